// Serial link to the servo microcontroller
//
// The firmware reads exactly two bytes per command: [servo_id, angle].
// No framing, checksum, or acknowledgment.

use serialport::{self, SerialPort, SerialPortInfo, SerialPortType};
use std::io::Write;
use std::thread::sleep;
use tracing::{debug, info, warn};

use crate::config::{
    DEFAULT_BAUDRATE, PORT_DESCRIPTION_HINT, PORT_PATH_PATTERNS, RESET_SETTLE, SERIAL_TIMEOUT,
};

/// Error types for the serial link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("No servo controller found ({scanned} serial ports scanned)")]
    DeviceNotFound { scanned: usize },

    #[error("Failed to open {port}: {source}")]
    Connection {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Byte sink for encoded servo commands
pub trait ServoLink {
    /// Write one `[servo_id, angle]` frame
    fn write_frame(&mut self, frame: [u8; 2]) -> Result<()>;
}

/// Serial connection to the servo controller board
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    port_name: String,
}

impl SerialLink {
    /// Auto-detect the controller and open it
    ///
    /// Every matching port is tried in scan order until one opens.
    pub fn connect(baudrate: u32) -> Result<Self> {
        let ports = serialport::available_ports()?;
        let candidates: Vec<&str> = matching_ports(&ports)
            .map(|info| info.port_name.as_str())
            .collect();
        debug!(
            "{} of {} serial ports look like a servo controller",
            candidates.len(),
            ports.len()
        );

        open_first(&candidates, ports.len(), |port_name| {
            Self::open_with_baudrate(port_name, baudrate)
        })
    }

    /// Open a known port at the default baudrate
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    /// Open with custom baudrate
    ///
    /// Blocks for the board's reset window before returning.
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(SERIAL_TIMEOUT)
            .open()
            .map_err(|source| LinkError::Connection {
                port: port_name.to_string(),
                source,
            })?;

        debug!("Waiting {:?} for {} to reset", RESET_SETTLE, port_name);
        sleep(RESET_SETTLE);
        info!("Connected to servo controller on {} @ {} baud", port_name, baudrate);

        Ok(Self {
            port,
            port_name: port_name.to_string(),
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ServoLink for SerialLink {
    fn write_frame(&mut self, frame: [u8; 2]) -> Result<()> {
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }
}

/// Scan serial ports and return the first one that looks like the controller
pub fn discover_port() -> Result<String> {
    let ports = serialport::available_ports()?;
    debug!("Scanning {} serial ports", ports.len());

    select_port(&ports)
        .map(|info| info.port_name.clone())
        .ok_or(LinkError::DeviceNotFound {
            scanned: ports.len(),
        })
}

/// Ports matching the controller's description or device path, in scan order
pub fn matching_ports(ports: &[SerialPortInfo]) -> impl Iterator<Item = &SerialPortInfo> {
    ports
        .iter()
        .filter(|info| is_servo_controller(&info.port_name, port_description(info).as_deref()))
}

/// First port matching the controller's description or device path
pub fn select_port(ports: &[SerialPortInfo]) -> Option<&SerialPortInfo> {
    matching_ports(ports).next()
}

/// Open the first candidate that succeeds, logging the ones that fail
///
/// Returns the last open error, or `DeviceNotFound` when there were no candidates.
fn open_first<T>(
    candidates: &[&str],
    scanned: usize,
    mut open: impl FnMut(&str) -> Result<T>,
) -> Result<T> {
    let mut last_err = None;

    for &port_name in candidates {
        match open(port_name) {
            Ok(link) => return Ok(link),
            Err(e) => {
                warn!("{}", e);
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or(LinkError::DeviceNotFound { scanned }))
}

/// Human-readable USB description (manufacturer and product), if any
pub fn port_description(info: &SerialPortInfo) -> Option<String> {
    match &info.port_type {
        SerialPortType::UsbPort(usb) => {
            let parts: Vec<&str> = [usb.manufacturer.as_deref(), usb.product.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        }
        _ => None,
    }
}

/// Match on the vendor name in the description or a USB-serial device path
pub fn is_servo_controller(port_name: &str, description: Option<&str>) -> bool {
    description.is_some_and(|desc| desc.contains(PORT_DESCRIPTION_HINT))
        || PORT_PATH_PATTERNS
            .iter()
            .any(|pattern| port_name.contains(pattern))
}

/// In-memory link that records frames, for tests
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingLink {
    pub frames: Vec<[u8; 2]>,
    pub fail_writes: bool,
}

#[cfg(test)]
impl ServoLink for RecordingLink {
    fn write_frame(&mut self, frame: [u8; 2]) -> Result<()> {
        if self.fail_writes {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }
        self.frames.push(frame);
        Ok(())
    }
}
