// Serial settings, calibration defaults, topics
use std::path::Path;
use std::time::Duration;

use crate::arm::encoder::ArmCalibration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Zenoh topics
pub const TOPIC_CMD: &str = "arm/cmd"; // panel commands
pub const TOPIC_POSE: &str = "arm/state/pose"; // link positions for rendering
pub const TOPIC_HEALTH: &str = "arm/state/health"; // link status

// Serial link to the servo microcontroller
pub const DEFAULT_BAUDRATE: u32 = 9600;
pub const SERIAL_TIMEOUT: Duration = Duration::from_secs(1);

// The board resets when the port opens; give the bootloader time before the first write
pub const RESET_SETTLE: Duration = Duration::from_secs(2);

// Pause after each write so the firmware's input buffer is not overrun
pub const WRITE_SETTLE: Duration = Duration::from_millis(10);

// Port auto-detection: USB description substring, device path patterns
pub const PORT_DESCRIPTION_HINT: &str = "Arduino";
pub const PORT_PATH_PATTERNS: [&str; 2] = ["ttyUSB", "ttyACM"];

// Arm geometry
pub const JOINT_COUNT: usize = 6;
pub const LINK_LENGTH: f64 = 0.1; // scene units

// Servo angle range in degrees
pub const MIN_ANGLE: i32 = 0;
pub const MAX_ANGLE: i32 = 180;

// Calibration constants (degrees). Servo 4 is mounted 30° off its horn.
pub const SERVO_OFFSETS: [i16; JOINT_COUNT] = [0, 0, 0, 0, 30, 0];
pub const MIN_SAFE_ANGLES: [u8; JOINT_COUNT] = [0, 0, 0, 0, 0, 0];

// Number of end-effector positions kept for the trajectory trace
pub const TRAJECTORY_CAPACITY: usize = 512;

/// Error types for loading a calibration file
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("Failed to read calibration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid calibration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid calibration file {path}: servo {servo_id} min_safe {min_safe}° exceeds 180°")]
    Invalid {
        path: String,
        servo_id: usize,
        min_safe: u8,
    },
}

/// Load per-servo offsets and safety floors from a JSON file
///
/// Format: `{"offsets": [0, 0, 0, 0, 30, 0], "min_safe": [0, 0, 0, 0, 0, 0]}`
pub fn load_calibration(path: &Path) -> Result<ArmCalibration, CalibrationError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| CalibrationError::Io {
        path: display.clone(),
        source,
    })?;
    let calibration: ArmCalibration =
        serde_json::from_str(&text).map_err(|source| CalibrationError::Parse {
            path: display.clone(),
            source,
        })?;

    // A floor above the servo range could never be honored
    if let Some((servo_id, &min_safe)) = calibration
        .min_safe
        .iter()
        .enumerate()
        .find(|&(_, &floor)| i32::from(floor) > MAX_ANGLE)
    {
        return Err(CalibrationError::Invalid {
            path: display,
            servo_id,
            min_safe,
        });
    }

    Ok(calibration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_calibration_matches_constants() {
        let calibration = ArmCalibration::default();
        assert_eq!(calibration.offsets, SERVO_OFFSETS);
        assert_eq!(calibration.min_safe, MIN_SAFE_ANGLES);
    }

    #[test]
    fn test_calibration_json_shape() {
        let calibration: ArmCalibration = serde_json::from_str(
            r#"{"offsets": [-5, 0, 0, 10, 30, 0], "min_safe": [0, 15, 0, 0, 0, 0]}"#,
        )
        .unwrap();
        assert_eq!(calibration.offsets[0], -5);
        assert_eq!(calibration.min_safe[1], 15);

        // Six entries per table
        let short = serde_json::from_str::<ArmCalibration>(
            r#"{"offsets": [0, 0], "min_safe": [0, 0, 0, 0, 0, 0]}"#,
        );
        assert!(short.is_err());
    }

    fn write_calibration(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_calibration_file() {
        let file = write_calibration(
            r#"{"offsets": [0, -10, 0, 0, 30, 0], "min_safe": [0, 0, 20, 0, 0, 180]}"#,
        );
        let calibration = load_calibration(file.path()).unwrap();

        assert_eq!(calibration.offsets, [0, -10, 0, 0, 30, 0]);
        assert_eq!(calibration.min_safe, [0, 0, 20, 0, 0, 180]);
    }

    #[test]
    fn test_floor_above_range_rejected() {
        let file = write_calibration(
            r#"{"offsets": [0, 0, 0, 0, 0, 0], "min_safe": [200, 0, 0, 0, 0, 0]}"#,
        );
        let err = load_calibration(file.path()).unwrap_err();

        assert!(matches!(
            err,
            CalibrationError::Invalid {
                servo_id: 0,
                min_safe: 200,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_file() {
        let file = write_calibration("{\"offsets\": ");
        let err = load_calibration(file.path()).unwrap_err();
        assert!(matches!(err, CalibrationError::Parse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_calibration(Path::new("/nonexistent/arm-calibration.json")).unwrap_err();
        assert!(matches!(err, CalibrationError::Io { .. }));
    }
}
