// 50 Hz loop: drain panel commands, drive the servos, publish pose and link health
// All session state lives in this one task, so commands are applied strictly in arrival order.

use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::arm::encoder::{ArmCalibration, CommandEncoder};
use crate::arm::serial::SerialLink;
use crate::config::{LOOP_HZ, TOPIC_CMD, TOPIC_HEALTH, TOPIC_POSE};
use crate::messages::PanelCommand;
use crate::session::ArmSession;

/// Settings for a runtime instance
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// Serial port to use instead of auto-detection
    pub port: Option<String>,
    pub baudrate: u32,
    pub calibration: ArmCalibration,
}

/// Open the servo controller, or `None` to run without hardware
pub fn connect_link(port: Option<&str>, baudrate: u32) -> Option<SerialLink> {
    let result = match port {
        Some(port) => SerialLink::open_with_baudrate(port, baudrate),
        None => SerialLink::connect(baudrate),
    };

    match result {
        Ok(link) => Some(link),
        Err(e) => {
            warn!("{} - continuing without servo hardware", e);
            None
        }
    }
}

/// `connect_link` on the blocking pool; opening waits out the board reset
pub async fn open_link(port: Option<String>, baudrate: u32) -> Option<SerialLink> {
    match tokio::task::spawn_blocking(move || connect_link(port.as_deref(), baudrate)).await {
        Ok(link) => link,
        Err(e) => {
            warn!("Serial connect task failed: {} - continuing without servo hardware", e);
            None
        }
    }
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let link = open_link(options.port.clone(), options.baudrate).await;
    let encoder = CommandEncoder::new(link, options.calibration);
    let mut arm = ArmSession::new(encoder);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD).await?;
    let pub_pose = session.declare_publisher(TOPIC_POSE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!("Runtime started: {}Hz loop, link {:?}", LOOP_HZ, arm.health());
    info!("Subscribed to: {}", TOPIC_CMD);
    info!("Publishing to: {}, {}", TOPIC_POSE, TOPIC_HEALTH);

    // Publish the starting pose so a renderer has something to draw
    let mut pose_changed = true;

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), apply in order
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<PanelCommand>(&payload) {
                Ok(cmd) => {
                    pose_changed |= arm.apply(cmd);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Publish pose only when a command touched it
        if pose_changed {
            let pose_json = serde_json::to_string(&arm.pose())?;
            pub_pose.put(pose_json).await?;
            pose_changed = false;
        }

        // 3. Publish health
        let health_json = serde_json::to_string(&arm.health())?;
        pub_health.put(health_json).await?;
    }
}
