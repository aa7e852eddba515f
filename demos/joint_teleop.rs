// Keyboard joint panel: 1-6 select joint, Left/Right ±1°, Up/Down ±10°, R reset, Q quit
//
// Usage: cargo run --example joint_teleop   (with `arm-control serve` running)
use arm_control::config::{JOINT_COUNT, MAX_ANGLE, MIN_ANGLE, TOPIC_CMD, TOPIC_POSE};
use arm_control::messages::{ArmPose, PanelCommand};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::Duration;
use tracing::{info, warn};

const FINE_STEP: i32 = 1; // degrees
const COARSE_STEP: i32 = 10; // degrees

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    info!("Controls: 1-6=joint, Left/Right=±1°, Up/Down=±10°, R=reset, Q=quit");

    enable_raw_mode()?;
    let result = run_panel(&session).await;
    disable_raw_mode()?;

    result
}

async fn run_panel(
    session: &zenoh::Session,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let publisher = session.declare_publisher(TOPIC_CMD).await?;
    let poses = session.declare_subscriber(TOPIC_POSE).await?;

    let mut joint: usize = 0;
    let mut angles = [0i32; JOINT_COUNT];
    info!("Joint {} selected", joint);

    loop {
        // Poll for key with 20ms timeout
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;

                let step = match code {
                    // Joint selection
                    KeyCode::Char(c @ '1'..='6') if pressed => {
                        joint = c as usize - '1' as usize;
                        info!("Joint {} selected ({}°)", joint, angles[joint]);
                        None
                    }

                    // Angle adjustment
                    KeyCode::Left if pressed => Some(-FINE_STEP),
                    KeyCode::Right if pressed => Some(FINE_STEP),
                    KeyCode::Down if pressed => Some(-COARSE_STEP),
                    KeyCode::Up if pressed => Some(COARSE_STEP),

                    KeyCode::Char('r') if pressed => {
                        angles = [0; JOINT_COUNT];
                        publish(&publisher, &PanelCommand::Reset).await?;
                        info!("Reset");
                        None
                    }

                    // Quit
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,

                    _ => None,
                };

                if let Some(step) = step {
                    angles[joint] = (angles[joint] + step).clamp(MIN_ANGLE, MAX_ANGLE);
                    let cmd = PanelCommand::Joint {
                        servo_id: joint as i32,
                        angle: angles[joint],
                    };
                    publish(&publisher, &cmd).await?;
                }
            }
        }

        // Show the latest pose the runtime published
        let mut latest = None;
        while let Ok(Some(sample)) = poses.try_recv() {
            latest = Some(sample);
        }
        if let Some(sample) = latest {
            match serde_json::from_slice::<ArmPose>(&sample.payload().to_bytes()) {
                Ok(pose) => print_pose(&pose),
                Err(e) => warn!("Failed to parse pose: {}", e),
            }
        }
    }

    Ok(())
}

async fn publish(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: &PanelCommand,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(cmd)?).await?;
    Ok(())
}

fn print_pose(pose: &ArmPose) {
    if let Some([x, y, z]) = pose.end_effector() {
        info!(
            "Joints {:?} -> end effector ({:.3}, {:.3}, {:.3}), trace {} pts",
            pose.joints_deg,
            x,
            y,
            z,
            pose.trajectory.len()
        );
    }
}
