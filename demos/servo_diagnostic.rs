// Servo diagnostic: find the controller, open it, optionally center every servo
//
// Usage: cargo run --example servo_diagnostic -- [port]
// Example: cargo run --example servo_diagnostic -- /dev/ttyACM0

use arm_control::arm::encoder::{ArmCalibration, CommandEncoder, MoveOutcome};
use arm_control::arm::serial::{discover_port, SerialLink};
use arm_control::config::JOINT_COUNT;
use std::io::{self, Write};

const CENTER: i32 = 90;

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse()?),
        )
        .init();

    // Step 1: port from args, else auto-detect
    println!("Step 1: Locating servo controller...");
    let port = match std::env::args().nth(1) {
        Some(port) => port,
        None => match discover_port() {
            Ok(port) => port,
            Err(e) => {
                println!("  ✗ {}", e);
                println!();
                println!("Troubleshooting:");
                println!("  - Verify the USB cable is connected");
                println!("  - Run `arm-control ports` to see what the system reports");
                println!("  - Pass the port path explicitly");
                return Err(e.into());
            }
        },
    };
    println!("  ✓ Using {}", port);
    println!();

    // Step 2: open (waits for the board to reset)
    println!("Step 2: Opening serial port...");
    let link = match SerialLink::open(&port) {
        Ok(link) => {
            println!("  ✓ Serial port opened successfully");
            link
        }
        Err(e) => {
            println!("  ✗ Failed to open serial port: {}", e);
            println!("  - On Linux, check the user is in the dialout group");
            return Err(e.into());
        }
    };
    println!();

    // Step 3: centering moves the arm
    if !confirm("Step 3: Center all servos at 90°? The arm WILL move")? {
        println!("Done (no writes).");
        return Ok(());
    }

    let calibration = ArmCalibration::default();
    let mut encoder = CommandEncoder::new(Some(link), calibration);
    for servo_id in 0..JOINT_COUNT as i32 {
        match encoder.move_servo(servo_id, CENTER) {
            Ok(MoveOutcome::Sent(cmd)) => {
                println!("  ✓ Servo {} sent {}°", cmd.servo_id, cmd.real_angle)
            }
            Ok(MoveOutcome::Suppressed(cmd)) => {
                println!("  - Servo {} already at {}°", cmd.servo_id, cmd.real_angle)
            }
            Err(e) => println!("  ✗ {}", e),
        }
    }

    Ok(())
}
