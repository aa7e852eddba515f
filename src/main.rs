use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use arm_control::arm::encoder::ArmCalibration;
use arm_control::arm::kinematics::forward_kinematics;
use arm_control::arm::serial::{port_description, select_port};
use arm_control::config::{load_calibration, DEFAULT_BAUDRATE, JOINT_COUNT};
use arm_control::messages::point_to_array;
use arm_control::runtime::{self, RuntimeOptions};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Control runtime for a 6-DOF servo arm
#[derive(Parser)]
#[command(name = "arm-control", version)]
struct Cli {
    /// Serial port of the servo controller (auto-detected if omitted)
    #[arg(long, global = true)]
    port: Option<String>,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE, global = true)]
    baud: u32,

    /// JSON file with per-servo offsets and safety floors
    #[arg(long, global = true)]
    calibration: Option<PathBuf>,

    /// Send panel angles without offsets or safety floors
    #[arg(long, global = true, conflicts_with = "calibration")]
    uncalibrated: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the control loop (default)
    Serve,
    /// Print link endpoint positions for six joint angles in degrees
    Fk {
        #[arg(num_args = 6, allow_negative_numbers = true, required = true)]
        degrees: Vec<f64>,
    },
    /// List serial ports and mark the one auto-detection would pick
    Ports,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(
            "info".parse().expect("static directive"),
        ))
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), BoxError> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let calibration = match (&cli.calibration, cli.uncalibrated) {
                (Some(path), _) => load_calibration(path)?,
                (None, true) => ArmCalibration::uncalibrated(),
                (None, false) => ArmCalibration::default(),
            };
            let options = RuntimeOptions {
                port: cli.port,
                baudrate: cli.baud,
                calibration,
            };
            runtime::run(options).await
        }
        Command::Fk { degrees } => print_link_points(&degrees),
        Command::Ports => list_ports(),
    }
}

fn print_link_points(degrees: &[f64]) -> Result<(), BoxError> {
    let degrees: [f64; JOINT_COUNT] = degrees
        .try_into()
        .map_err(|_| format!("expected {} joint angles", JOINT_COUNT))?;
    let points = forward_kinematics(&degrees.map(f64::to_radians));
    let points: Vec<[f64; 3]> = points.iter().map(point_to_array).collect();

    println!("{}", serde_json::to_string_pretty(&points)?);
    Ok(())
}

fn list_ports() -> Result<(), BoxError> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    let selected = select_port(&ports).map(|info| info.port_name.clone());
    for info in &ports {
        let marker = if selected.as_deref() == Some(info.port_name.as_str()) {
            "*"
        } else {
            " "
        };
        let description = port_description(info).unwrap_or_else(|| "-".to_string());
        println!("{} {:<24} {}", marker, info.port_name, description);
    }
    Ok(())
}
