// Arm control module for the 6-DOF servo arm
//
// Provides:
// - Forward kinematics (joint angles -> link endpoint positions)
// - Servo command encoding with calibration and safety clamping
// - Serial link to the servo microcontroller

pub mod encoder;
pub mod kinematics;
pub mod serial;

pub use encoder::{ArmCalibration, CommandEncoder, CommandError, MoveOutcome, ServoCommand};
pub use kinematics::{forward_kinematics, joint_degrees_to_radians, Trajectory};
pub use serial::{LinkError, SerialLink, ServoLink};
