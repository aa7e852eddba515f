// Define message types for the runtime

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::config::JOINT_COUNT;

// Command from the panel -> runtime
// Angles stay signed so out-of-range requests reach the range check instead of failing to parse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PanelCommand {
    Joint { servo_id: i32, angle: i32 },
    Reset,
}

/// Arm pose published by the runtime for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmPose {
    /// Panel angles in degrees
    pub joints_deg: [u8; JOINT_COUNT],
    /// Base point followed by each link end
    pub points: Vec<[f64; 3]>,
    /// Drawable link segments (start, end)
    pub links: Vec<[[f64; 3]; 2]>,
    /// End-effector history, oldest first
    pub trajectory: Vec<[f64; 3]>,
}

impl ArmPose {
    pub fn end_effector(&self) -> Option<[f64; 3]> {
        self.points.last().copied()
    }
}

pub fn point_to_array(point: &Point3<f64>) -> [f64; 3] {
    [point.x, point.y, point.z]
}

/// Link health published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LinkHealth {
    Connected,
    Offline,
    WriteFailed,
}
