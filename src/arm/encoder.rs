// Servo command encoding: calibration offset, safety clamping, duplicate suppression

use serde::{Deserialize, Serialize};
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, info};

use super::serial::{LinkError, ServoLink};
use crate::config::{
    JOINT_COUNT, MAX_ANGLE, MIN_ANGLE, MIN_SAFE_ANGLES, SERVO_OFFSETS, WRITE_SETTLE,
};

/// Per-servo calibration applied before transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmCalibration {
    /// Degrees added to the panel angle
    pub offsets: [i16; JOINT_COUNT],
    /// Lowest angle ever sent to each servo
    pub min_safe: [u8; JOINT_COUNT],
}

impl ArmCalibration {
    /// No offsets and no safety floor
    pub fn uncalibrated() -> Self {
        Self {
            offsets: [0; JOINT_COUNT],
            min_safe: [0; JOINT_COUNT],
        }
    }

    /// Angle actually sent to the servo for a panel angle
    ///
    /// Within [min_safe, 180] for floors inside the servo range.
    /// `None` for an unknown servo.
    pub fn real_angle(&self, servo_id: usize, angle: u8) -> Option<u8> {
        let offset = *self.offsets.get(servo_id)?;
        let floor = (*self.min_safe.get(servo_id)?).min(MAX_ANGLE as u8);

        let raw = i32::from(angle) + i32::from(offset);
        let clamped = raw.clamp(MIN_ANGLE, MAX_ANGLE) as u8;
        Some(clamped.max(floor))
    }
}

impl Default for ArmCalibration {
    fn default() -> Self {
        Self {
            offsets: SERVO_OFFSETS,
            min_safe: MIN_SAFE_ANGLES,
        }
    }
}

/// A validated command for one servo channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServoCommand {
    pub servo_id: u8,
    pub real_angle: u8,
}

impl ServoCommand {
    /// Wire frame: [servo_id, real_angle]
    pub fn to_bytes(self) -> [u8; 2] {
        [self.servo_id, self.real_angle]
    }
}

/// Result of a move request that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Frame written to the link
    Sent(ServoCommand),
    /// Same real angle as the last one sent; nothing written
    Suppressed(ServoCommand),
}

/// Error types for servo commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Servo {servo_id} / angle {angle} out of range (servo 0-5, angle 0-180)")]
    OutOfRange { servo_id: i32, angle: i32 },

    #[error("Servo controller not connected")]
    NotConnected,

    #[error("Failed to send command to servo {servo_id}: {source}")]
    Transmission {
        servo_id: u8,
        #[source]
        source: LinkError,
    },
}

/// Check a panel request against the servo and angle ranges
pub fn check_range(servo_id: i32, angle: i32) -> Result<(usize, u8), CommandError> {
    let servo_ok = (0..JOINT_COUNT as i32).contains(&servo_id);
    let angle_ok = (MIN_ANGLE..=MAX_ANGLE).contains(&angle);

    if servo_ok && angle_ok {
        Ok((servo_id as usize, angle as u8))
    } else {
        Err(CommandError::OutOfRange { servo_id, angle })
    }
}

/// Turns panel angles into frames on the servo link
pub struct CommandEncoder<L: ServoLink> {
    link: Option<L>,
    calibration: ArmCalibration,
    last_sent: [Option<u8>; JOINT_COUNT],
    write_settle: Duration,
}

impl<L: ServoLink> CommandEncoder<L> {
    /// Create an encoder; `None` means the controller was never found
    pub fn new(link: Option<L>, calibration: ArmCalibration) -> Self {
        Self {
            link,
            calibration,
            last_sent: [None; JOINT_COUNT],
            write_settle: WRITE_SETTLE,
        }
    }

    /// Override the pause after each write
    pub fn with_write_settle(mut self, write_settle: Duration) -> Self {
        self.write_settle = write_settle;
        self
    }

    /// Move one servo to a panel angle
    ///
    /// The last-sent cache is updated before the write, so a failed write is
    /// not retried by repeating the same command.
    pub fn move_servo(&mut self, servo_id: i32, angle: i32) -> Result<MoveOutcome, CommandError> {
        let Some(link) = self.link.as_mut() else {
            return Err(CommandError::NotConnected);
        };

        let (id, checked) = check_range(servo_id, angle)?;
        let real_angle = self
            .calibration
            .real_angle(id, checked)
            .ok_or(CommandError::OutOfRange { servo_id, angle })?;
        let command = ServoCommand {
            servo_id: id as u8,
            real_angle,
        };

        if self.last_sent[id] == Some(command.real_angle) {
            debug!("Servo {} already at {}°, skipping", id, command.real_angle);
            return Ok(MoveOutcome::Suppressed(command));
        }

        self.last_sent[id] = Some(command.real_angle);

        link.write_frame(command.to_bytes())
            .map_err(|source| CommandError::Transmission {
                servo_id: command.servo_id,
                source,
            })?;
        sleep(self.write_settle);

        info!(
            "Servo {} -> panel {}°, sent {}°",
            id, checked, command.real_angle
        );
        Ok(MoveOutcome::Sent(command))
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn calibration(&self) -> &ArmCalibration {
        &self.calibration
    }

    /// Real angle most recently marked as sent for a servo
    pub fn last_sent(&self, servo_id: usize) -> Option<u8> {
        self.last_sent.get(servo_id).copied().flatten()
    }

    pub fn link(&self) -> Option<&L> {
        self.link.as_ref()
    }
}
