// Arm session: single owner of joint angles, the servo encoder and the trajectory trace

use tracing::{error, info, warn};

use crate::arm::encoder::{check_range, CommandEncoder, CommandError, MoveOutcome};
use crate::arm::kinematics::{
    forward_kinematics, joint_degrees_to_radians, link_segments, LinkPoints, Trajectory,
};
use crate::arm::serial::ServoLink;
use crate::config::JOINT_COUNT;
use crate::messages::{point_to_array, ArmPose, LinkHealth, PanelCommand};

pub struct ArmSession<L: ServoLink> {
    joints: [u8; JOINT_COUNT],
    encoder: CommandEncoder<L>,
    trajectory: Trajectory,
    last_write_failed: bool,
}

impl<L: ServoLink> ArmSession<L> {
    /// Start with all joints at 0° and the initial pose traced
    pub fn new(encoder: CommandEncoder<L>) -> Self {
        Self::with_trajectory(encoder, Trajectory::new())
    }

    pub fn with_trajectory(encoder: CommandEncoder<L>, trajectory: Trajectory) -> Self {
        let mut session = Self {
            joints: [0; JOINT_COUNT],
            encoder,
            trajectory,
            last_write_failed: false,
        };
        session.trace_pose();
        session
    }

    /// Apply a panel command, returns true if the pose may have changed
    pub fn apply(&mut self, cmd: PanelCommand) -> bool {
        match cmd {
            PanelCommand::Joint { servo_id, angle } => self.set_joint(servo_id, angle),
            PanelCommand::Reset => {
                self.reset();
                true
            }
        }
    }

    /// Move one joint from a panel angle
    ///
    /// Out-of-range requests are logged and leave the session untouched.
    pub fn set_joint(&mut self, servo_id: i32, angle: i32) -> bool {
        let (id, degrees) = match check_range(servo_id, angle) {
            Ok(checked) => checked,
            Err(e) => {
                warn!("{}", e);
                return false;
            }
        };

        self.joints[id] = degrees;
        self.send(servo_id, angle);
        self.trace_pose();
        true
    }

    /// Return every joint to 0° and start a fresh trajectory
    pub fn reset(&mut self) {
        info!("Resetting arm");
        self.trajectory.clear();
        self.joints = [0; JOINT_COUNT];
        for servo_id in 0..JOINT_COUNT as i32 {
            self.send(servo_id, 0);
        }
        self.trace_pose();
    }

    /// Current pose for rendering
    pub fn pose(&self) -> ArmPose {
        let points = self.link_points();

        ArmPose {
            joints_deg: self.joints,
            points: points.iter().map(point_to_array).collect(),
            links: link_segments(&points)
                .iter()
                .map(|(start, end)| [point_to_array(start), point_to_array(end)])
                .collect(),
            trajectory: self.trajectory.points().map(point_to_array).collect(),
        }
    }

    pub fn health(&self) -> LinkHealth {
        if !self.encoder.is_connected() {
            LinkHealth::Offline
        } else if self.last_write_failed {
            LinkHealth::WriteFailed
        } else {
            LinkHealth::Connected
        }
    }

    pub fn joints(&self) -> [u8; JOINT_COUNT] {
        self.joints
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn encoder(&self) -> &CommandEncoder<L> {
        &self.encoder
    }

    fn link_points(&self) -> LinkPoints {
        forward_kinematics(&joint_degrees_to_radians(&self.joints))
    }

    fn trace_pose(&mut self) {
        let end_effector = self.link_points()[JOINT_COUNT];
        self.trajectory.push(end_effector);
    }

    fn send(&mut self, servo_id: i32, angle: i32) {
        match self.encoder.move_servo(servo_id, angle) {
            Ok(MoveOutcome::Sent(_)) => self.last_write_failed = false,
            Ok(MoveOutcome::Suppressed(_)) => {}
            Err(err @ CommandError::Transmission { .. }) => {
                error!("{}", err);
                self.last_write_failed = true;
            }
            Err(err) => warn!("{}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::encoder::ArmCalibration;
    use crate::arm::serial::RecordingLink;
    use std::time::Duration;

    fn session() -> ArmSession<RecordingLink> {
        let encoder = CommandEncoder::new(Some(RecordingLink::default()), ArmCalibration::default())
            .with_write_settle(Duration::ZERO);
        ArmSession::new(encoder)
    }

    fn frames(session: &ArmSession<RecordingLink>) -> Vec<[u8; 2]> {
        session
            .encoder()
            .link()
            .map(|l| l.frames.clone())
            .unwrap_or_default()
    }

    #[test]
    fn test_initial_pose() {
        let session = session();
        let pose = session.pose();

        assert_eq!(pose.points.len(), JOINT_COUNT + 1);
        assert_eq!(pose.links.len(), JOINT_COUNT);
        assert_eq!(pose.trajectory.len(), 1);
        let end = pose.end_effector().unwrap();
        assert!((end[0] - 0.6).abs() < 1e-9);
        assert_eq!(session.health(), LinkHealth::Connected);
    }

    #[test]
    fn test_set_joint_sends_and_traces() {
        let mut session = session();
        assert!(session.set_joint(4, 150));

        assert_eq!(session.joints()[4], 150);
        assert_eq!(frames(&session), vec![[4, 180]]);
        assert_eq!(session.trajectory().len(), 2);
    }

    #[test]
    fn test_repeat_traces_without_resending() {
        let mut session = session();
        session.set_joint(1, 30);
        session.set_joint(1, 30);

        assert_eq!(frames(&session).len(), 1);
        assert_eq!(session.trajectory().len(), 3);
    }

    #[test]
    fn test_out_of_range_leaves_state() {
        let mut session = session();
        assert!(!session.set_joint(6, 90));
        assert!(!session.set_joint(0, -1));

        assert_eq!(session.joints(), [0; JOINT_COUNT]);
        assert!(frames(&session).is_empty());
        assert_eq!(session.trajectory().len(), 1);
    }

    #[test]
    fn test_reset() {
        let mut session = session();
        session.set_joint(0, 90);
        session.set_joint(2, 45);
        session.reset();

        assert_eq!(session.joints(), [0; JOINT_COUNT]);
        assert_eq!(session.trajectory().len(), 1);
        // Every servo is commanded to 0; servo 4 carries its offset
        assert_eq!(
            frames(&session),
            vec![[0, 90], [2, 45], [0, 0], [1, 0], [2, 0], [3, 0], [4, 30], [5, 0]]
        );
    }

    #[test]
    fn test_offline_still_tracks_pose() {
        let encoder: CommandEncoder<RecordingLink> =
            CommandEncoder::new(None, ArmCalibration::default());
        let mut session = ArmSession::new(encoder);

        assert!(session.apply(PanelCommand::Joint {
            servo_id: 0,
            angle: 90
        }));
        assert_eq!(session.health(), LinkHealth::Offline);

        let end = session.pose().end_effector().unwrap();
        assert!(end[0].abs() < 1e-9);
        assert!((end[1] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_write_failure_reported() {
        let link = RecordingLink {
            fail_writes: true,
            ..Default::default()
        };
        let encoder = CommandEncoder::new(Some(link), ArmCalibration::default())
            .with_write_settle(Duration::ZERO);
        let mut session = ArmSession::new(encoder);

        session.set_joint(3, 10);
        assert_eq!(session.health(), LinkHealth::WriteFailed);
        assert_eq!(session.joints()[3], 10);
    }
}
