// Forward kinematics for the 6-DOF arm
// Chains one homogeneous transform per joint: rotate about Z, then advance along the rotated X axis.

use std::collections::VecDeque;

use nalgebra::{Matrix4, Point3};

use crate::config::{JOINT_COUNT, LINK_LENGTH, TRAJECTORY_CAPACITY};

/// Base point followed by the end of every link
pub type LinkPoints = [Point3<f64>; JOINT_COUNT + 1];

/// Homogeneous transform of a single link
///
/// | cos θ  -sin θ  0  l·cos θ |
/// | sin θ   cos θ  0  l·sin θ |
/// | 0       0      1  0       |
/// | 0       0      0  1       |
fn link_transform(theta: f64, length: f64) -> Matrix4<f64> {
    let (sin_t, cos_t) = theta.sin_cos();

    #[rustfmt::skip]
    let transform = Matrix4::new(
        cos_t, -sin_t, 0.0, length * cos_t,
        sin_t,  cos_t, 0.0, length * sin_t,
        0.0,    0.0,   1.0, 0.0,
        0.0,    0.0,   0.0, 1.0,
    );
    transform
}

/// Translation column of a homogeneous transform
fn origin_of(transform: &Matrix4<f64>) -> Point3<f64> {
    Point3::new(transform[(0, 3)], transform[(1, 3)], transform[(2, 3)])
}

/// Compute link endpoint positions for the given joint angles
///
/// # Arguments
/// * `angles` - Joint angles in radians, base joint first
///
/// # Returns
/// Seven points: the base at the origin, then the end of each link
pub fn forward_kinematics(angles: &[f64; JOINT_COUNT]) -> LinkPoints {
    forward_kinematics_with_links(angles, &[LINK_LENGTH; JOINT_COUNT])
}

/// Compute link endpoint positions with custom link lengths
pub fn forward_kinematics_with_links(
    angles: &[f64; JOINT_COUNT],
    links: &[f64; JOINT_COUNT],
) -> LinkPoints {
    let mut transform = Matrix4::identity();
    let mut points = [Point3::origin(); JOINT_COUNT + 1];

    for (i, (&theta, &length)) in angles.iter().zip(links.iter()).enumerate() {
        transform *= link_transform(theta, length);
        points[i + 1] = origin_of(&transform);
    }

    points
}

/// Convert joint angles from the panel's degrees to radians
pub fn joint_degrees_to_radians(degrees: &[u8; JOINT_COUNT]) -> [f64; JOINT_COUNT] {
    degrees.map(|deg| f64::from(deg).to_radians())
}

/// Consecutive point pairs that form a visible link
///
/// Zero-length links are skipped since they have no direction to draw along.
pub fn link_segments(points: &[Point3<f64>]) -> Vec<(Point3<f64>, Point3<f64>)> {
    points
        .windows(2)
        .filter(|pair| (pair[1] - pair[0]).norm() > f64::EPSILON)
        .map(|pair| (pair[0], pair[1]))
        .collect()
}

/// Bounded history of end-effector positions, oldest first
#[derive(Debug, Clone)]
pub struct Trajectory {
    points: VecDeque<Point3<f64>>,
    capacity: usize,
}

impl Trajectory {
    pub fn new() -> Self {
        Self::with_capacity(TRAJECTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a position, dropping the oldest one when full
    pub fn push(&mut self, point: Point3<f64>) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.points.iter()
    }
}

impl Default for Trajectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn assert_point(p: &Point3<f64>, x: f64, y: f64, z: f64) {
        assert!(
            (p.x - x).abs() < EPS && (p.y - y).abs() < EPS && (p.z - z).abs() < EPS,
            "expected ({}, {}, {}), got ({}, {}, {})",
            x,
            y,
            z,
            p.x,
            p.y,
            p.z
        );
    }

    #[test]
    fn test_zero_angles_stretch_along_x() {
        let points = forward_kinematics(&[0.0; JOINT_COUNT]);

        assert_point(&points[0], 0.0, 0.0, 0.0);
        for (i, p) in points.iter().enumerate() {
            assert_point(p, 0.1 * i as f64, 0.0, 0.0);
        }
        assert_point(&points[JOINT_COUNT], 0.6, 0.0, 0.0);
    }

    #[test]
    fn test_all_right_angles() {
        // Cumulative headings are 90, 180, 270, 360, 450, 540 degrees,
        // so each link steps +y, -x, -y, +x, +y, -x
        let points = forward_kinematics(&[FRAC_PI_2; JOINT_COUNT]);

        assert_point(&points[1], 0.0, 0.1, 0.0);
        assert_point(&points[2], -0.1, 0.1, 0.0);
        assert_point(&points[3], -0.1, 0.0, 0.0);
        assert_point(&points[4], 0.0, 0.0, 0.0);
        assert_point(&points[5], 0.0, 0.1, 0.0);
        assert_point(&points[6], -0.1, 0.1, 0.0);
    }

    #[test]
    fn test_base_rotation_swings_whole_arm() {
        let mut angles = [0.0; JOINT_COUNT];
        angles[0] = FRAC_PI_2;
        let points = forward_kinematics(&angles);

        // Every link follows the base joint, so the arm lies along +y
        assert_point(&points[JOINT_COUNT], 0.0, 0.6, 0.0);
    }

    #[test]
    fn test_arm_stays_in_plane() {
        let points = forward_kinematics(&[0.3, 1.1, 2.0, 0.7, 3.0, 1.5]);
        assert!(points.iter().all(|p| p.z.abs() < EPS));
    }

    #[test]
    fn test_custom_link_lengths() {
        let links = [1.0, 0.5, 0.25, 0.0, 0.0, 0.25];
        let points = forward_kinematics_with_links(&[0.0; JOINT_COUNT], &links);
        assert_point(&points[JOINT_COUNT], 2.0, 0.0, 0.0);
    }

    #[test]
    fn test_degrees_to_radians() {
        let radians = joint_degrees_to_radians(&[0, 90, 180, 45, 0, 0]);
        assert!(radians[0].abs() < EPS);
        assert!((radians[1] - FRAC_PI_2).abs() < EPS);
        assert!((radians[2] - std::f64::consts::PI).abs() < EPS);
        assert!((radians[3] - std::f64::consts::FRAC_PI_4).abs() < EPS);
    }

    #[test]
    fn test_segments_skip_degenerate_links() {
        let links = [0.1, 0.0, 0.1, 0.1, 0.1, 0.1];
        let points = forward_kinematics_with_links(&[0.0; JOINT_COUNT], &links);
        let segments = link_segments(&points);

        assert_eq!(segments.len(), 5);
        for (start, end) in &segments {
            assert!(((end - start).norm() - 0.1).abs() < EPS);
        }
    }

    #[test]
    fn test_trajectory_drops_oldest() {
        let mut trajectory = Trajectory::with_capacity(2);
        trajectory.push(Point3::new(1.0, 0.0, 0.0));
        trajectory.push(Point3::new(2.0, 0.0, 0.0));
        trajectory.push(Point3::new(3.0, 0.0, 0.0));

        let xs: Vec<f64> = trajectory.points().map(|p| p.x).collect();
        assert_eq!(xs, vec![2.0, 3.0]);

        trajectory.clear();
        assert!(trajectory.is_empty());
    }
}
