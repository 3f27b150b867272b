//! Body landmark topology (33-point pose model)

use serde::Serialize;

/// Single pose landmark in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Landmark {
    /// Normalized X coordinate (0.0-1.0, may exceed the range off-frame)
    pub x: f32,
    /// Normalized Y coordinate (0.0-1.0)
    pub y: f32,
    /// Relative depth
    pub z: f32,
    /// Probability that the landmark is visible (0.0-1.0)
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// Visibility strictly above the threshold
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }

    /// Convert to pixel coordinates (truncating)
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        ((self.x * width as f32) as i32, (self.y * height as f32) as i32)
    }
}

/// Landmark indices of the 33-point body model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum PoseLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl PoseLandmark {
    pub const COUNT: usize = 33;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Shoulders and hips, used to locate the body centre
pub const TORSO: [PoseLandmark; 4] = [
    PoseLandmark::LeftShoulder,
    PoseLandmark::RightShoulder,
    PoseLandmark::LeftHip,
    PoseLandmark::RightHip,
];

/// Skeleton edges (start index, end index)
pub const POSE_CONNECTIONS: [(usize, usize); 35] = [
    // face
    (0, 1), (1, 2), (2, 3), (3, 7),
    (0, 4), (4, 5), (5, 6), (6, 8),
    (9, 10),
    // arms and hands
    (11, 12),
    (11, 13), (13, 15), (15, 17), (15, 19), (15, 21), (17, 19),
    (12, 14), (14, 16), (16, 18), (16, 20), (16, 22), (18, 20),
    // torso
    (11, 23), (12, 24), (23, 24),
    // legs and feet
    (23, 25), (24, 26), (25, 27), (26, 28),
    (27, 29), (28, 30), (29, 31), (30, 32), (27, 31), (28, 32),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connections_within_topology() {
        for (a, b) in POSE_CONNECTIONS {
            assert!(a < PoseLandmark::COUNT && b < PoseLandmark::COUNT);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn test_torso_indices() {
        let idx: Vec<usize> = TORSO.iter().map(|l| l.index()).collect();
        assert_eq!(idx, vec![11, 12, 23, 24]);
    }

    #[test]
    fn test_visibility_is_strict() {
        let lm = Landmark::new(0.5, 0.5, 0.0, 0.5);
        assert!(!lm.is_visible(0.5));
        assert!(lm.is_visible(0.49));
        assert_eq!(lm.to_pixel(640, 480), (320, 240));
    }
}
