//! # Vision equipment interface
//!
//! Frames published by the vision coprocessor. Each frame carries the robot pose solved from the
//! AprilTags in view, in the coprocessor's field-centred frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Index of the x position (m) in the botpose array.
pub const BOTPOSE_X: usize = 0;

/// Index of the y position (m) in the botpose array.
pub const BOTPOSE_Y: usize = 1;

/// Index of the yaw (degrees) in the botpose array.
pub const BOTPOSE_YAW_DEG: usize = 5;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single frame from the vision coprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisionFrame {
    /// Robot pose as `[x, y, z, roll, pitch, yaw]`, with positions in meters measured from the
    /// centre of the field and angles in degrees. `None` if no solution exists for this frame.
    pub botpose: Option<[f64; 6]>,

    /// Time at which the image was captured, in seconds on the robot's session clock.
    pub capture_time_s: f64,

    /// True if at least one AprilTag is visible in this frame.
    pub visible: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VisionFrame {
    /// A frame in which no tags are visible.
    pub fn not_visible(capture_time_s: f64) -> Self {
        Self {
            botpose: None,
            capture_time_s,
            visible: false
        }
    }

    /// Returns the botpose if the frame is visible and carries a solution.
    pub fn solution(&self) -> Option<&[f64; 6]> {
        match (self.visible, self.botpose.as_ref()) {
            (true, Some(p)) => Some(p),
            _ => None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_json() {
        let json = r#"{
            "botpose": [1.0, -2.0, 0.0, 0.0, 0.0, 90.0],
            "capture_time_s": 12.5,
            "visible": true
        }"#;

        let frame: VisionFrame = serde_json::from_str(json).unwrap();
        let pose = frame.solution().unwrap();
        assert_eq!(pose[BOTPOSE_X], 1.0);
        assert_eq!(pose[BOTPOSE_Y], -2.0);
        assert_eq!(pose[BOTPOSE_YAW_DEG], 90.0);

        let json = r#"{"botpose": null, "capture_time_s": 3.0, "visible": false}"#;
        let frame: VisionFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame, VisionFrame::not_visible(3.0));
        assert!(frame.solution().is_none());
    }
}
