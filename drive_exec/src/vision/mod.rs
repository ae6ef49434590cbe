//! # Vision
//!
//! Pose fixes from the AprilTag camera. Frames arrive from the [`VisionClient`] through a
//! [`Mailbox`], are debounced by the [`VisionFilter`] and converted into [`VisionMeasurement`]s in
//! the field frame used by the pose estimator.
//!
//! The camera reports poses with the origin at the centre of the field, the estimator uses the
//! corner of the field, so the measured position is offset by half the field dimensions.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod client;
mod filter;
mod mailbox;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::pose_est::Pose;
use comms_if::eqpt::vision::{VisionFrame, BOTPOSE_X, BOTPOSE_Y, BOTPOSE_YAW_DEG};

pub use client::*;
pub use filter::*;
pub use mailbox::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Vision parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct VisionParams {
    /// If false no vision frames are fused.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Number of consecutive frames with a visible target before frames are fused.
    #[serde(default = "default_min_consecutive_frames")]
    pub min_consecutive_frames: u32,

    /// Dimensions of the field.
    #[serde(default)]
    pub field: FieldParams,
}

/// Dimensions of the playing field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldParams {
    /// Units: meters
    pub length_m: f64,

    /// Units: meters
    pub width_m: f64,
}

/// A pose measured by the camera, in the field frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisionMeasurement {
    pub pose: Pose,

    /// Capture time of the image the pose was solved from.
    ///
    /// Units: seconds
    pub timestamp_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            min_consecutive_frames: default_min_consecutive_frames(),
            field: FieldParams::default(),
        }
    }
}

impl Default for FieldParams {
    fn default() -> Self {
        // 2023 field
        Self {
            length_m: 16.54175,
            width_m: 8.0137,
        }
    }
}

impl VisionMeasurement {
    /// Convert a frame into a measurement, or `None` if the frame has no solution.
    pub fn from_frame(frame: &VisionFrame, field: &FieldParams) -> Option<Self> {
        let botpose = frame.solution()?;

        Some(Self {
            pose: Pose::new(
                botpose[BOTPOSE_X] + 0.5 * field.length_m,
                botpose[BOTPOSE_Y] + 0.5 * field.width_m,
                botpose[BOTPOSE_YAW_DEG].to_radians(),
            ),
            timestamp_s: frame.capture_time_s,
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_enabled() -> bool {
    true
}

fn default_min_consecutive_frames() -> u32 {
    2
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_frame() {
        let field = FieldParams {
            length_m: 16.0,
            width_m: 8.0,
        };

        let frame = VisionFrame {
            botpose: Some([1.0, -2.0, 0.3, 5.0, 5.0, 90.0]),
            capture_time_s: 4.2,
            visible: true,
        };

        let m = VisionMeasurement::from_frame(&frame, &field).unwrap();
        assert!((m.pose.x_m - 9.0).abs() < 1e-12);
        assert!((m.pose.y_m - 2.0).abs() < 1e-12);
        assert!((m.pose.heading_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(m.timestamp_s, 4.2);

        assert!(VisionMeasurement::from_frame(&VisionFrame::not_visible(1.0), &field).is_none());
    }

    #[test]
    fn test_default_params() {
        let params: VisionParams = util::params::from_str("").unwrap();
        assert!(params.enabled);
        assert_eq!(params.min_consecutive_frames, 2);
        assert_eq!(params.field.length_m, 16.54175);
    }
}
