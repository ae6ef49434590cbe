//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{
    input::InputParams,
    pose_est::{Pose, PoseEstParams},
    swerve::SwerveParams,
    vision::VisionParams,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the drive, loaded from `drive.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Age after which a gyro reading is considered stale.
    ///
    /// Units: seconds
    pub gyro_stale_timeout_s: f64,

    /// Age after which the last drive intent is replaced by a stop.
    ///
    /// Units: seconds
    pub intent_timeout_s: f64,

    /// Pose of the robot when the drive starts.
    #[serde(default)]
    pub initial_pose: Pose,

    pub swerve: SwerveParams,

    #[serde(default)]
    pub pose_est: PoseEstParams,

    #[serde(default)]
    pub vision: VisionParams,

    #[serde(default)]
    pub input: InputParams,
}
