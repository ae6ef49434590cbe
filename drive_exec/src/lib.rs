//! # Drive library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to access items defined
//! inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Global data store for the drive executable
pub mod data_store;

/// Drive control module - composes the modules, kinematics and estimator into the robot drive
pub mod drive_ctrl;

/// Driver input shaping - converts raw joystick axes into drive intents
pub mod input;

/// Parameters of the drive executable
pub mod params;

/// Pose estimation module - fuses wheel odometry, gyro and vision into a field pose
pub mod pose_est;

/// Swerve drive module - kinematics, per module control and hardware ports
pub mod swerve;

/// Telecommand client - recieves telecommands from the driver station
pub mod tc_client;

/// Vision module - recieves and filters pose fixes from the vision coprocessor
pub mod vision;
