//! # Swerve drive module
//!
//! Kinematics and per-module closed-loop control for a four module swerve drive. Every array of
//! per-module data in the software is ordered front left, front right, rear left, rear right.
//!
//! ## Frames
//!
//! All chassis quantities are in the robot body frame: x forward, y left, and rotations positive
//! anticlockwise when viewed from above.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod control;
mod kinematics;
mod module;
mod params;
pub mod ports;
pub mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// Internal
pub use control::*;
pub use kinematics::*;
pub use module::*;
pub use params::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The number of swerve modules on the robot.
pub const NUM_MODULES: usize = 4;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Identifies one of the swerve modules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleId {
    /// Front left
    FL,
    /// Front right
    FR,
    /// Rear left
    RL,
    /// Rear right
    RR,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A velocity of the chassis in the robot body frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisVelocity {
    /// Forward velocity.
    ///
    /// Units: meters/second
    pub vx_ms: f64,

    /// Leftward velocity.
    ///
    /// Units: meters/second
    pub vy_ms: f64,

    /// Rotation rate, positive anticlockwise.
    ///
    /// Units: radians/second
    pub rate_rads: f64,
}

/// A demand for a single module.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleTarget {
    /// Signed wheel speed.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Steer angle. May be expressed continuously (i.e. outside of [-pi, pi)).
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// The measured velocity state of a single module.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleState {
    /// Signed wheel speed.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Steer angle in the range [-pi, pi).
    ///
    /// Units: radians
    pub angle_rad: f64,
}

/// The measured position of a single module.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModulePosition {
    /// Distance travelled by the wheel since the last reset.
    ///
    /// Units: meters
    pub distance_m: f64,

    /// Continuous steer angle.
    ///
    /// Units: radians
    pub angle_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModuleId {
    /// All module IDs in the fixed order used by every per-module array.
    pub const ALL: [ModuleId; NUM_MODULES] = [
        ModuleId::FL,
        ModuleId::FR,
        ModuleId::RL,
        ModuleId::RR,
    ];

    /// Index of this module in per-module arrays.
    pub fn index(self) -> usize {
        match self {
            ModuleId::FL => 0,
            ModuleId::FR => 1,
            ModuleId::RL => 2,
            ModuleId::RR => 3,
        }
    }
}

impl ChassisVelocity {
    /// Create a new chassis velocity.
    pub fn new(vx_ms: f64, vy_ms: f64, rate_rads: f64) -> Self {
        Self {
            vx_ms,
            vy_ms,
            rate_rads,
        }
    }

    /// Returns true if every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.vx_ms == 0.0 && self.vy_ms == 0.0 && self.rate_rads == 0.0
    }

    /// Convert a velocity given in the field frame into the robot frame.
    ///
    /// The translational part is rotated by `-heading_rad`, the rotation rate is unchanged.
    pub fn from_field_relative(field_vel: ChassisVelocity, heading_rad: f64) -> Self {
        let (sin, cos) = heading_rad.sin_cos();

        Self {
            vx_ms: field_vel.vx_ms * cos + field_vel.vy_ms * sin,
            vy_ms: -field_vel.vx_ms * sin + field_vel.vy_ms * cos,
            rate_rads: field_vel.rate_rads,
        }
    }
}

impl ModuleTarget {
    /// Create a new module target.
    pub fn new(speed_ms: f64, angle_rad: f64) -> Self {
        Self { speed_ms, angle_rad }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_field_relative_transform() {
        let robot = ChassisVelocity::from_field_relative(
            ChassisVelocity::new(1.0, 0.0, 0.3),
            std::f64::consts::FRAC_PI_2,
        );

        assert!(robot.vx_ms.abs() < 1e-12);
        assert!((robot.vy_ms + 1.0).abs() < 1e-12);
        assert_eq!(robot.rate_rads, 0.3);

        let robot = ChassisVelocity::from_field_relative(ChassisVelocity::new(1.0, 2.0, 0.0), 0.0);
        assert_eq!(robot, ChassisVelocity::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_module_order() {
        for (i, id) in ModuleId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }
    }
}
