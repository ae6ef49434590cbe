//! # Operator input shaping
//!
//! Converts raw joystick axes into a drive intent. Each axis has a deadband applied, with the
//! remaining travel rescaled to start from zero at the edge of the deadband, and is then raised to
//! a power (keeping its sign) for fine control at low deflection.
//!
//! Pushing a stick forward gives a negative axis value, so all axes are negated. The left stick
//! translates (y forwards, x sideways) and the right stick x axis rotates.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::{drive_ctrl::DriveIntent, swerve::ChassisVelocity};
use comms_if::tc::JoystickAxes;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Input shaping parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct InputParams {
    /// Axis deflection below which the axis reads zero, in [0, 1).
    pub deadband: f64,

    /// Power the axis is raised to after the deadband.
    pub exponent: i32,

    /// Speed at full deflection of the left stick.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Rate at full deflection of the right stick.
    ///
    /// Units: radians/second
    pub max_angular_rate_rads: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Invalid input shaping parameters.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InputParamsError {
    #[error("Deadband must be in [0, 1), got {0}")]
    Deadband(f64),

    #[error("Exponent must be at least 1, got {0}")]
    Exponent(i32),

    #[error("Maximum speed must be finite and positive, got {0} m/s")]
    MaxSpeed(f64),

    #[error("Maximum angular rate must be finite and positive, got {0} rad/s")]
    MaxAngularRate(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl InputParams {
    /// Check the parameters describe a curve from zero at rest to the maximum at full deflection.
    pub fn validate(&self) -> Result<(), InputParamsError> {
        if !(self.deadband >= 0.0 && self.deadband < 1.0) {
            return Err(InputParamsError::Deadband(self.deadband));
        }

        if self.exponent < 1 {
            return Err(InputParamsError::Exponent(self.exponent));
        }

        if !(self.max_speed_ms.is_finite() && self.max_speed_ms > 0.0) {
            return Err(InputParamsError::MaxSpeed(self.max_speed_ms));
        }

        if !(self.max_angular_rate_rads.is_finite() && self.max_angular_rate_rads > 0.0) {
            return Err(InputParamsError::MaxAngularRate(self.max_angular_rate_rads));
        }

        Ok(())
    }
}

impl Default for InputParams {
    fn default() -> Self {
        Self {
            deadband: 0.1,
            exponent: 3,
            max_speed_ms: 4.0,
            max_angular_rate_rads: 2.0 * std::f64::consts::PI,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert joystick axes into a drive intent.
///
/// Field relative driving is the default, holding the robot relative button switches to robot
/// relative.
pub fn shape_joystick(axes: &JoystickAxes, params: &InputParams) -> DriveIntent {
    let vx_ms = -shape_axis(axes.left_y, params) * params.max_speed_ms;
    let vy_ms = -shape_axis(axes.left_x, params) * params.max_speed_ms;
    let rate_rads = -shape_axis(axes.right_x, params) * params.max_angular_rate_rads;

    DriveIntent {
        velocity: ChassisVelocity::new(vx_ms, vy_ms, rate_rads),
        field_relative: !axes.robot_relative,
    }
}

/// Apply the deadband and power curve to a single axis.
///
/// The result is in [-1, 1]. Non-finite axis values read as zero.
pub fn shape_axis(value: f64, params: &InputParams) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }

    let value = deadband(clamp(&value, &-1.0, &1.0), params.deadband);

    value.abs().powi(params.exponent).copysign(value)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn deadband(value: f64, deadband: f64) -> f64 {
    if value.abs() <= deadband {
        0.0
    } else if value > 0.0 {
        (value - deadband) / (1.0 - deadband)
    } else {
        (value + deadband) / (1.0 - deadband)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_shape_axis() {
        let params = InputParams::default();

        assert_eq!(shape_axis(0.0, &params), 0.0);
        assert_eq!(shape_axis(0.1, &params), 0.0);
        assert_eq!(shape_axis(-0.05, &params), 0.0);
        assert!((shape_axis(1.0, &params) - 1.0).abs() < 1e-12);
        assert!((shape_axis(-1.0, &params) + 1.0).abs() < 1e-12);

        // Half way through the live range cubes to an eighth
        assert!((shape_axis(0.55, &params) - 0.125).abs() < 1e-12);
        assert!((shape_axis(-0.55, &params) + 0.125).abs() < 1e-12);

        // Out of range and invalid values
        assert!((shape_axis(1.5, &params) - 1.0).abs() < 1e-12);
        assert_eq!(shape_axis(f64::NAN, &params), 0.0);
    }

    #[test]
    fn test_even_exponent_keeps_sign() {
        let params = InputParams {
            exponent: 2,
            ..Default::default()
        };

        assert!((shape_axis(-1.0, &params) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        assert_eq!(InputParams::default().validate(), Ok(()));

        let params = InputParams {
            exponent: 0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(InputParamsError::Exponent(0)));

        let params = InputParams {
            deadband: 1.0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(InputParamsError::Deadband(1.0)));

        let params = InputParams {
            deadband: -0.1,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(InputParamsError::Deadband(-0.1)));

        let params = InputParams {
            max_speed_ms: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(InputParamsError::MaxSpeed(f64::INFINITY)));

        let params = InputParams {
            max_angular_rate_rads: 0.0,
            ..Default::default()
        };
        assert_eq!(params.validate(), Err(InputParamsError::MaxAngularRate(0.0)));
    }

    #[test]
    fn test_shape_joystick() {
        let params = InputParams::default();

        // Stick pushed fully forward and right, twisting anticlockwise
        let axes = JoystickAxes {
            left_x: 1.0,
            left_y: -1.0,
            right_x: -1.0,
            robot_relative: false,
        };

        let intent = shape_joystick(&axes, &params);
        assert!((intent.velocity.vx_ms - 4.0).abs() < 1e-12);
        assert!((intent.velocity.vy_ms + 4.0).abs() < 1e-12);
        assert!((intent.velocity.rate_rads - 2.0 * PI).abs() < 1e-12);
        assert!(intent.field_relative);

        let axes = JoystickAxes {
            left_x: 0.05,
            left_y: 0.0,
            right_x: 0.0,
            robot_relative: true,
        };

        let intent = shape_joystick(&axes, &params);
        assert!(intent.velocity.is_zero());
        assert!(!intent.field_relative);
    }
}
