//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications
//! interface. Telecommands are sent from the driver station to the drive
//! executable as JSON, in the form
//!
//! ```json
//! {"type": "Drive", "payload": {"vx_ms": 1.0, "vy_ms": 0.0, "rate_rads": 0.0, "field_relative": true}}
//! ```
//!
//! Commands with no payload omit the `payload` key.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use structopt::StructOpt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Raw joystick axes from the driver's controller.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub struct JoystickAxes {
    /// Left stick horizontal axis, in [-1, 1].
    #[structopt(allow_hyphen_values = true)]
    pub left_x: f64,

    /// Left stick vertical axis, in [-1, 1]. Pushing the stick forward gives
    /// negative values.
    #[structopt(allow_hyphen_values = true)]
    pub left_y: f64,

    /// Right stick horizontal axis, in [-1, 1].
    #[structopt(allow_hyphen_values = true)]
    pub right_x: f64,

    /// True while the robot-relative button is held.
    #[structopt(long)]
    #[serde(default)]
    pub robot_relative: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the robot by the driver station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
#[serde(tag = "type", content = "payload")]
pub enum Tc {
    /// Stop all actuators and ignore drive commands until made unsafe.
    #[structopt(name = "safe")]
    MakeSafe,

    /// Leave safe mode.
    #[structopt(name = "unsafe")]
    MakeUnsafe,

    /// Drive from raw joystick axes, shaped on the robot.
    #[structopt(name = "joy")]
    Joystick(JoystickAxes),

    /// Drive with a chassis velocity.
    #[structopt(name = "drive")]
    Drive {
        /// Forward velocity in meters/second.
        #[structopt(allow_hyphen_values = true)]
        vx_ms: f64,

        /// Leftward velocity in meters/second.
        #[structopt(allow_hyphen_values = true)]
        vy_ms: f64,

        /// Rotation rate in radians/second, positive anticlockwise.
        #[structopt(allow_hyphen_values = true)]
        rate_rads: f64,

        /// Interpret the velocity in the field frame rather than the robot
        /// frame.
        #[structopt(long)]
        field_relative: bool,
    },

    /// Move the estimated position, keeping the current heading.
    #[structopt(name = "reset-odom")]
    ResetOdometry {
        #[structopt(allow_hyphen_values = true)]
        x_m: f64,
        #[structopt(allow_hyphen_values = true)]
        y_m: f64,
    },

    /// Move the estimated position and heading.
    #[structopt(name = "reset-odom-rot")]
    ResetOdometryAndRotation {
        #[structopt(allow_hyphen_values = true)]
        x_m: f64,
        #[structopt(allow_hyphen_values = true)]
        y_m: f64,
        #[structopt(allow_hyphen_values = true)]
        heading_rad: f64,
    },

    /// Set the standard deviations of vision measurements.
    #[structopt(name = "vision-conf")]
    SetVisionConfidence {
        x_m: f64,
        y_m: f64,
        heading_rad: f64,
    },

    /// Make the current heading the zero heading.
    #[structopt(name = "zero-heading")]
    ZeroHeading,

    /// Reset the cumulative drive distance of every module.
    #[structopt(name = "reset-dist")]
    ResetDriveDistances,

    /// Make the current pitch and roll the level attitude.
    #[structopt(name = "zero-attitude")]
    ZeroPitchAndRoll,
}

/// Response to a telecommand, sent back on the same socket.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcResponse {
    /// The TC was accepted and will be executed.
    Ok,

    /// The TC could not be parsed.
    Invalid,

    /// The TC was valid but cannot be executed in the current state.
    CannotExecute,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }

    /// Returns true if the TC may be executed while the robot is in safe mode.
    pub fn allowed_in_safe(&self) -> bool {
        !matches!(self, Tc::Joystick(_) | Tc::Drive { .. })
    }
}
