//! # Hardware ports
//!
//! Traits through which the drive software reaches the module actuators, the absolute steer
//! encoders and the gyro. Vendor drivers implement these for the real robot, the `sim` module
//! implements them for testing.
//!
//! Port reads must never block, a driver with no fresh data returns its last value (or `None`).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::ModuleId;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A reading of an absolute steer encoder.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct EncoderReading {
    /// Raw absolute angle, in [-pi, pi).
    ///
    /// Units: radians
    pub angle_rad: f64,

    /// Time at which the reading was taken, on the session clock.
    ///
    /// Units: seconds
    pub timestamp_s: f64,
}

/// A reading of the gyro.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct GyroReading {
    /// Continuous yaw, positive anticlockwise.
    ///
    /// Units: radians
    pub heading_rad: f64,

    /// Units: radians
    pub pitch_rad: f64,

    /// Units: radians
    pub roll_rad: f64,

    /// Time at which the reading was taken, on the session clock.
    ///
    /// Units: seconds
    pub timestamp_s: f64,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The hardware of a single swerve module.
pub trait ModuleIo {
    /// Which module this hardware belongs to.
    fn id(&self) -> ModuleId;

    /// Cumulative distance travelled by the wheel, as counted by the drive motor.
    ///
    /// Units: meters
    fn drive_position_m(&mut self) -> f64;

    /// Speed of the wheel.
    ///
    /// Units: meters/second
    fn drive_velocity_ms(&mut self) -> f64;

    /// Read the absolute steer encoder, or `None` if the encoder is not responding.
    fn read_encoder(&mut self) -> Option<EncoderReading>;

    /// Demand a voltage from the drive motor.
    fn set_drive_voltage(&mut self, voltage_v: f64);

    /// Demand a voltage from the steer motor, positive turns the module anticlockwise.
    fn set_steer_voltage(&mut self, voltage_v: f64);
}

/// The robot's gyro.
pub trait Gyro {
    /// Read the gyro, or `None` if the gyro is not responding.
    fn read(&mut self) -> Option<GyroReading>;
}

impl<T: ModuleIo + ?Sized> ModuleIo for Box<T> {
    fn id(&self) -> ModuleId {
        (**self).id()
    }

    fn drive_position_m(&mut self) -> f64 {
        (**self).drive_position_m()
    }

    fn drive_velocity_ms(&mut self) -> f64 {
        (**self).drive_velocity_ms()
    }

    fn read_encoder(&mut self) -> Option<EncoderReading> {
        (**self).read_encoder()
    }

    fn set_drive_voltage(&mut self, voltage_v: f64) {
        (**self).set_drive_voltage(voltage_v)
    }

    fn set_steer_voltage(&mut self, voltage_v: f64) {
        (**self).set_steer_voltage(voltage_v)
    }
}

impl<T: Gyro + ?Sized> Gyro for Box<T> {
    fn read(&mut self) -> Option<GyroReading> {
        (**self).read()
    }
}
