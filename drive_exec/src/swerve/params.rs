//! Parameters structure for the swerve drive

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{ModuleId, NUM_MODULES};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the swerve drive.
#[derive(Debug, Clone, Deserialize)]
pub struct SwerveParams {

    // ---- GEOMETRY ----

    /// Distance between the centres of the left and right wheels.
    ///
    /// Units: meters
    pub track_width_m: f64,

    /// Distance between the centres of the front and rear wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    // ---- CAPABILITIES ----

    /// Maximum speed of any module, module targets are desaturated against this.
    ///
    /// Units: meters/second
    pub max_module_speed_ms: f64,

    /// Maximum voltage that may be demanded from any actuator.
    ///
    /// Units: volts
    pub max_voltage_v: f64,

    // ---- SENSING ----

    /// Age after which an absolute encoder reading is considered stale.
    ///
    /// Units: seconds
    pub encoder_stale_timeout_s: f64,

    // ---- CONTROL ----

    /// Gains for the drive axes.
    pub drive_gains: DriveGains,

    /// Gains and limits for the steer axes.
    pub steer_gains: SteerGains,

    /// Per module parameters, in the order FL, FR, RL, RR.
    pub modules: [ModuleParams; NUM_MODULES],
}

/// Drive axis gains.
///
/// Voltage is `k_s * sign(v) + k_v * v + k_a * a + k_p * (v - v_measured)`.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveGains {
    /// Units: volts
    pub k_s: f64,

    /// Units: volts/(meter/second)
    pub k_v: f64,

    /// Units: volts/(meter/second^2)
    pub k_a: f64,

    /// Units: volts/(meter/second)
    pub k_p: f64,
}

/// Steer axis gains and motion limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SteerGains {
    /// Units: volts/radian
    pub k_p: f64,

    /// Units: volts
    pub k_s: f64,

    /// Units: volts/(radian/second)
    pub k_v: f64,

    /// Maximum steer rate of the motion profile.
    ///
    /// Units: radians/second
    pub max_rate_rads: f64,

    /// Maximum steer acceleration of the motion profile.
    ///
    /// Units: radians/second^2
    pub max_accel_radss: f64,
}

/// Parameters for a single module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleParams {
    /// Which module these parameters apply to.
    pub id: ModuleId,

    /// Absolute encoder reading when the wheel points straight ahead.
    ///
    /// Units: radians
    #[serde(default)]
    pub encoder_offset_rad: f64,

    /// True if the absolute encoder counts clockwise.
    #[serde(default)]
    pub encoder_inverted: bool,

    /// True if the drive motor is mounted reversed.
    #[serde(default)]
    pub drive_inverted: bool,
}
