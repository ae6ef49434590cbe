//! # Swerve module controller
//!
//! One instance per module. Each cycle the module is first sensed, caching the readings of its
//! hardware, and then given a target which is optimised and tracked by the steer and drive
//! controllers.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{trace, warn};
use serde::Serialize;

// Internal
use super::{
    optimise,
    ports::ModuleIo,
    DriveController, ModuleId, ModuleParams, ModulePosition, ModuleState, ModuleTarget,
    SteerController, SwerveParams,
};
use util::{
    maths::{clamp, continuous_setpoint, wrap_to_pi},
    time::is_stale,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single swerve module: a drive actuator, a steer actuator and an absolute steer encoder.
pub struct SwerveModule<IO: ModuleIo> {
    io: IO,
    params: ModuleParams,

    max_voltage_v: f64,
    encoder_stale_timeout_s: f64,

    steer_ctrl: SteerController,
    drive_ctrl: DriveController,

    /// Continuous steer angle, unwrapped from the absolute encoder.
    angle_rad: f64,

    /// Timestamp of the last encoder reading that was used.
    last_encoder_time_s: Option<f64>,

    /// Raw drive position at the last explicit reset.
    drive_zero_m: f64,
    drive_position_m: f64,
    drive_velocity_ms: f64,

    report: ModuleReport,
}

/// Status of a module for the current cycle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct ModuleReport {
    /// The encoder reading was missing or too old, the last known angle is being used.
    pub encoder_stale: bool,

    /// The drive voltage was clamped.
    pub drive_saturated: bool,

    /// The steer voltage was clamped.
    pub steer_saturated: bool,

    /// The optimised target sent to the controllers.
    pub target: ModuleTarget,

    /// Units: volts
    pub drive_voltage_v: f64,

    /// Units: volts
    pub steer_voltage_v: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<IO: ModuleIo> SwerveModule<IO> {
    /// Create a new module from its hardware.
    ///
    /// `params.modules[index]` must describe this module.
    pub fn new(io: IO, params: &SwerveParams, index: usize) -> Self {
        let module_params = params.modules[index].clone();

        Self {
            io,
            params: module_params,
            max_voltage_v: params.max_voltage_v.abs(),
            encoder_stale_timeout_s: params.encoder_stale_timeout_s,
            steer_ctrl: SteerController::new(params.steer_gains.clone()),
            drive_ctrl: DriveController::new(params.drive_gains.clone()),
            angle_rad: 0.0,
            last_encoder_time_s: None,
            drive_zero_m: 0.0,
            drive_position_m: 0.0,
            drive_velocity_ms: 0.0,
            report: ModuleReport {
                encoder_stale: true,
                ..Default::default()
            },
        }
    }

    /// Which module this is.
    pub fn id(&self) -> ModuleId {
        self.params.id
    }

    /// Read the hardware, once per cycle before any target is set.
    pub fn sense(&mut self, now_s: f64) {
        let drive_sign = if self.params.drive_inverted { -1.0 } else { 1.0 };
        self.drive_position_m = drive_sign * self.io.drive_position_m();
        self.drive_velocity_ms = drive_sign * self.io.drive_velocity_ms();

        let reading = match self.io.read_encoder() {
            Some(r) if !is_stale(r.timestamp_s, now_s, self.encoder_stale_timeout_s) => Some(r),
            _ => None,
        };

        match reading {
            Some(r) => {
                let encoder_sign = if self.params.encoder_inverted { -1.0 } else { 1.0 };
                let absolute_rad =
                    wrap_to_pi(encoder_sign * r.angle_rad - self.params.encoder_offset_rad);

                // The first reading sets the winding, later readings are unwrapped against the
                // previous angle
                self.angle_rad = match self.last_encoder_time_s {
                    Some(_) => continuous_setpoint(self.angle_rad, absolute_rad),
                    None => absolute_rad,
                };

                if self.report.encoder_stale && self.last_encoder_time_s.is_some() {
                    warn!("{:?} steer encoder recovered", self.params.id);
                }

                self.last_encoder_time_s = Some(r.timestamp_s);
                self.report.encoder_stale = false;
            }
            None => {
                if !self.report.encoder_stale {
                    warn!(
                        "{:?} steer encoder is stale, holding last angle {:.3} rad",
                        self.params.id, self.angle_rad
                    );
                }
                self.report.encoder_stale = true;
            }
        }
    }

    /// Measured speed and bounded angle of the module.
    pub fn state(&self) -> ModuleState {
        ModuleState {
            speed_ms: self.drive_velocity_ms,
            angle_rad: wrap_to_pi(self.angle_rad),
        }
    }

    /// Measured distance and continuous angle of the module.
    pub fn position(&self) -> ModulePosition {
        ModulePosition {
            distance_m: self.drive_position_m - self.drive_zero_m,
            angle_rad: self.angle_rad,
        }
    }

    /// Status for the current cycle.
    pub fn report(&self) -> ModuleReport {
        self.report
    }

    /// Drive the module towards the target.
    ///
    /// The target is first optimised against the measured angle, then the steer and drive
    /// controllers each produce a voltage which is clamped and written to the hardware. Returns
    /// the optimised target.
    pub fn set_target(&mut self, target: &ModuleTarget, dt_s: f64) -> ModuleTarget {
        let optimised = optimise(target, self.angle_rad);

        let steer_v = self.steer_ctrl.calculate(optimised.angle_rad, self.angle_rad, dt_s);
        let drive_v = self
            .drive_ctrl
            .calculate(optimised.speed_ms, self.drive_velocity_ms, dt_s);

        let steer_clamped_v = clamp(&steer_v, &-self.max_voltage_v, &self.max_voltage_v);
        let drive_clamped_v = clamp(&drive_v, &-self.max_voltage_v, &self.max_voltage_v);

        self.report.steer_saturated = steer_clamped_v != steer_v;
        self.report.drive_saturated = drive_clamped_v != drive_v;
        self.report.target = optimised;
        self.report.steer_voltage_v = steer_clamped_v;
        self.report.drive_voltage_v = drive_clamped_v;

        trace!(
            "{:?} target {:?} -> steer {:.3} V, drive {:.3} V",
            self.params.id,
            optimised,
            steer_clamped_v,
            drive_clamped_v
        );

        let drive_sign = if self.params.drive_inverted { -1.0 } else { 1.0 };
        self.io.set_steer_voltage(steer_clamped_v);
        self.io.set_drive_voltage(drive_sign * drive_clamped_v);

        optimised
    }

    /// Zero both actuators and restart the controllers from the measured state.
    pub fn stop(&mut self) {
        self.io.set_steer_voltage(0.0);
        self.io.set_drive_voltage(0.0);

        self.steer_ctrl.reset(self.angle_rad);
        self.drive_ctrl.reset();

        self.report.steer_voltage_v = 0.0;
        self.report.drive_voltage_v = 0.0;
        self.report.target = ModuleTarget::new(0.0, self.angle_rad);
    }

    /// Reset the cumulative drive distance to zero.
    pub fn reset_drive_distance(&mut self) {
        self.drive_zero_m = self.drive_position_m;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::swerve::{
        ports::EncoderReading, DriveGains, ModuleParams, SteerGains,
    };
    use std::f64::consts::PI;

    /// Scripted hardware recording the last demands.
    struct FakeIo {
        encoder: Option<EncoderReading>,
        position_m: f64,
        velocity_ms: f64,
        drive_v: f64,
        steer_v: f64,
    }

    impl ModuleIo for FakeIo {
        fn id(&self) -> ModuleId {
            ModuleId::FL
        }
        fn drive_position_m(&mut self) -> f64 {
            self.position_m
        }
        fn drive_velocity_ms(&mut self) -> f64 {
            self.velocity_ms
        }
        fn read_encoder(&mut self) -> Option<EncoderReading> {
            self.encoder
        }
        fn set_drive_voltage(&mut self, voltage_v: f64) {
            self.drive_v = voltage_v;
        }
        fn set_steer_voltage(&mut self, voltage_v: f64) {
            self.steer_v = voltage_v;
        }
    }

    fn params(drive_inverted: bool) -> SwerveParams {
        let module = |id| ModuleParams {
            id,
            encoder_offset_rad: 0.0,
            encoder_inverted: false,
            drive_inverted,
        };

        SwerveParams {
            track_width_m: 0.6223,
            wheel_base_m: 0.6223,
            max_module_speed_ms: 4.0,
            max_voltage_v: 12.0,
            encoder_stale_timeout_s: 0.1,
            drive_gains: DriveGains { k_s: 0.73394, k_v: 2.4068, k_a: 0.0, k_p: 0.0 },
            steer_gains: SteerGains {
                k_p: 8.1,
                k_s: 0.77,
                k_v: 0.75,
                max_rate_rads: 3.0 * PI,
                max_accel_radss: 6.0 * PI,
            },
            modules: [
                module(ModuleId::FL),
                module(ModuleId::FR),
                module(ModuleId::RL),
                module(ModuleId::RR),
            ],
        }
    }

    fn fake(angle_rad: f64, timestamp_s: f64) -> FakeIo {
        FakeIo {
            encoder: Some(EncoderReading { angle_rad, timestamp_s }),
            position_m: 0.0,
            velocity_ms: 0.0,
            drive_v: 0.0,
            steer_v: 0.0,
        }
    }

    #[test]
    fn test_continuous_angle() {
        let mut m = SwerveModule::new(fake(PI - 0.1, 0.0), &params(false), 0);
        m.sense(0.0);
        assert!((m.position().angle_rad - (PI - 0.1)).abs() < 1e-12);

        // Crossing the encoder's discontinuity keeps the angle continuous
        m.io.encoder = Some(EncoderReading { angle_rad: -PI + 0.1, timestamp_s: 0.02 });
        m.sense(0.02);
        assert!((m.position().angle_rad - (PI + 0.1)).abs() < 1e-12);

        // The state angle is bounded
        assert!((m.state().angle_rad - (-PI + 0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_encoder_staleness() {
        let mut m = SwerveModule::new(fake(0.5, 0.0), &params(false), 0);
        m.sense(0.0);
        assert!(!m.report().encoder_stale);

        // Old reading
        m.io.encoder = Some(EncoderReading { angle_rad: 1.0, timestamp_s: 0.0 });
        m.sense(0.5);
        assert!(m.report().encoder_stale);
        assert!((m.position().angle_rad - 0.5).abs() < 1e-12);

        // Missing reading
        m.io.encoder = None;
        m.sense(0.52);
        assert!(m.report().encoder_stale);
        assert!((m.position().angle_rad - 0.5).abs() < 1e-12);

        // Fresh reading recovers
        m.io.encoder = Some(EncoderReading { angle_rad: 1.0, timestamp_s: 0.54 });
        m.sense(0.54);
        assert!(!m.report().encoder_stale);
        assert!((m.position().angle_rad - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_queries_are_pure() {
        let mut m = SwerveModule::new(fake(0.3, 0.0), &params(false), 0);
        m.io.position_m = 1.25;
        m.io.velocity_ms = 0.5;
        m.sense(0.0);

        let s = m.state();
        let p = m.position();
        assert_eq!(m.state(), s);
        assert_eq!(m.position(), p);
        assert_eq!(p.distance_m, 1.25);
        assert_eq!(s.speed_ms, 0.5);
    }

    #[test]
    fn test_set_target_optimises() {
        let mut m = SwerveModule::new(fake(0.0, 0.0), &params(false), 0);
        m.sense(0.0);

        let t = m.set_target(&ModuleTarget::new(1.0, PI), 0.02);
        assert_eq!(t.speed_ms, -1.0);
        assert!(t.angle_rad.abs() < 1e-12);

        // Reversed at steady state, feedforward only
        assert!((m.io.drive_v - (-0.73394 - 2.4068)).abs() < 1e-9);
        assert_eq!(m.io.steer_v, 0.0);
    }

    #[test]
    fn test_voltage_clamp() {
        let mut m = SwerveModule::new(fake(0.0, 0.0), &params(true), 0);
        m.sense(0.0);

        m.set_target(&ModuleTarget::new(10.0, 0.0), 0.02);
        let r = m.report();
        assert!(r.drive_saturated);
        assert_eq!(r.drive_voltage_v, 12.0);

        // Inverted drive motor receives the negated demand
        assert_eq!(m.io.drive_v, -12.0);
    }

    #[test]
    fn test_reset_drive_distance() {
        let mut m = SwerveModule::new(fake(0.0, 0.0), &params(true), 0);
        m.io.position_m = -2.0;
        m.sense(0.0);
        assert_eq!(m.position().distance_m, 2.0);

        m.reset_drive_distance();
        assert_eq!(m.position().distance_m, 0.0);

        m.io.position_m = -2.5;
        m.sense(0.02);
        assert!((m.position().distance_m - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_stop() {
        let mut m = SwerveModule::new(fake(0.0, 0.0), &params(false), 0);
        m.sense(0.0);
        m.set_target(&ModuleTarget::new(2.0, 0.4), 0.02);
        assert!(m.io.drive_v != 0.0);

        m.stop();
        assert_eq!(m.io.drive_v, 0.0);
        assert_eq!(m.io.steer_v, 0.0);
    }
}
