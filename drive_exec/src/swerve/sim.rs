//! # Simulated drivetrain
//!
//! A kinematic simulation of the four modules and the gyro, standing in for the vendor drivers.
//! Actuators are modelled as first order motors which reach the speed given by their voltage
//! immediately:
//!
//! ```text
//! rate = (V - k_s * sign(V)) / k_v      if |V| > k_s
//!      = 0                              otherwise
//! ```
//!
//! The chassis moves with the least squares rigid body motion of the module velocities.
//!
//! Faults can be injected (encoder or gyro dropouts) to exercise the degraded paths of the drive.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;
use serde::Deserialize;

use super::{
    ports::{EncoderReading, Gyro, GyroReading, ModuleIo},
    KinematicsError, ModuleId, ModuleState, SwerveKinematics, SwerveParams, NUM_MODULES,
};
use crate::pose_est::{Pose, Twist};
use util::maths::{sign_or_zero, wrap_to_pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motor constants of the simulated actuators.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Units: volts
    pub drive_k_s: f64,

    /// Units: volts/(meter/second)
    pub drive_k_v: f64,

    /// Units: volts
    pub steer_k_s: f64,

    /// Units: volts/(radian/second)
    pub steer_k_v: f64,
}

/// Handle to the simulated drivetrain.
///
/// Cloning the handle shares the same simulated world.
#[derive(Clone)]
pub struct SimDrivetrain {
    world: Arc<Mutex<SimWorld>>,
}

/// Simulated hardware of one module.
pub struct SimModuleIo {
    id: ModuleId,
    world: Arc<Mutex<SimWorld>>,
}

/// Simulated gyro.
pub struct SimGyro {
    world: Arc<Mutex<SimWorld>>,
}

struct SimWorld {
    params: SimParams,
    kinematics: SwerveKinematics,

    time_s: f64,
    modules: [SimModule; NUM_MODULES],

    /// Pose of the chassis in the field, heading is continuous.
    pose: Pose,
    pitch_rad: f64,
    roll_rad: f64,
    gyro_available: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimModule {
    /// True continuous steer angle.
    angle_rad: f64,
    position_m: f64,
    velocity_ms: f64,

    /// Voltages in the motor's own direction.
    drive_v: f64,
    steer_v: f64,

    encoder_offset_rad: f64,
    encoder_inverted: bool,
    drive_inverted: bool,
    encoder_available: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimDrivetrain {
    /// Create a simulated drivetrain at rest at the origin, all wheels pointing forward.
    ///
    /// Encoder offsets and motor inversions are taken from `swerve_params` so that the simulated
    /// hardware reads the way the real hardware would.
    pub fn new(swerve_params: &SwerveParams, sim_params: SimParams) -> Result<Self, KinematicsError> {
        let kinematics =
            SwerveKinematics::new(swerve_params.track_width_m, swerve_params.wheel_base_m)?;

        let mut modules = [SimModule::default(); NUM_MODULES];
        for (m, p) in modules.iter_mut().zip(swerve_params.modules.iter()) {
            m.encoder_offset_rad = p.encoder_offset_rad;
            m.encoder_inverted = p.encoder_inverted;
            m.drive_inverted = p.drive_inverted;
            m.encoder_available = true;
        }

        Ok(Self {
            world: Arc::new(Mutex::new(SimWorld {
                params: sim_params,
                kinematics,
                time_s: 0.0,
                modules,
                pose: Pose::default(),
                pitch_rad: 0.0,
                roll_rad: 0.0,
                gyro_available: true,
            })),
        })
    }

    /// Get the hardware of one module.
    pub fn module_io(&self, id: ModuleId) -> SimModuleIo {
        SimModuleIo {
            id,
            world: self.world.clone(),
        }
    }

    /// Get the hardware of all modules, in order.
    pub fn module_ios(&self) -> [SimModuleIo; NUM_MODULES] {
        [
            self.module_io(ModuleId::FL),
            self.module_io(ModuleId::FR),
            self.module_io(ModuleId::RL),
            self.module_io(ModuleId::RR),
        ]
    }

    /// Get the gyro.
    pub fn gyro(&self) -> SimGyro {
        SimGyro {
            world: self.world.clone(),
        }
    }

    /// Advance the simulation to `now_s`, applying the last demanded voltages.
    ///
    /// Times earlier than the current simulation time are ignored.
    pub fn step_to(&self, now_s: f64) {
        let mut world = lock(&self.world);

        let dt_s = now_s - world.time_s;
        if !(dt_s > 0.0) {
            return;
        }

        let params = world.params.clone();
        let mut states = [ModuleState::default(); NUM_MODULES];

        for (m, s) in world.modules.iter_mut().zip(states.iter_mut()) {
            let drive_sign = if m.drive_inverted { -1.0 } else { 1.0 };

            m.angle_rad += motor_rate(m.steer_v, params.steer_k_s, params.steer_k_v) * dt_s;
            m.velocity_ms =
                motor_rate(drive_sign * m.drive_v, params.drive_k_s, params.drive_k_v);
            m.position_m += m.velocity_ms * dt_s;

            *s = ModuleState {
                speed_ms: m.velocity_ms,
                angle_rad: wrap_to_pi(m.angle_rad),
            };
        }

        let vel = world.kinematics.inverse_velocity(&states);
        world.pose = world.pose.exp(&Twist::new(
            vel.vx_ms * dt_s,
            vel.vy_ms * dt_s,
            vel.rate_rads * dt_s,
        ));
        world.time_s = now_s;
    }

    /// The true pose of the chassis.
    pub fn true_pose(&self) -> Pose {
        lock(&self.world).pose
    }

    /// Set the true pose of the chassis.
    pub fn set_true_pose(&self, pose: Pose) {
        lock(&self.world).pose = pose;
    }

    /// Enable or disable the absolute encoder of a module.
    pub fn set_encoder_available(&self, id: ModuleId, available: bool) {
        debug!("Sim: {:?} encoder available = {}", id, available);
        lock(&self.world).modules[id.index()].encoder_available = available;
    }

    /// Enable or disable the gyro.
    pub fn set_gyro_available(&self, available: bool) {
        debug!("Sim: gyro available = {}", available);
        lock(&self.world).gyro_available = available;
    }

    /// Set the chassis pitch and roll reported by the gyro.
    pub fn set_attitude(&self, pitch_rad: f64, roll_rad: f64) {
        let mut world = lock(&self.world);
        world.pitch_rad = pitch_rad;
        world.roll_rad = roll_rad;
    }
}

impl ModuleIo for SimModuleIo {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn drive_position_m(&mut self) -> f64 {
        let world = lock(&self.world);
        let m = &world.modules[self.id.index()];
        if m.drive_inverted { -m.position_m } else { m.position_m }
    }

    fn drive_velocity_ms(&mut self) -> f64 {
        let world = lock(&self.world);
        let m = &world.modules[self.id.index()];
        if m.drive_inverted { -m.velocity_ms } else { m.velocity_ms }
    }

    fn read_encoder(&mut self) -> Option<EncoderReading> {
        let world = lock(&self.world);
        let m = &world.modules[self.id.index()];

        if !m.encoder_available {
            return None;
        }

        let raw_rad = m.angle_rad + m.encoder_offset_rad;
        let raw_rad = if m.encoder_inverted { -raw_rad } else { raw_rad };

        Some(EncoderReading {
            angle_rad: wrap_to_pi(raw_rad),
            timestamp_s: world.time_s,
        })
    }

    fn set_drive_voltage(&mut self, voltage_v: f64) {
        lock(&self.world).modules[self.id.index()].drive_v = voltage_v;
    }

    fn set_steer_voltage(&mut self, voltage_v: f64) {
        lock(&self.world).modules[self.id.index()].steer_v = voltage_v;
    }
}

impl Gyro for SimGyro {
    fn read(&mut self) -> Option<GyroReading> {
        let world = lock(&self.world);

        if !world.gyro_available {
            return None;
        }

        Some(GyroReading {
            heading_rad: world.pose.heading_rad,
            pitch_rad: world.pitch_rad,
            roll_rad: world.roll_rad,
            timestamp_s: world.time_s,
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Steady state rate of a motor for the given voltage.
fn motor_rate(voltage_v: f64, k_s: f64, k_v: f64) -> f64 {
    if voltage_v.abs() <= k_s || k_v <= 0.0 {
        0.0
    } else {
        (voltage_v - k_s * sign_or_zero(voltage_v)) / k_v
    }
}

/// Lock the world. The simulation holds no invariants across a panic so a poisoned lock is
/// still usable.
fn lock(world: &Arc<Mutex<SimWorld>>) -> MutexGuard<'_, SimWorld> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::swerve::{DriveGains, ModuleParams, SteerGains};

    fn swerve_params() -> SwerveParams {
        let module = |id| ModuleParams {
            id,
            encoder_offset_rad: 0.3,
            encoder_inverted: true,
            drive_inverted: true,
        };

        SwerveParams {
            track_width_m: 0.6,
            wheel_base_m: 0.6,
            max_module_speed_ms: 4.0,
            max_voltage_v: 12.0,
            encoder_stale_timeout_s: 0.1,
            drive_gains: DriveGains { k_s: 0.5, k_v: 2.0, k_a: 0.0, k_p: 0.0 },
            steer_gains: SteerGains {
                k_p: 8.0,
                k_s: 0.0,
                k_v: 1.0,
                max_rate_rads: 10.0,
                max_accel_radss: 20.0,
            },
            modules: [
                module(ModuleId::FL),
                module(ModuleId::FR),
                module(ModuleId::RL),
                module(ModuleId::RR),
            ],
        }
    }

    fn sim_params() -> SimParams {
        SimParams { drive_k_s: 0.5, drive_k_v: 2.0, steer_k_s: 0.0, steer_k_v: 1.0 }
    }

    #[test]
    fn test_motor_rate() {
        assert_eq!(motor_rate(0.3, 0.5, 2.0), 0.0);
        assert_eq!(motor_rate(2.5, 0.5, 2.0), 1.0);
        assert_eq!(motor_rate(-2.5, 0.5, 2.0), -1.0);
    }

    #[test]
    fn test_straight_line() {
        let sim = SimDrivetrain::new(&swerve_params(), sim_params()).unwrap();
        let mut ios = sim.module_ios();

        // Inverted motors, so a negative voltage drives forward at 1 m/s
        for io in ios.iter_mut() {
            io.set_drive_voltage(-2.5);
        }
        sim.step_to(1.0);

        let pose = sim.true_pose();
        assert!((pose.x_m - 1.0).abs() < 1e-9);
        assert!(pose.y_m.abs() < 1e-9);
        assert!(pose.heading_rad.abs() < 1e-9);

        for io in ios.iter_mut() {
            assert!((io.drive_position_m() + 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_encoder_reads_raw() {
        let sim = SimDrivetrain::new(&swerve_params(), sim_params()).unwrap();
        let mut io = sim.module_io(ModuleId::RR);

        // Wheel straight ahead reads the negated offset
        let r = io.read_encoder().unwrap();
        assert!((r.angle_rad + 0.3).abs() < 1e-12);

        sim.set_encoder_available(ModuleId::RR, false);
        assert!(io.read_encoder().is_none());
    }

    #[test]
    fn test_gyro_dropout() {
        let sim = SimDrivetrain::new(&swerve_params(), sim_params()).unwrap();
        let mut gyro = sim.gyro();

        sim.set_attitude(0.1, -0.2);
        let r = gyro.read().unwrap();
        assert_eq!((r.pitch_rad, r.roll_rad), (0.1, -0.2));

        sim.set_gyro_available(false);
        assert!(gyro.read().is_none());
    }
}
