//! # Drive control module
//!
//! Composes the swerve modules, the kinematics and the pose estimator into the robot drive.
//!
//! Each cycle DriveCtrl senses the four modules and the gyro, converts the current drive intent
//! into module targets, drives the modules towards them, integrates odometry and fuses any new
//! vision fix. Requests made between cycles (intents, resets, vision confidence) are applied
//! immediately to the estimator or on the next cycle for the modules.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};
use serde::Serialize;

use crate::{
    input::InputParamsError,
    pose_est::{Pose, PoseEstError, PoseEstimator},
    swerve::{
        ports::{Gyro, GyroReading, ModuleIo},
        ChassisVelocity, KinematicsError, ModuleId, ModulePosition, ModuleState, SwerveKinematics,
        SwerveModule, NUM_MODULES,
    },
    vision::VisionFilter,
};
use util::archive::{ArchiveError, Archiver};

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// What the driver wants the robot to do.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct DriveIntent {
    pub velocity: ChassisVelocity,

    /// If true `velocity` is given in the field frame, otherwise in the robot frame.
    pub field_relative: bool,
}

/// The robot drive.
pub struct DriveCtrl<M: ModuleIo, G: Gyro> {
    pub(crate) params: Params,

    kinematics: SwerveKinematics,
    modules: [SwerveModule<M>; NUM_MODULES],
    gyro: G,
    estimator: PoseEstimator,
    vision_filter: VisionFilter,

    /// Intent requested since the last cycle.
    pending_intent: Option<DriveIntent>,

    /// Intent being executed and the time it was first executed.
    intent: Option<(DriveIntent, f64)>,

    last_time_s: Option<f64>,

    /// Last fresh gyro reading.
    last_gyro: Option<GyroReading>,
    gyro_stale: bool,

    pitch_zero_rad: f64,
    roll_zero_rad: f64,

    num_vision_accepted: u64,
    num_vision_rejected: u64,

    pub(crate) report: StatusReport,
    arch_report: Archiver,

    pub(crate) output: Option<OutputData>,
    arch_output: Archiver,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Invalid drive geometry: {0}")]
    KinematicsError(KinematicsError),

    #[error("Pose estimator error: {0}")]
    PoseEstError(PoseEstError),

    #[error("Hardware module {index} is {found:?}, expected {expected:?}")]
    ModuleOrder {
        index: usize,
        expected: ModuleId,
        found: ModuleId,
    },

    #[error("Module parameters {index} are for {found:?}, expected {expected:?}")]
    ParamsModuleOrder {
        index: usize,
        expected: ModuleId,
        found: ModuleId,
    },

    #[error("Drive intent is not finite: {0:?}")]
    InvalidIntent(DriveIntent),

    #[error("Invalid input shaping parameters: {0}")]
    InvalidInputParams(InputParamsError),

    #[error("Could not set up the archives: {0}")]
    ArchiveError(ArchiveError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveIntent {
    /// Returns true if every component of the velocity is finite.
    pub fn is_finite(&self) -> bool {
        self.velocity.vx_ms.is_finite()
            && self.velocity.vy_ms.is_finite()
            && self.velocity.rate_rads.is_finite()
    }
}

impl<M: ModuleIo, G: Gyro> DriveCtrl<M, G> {
    /// Create the drive from its parameters and hardware.
    ///
    /// The module hardware and the module parameters must both be in the order FL, FR, RL, RR.
    pub fn new(params: Params, modules: [M; NUM_MODULES], gyro: G) -> Result<Self, DriveCtrlError> {
        for (index, expected) in ModuleId::ALL.iter().enumerate() {
            let found = modules[index].id();
            if found != *expected {
                return Err(DriveCtrlError::ModuleOrder {
                    index,
                    expected: *expected,
                    found,
                });
            }

            let found = params.swerve.modules[index].id;
            if found != *expected {
                return Err(DriveCtrlError::ParamsModuleOrder {
                    index,
                    expected: *expected,
                    found,
                });
            }
        }

        params
            .input
            .validate()
            .map_err(DriveCtrlError::InvalidInputParams)?;

        let kinematics =
            SwerveKinematics::new(params.swerve.track_width_m, params.swerve.wheel_base_m)
                .map_err(DriveCtrlError::KinematicsError)?;

        let estimator = PoseEstimator::new(&params.pose_est, params.initial_pose)
            .map_err(DriveCtrlError::PoseEstError)?;

        let [fl, fr, rl, rr] = modules;
        let modules = [
            SwerveModule::new(fl, &params.swerve, 0),
            SwerveModule::new(fr, &params.swerve, 1),
            SwerveModule::new(rl, &params.swerve, 2),
            SwerveModule::new(rr, &params.swerve, 3),
        ];

        let vision_filter = VisionFilter::new(params.vision.min_consecutive_frames);

        Ok(Self {
            params,
            kinematics,
            modules,
            gyro,
            estimator,
            vision_filter,
            pending_intent: None,
            intent: None,
            last_time_s: None,
            last_gyro: None,
            gyro_stale: false,
            pitch_zero_rad: 0.0,
            roll_zero_rad: 0.0,
            num_vision_accepted: 0,
            num_vision_rejected: 0,
            report: StatusReport::default(),
            arch_report: Archiver::default(),
            output: None,
            arch_output: Archiver::default(),
        })
    }

    /// Request a chassis velocity, executed from the next cycle.
    ///
    /// A field relative velocity is rotated into the robot frame using the estimated heading.
    pub fn drive(
        &mut self,
        vx_ms: f64,
        vy_ms: f64,
        rate_rads: f64,
        field_relative: bool,
    ) -> Result<(), DriveCtrlError> {
        self.set_intent(DriveIntent {
            velocity: ChassisVelocity::new(vx_ms, vy_ms, rate_rads),
            field_relative,
        })
    }

    /// Request a drive intent, executed from the next cycle.
    pub fn set_intent(&mut self, intent: DriveIntent) -> Result<(), DriveCtrlError> {
        if !intent.is_finite() {
            return Err(DriveCtrlError::InvalidIntent(intent));
        }

        self.pending_intent = Some(intent);
        Ok(())
    }

    /// Stop all modules immediately and forget the current intent.
    pub fn stop(&mut self) {
        for m in self.modules.iter_mut() {
            m.stop();
        }

        self.pending_intent = None;
        self.intent = None;
    }

    /// The estimated pose of the robot.
    pub fn pose(&self) -> Pose {
        self.estimator.pose()
    }

    /// The estimated heading of the robot.
    ///
    /// Units: radians
    pub fn heading(&self) -> f64 {
        self.estimator.heading()
    }

    /// Move the estimated position, keeping the estimated heading.
    pub fn reset_odometry(&mut self, pose: &Pose) {
        self.estimator.reset_pose(pose);
    }

    /// Move the estimated position and heading.
    pub fn reset_odometry_and_rotation(&mut self, pose: &Pose, heading_rad: f64) {
        self.estimator.reset_pose_and_heading(pose, heading_rad);
    }

    /// Make the current heading the zero heading, keeping the estimated position.
    pub fn zero_heading(&mut self) {
        let pose = self.estimator.pose();
        self.estimator.reset_pose_and_heading(&pose, 0.0);
    }

    /// Fuse a vision fix of the pose, captured at `timestamp_s`.
    pub fn add_vision_measurement(
        &mut self,
        pose: &Pose,
        timestamp_s: f64,
    ) -> Result<(), DriveCtrlError> {
        self.estimator
            .add_vision_measurement(pose, timestamp_s)
            .map_err(DriveCtrlError::PoseEstError)
    }

    /// Set the standard deviations of vision fixes in x, y and heading.
    pub fn set_vision_confidence(
        &mut self,
        x_m: f64,
        y_m: f64,
        heading_rad: f64,
    ) -> Result<(), DriveCtrlError> {
        self.estimator
            .set_vision_std_devs([x_m, y_m, heading_rad])
            .map_err(DriveCtrlError::PoseEstError)
    }

    /// Measured positions of the modules, as of the last cycle.
    pub fn module_positions(&self) -> [ModulePosition; NUM_MODULES] {
        [
            self.modules[0].position(),
            self.modules[1].position(),
            self.modules[2].position(),
            self.modules[3].position(),
        ]
    }

    /// Measured states of the modules, as of the last cycle.
    pub fn module_states(&self) -> [ModuleState; NUM_MODULES] {
        [
            self.modules[0].state(),
            self.modules[1].state(),
            self.modules[2].state(),
            self.modules[3].state(),
        ]
    }

    /// Reset the cumulative drive distance of every module.
    pub fn reset_drive_distances(&mut self) {
        let before = self.module_positions();

        for m in self.modules.iter_mut() {
            m.reset_drive_distance();
        }

        // Move the odometry snapshot onto the new zero
        let [p0, p1, p2, p3] = before;
        self.estimator.shift_snapshot_distances(&[
            p0.distance_m,
            p1.distance_m,
            p2.distance_m,
            p3.distance_m,
        ]);

        info!("Module drive distances reset");
    }

    /// Make the current pitch and roll the zero attitude.
    pub fn zero_pitch_and_roll(&mut self) {
        match self.last_gyro {
            Some(ref g) => {
                self.pitch_zero_rad = g.pitch_rad;
                self.roll_zero_rad = g.roll_rad;
                info!(
                    "Pitch and roll zeroed at {:.3}, {:.3} rad",
                    self.pitch_zero_rad, self.roll_zero_rad
                );
            }
            None => warn!("Cannot zero pitch and roll, no gyro reading available"),
        }
    }

    /// Pitch of the chassis relative to the zeroed attitude.
    ///
    /// Units: radians
    pub fn pitch_rad(&self) -> Option<f64> {
        self.last_gyro.map(|g| g.pitch_rad - self.pitch_zero_rad)
    }

    /// Roll of the chassis relative to the zeroed attitude.
    ///
    /// Units: radians
    pub fn roll_rad(&self) -> Option<f64> {
        self.last_gyro.map(|g| g.roll_rad - self.roll_zero_rad)
    }

    /// Tilt of the chassis along the field x axis.
    ///
    /// Pitch and roll are projected onto the field x axis through the fused heading.
    ///
    /// Units: radians
    pub fn balance_error_rad(&self) -> Option<f64> {
        let heading_rad = self.estimator.heading();
        match (self.pitch_rad(), self.roll_rad()) {
            (Some(pitch_rad), Some(roll_rad)) => {
                Some(pitch_rad * heading_rad.cos() + roll_rad * heading_rad.sin())
            }
            _ => None,
        }
    }

    /// The drive parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }
}
