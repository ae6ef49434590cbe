//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::{DriveCtrl, DriveCtrlError, DriveIntent, Params};
use crate::{
    pose_est::Pose,
    swerve::{
        desaturate,
        ports::{Gyro, ModuleIo},
        ChassisVelocity, ModuleReport, ModuleTarget, NUM_MODULES,
    },
    vision::{FilterOutcome, VisionMeasurement},
};
use comms_if::eqpt::vision::VisionFrame;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
    time::is_stale,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Data needed to initialise DriveCtrl.
pub struct InitData<M: ModuleIo, G: Gyro> {
    pub params: Params,

    /// Module hardware, in the order FL, FR, RL, RR.
    pub modules: [M; NUM_MODULES],

    pub gyro: G,
}

/// Input data to DriveCtrl.
#[derive(Debug, Clone, Default)]
pub struct InputData {
    /// Time of this cycle on the session clock.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// A new drive intent, or `None` to continue with the current one.
    pub intent: Option<DriveIntent>,

    /// The latest frame from the vision coprocessor, if any.
    pub vision_frame: Option<VisionFrame>,

    /// If true the actuators are stopped. Sensing and pose estimation continue.
    pub safe: bool,
}

/// Output of DriveCtrl.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutputData {
    /// Optimised targets sent to the modules.
    pub targets: [ModuleTarget; NUM_MODULES],

    /// Estimated pose at the end of the cycle.
    pub pose: Pose,

    /// Robot relative chassis velocity commanded this cycle.
    pub command: ChassisVelocity,
}

/// Status report for DriveCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// The actuators were stopped.
    pub safe: bool,

    /// The gyro gave no fresh reading, heading is being integrated from the wheels.
    pub gyro_stale: bool,

    /// Per module status.
    pub modules: [ModuleReport; NUM_MODULES],

    /// Module speeds were scaled down to the maximum module speed.
    pub desaturated: bool,

    /// The drive intent was not refreshed in time and has been dropped.
    pub intent_timed_out: bool,

    /// What happened to this cycle's vision frame.
    pub vision: VisionStatus,

    /// Total vision fixes fused so far.
    pub num_vision_accepted: u64,

    /// Total vision fixes rejected by the estimator so far.
    pub num_vision_rejected: u64,
}

/// Fate of the vision frame in a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VisionStatus {
    Disabled,
    NoFrame,
    NotVisible,
    Debouncing,
    NotNewer,
    Accepted,
    Rejected,
}

/// Flat row of the output archive.
#[derive(Serialize)]
struct OutputRecord {
    time_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    cmd_vx_ms: f64,
    cmd_vy_ms: f64,
    cmd_rate_rads: f64,
    fl_speed_ms: f64,
    fl_angle_rad: f64,
    fr_speed_ms: f64,
    fr_angle_rad: f64,
    rl_speed_ms: f64,
    rl_angle_rad: f64,
    rr_speed_ms: f64,
    rr_angle_rad: f64,
}

/// Flat row of the status archive.
#[derive(Serialize)]
struct StatusRecord {
    time_s: f64,
    safe: bool,
    gyro_stale: bool,
    num_encoders_stale: usize,
    num_drive_saturated: usize,
    num_steer_saturated: usize,
    desaturated: bool,
    intent_timed_out: bool,
    vision: VisionStatus,
    num_vision_accepted: u64,
    num_vision_rejected: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for VisionStatus {
    fn default() -> Self {
        VisionStatus::NoFrame
    }
}

impl StatusReport {
    /// Stale encoder flags, in module order.
    pub fn encoder_stale(&self) -> [bool; NUM_MODULES] {
        let mut stale = [false; NUM_MODULES];
        for (s, m) in stale.iter_mut().zip(self.modules.iter()) {
            *s = m.encoder_stale;
        }
        stale
    }

    /// Returns true if any sensor is stale.
    pub fn degraded(&self) -> bool {
        self.gyro_stale || self.modules.iter().any(|m| m.encoder_stale)
    }
}

impl<M: ModuleIo, G: Gyro> State for DriveCtrl<M, G> {
    type InitData = InitData<M, G>;
    type InitError = DriveCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Archives are written to the `drive_ctrl` directory of the session.
    fn init(init_data: Self::InitData, session: &Session) -> Result<Self, Self::InitError> {
        let mut drive_ctrl = Self::new(init_data.params, init_data.modules, init_data.gyro)?;

        drive_ctrl.arch_report = Archiver::from_path(session, "drive_ctrl/status_report.csv")
            .map_err(DriveCtrlError::ArchiveError)?;
        drive_ctrl.arch_output = Archiver::from_path(session, "drive_ctrl/output.csv")
            .map_err(DriveCtrlError::ArchiveError)?;

        Ok(drive_ctrl)
    }

    /// Perform cyclic processing of DriveCtrl.
    ///
    /// An invalid intent is rejected before anything else is done, the previous intent is kept.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // ---- INTENT ----

        if let Some(intent) = input_data.intent {
            self.set_intent(intent)?;
        }

        let now_s = input_data.time_s;
        let dt_s = match self.last_time_s {
            Some(t) if now_s > t => now_s - t,
            _ => 0.0,
        };
        self.last_time_s = Some(now_s);

        self.report = StatusReport {
            safe: input_data.safe,
            ..Default::default()
        };

        if input_data.safe {
            self.pending_intent = None;
            self.intent = None;
        }

        if let Some(intent) = self.pending_intent.take() {
            self.intent = Some((intent, now_s));
        }

        let intent = match self.intent {
            Some((intent, time_s)) if now_s - time_s <= self.params.intent_timeout_s => intent,
            Some(_) => {
                warn!(
                    "Drive intent not refreshed for {} s, stopping",
                    self.params.intent_timeout_s
                );
                self.intent = None;
                self.report.intent_timed_out = true;
                DriveIntent::default()
            }
            None => DriveIntent::default(),
        };

        // ---- SENSING ----

        for m in self.modules.iter_mut() {
            m.sense(now_s);
        }

        let gyro_heading_rad = self.sense_gyro(now_s);

        // ---- COMMAND ----

        let command = match intent.field_relative {
            true => ChassisVelocity::from_field_relative(intent.velocity, self.estimator.heading()),
            false => intent.velocity,
        };

        let mut targets = self.kinematics.forward(&command);
        self.report.desaturated = desaturate(&mut targets, self.params.swerve.max_module_speed_ms);

        // ---- ACTUATION ----

        let mut optimised = [ModuleTarget::default(); NUM_MODULES];

        for ((m, t), o) in self
            .modules
            .iter_mut()
            .zip(targets.iter())
            .zip(optimised.iter_mut())
        {
            *o = match input_data.safe {
                true => {
                    m.stop();
                    m.report().target
                }
                false => m.set_target(t, dt_s),
            };
        }

        for (r, m) in self.report.modules.iter_mut().zip(self.modules.iter()) {
            *r = m.report();
        }

        // ---- ODOMETRY ----

        let positions = self.module_positions();
        let pose = self
            .estimator
            .update_with_odometry(&self.kinematics, gyro_heading_rad, &positions);

        // ---- VISION ----

        self.report.vision = self.process_vision(input_data.vision_frame.as_ref());
        self.report.num_vision_accepted = self.num_vision_accepted;
        self.report.num_vision_rejected = self.num_vision_rejected;

        // ---- OUTPUT ----

        let output = OutputData {
            targets: optimised,
            pose: self.estimator.pose(),
            command,
        };

        trace!(
            "DriveCtrl: command {:?}, odometry pose {:?}, fused pose {:?}",
            command,
            pose,
            output.pose
        );

        self.output = Some(output);

        Ok((output, self.report))
    }
}

impl<M: ModuleIo, G: Gyro> Archived for DriveCtrl<M, G> {
    fn write(&mut self) -> Result<(), ArchiveError> {
        let time_s = self.last_time_s.unwrap_or(0.0);
        let r = &self.report;

        self.arch_report.serialise(StatusRecord {
            time_s,
            safe: r.safe,
            gyro_stale: r.gyro_stale,
            num_encoders_stale: r.modules.iter().filter(|m| m.encoder_stale).count(),
            num_drive_saturated: r.modules.iter().filter(|m| m.drive_saturated).count(),
            num_steer_saturated: r.modules.iter().filter(|m| m.steer_saturated).count(),
            desaturated: r.desaturated,
            intent_timed_out: r.intent_timed_out,
            vision: r.vision,
            num_vision_accepted: r.num_vision_accepted,
            num_vision_rejected: r.num_vision_rejected,
        })?;

        if let Some(ref o) = self.output {
            self.arch_output.serialise(OutputRecord {
                time_s,
                x_m: o.pose.x_m,
                y_m: o.pose.y_m,
                heading_rad: o.pose.heading_rad,
                cmd_vx_ms: o.command.vx_ms,
                cmd_vy_ms: o.command.vy_ms,
                cmd_rate_rads: o.command.rate_rads,
                fl_speed_ms: o.targets[0].speed_ms,
                fl_angle_rad: o.targets[0].angle_rad,
                fr_speed_ms: o.targets[1].speed_ms,
                fr_angle_rad: o.targets[1].angle_rad,
                rl_speed_ms: o.targets[2].speed_ms,
                rl_angle_rad: o.targets[2].angle_rad,
                rr_speed_ms: o.targets[3].speed_ms,
                rr_angle_rad: o.targets[3].angle_rad,
            })?;
        }

        Ok(())
    }
}

impl<M: ModuleIo, G: Gyro> DriveCtrl<M, G> {
    /// Read the gyro, returning the heading if the reading is fresh.
    fn sense_gyro(&mut self, now_s: f64) -> Option<f64> {
        let reading = match self.gyro.read() {
            Some(r) if !is_stale(r.timestamp_s, now_s, self.params.gyro_stale_timeout_s) => Some(r),
            _ => None,
        };

        match reading {
            Some(r) => {
                if self.gyro_stale {
                    warn!("Gyro recovered");
                }
                self.gyro_stale = false;
                self.last_gyro = Some(r);
                Some(r.heading_rad)
            }
            None => {
                if !self.gyro_stale {
                    warn!("Gyro is stale, integrating heading from the wheels");
                }
                self.gyro_stale = true;
                self.report.gyro_stale = true;
                None
            }
        }
    }

    /// Pass the frame through the filter and fuse it if it survives.
    fn process_vision(&mut self, frame: Option<&VisionFrame>) -> VisionStatus {
        if !self.params.vision.enabled {
            return VisionStatus::Disabled;
        }

        let frame = match self.vision_filter.filter(frame) {
            FilterOutcome::NoFrame => return VisionStatus::NoFrame,
            FilterOutcome::NotVisible => return VisionStatus::NotVisible,
            FilterOutcome::Debouncing => return VisionStatus::Debouncing,
            FilterOutcome::NotNewer => return VisionStatus::NotNewer,
            FilterOutcome::Forward(f) => f,
        };

        let measurement = match VisionMeasurement::from_frame(&frame, &self.params.vision.field) {
            Some(m) => m,
            None => return VisionStatus::NotVisible,
        };

        match self
            .estimator
            .add_vision_measurement(&measurement.pose, measurement.timestamp_s)
        {
            Ok(()) => {
                debug!("Vision fix fused: {:?}", measurement);
                self.num_vision_accepted += 1;
                VisionStatus::Accepted
            }
            Err(e) => {
                trace!("Vision fix rejected: {}", e);
                self.num_vision_rejected += 1;
                VisionStatus::Rejected
            }
        }
    }
}
