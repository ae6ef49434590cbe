//! # Pose estimation
//!
//! Fuses wheel odometry, the gyro and intermittent vision fixes into a single field frame pose.
//!
//! Each cycle the change in module positions is turned into a body frame twist by the inverse
//! kinematics and applied to the pose along a constant curvature arc. While the gyro is available
//! it is authoritative for heading: the heading is always `gyro + offset`, with the offset
//! anchored whenever the gyro (re)appears so that a dropout never causes a jump.
//!
//! Vision fixes pull the current pose towards the measured pose by a per axis gain computed from
//! the relative confidence of the odometry and the vision measurements.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod pose;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, trace};
use serde::Deserialize;

use crate::swerve::{ModulePosition, SwerveKinematics, NUM_MODULES};

pub use pose::*;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the pose estimator.
#[derive(Debug, Clone, Deserialize)]
pub struct PoseEstParams {
    /// Standard deviations of the odometry state, in x, y and heading.
    ///
    /// Units: meters, meters, radians
    #[serde(default = "default_state_std_devs")]
    pub state_std_devs: [f64; 3],

    /// Standard deviations of vision measurements, in x, y and heading.
    ///
    /// Units: meters, meters, radians
    #[serde(default = "default_vision_std_devs")]
    pub vision_std_devs: [f64; 3],
}

/// Fused estimate of the robot pose.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    pose: Pose,

    state_std_devs: [f64; 3],
    vision_std_devs: [f64; 3],

    /// Per axis gain applied to vision corrections.
    vision_gains: [f64; 3],

    /// Module positions at the last odometry update.
    last_positions: Option<[ModulePosition; NUM_MODULES]>,

    /// Gyro heading at the last odometry update.
    last_gyro_rad: Option<f64>,

    /// `heading = gyro + offset` while the gyro is anchored.
    gyro_offset_rad: Option<f64>,

    /// Timestamp of the last accepted vision measurement.
    last_vision_time_s: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur in the pose estimator.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PoseEstError {
    #[error("Vision measurement at {timestamp_s} s is not newer than the last accepted one at {last_s} s")]
    OutOfOrder { timestamp_s: f64, last_s: f64 },

    #[error("Vision measurement is not finite: {0:?} at {1} s")]
    NonFinite(Pose, f64),

    #[error("Standard deviations must be finite and non-negative, got {0:?}")]
    InvalidStdDevs([f64; 3]),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for PoseEstParams {
    fn default() -> Self {
        Self {
            state_std_devs: default_state_std_devs(),
            vision_std_devs: default_vision_std_devs(),
        }
    }
}

impl PoseEstimator {
    /// Create a new estimator starting at `initial`.
    pub fn new(params: &PoseEstParams, initial: Pose) -> Result<Self, PoseEstError> {
        validate_std_devs(&params.state_std_devs)?;
        validate_std_devs(&params.vision_std_devs)?;

        Ok(Self {
            pose: initial,
            state_std_devs: params.state_std_devs,
            vision_std_devs: params.vision_std_devs,
            vision_gains: calc_gains(&params.state_std_devs, &params.vision_std_devs),
            last_positions: None,
            last_gyro_rad: None,
            gyro_offset_rad: None,
            last_vision_time_s: None,
        })
    }

    /// The current fused pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// The current fused heading.
    ///
    /// Units: radians
    pub fn heading(&self) -> f64 {
        self.pose.heading_rad
    }

    /// The timestamp of the last accepted vision measurement.
    pub fn last_vision_time_s(&self) -> Option<f64> {
        self.last_vision_time_s
    }

    /// The per axis gains applied to vision corrections.
    pub fn vision_gains(&self) -> [f64; 3] {
        self.vision_gains
    }

    /// Integrate the motion since the last update.
    ///
    /// The first update after construction or a reset only records the module positions and
    /// anchors the gyro.
    pub fn update_with_odometry(
        &mut self,
        kinematics: &SwerveKinematics,
        gyro_heading_rad: Option<f64>,
        positions: &[ModulePosition; NUM_MODULES],
    ) -> Pose {
        if let Some(ref last_positions) = self.last_positions {
            let mut twist = kinematics.inverse_displacement(last_positions, positions);

            match (gyro_heading_rad, self.last_gyro_rad, self.gyro_offset_rad) {
                (Some(gyro_rad), Some(last_gyro_rad), Some(offset_rad)) => {
                    twist.dheading_rad = gyro_rad - last_gyro_rad;
                    let mut pose = self.pose.exp(&twist);
                    pose.heading_rad = gyro_rad + offset_rad;
                    self.pose = pose;
                }
                _ => {
                    self.pose = self.pose.exp(&twist);
                }
            }

            trace!("Odometry twist {:?} -> pose {:?}", twist, self.pose);
        }

        match gyro_heading_rad {
            Some(gyro_rad) => {
                if self.gyro_offset_rad.is_none() || self.last_gyro_rad.is_none() {
                    self.gyro_offset_rad = Some(self.pose.heading_rad - gyro_rad);
                    debug!("Gyro anchored with offset {:?} rad", self.gyro_offset_rad);
                }
            }
            None => {
                if self.last_gyro_rad.is_some() {
                    info!("Gyro unavailable, integrating heading from the wheels");
                }
            }
        }

        self.last_gyro_rad = gyro_heading_rad;
        self.last_positions = Some(*positions);

        self.pose
    }

    /// Fuse a vision measurement of the pose captured at `timestamp_s`.
    ///
    /// Measurements which are not finite, or not newer than the last accepted measurement, are
    /// rejected and leave the estimate untouched.
    pub fn add_vision_measurement(
        &mut self,
        measured: &Pose,
        timestamp_s: f64,
    ) -> Result<(), PoseEstError> {
        if !measured.is_finite() || !timestamp_s.is_finite() {
            return Err(PoseEstError::NonFinite(*measured, timestamp_s));
        }

        if let Some(last_s) = self.last_vision_time_s {
            if timestamp_s <= last_s {
                return Err(PoseEstError::OutOfOrder { timestamp_s, last_s });
            }
        }

        let correction = self.pose.log(measured).scaled(&self.vision_gains);
        let pose = self.pose.exp(&correction);

        if let Some(ref mut offset_rad) = self.gyro_offset_rad {
            *offset_rad += pose.heading_rad - self.pose.heading_rad;
        }

        trace!("Vision {:?} corrected pose {:?} -> {:?}", measured, self.pose, pose);

        self.pose = pose;
        self.last_vision_time_s = Some(timestamp_s);

        Ok(())
    }

    /// Set the confidence in vision measurements.
    pub fn set_vision_std_devs(&mut self, std_devs: [f64; 3]) -> Result<(), PoseEstError> {
        validate_std_devs(&std_devs)?;

        self.vision_std_devs = std_devs;
        self.vision_gains = calc_gains(&self.state_std_devs, &self.vision_std_devs);

        info!("Vision std devs set to {:?}, gains {:?}", std_devs, self.vision_gains);

        Ok(())
    }

    /// Move the estimate to the translation of `pose`, keeping the current heading.
    pub fn reset_pose(&mut self, pose: &Pose) {
        let heading_rad = self.pose.heading_rad;
        self.reset_pose_and_heading(pose, heading_rad);
    }

    /// Move the estimate to the translation of `pose` with the given heading.
    pub fn reset_pose_and_heading(&mut self, pose: &Pose, heading_rad: f64) {
        self.pose = Pose::new(pose.x_m, pose.y_m, heading_rad);
        self.clear_snapshots();

        info!("Pose reset to {:?}", self.pose);
    }

    /// Shift the recorded module distances by `offsets_m`, keeping the gyro anchor.
    ///
    /// Must be called whenever the module distances are rezeroed outside the estimator, with the
    /// distances at which they were zeroed.
    pub fn shift_snapshot_distances(&mut self, offsets_m: &[f64; NUM_MODULES]) {
        if let Some(ref mut positions) = self.last_positions {
            for (p, o) in positions.iter_mut().zip(offsets_m.iter()) {
                p.distance_m -= o;
            }
        }
    }

    /// Forget the last module positions and gyro anchor.
    fn clear_snapshots(&mut self) {
        self.last_positions = None;
        self.last_gyro_rad = None;
        self.gyro_offset_rad = None;
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_state_std_devs() -> [f64; 3] {
    [0.1, 0.1, 0.1]
}

fn default_vision_std_devs() -> [f64; 3] {
    [0.9, 0.9, 0.9]
}

fn validate_std_devs(std_devs: &[f64; 3]) -> Result<(), PoseEstError> {
    if std_devs.iter().all(|s| s.is_finite() && *s >= 0.0) {
        Ok(())
    } else {
        Err(PoseEstError::InvalidStdDevs(*std_devs))
    }
}

/// Steady state Kalman gain for each axis, `k = q / (q + sqrt(q * r))`.
fn calc_gains(state_std_devs: &[f64; 3], vision_std_devs: &[f64; 3]) -> [f64; 3] {
    let mut gains = [0.0; 3];

    for (k, (s, v)) in gains
        .iter_mut()
        .zip(state_std_devs.iter().zip(vision_std_devs.iter()))
    {
        let q = s * s;
        let r = v * v;

        *k = if q == 0.0 { 0.0 } else { q / (q + (q * r).sqrt()) };
    }

    gains
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    use crate::swerve::ChassisVelocity;

    fn kinematics() -> SwerveKinematics {
        SwerveKinematics::new(0.6, 0.6).unwrap()
    }

    fn positions(distance_m: f64, angle_rad: f64) -> [ModulePosition; NUM_MODULES] {
        [ModulePosition { distance_m, angle_rad }; NUM_MODULES]
    }

    fn estimator() -> PoseEstimator {
        PoseEstimator::new(&PoseEstParams::default(), Pose::default()).unwrap()
    }

    #[test]
    fn test_gains() {
        let est = estimator();
        for k in est.vision_gains().iter() {
            assert!((k - 0.1).abs() < 1e-12);
        }

        assert_eq!(calc_gains(&[0.0; 3], &[1.0; 3]), [0.0; 3]);
        assert_eq!(calc_gains(&[0.5; 3], &[0.0; 3]), [1.0; 3]);
    }

    #[test]
    fn test_invalid_std_devs() {
        let mut est = estimator();
        assert_eq!(
            est.set_vision_std_devs([0.1, -0.1, 0.1]),
            Err(PoseEstError::InvalidStdDevs([0.1, -0.1, 0.1]))
        );
        assert!(est.set_vision_std_devs([0.1, f64::NAN, 0.1]).is_err());

        let params = PoseEstParams {
            state_std_devs: [f64::INFINITY, 0.1, 0.1],
            ..Default::default()
        };
        assert!(PoseEstimator::new(&params, Pose::default()).is_err());
    }

    #[test]
    fn test_first_update_records_only() {
        let kin = kinematics();
        let mut est = estimator();

        est.update_with_odometry(&kin, None, &positions(5.0, 0.0));
        assert_eq!(est.pose(), Pose::default());

        est.update_with_odometry(&kin, None, &positions(6.0, 0.0));
        assert!((est.pose().x_m - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_straight_drive() {
        let kin = kinematics();
        let mut est = estimator();

        est.update_with_odometry(&kin, Some(0.0), &positions(0.0, 0.0));
        for i in 1..=50 {
            est.update_with_odometry(&kin, Some(0.0), &positions(0.02 * i as f64, 0.0));
        }

        let pose = est.pose();
        assert!((pose.x_m - 1.0).abs() < 1e-9);
        assert!(pose.y_m.abs() < 1e-9);
        assert!(pose.heading_rad.abs() < 1e-9);
    }

    #[test]
    fn test_pure_rotation() {
        let mut kin = kinematics();
        let mut est = estimator();

        let targets = kin.forward(&ChassisVelocity::new(0.0, 0.0, 1.0));
        let mut pos = [ModulePosition::default(); NUM_MODULES];
        for (p, t) in pos.iter_mut().zip(targets.iter()) {
            p.angle_rad = t.angle_rad;
        }

        est.update_with_odometry(&kin, None, &pos);

        // Rotate through pi/2 at 1 rad/s in 20 ms steps
        let dt = 0.02;
        let steps = (PI / 2.0 / dt).round() as usize;
        for _ in 0..steps {
            for (p, t) in pos.iter_mut().zip(targets.iter()) {
                p.distance_m += t.speed_ms * dt;
            }
            est.update_with_odometry(&kin, None, &pos);
        }

        let pose = est.pose();
        assert!(pose.x_m.abs() < 1e-9);
        assert!(pose.y_m.abs() < 1e-9);
        assert!((pose.heading_rad - steps as f64 * dt).abs() < 1e-9);
    }

    #[test]
    fn test_gyro_authoritative() {
        let kin = kinematics();
        let mut est = estimator();

        est.update_with_odometry(&kin, Some(2.0), &positions(0.0, 0.0));
        assert_eq!(est.heading(), 0.0);

        // Wheels say straight, gyro says turned
        est.update_with_odometry(&kin, Some(2.5), &positions(0.0, 0.0));
        assert!((est.heading() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_gyro_dropout_no_jump() {
        let kin = kinematics();
        let mut est = estimator();

        est.update_with_odometry(&kin, Some(1.0), &positions(0.0, 0.0));
        est.update_with_odometry(&kin, Some(1.2), &positions(0.0, 0.0));
        assert!((est.heading() - 0.2).abs() < 1e-12);

        // Lost, heading holds as the wheels are not turning
        est.update_with_odometry(&kin, None, &positions(0.0, 0.0));
        assert!((est.heading() - 0.2).abs() < 1e-12);

        // Gyro returns at a very different reading, heading re-anchored with no jump
        est.update_with_odometry(&kin, Some(-3.0), &positions(0.0, 0.0));
        assert!((est.heading() - 0.2).abs() < 1e-12);

        est.update_with_odometry(&kin, Some(-2.9), &positions(0.0, 0.0));
        assert!((est.heading() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_vision_rejection() {
        let mut est = estimator();

        let fix = Pose::new(1.0, 1.0, 0.0);
        est.add_vision_measurement(&fix, 1.0).unwrap();
        let after_first = est.pose();

        assert_eq!(
            est.add_vision_measurement(&fix, 1.0),
            Err(PoseEstError::OutOfOrder {
                timestamp_s: 1.0,
                last_s: 1.0
            })
        );
        assert!(est.add_vision_measurement(&fix, 0.5).is_err());
        assert!(est
            .add_vision_measurement(&Pose::new(f64::NAN, 0.0, 0.0), 2.0)
            .is_err());
        assert!(est.add_vision_measurement(&fix, f64::INFINITY).is_err());

        assert_eq!(est.pose(), after_first);
        assert_eq!(est.last_vision_time_s(), Some(1.0));
    }

    #[test]
    fn test_vision_convergence() {
        let mut est = estimator();
        let fix = Pose::new(1.0, -2.0, 0.5);

        let mut last_err = f64::INFINITY;
        for i in 0..200 {
            est.add_vision_measurement(&fix, i as f64 * 0.02).unwrap();

            let t = est.pose().log(&fix);
            let err = (t.dx_m.powi(2) + t.dy_m.powi(2) + t.dheading_rad.powi(2)).sqrt();
            assert!(err <= last_err + 1e-12);
            last_err = err;
        }

        let pose = est.pose();
        assert!((pose.x_m - 1.0).abs() < 1e-6);
        assert!((pose.y_m + 2.0).abs() < 1e-6);
        assert!((pose.heading_rad - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_vision_shifts_gyro_offset() {
        let kin = kinematics();
        let mut est = estimator();

        est.update_with_odometry(&kin, Some(0.0), &positions(0.0, 0.0));
        est.add_vision_measurement(&Pose::new(0.0, 0.0, 1.0), 1.0).unwrap();
        let corrected = est.heading();
        assert!(corrected > 0.0);

        // Same gyro reading, corrected heading is kept
        est.update_with_odometry(&kin, Some(0.0), &positions(0.0, 0.0));
        assert!((est.heading() - corrected).abs() < 1e-12);
    }

    #[test]
    fn test_resets() {
        let kin = kinematics();
        let mut est = estimator();

        est.update_with_odometry(&kin, Some(0.0), &positions(0.0, 0.0));
        est.update_with_odometry(&kin, Some(0.3), &positions(1.0, 0.0));

        est.reset_pose(&Pose::new(4.0, 5.0, 2.0));
        let pose = est.pose();
        assert_eq!((pose.x_m, pose.y_m), (4.0, 5.0));
        assert!((pose.heading_rad - 0.3).abs() < 1e-12);

        // Snapshots cleared, next update only records
        est.update_with_odometry(&kin, Some(0.3), &positions(10.0, 0.0));
        assert_eq!(est.pose(), pose);

        est.reset_pose_and_heading(&Pose::new(1.0, 1.0, 0.0), -1.0);
        assert_eq!(est.pose(), Pose::new(1.0, 1.0, -1.0));

        // Re-anchored to the new heading
        est.update_with_odometry(&kin, Some(0.3), &positions(10.0, 0.0));
        est.update_with_odometry(&kin, Some(0.4), &positions(10.0, 0.0));
        assert!((est.heading() + 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_shift_snapshot_distances() {
        let kin = kinematics();
        let mut est = estimator();

        est.update_with_odometry(&kin, Some(0.0), &positions(0.0, 0.0));
        est.update_with_odometry(&kin, Some(0.0), &positions(2.0, 0.0));

        // Distances rezeroed at 2 m, the wheels then travel another 0.5 m
        est.shift_snapshot_distances(&[2.0; NUM_MODULES]);
        est.update_with_odometry(&kin, Some(0.0), &positions(0.5, 0.0));

        assert!((est.pose().x_m - 2.5).abs() < 1e-9);
        assert!(est.pose().y_m.abs() < 1e-9);
    }
}
