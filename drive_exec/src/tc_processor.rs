//! # Telecommand processor module
//!
//! The telecommand processor handles TCs coming from the driver station.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use comms_if::tc::{Tc, TcResponse};
use drive_lib::{
    data_store::{DataStore, SafeModeCause},
    drive_ctrl::{DriveCtrl, DriveIntent},
    input::shape_joystick,
    pose_est::Pose,
    swerve::{
        ports::{Gyro, ModuleIo},
        ChassisVelocity,
    },
};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Drive commands are placed in the datastore for the next DriveCtrl cycle, everything else is
/// applied to the drive immediately. Returns the response to send back to the driver station.
pub(crate) fn exec<M: ModuleIo, G: Gyro>(
    ds: &mut DataStore,
    drive_ctrl: &mut DriveCtrl<M, G>,
    tc: &Tc,
) -> TcResponse {

    // Handle different Tcs
    match tc {
        Tc::MakeSafe => {
            debug!("Recieved MakeSafe command");
            ds.make_safe(SafeModeCause::MakeSafeTc);
        },
        Tc::MakeUnsafe => {
            debug!("Recieved MakeUnsafe command");
            if ds.make_unsafe(SafeModeCause::MakeSafeTc).is_err() {
                warn!(
                    "Cannot leave safe mode, it was not entered by a TC (cause: {:?})",
                    ds.safe_cause
                );
                return TcResponse::CannotExecute
            }
        },
        Tc::Joystick(axes) => {
            ds.drive_input.intent = Some(shape_joystick(axes, &drive_ctrl.params().input));
        },
        Tc::Drive { vx_ms, vy_ms, rate_rads, field_relative } => {
            let intent = DriveIntent {
                velocity: ChassisVelocity::new(*vx_ms, *vy_ms, *rate_rads),
                field_relative: *field_relative,
            };

            if !intent.is_finite() {
                warn!("Rejected non-finite drive command: {:?}", intent);
                return TcResponse::Invalid
            }

            ds.drive_input.intent = Some(intent);
        },
        Tc::ResetOdometry { x_m, y_m } => {
            let pose = Pose::new(*x_m, *y_m, drive_ctrl.heading());
            if !pose.is_finite() {
                return TcResponse::Invalid
            }

            drive_ctrl.reset_odometry(&pose);
            info!("Odometry reset to ({:.3}, {:.3}) m", x_m, y_m);
        },
        Tc::ResetOdometryAndRotation { x_m, y_m, heading_rad } => {
            let pose = Pose::new(*x_m, *y_m, *heading_rad);
            if !pose.is_finite() {
                return TcResponse::Invalid
            }

            drive_ctrl.reset_odometry_and_rotation(&pose, *heading_rad);
            info!("Odometry reset to {:?}", pose);
        },
        Tc::SetVisionConfidence { x_m, y_m, heading_rad } => {
            if let Err(e) = drive_ctrl.set_vision_confidence(*x_m, *y_m, *heading_rad) {
                warn!("Could not set the vision confidence: {}", e);
                return TcResponse::Invalid
            }
        },
        Tc::ZeroHeading => {
            drive_ctrl.zero_heading();
            info!("Heading zeroed");
        },
        Tc::ResetDriveDistances => drive_ctrl.reset_drive_distances(),
        Tc::ZeroPitchAndRoll => drive_ctrl.zero_pitch_and_roll(),
    }

    TcResponse::Ok
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::JoystickAxes;
    use drive_lib::{
        drive_ctrl::Params,
        swerve::sim::{SimDrivetrain, SimGyro, SimModuleIo, SimParams},
    };

    const PARAMS: &str = r#"
        gyro_stale_timeout_s = 0.1
        intent_timeout_s = 0.5

        [swerve]
        track_width_m = 0.6223
        wheel_base_m = 0.6223
        max_module_speed_ms = 4.0
        max_voltage_v = 12.0
        encoder_stale_timeout_s = 0.1

        [swerve.drive_gains]
        k_s = 0.73394
        k_v = 2.4068
        k_a = 0.0
        k_p = 0.0

        [swerve.steer_gains]
        k_p = 8.1
        k_s = 0.77
        k_v = 0.75
        max_rate_rads = 9.42477796076938
        max_accel_radss = 18.84955592153876

        [[swerve.modules]]
        id = "FL"

        [[swerve.modules]]
        id = "FR"

        [[swerve.modules]]
        id = "RL"

        [[swerve.modules]]
        id = "RR"
    "#;

    fn drive() -> DriveCtrl<SimModuleIo, SimGyro> {
        let params: Params = util::params::from_str(PARAMS).unwrap();
        let sim = SimDrivetrain::new(
            &params.swerve,
            SimParams {
                drive_k_s: 0.73394,
                drive_k_v: 2.4068,
                steer_k_s: 0.0,
                steer_k_v: 0.75,
            },
        ).unwrap();

        DriveCtrl::new(params, sim.module_ios(), sim.gyro()).unwrap()
    }

    #[test]
    fn test_drive_tc() {
        let mut ds = DataStore::default();
        let mut ctrl = drive();

        let tc = Tc::Drive { vx_ms: 1.0, vy_ms: 0.5, rate_rads: 0.0, field_relative: true };
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Ok);

        let intent = ds.drive_input.intent.unwrap();
        assert_eq!(intent.velocity, ChassisVelocity::new(1.0, 0.5, 0.0));
        assert!(intent.field_relative);

        let tc = Tc::Drive {
            vx_ms: std::f64::NAN,
            vy_ms: 0.0,
            rate_rads: 0.0,
            field_relative: false
        };
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Invalid);

        // The previous intent is left in place
        assert_eq!(ds.drive_input.intent, Some(intent));
    }

    #[test]
    fn test_joystick_tc() {
        let mut ds = DataStore::default();
        let mut ctrl = drive();

        let tc = Tc::Joystick(JoystickAxes {
            left_x: 0.0,
            left_y: -1.0,
            right_x: 0.0,
            robot_relative: true,
        });
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Ok);

        let intent = ds.drive_input.intent.unwrap();
        assert!(intent.velocity.vx_ms > 0.0);
        assert!(!intent.field_relative);
    }

    #[test]
    fn test_safe_mode_tcs() {
        let mut ds = DataStore::default();
        let mut ctrl = drive();

        assert_eq!(exec(&mut ds, &mut ctrl, &Tc::MakeSafe), TcResponse::Ok);
        assert!(ds.safe);
        assert_eq!(exec(&mut ds, &mut ctrl, &Tc::MakeUnsafe), TcResponse::Ok);
        assert!(!ds.safe);

        // Safe mode entered for another reason cannot be left by TC
        ds.make_safe(SafeModeCause::CycleOverruns);
        assert_eq!(exec(&mut ds, &mut ctrl, &Tc::MakeUnsafe), TcResponse::CannotExecute);
        assert!(ds.safe);
    }

    #[test]
    fn test_estimator_tcs() {
        let mut ds = DataStore::default();
        let mut ctrl = drive();

        let tc = Tc::ResetOdometryAndRotation { x_m: 2.0, y_m: 3.0, heading_rad: 0.5 };
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Ok);
        assert_eq!(ctrl.pose(), Pose::new(2.0, 3.0, 0.5));

        let tc = Tc::ResetOdometry { x_m: 1.0, y_m: -1.0 };
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Ok);
        assert_eq!(ctrl.pose(), Pose::new(1.0, -1.0, 0.5));

        assert_eq!(exec(&mut ds, &mut ctrl, &Tc::ZeroHeading), TcResponse::Ok);
        assert_eq!(ctrl.heading(), 0.0);

        let tc = Tc::ResetOdometry { x_m: std::f64::INFINITY, y_m: 0.0 };
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Invalid);
        assert_eq!(ctrl.pose(), Pose::new(1.0, -1.0, 0.0));

        let tc = Tc::SetVisionConfidence { x_m: -1.0, y_m: 0.5, heading_rad: 0.5 };
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Invalid);

        let tc = Tc::SetVisionConfidence { x_m: 0.5, y_m: 0.5, heading_rad: 0.5 };
        assert_eq!(exec(&mut ds, &mut ctrl, &tc), TcResponse::Ok);
    }
}
