//! Main robot-side drive executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Step the simulated drivetrain to the cycle time
//!         - Telecommand processing and handling
//!         - Vision frame acquisition
//!         - Drive control processing:
//!             - Module and gyro sensing
//!             - Kinematics and module control
//!             - Odometry and vision fusion
//!         - Archiving
//!
//! # Modules
//!
//! All modules (e.g. `drive_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::{net::NetParams, tc::TcResponse};
use drive_lib::{
    data_store::{DataStore, SafeModeCause},
    drive_ctrl::{self, DriveCtrl},
    params::DriveExecParams,
    swerve::sim::SimDrivetrain,
    tc_client::{TcClient, TcClientError},
    vision::VisionClient,
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info, warn};
use std::thread;
use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::WrapErr};

// Internal
use util::{
    host,
    module::State,
    logger::{logger_init, LevelFilter},
    session::Session,
    archive::Archived
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "drive_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Swerve Drive Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: DriveExecParams = util::params::load(
        "exec.toml"
    ).wrap_err("Could not load exec params")?;

    let net_params: NetParams = util::params::load(
        "net.toml"
    ).wrap_err("Could not load net params")?;

    let drive_params: drive_ctrl::Params = util::params::load(
        "drive.toml"
    ).wrap_err("Could not load drive params")?;

    info!("Exec parameters loaded");

    let cycle_frequency_hz = 1.0 / exec_params.cycle_period_s;

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    let sim = SimDrivetrain::new(&drive_params.swerve, exec_params.sim.clone())
        .wrap_err("Failed to initialise the simulated drivetrain")?;
    sim.set_true_pose(drive_params.initial_pose);
    info!("Simulated drivetrain initialised at {:?}", drive_params.initial_pose);

    let use_vision = exec_params.use_vision && drive_params.vision.enabled;

    let mut drive_ctrl = DriveCtrl::init(
        drive_ctrl::InitData {
            params: drive_params,
            modules: sim.module_ios(),
            gyro: sim.gyro(),
        },
        &session
    ).wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let tc_client = TcClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the TcClient")?;
    info!("TcClient initialised");

    let vision_client = match use_vision {
        true => {
            let c = VisionClient::new(&zmq_ctx, &net_params)
                .wrap_err("Failed to initialise the VisionClient")?;
            info!("VisionClient initialised");
            Some(c)
        },
        false => {
            info!("Vision disabled, VisionClient not started");
            None
        }
    };

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz);

        // ---- DATA INPUT ----

        sim.step_to(ds.time_s);

        // ---- TELECOMMAND PROCESSING ----

        // If the client is connected remove any safe mode, otherwise make safe
        if tc_client.is_connected() {
            ds.make_unsafe(SafeModeCause::TcClientNotConnected).ok();
        }
        else {
            ds.make_safe(SafeModeCause::TcClientNotConnected);
        }

        // Get commands until none remain
        loop {
            match tc_client.recieve_tc() {
                Ok(Some(tc)) => {
                    // In safe mode drive commands are refused with the cannot execute response
                    let response = match ds.safe && !tc.allowed_in_safe() {
                        true => TcResponse::CannotExecute,
                        false => tc_processor::exec(&mut ds, &mut drive_ctrl, &tc)
                    };

                    // Print warning if couldn't send the response
                    if let Err(e) = tc_client.send_response(response) {
                        warn!("Could not respond to TC: {}", e);
                    }
                },
                Ok(None) => {
                    break
                },
                // If not connected go into safe mode
                Err(TcClientError::NotConnected) => {
                    if !ds.safe {
                        error!("Connection to TcServer lost");
                    }

                    ds.make_safe(SafeModeCause::TcClientNotConnected);
                    break;
                },
                Err(TcClientError::TcParseError(e)) => {
                    warn!("Could not parse recieved TC: {}", e);
                    break;
                },
                Err(TcClientError::NonUtf8Response) => {
                    warn!("Recieved a TC which was not valid UTF-8");
                    break;
                },
                Err(e) => return Err(e)
                    .wrap_err("An error occured while receiving TCs from the server")
            }
        }

        // A TC may have changed the safe state
        ds.drive_input.safe = ds.safe;

        // ---- VISION ----

        ds.drive_input.vision_frame = vision_client
            .as_ref()
            .and_then(|c| c.latest_frame());

        // ---- CONTROL ALGORITHM PROCESSING ----

        match drive_ctrl.proc(&ds.drive_input) {
            Ok((o, r)) => {
                ds.drive_output = Some(o);
                ds.drive_status_rpt = r;
            },
            Err(e) => {
                // Only an invalid intent can fail here, the old intent is not resumed
                warn!("Error during DriveCtrl processing: {}", e);
                drive_ctrl.stop();
            }
        };

        // ---- WRITE ARCHIVES ----

        if let Err(e) = drive_ctrl.write() {
            warn!("Could not write DriveCtrl archives: {}", e);
        }

        // ---- TELEMETRY ----

        if ds.is_1_hz_cycle {
            if let Some(ref o) = ds.drive_output {
                info!(
                    "Pose: ({:.3} m, {:.3} m, {:.3} rad), true pose {:?}, vision {:?}",
                    o.pose.x_m,
                    o.pose.y_m,
                    o.pose.heading_rad,
                    sim.true_pose(),
                    ds.drive_status_rpt.vision
                );
            }

            if ds.drive_status_rpt.degraded() {
                warn!(
                    "Drive degraded: gyro stale: {}, encoders stale: {:?}",
                    ds.drive_status_rpt.gyro_stale,
                    ds.drive_status_rpt.encoder_stale()
                );
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(exec_params.cycle_period_s)
            .checked_sub(cycle_dur)
        {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                ds.make_unsafe(SafeModeCause::CycleOverruns).ok();
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - exec_params.cycle_period_s
                );
                ds.num_consec_cycle_overruns += 1;

                if ds.num_consec_cycle_overruns > exec_params.max_consec_cycle_overruns {
                    if !ds.safe {
                        error!(
                            "More than {} consecutive cycle overruns",
                            exec_params.max_consec_cycle_overruns
                        );
                    }
                    ds.make_safe(SafeModeCause::CycleOverruns);
                }
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }
}
