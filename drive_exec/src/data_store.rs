//! # Data Store

use log::{info, warn};

use crate::drive_ctrl;

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Gives the reason the robot has been put into safe mode
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SafeModeCause {
    MakeSafeTc,
    TcClientNotConnected,
    CycleOverruns,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Session elapsed time at the start of the cycle
    pub time_s: f64,

    // Safe mode variables
    /// Determines if the robot is in safe mode.
    pub safe: bool,

    /// Gives the reason for the robot being in safe mode.
    pub safe_cause: Option<SafeModeCause>,

    // DriveCtrl
    pub drive_input: drive_ctrl::InputData,
    pub drive_output: Option<drive_ctrl::OutputData>,
    pub drive_status_rpt: drive_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Puts the robot into safe mode with the given cause.
    ///
    /// The drive is stopped by DriveCtrl on its next cycle.
    pub fn make_safe(&mut self, cause: SafeModeCause) {
        if !self.safe {
            warn!("Make safe requested, cause: {:?}", cause);
            self.safe = true;
            self.safe_cause = Some(cause);
        }
    }

    /// Attempts to disable the safe mode by clearing the given cause.
    ///
    /// Returns `Ok(())` if this cause was cleared and safe mode was disabled, or `Err(())`
    /// otherwise. To remove safe mode the provided cause must match the initial reason for safe
    /// mode being enabled.
    ///
    /// If safe mode was not enabled `Ok(())` is returned
    pub fn make_unsafe(&mut self, cause: SafeModeCause) -> Result<(), ()> {
        if !self.safe {
            return Ok(());
        }

        match self.safe_cause {
            Some(root_cause) => {
                if cause == root_cause {
                    self.safe = false;
                    self.safe_cause = None;
                    info!("Make unsafe requested, root cause match, safe mode disabled");
                    Ok(())
                } else {
                    Err(())
                }
            }
            None => Ok(()),
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        let cycles_per_s = (cycle_frequency_hz as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.time_s = util::session::get_elapsed_seconds();

        self.drive_input = drive_ctrl::InputData {
            time_s: self.time_s,
            safe: self.safe,
            ..Default::default()
        };
        self.drive_output = None;
        self.drive_status_rpt = drive_ctrl::StatusReport::default();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_safe_mode_root_cause() {
        let mut ds = DataStore::default();

        ds.make_safe(SafeModeCause::TcClientNotConnected);
        assert!(ds.safe);

        // A second cause does not replace the root cause
        ds.make_safe(SafeModeCause::MakeSafeTc);
        assert_eq!(ds.safe_cause, Some(SafeModeCause::TcClientNotConnected));

        assert!(ds.make_unsafe(SafeModeCause::MakeSafeTc).is_err());
        assert!(ds.safe);

        assert!(ds.make_unsafe(SafeModeCause::TcClientNotConnected).is_ok());
        assert!(!ds.safe);
        assert_eq!(ds.safe_cause, None);
    }

    #[test]
    fn test_make_unsafe_when_not_safe() {
        let mut ds = DataStore::default();
        assert!(ds.make_unsafe(SafeModeCause::CycleOverruns).is_ok());
        assert!(!ds.safe);
    }

    #[test]
    fn test_cycle_start() {
        let mut ds = DataStore::default();
        ds.safe = true;
        ds.drive_input.intent = Some(Default::default());

        ds.cycle_start(50.0);
        assert!(ds.is_1_hz_cycle);
        assert!(ds.drive_input.safe);
        assert!(ds.drive_input.intent.is_none());

        ds.num_cycles = 1;
        ds.cycle_start(50.0);
        assert!(!ds.is_1_hz_cycle);

        ds.num_cycles = 50;
        ds.cycle_start(50.0);
        assert!(ds.is_1_hz_cycle);
    }
}
