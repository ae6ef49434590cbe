//! # Drive Executable Parameters
//!
//! This module provide parameters for the drive executable itself, loaded from `exec.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::swerve::sim::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DriveExecParams {

    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of consecutive cycle overruns after which the robot is made safe.
    pub max_consec_cycle_overruns: u64,

    /// If false frames from the vision coprocessor are not subscribed to.
    #[serde(default = "default_true")]
    pub use_vision: bool,

    /// Actuator model of the simulated drivetrain.
    pub sim: SimParams,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        let params: DriveExecParams = util::params::from_str(r#"
            cycle_period_s = 0.02
            max_consec_cycle_overruns = 50

            [sim]
            drive_k_s = 0.73394
            drive_k_v = 2.4068
            steer_k_s = 0.0
            steer_k_v = 0.75
        "#).unwrap();

        assert_eq!(params.cycle_period_s, 0.02);
        assert_eq!(params.max_consec_cycle_overruns, 50);
        assert!(params.use_vision);
    }
}
