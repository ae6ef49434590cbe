//! # Module control laws
//!
//! The steer axis tracks a trapezoidal motion profile towards the target angle, with a
//! proportional correction on the measured angle and a static plus velocity feedforward on the
//! profiled velocity. The drive axis is feedforward on the target speed with a proportional
//! correction on the measured speed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use super::{DriveGains, SteerGains};
use util::maths::sign_or_zero;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A point on a motion profile.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct ProfileState {
    /// Units: radians
    pub pos: f64,

    /// Units: radians/second
    pub vel: f64,
}

/// A trapezoidal motion profile, stepped once per cycle.
///
/// The profile accelerates towards the goal at no more than `max_accel`, cruises at no more than
/// `max_vel` and decelerates so that it arrives at the goal at rest.
#[derive(Debug, Clone)]
pub struct TrapezoidProfile {
    max_vel: f64,
    max_accel: f64,
    setpoint: Option<ProfileState>,
}

/// Steer axis controller.
#[derive(Debug, Clone)]
pub struct SteerController {
    gains: SteerGains,
    profile: TrapezoidProfile,
}

/// Drive axis controller.
#[derive(Debug, Clone)]
pub struct DriveController {
    gains: DriveGains,
    prev_target_ms: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrapezoidProfile {
    pub fn new(max_vel: f64, max_accel: f64) -> Self {
        Self {
            max_vel: max_vel.abs(),
            max_accel: max_accel.abs(),
            setpoint: None,
        }
    }

    /// Restart the profile from the given state.
    pub fn reset(&mut self, state: ProfileState) {
        self.setpoint = Some(state);
    }

    /// Advance the profile by `dt_s` towards `goal`, arriving at rest.
    ///
    /// If the profile has not been stepped before it starts at rest at `current`. The full profile
    /// from the previous setpoint to the goal is solved each step and sampled at `dt_s`, so the
    /// setpoint never moves past the goal.
    pub fn step(&mut self, goal: f64, current: f64, dt_s: f64) -> ProfileState {
        let prev = match self.setpoint {
            Some(s) => s,
            None => ProfileState { pos: current, vel: 0.0 },
        };

        if !(dt_s > 0.0) {
            self.setpoint = Some(prev);
            return prev;
        }

        let next = if self.max_vel > 0.0 && self.max_accel > 0.0 {
            self.sample(prev, goal, dt_s)
        } else {
            ProfileState { pos: goal, vel: 0.0 }
        };

        self.setpoint = Some(next);
        next
    }

    /// Sample the profile from `start` to `goal` at time `t_s`.
    fn sample(&self, start: ProfileState, goal: f64, t_s: f64) -> ProfileState {
        // Solve in the direction of travel so the goal is always ahead
        let dir = if start.pos > goal { -1.0 } else { 1.0 };
        let pos = start.pos * dir;
        let vel = (start.vel * dir).min(self.max_vel);
        let goal = goal * dir;

        // Time and distance the profile would have taken to reach the starting velocity from rest
        let cutoff_time = vel / self.max_accel;
        let cutoff_dist = cutoff_time * cutoff_time * self.max_accel / 2.0;

        let full_trapezoid_dist = cutoff_dist + (goal - pos);
        let mut accel_time = self.max_vel / self.max_accel;
        let mut full_speed_dist = full_trapezoid_dist - accel_time * accel_time * self.max_accel;

        // Triangular profile, max velocity never reached
        if full_speed_dist < 0.0 {
            accel_time = (full_trapezoid_dist / self.max_accel).sqrt();
            full_speed_dist = 0.0;
        }

        let end_accel = accel_time - cutoff_time;
        let end_full_speed = end_accel + full_speed_dist / self.max_vel;
        let end_decel = end_full_speed + accel_time;

        let (p, v) = if t_s < end_accel {
            (
                pos + (vel + t_s * self.max_accel / 2.0) * t_s,
                vel + t_s * self.max_accel,
            )
        } else if t_s < end_full_speed {
            (
                pos + (vel + end_accel * self.max_accel / 2.0) * end_accel
                    + self.max_vel * (t_s - end_accel),
                self.max_vel,
            )
        } else if t_s <= end_decel {
            let time_left = end_decel - t_s;
            (
                goal - (time_left * self.max_accel / 2.0) * time_left,
                time_left * self.max_accel,
            )
        } else {
            (goal, 0.0)
        };

        ProfileState { pos: p * dir, vel: v * dir }
    }
}

impl SteerController {
    pub fn new(gains: SteerGains) -> Self {
        Self {
            profile: TrapezoidProfile::new(gains.max_rate_rads, gains.max_accel_radss),
            gains,
        }
    }

    /// Calculate the steer voltage needed to move from `measured_rad` towards `goal_rad`.
    ///
    /// Both angles must be continuous and within half a turn of each other.
    pub fn calculate(&mut self, goal_rad: f64, measured_rad: f64, dt_s: f64) -> f64 {
        let sp = self.profile.step(goal_rad, measured_rad, dt_s);

        self.gains.k_p * (sp.pos - measured_rad)
            + self.gains.k_s * sign_or_zero(sp.vel)
            + self.gains.k_v * sp.vel
    }

    /// Restart the profile at rest on the measured angle.
    pub fn reset(&mut self, measured_rad: f64) {
        self.profile.reset(ProfileState { pos: measured_rad, vel: 0.0 });
    }
}

impl DriveController {
    pub fn new(gains: DriveGains) -> Self {
        Self {
            gains,
            prev_target_ms: None,
        }
    }

    /// Calculate the drive voltage for the target speed.
    pub fn calculate(&mut self, target_ms: f64, measured_ms: f64, dt_s: f64) -> f64 {
        let accel_mss = match self.prev_target_ms {
            Some(prev) if dt_s > 0.0 => (target_ms - prev) / dt_s,
            _ => 0.0,
        };
        self.prev_target_ms = Some(target_ms);

        self.gains.k_s * sign_or_zero(target_ms)
            + self.gains.k_v * target_ms
            + self.gains.k_a * accel_mss
            + self.gains.k_p * (target_ms - measured_ms)
    }

    /// Forget the previous target, so the next call has no acceleration term.
    pub fn reset(&mut self) {
        self.prev_target_ms = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_profile_limits() {
        let max_vel = 3.0 * std::f64::consts::PI;
        let max_accel = 6.0 * std::f64::consts::PI;
        let dt_s = 0.02;

        let mut profile = TrapezoidProfile::new(max_vel, max_accel);
        let mut prev = ProfileState::default();
        let goal = 3.0;

        for _ in 0..500 {
            let s = profile.step(goal, 0.0, dt_s);

            assert!(s.vel.abs() <= max_vel + 1e-9);
            assert!((s.vel - prev.vel).abs() <= max_accel * dt_s + 1e-9);

            // Never moves past the goal
            assert!(s.pos <= goal + 1e-9);

            prev = s;
        }

        assert_eq!(prev, ProfileState { pos: goal, vel: 0.0 });
    }

    #[test]
    fn test_profile_reaches_negative_goal() {
        let mut profile = TrapezoidProfile::new(2.0, 4.0);
        let mut s = ProfileState::default();
        for _ in 0..500 {
            s = profile.step(-1.0, 0.0, 0.02);
        }
        assert_eq!(s, ProfileState { pos: -1.0, vel: 0.0 });
    }

    #[test]
    fn test_steer_at_goal_is_zero() {
        let mut ctrl = SteerController::new(SteerGains {
            k_p: 8.1,
            k_s: 0.77,
            k_v: 0.75,
            max_rate_rads: 3.0 * std::f64::consts::PI,
            max_accel_radss: 6.0 * std::f64::consts::PI,
        });

        assert_eq!(ctrl.calculate(1.0, 1.0, 0.02), 0.0);

        // Moving towards the goal gives a positive voltage
        assert!(ctrl.calculate(2.0, 1.0, 0.02) > 0.0);
    }

    #[test]
    fn test_drive_feedforward() {
        let gains = DriveGains {
            k_s: 0.73394,
            k_v: 2.4068,
            k_a: 0.28749,
            k_p: 0.0,
        };
        let mut ctrl = DriveController::new(gains.clone());

        // No acceleration term on the first call
        let v = ctrl.calculate(1.0, 0.0, 0.02);
        assert!((v - (gains.k_s + gains.k_v)).abs() < 1e-12);

        // Steady state
        let v = ctrl.calculate(1.0, 1.0, 0.02);
        assert!((v - (gains.k_s + gains.k_v)).abs() < 1e-12);

        // Acceleration adds the kA term
        let v = ctrl.calculate(1.5, 1.0, 0.02);
        let expected = gains.k_s + gains.k_v * 1.5 + gains.k_a * 25.0;
        assert!((v - expected).abs() < 1e-9);

        // Zero target gives no static friction term
        ctrl.reset();
        assert_eq!(ctrl.calculate(0.0, 0.0, 0.02), 0.0);
    }
}
