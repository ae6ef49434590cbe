//! Swerve drive kinematics
//!
//! The rigid body relation between the chassis velocity and the velocity of a module at position
//! `(x, y)` is
//!
//! ```text
//! | v_mod_x |   | 1  0  -y |   | vx |
//! | v_mod_y | = | 0  1   x | * | vy |
//!                              | w  |
//! ```
//!
//! Stacking this for all modules gives an 8x3 matrix `A`. Forward kinematics (chassis to module)
//! applies `A` directly, inverse kinematics (modules to chassis) applies the least squares
//! pseudo-inverse `(A^T A)^-1 A^T`, computed once at construction.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{Matrix3, SMatrix, SVector, Vector2, Vector3};

// Internal
use super::{
    ChassisVelocity, ModulePosition, ModuleState, ModuleTarget, NUM_MODULES,
};
use crate::pose_est::Twist;
use util::maths::{continuous_setpoint, wrap_to_pi};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Smallest determinant of `A^T A` considered invertible.
const MIN_NORMAL_DETERMINANT: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Swerve drive kinematics for four modules.
#[derive(Debug, Clone)]
pub struct SwerveKinematics {
    /// Position of each module relative to the chassis centre.
    ///
    /// Units: meters
    positions_m: [Vector2<f64>; NUM_MODULES],

    /// Rigid body matrix mapping chassis velocity to module velocities.
    forward: SMatrix<f64, 8, 3>,

    /// Least squares inverse of `forward`.
    inverse: SMatrix<f64, 3, 8>,

    /// Last commanded angle of each module, held when a zero velocity is commanded.
    last_angles_rad: [f64; NUM_MODULES],
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur when building the kinematics.
#[derive(Debug, thiserror::Error)]
pub enum KinematicsError {
    #[error("Invalid {name} ({value}), expected a finite positive value")]
    InvalidDimension { name: &'static str, value: f64 },

    #[error("Module positions must be finite, found {0:?}")]
    NonFinitePosition([f64; 2]),

    #[error("The module geometry is singular, the chassis velocity cannot be recovered")]
    SingularGeometry,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveKinematics {
    /// Build the kinematics for a rectangular chassis.
    ///
    /// `track_width_m` is the distance between the left and right wheels, `wheel_base_m` the
    /// distance between the front and rear wheels.
    pub fn new(track_width_m: f64, wheel_base_m: f64) -> Result<Self, KinematicsError> {
        check_dimension("track width", track_width_m)?;
        check_dimension("wheel base", wheel_base_m)?;

        let hx = wheel_base_m / 2.0;
        let hy = track_width_m / 2.0;

        Self::from_positions([[hx, hy], [hx, -hy], [-hx, hy], [-hx, -hy]])
    }

    /// Build the kinematics from arbitrary module positions, given as `[x, y]` in meters.
    pub fn from_positions(
        positions_m: [[f64; 2]; NUM_MODULES],
    ) -> Result<Self, KinematicsError> {
        let mut forward = SMatrix::<f64, 8, 3>::zeros();
        let mut positions = [Vector2::zeros(); NUM_MODULES];

        for (i, p) in positions_m.iter().enumerate() {
            if !p[0].is_finite() || !p[1].is_finite() {
                return Err(KinematicsError::NonFinitePosition(*p));
            }

            positions[i] = Vector2::new(p[0], p[1]);

            forward[(2 * i, 0)] = 1.0;
            forward[(2 * i, 2)] = -p[1];
            forward[(2 * i + 1, 1)] = 1.0;
            forward[(2 * i + 1, 2)] = p[0];
        }

        let transpose = forward.transpose();
        let normal: Matrix3<f64> = transpose * forward;

        if normal.determinant().abs() < MIN_NORMAL_DETERMINANT {
            return Err(KinematicsError::SingularGeometry);
        }

        let inverse = match normal.try_inverse() {
            Some(n) => n * transpose,
            None => return Err(KinematicsError::SingularGeometry),
        };

        Ok(Self {
            positions_m: positions,
            forward,
            inverse,
            last_angles_rad: [0.0; NUM_MODULES],
        })
    }

    /// Get the position of each module relative to the chassis centre.
    pub fn module_positions_m(&self) -> &[Vector2<f64>; NUM_MODULES] {
        &self.positions_m
    }

    /// Calculate the target of each module for the given chassis velocity.
    ///
    /// The returned angles are in the range [-pi, pi). If the velocity is exactly zero every
    /// module keeps the angle it was last commanded to with zero speed, so the wheels do not snap
    /// back to straight ahead when the driver lets go of the sticks.
    pub fn forward(&mut self, velocity: &ChassisVelocity) -> [ModuleTarget; NUM_MODULES] {
        let mut targets = [ModuleTarget::default(); NUM_MODULES];

        if velocity.is_zero() {
            for (t, a) in targets.iter_mut().zip(self.last_angles_rad.iter()) {
                *t = ModuleTarget::new(0.0, *a);
            }
            return targets;
        }

        let chassis = Vector3::new(velocity.vx_ms, velocity.vy_ms, velocity.rate_rads);
        let modules: SVector<f64, 8> = self.forward * chassis;

        for i in 0..NUM_MODULES {
            let vx = modules[2 * i];
            let vy = modules[2 * i + 1];
            let speed_ms = vx.hypot(vy);

            // A module on the centre of rotation has no defined direction, so it holds its angle
            let angle_rad = if speed_ms > 0.0 {
                vy.atan2(vx)
            } else {
                self.last_angles_rad[i]
            };

            targets[i] = ModuleTarget::new(speed_ms, wrap_to_pi(angle_rad));
            self.last_angles_rad[i] = targets[i].angle_rad;
        }

        trace!("Kinematics forward {:?} -> {:?}", velocity, targets);

        targets
    }

    /// Calculate the displacement of the chassis from the change in module positions.
    ///
    /// Each module contributes a displacement vector of the distance it travelled along its
    /// current angle. The result is the least squares rigid body motion explaining those vectors.
    pub fn inverse_displacement(
        &self,
        start: &[ModulePosition; NUM_MODULES],
        end: &[ModulePosition; NUM_MODULES],
    ) -> Twist {
        let mut modules = SVector::<f64, 8>::zeros();

        for i in 0..NUM_MODULES {
            let delta_m = end[i].distance_m - start[i].distance_m;
            let (sin, cos) = end[i].angle_rad.sin_cos();

            modules[2 * i] = delta_m * cos;
            modules[2 * i + 1] = delta_m * sin;
        }

        let chassis = self.inverse * modules;

        Twist::new(chassis[0], chassis[1], chassis[2])
    }

    /// Calculate the chassis velocity from the measured module states.
    pub fn inverse_velocity(&self, states: &[ModuleState; NUM_MODULES]) -> ChassisVelocity {
        let mut modules = SVector::<f64, 8>::zeros();

        for (i, s) in states.iter().enumerate() {
            let (sin, cos) = s.angle_rad.sin_cos();

            modules[2 * i] = s.speed_ms * cos;
            modules[2 * i + 1] = s.speed_ms * sin;
        }

        let chassis = self.inverse * modules;

        ChassisVelocity::new(chassis[0], chassis[1], chassis[2])
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Scale down all module speeds so that none exceeds `max_speed_ms`.
///
/// All speeds are scaled by the same factor so the direction of travel and the ratio between
/// translation and rotation are preserved. Returns true if the speeds were scaled.
pub fn desaturate(targets: &mut [ModuleTarget; NUM_MODULES], max_speed_ms: f64) -> bool {
    let highest_ms = targets
        .iter()
        .fold(0f64, |acc, t| acc.max(t.speed_ms.abs()));

    if highest_ms <= max_speed_ms || highest_ms <= 0.0 {
        return false;
    }

    let scale = max_speed_ms / highest_ms;
    for t in targets.iter_mut() {
        t.speed_ms *= scale;
    }

    true
}

/// Optimise a target against the measured angle of the module.
///
/// If reaching the target angle would need more than a quarter turn the module instead points
/// the opposite way and reverses its speed. The returned angle is expressed continuously relative
/// to `measured_angle_rad`, so it is never more than a quarter turn away from it. Applying this
/// function to its own output returns the same target.
pub fn optimise(target: &ModuleTarget, measured_angle_rad: f64) -> ModuleTarget {
    let angle_rad = continuous_setpoint(measured_angle_rad, target.angle_rad);

    if (angle_rad - measured_angle_rad).abs() > std::f64::consts::FRAC_PI_2 {
        ModuleTarget::new(
            -target.speed_ms,
            continuous_setpoint(measured_angle_rad, target.angle_rad + std::f64::consts::PI),
        )
    } else {
        ModuleTarget::new(target.speed_ms, angle_rad)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_dimension(name: &'static str, value: f64) -> Result<(), KinematicsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(KinematicsError::InvalidDimension { name, value })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const TRACK_WIDTH_M: f64 = 0.6223;

    fn kinematics() -> SwerveKinematics {
        SwerveKinematics::new(TRACK_WIDTH_M, TRACK_WIDTH_M).unwrap()
    }

    fn positions(distance_m: [f64; 4], angle_rad: [f64; 4]) -> [ModulePosition; 4] {
        let mut p = [ModulePosition::default(); 4];
        for i in 0..4 {
            p[i] = ModulePosition { distance_m: distance_m[i], angle_rad: angle_rad[i] };
        }
        p
    }

    #[test]
    fn test_geometry_order() {
        let k = kinematics();
        let h = TRACK_WIDTH_M / 2.0;
        let p = k.module_positions_m();

        assert_eq!((p[0].x, p[0].y), (h, h));
        assert_eq!((p[1].x, p[1].y), (h, -h));
        assert_eq!((p[2].x, p[2].y), (-h, h));
        assert_eq!((p[3].x, p[3].y), (-h, -h));
    }

    #[test]
    fn test_degenerate_geometry() {
        assert!(SwerveKinematics::new(0.0, 0.5).is_err());
        assert!(SwerveKinematics::new(0.5, std::f64::NAN).is_err());
        assert!(SwerveKinematics::new(-1.0, 0.5).is_err());
        assert!(matches!(
            SwerveKinematics::from_positions([[0.0, 0.0]; 4]),
            Err(KinematicsError::SingularGeometry)
        ));
    }

    #[test]
    fn test_forward_straight() {
        let mut k = kinematics();
        let targets = k.forward(&ChassisVelocity::new(2.0, 0.0, 0.0));

        for t in targets.iter() {
            assert!((t.speed_ms - 2.0).abs() < 1e-12);
            assert!(t.angle_rad.abs() < 1e-12);
        }

        let targets = k.forward(&ChassisVelocity::new(0.0, 1.0, 0.0));
        for t in targets.iter() {
            assert!((t.angle_rad - FRAC_PI_2).abs() < 1e-12);
        }
    }

    #[test]
    fn test_forward_rotation() {
        let mut k = kinematics();
        let targets = k.forward(&ChassisVelocity::new(0.0, 0.0, 1.0));
        let radius_m = (2.0f64).sqrt() * TRACK_WIDTH_M / 2.0;

        // Every module is tangent to the circle through the module positions
        let expected = [3.0 * FRAC_PI_4, FRAC_PI_4, -3.0 * FRAC_PI_4, -FRAC_PI_4];
        for (t, e) in targets.iter().zip(expected.iter()) {
            assert!((t.speed_ms - radius_m).abs() < 1e-12);
            assert!(wrap_to_pi(t.angle_rad - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_command_holds_angles() {
        let mut k = kinematics();

        // Before any command the modules hold straight ahead
        let targets = k.forward(&ChassisVelocity::default());
        for t in targets.iter() {
            assert_eq!(*t, ModuleTarget::new(0.0, 0.0));
        }

        let moving = k.forward(&ChassisVelocity::new(0.5, 0.5, 0.2));
        let stopped = k.forward(&ChassisVelocity::default());

        for (m, s) in moving.iter().zip(stopped.iter()) {
            assert_eq!(s.speed_ms, 0.0);
            assert_eq!(s.angle_rad, m.angle_rad);
        }

        // Symmetric in every module
        let stopped_again = k.forward(&ChassisVelocity::default());
        assert_eq!(stopped, stopped_again);
    }

    #[test]
    fn test_desaturate() {
        let mut targets = [
            ModuleTarget::new(6.0, 0.0),
            ModuleTarget::new(-3.0, 0.0),
            ModuleTarget::new(2.0, 1.0),
            ModuleTarget::new(0.0, 2.0),
        ];

        assert!(desaturate(&mut targets, 4.0));
        assert!((targets[0].speed_ms - 4.0).abs() < 1e-12);
        assert!((targets[1].speed_ms + 2.0).abs() < 1e-12);
        assert!((targets[2].speed_ms - 4.0 / 3.0).abs() < 1e-12);
        assert_eq!(targets[3].speed_ms, 0.0);
        assert_eq!(targets[2].angle_rad, 1.0);

        assert!(!desaturate(&mut targets, 4.0));
    }

    #[test]
    fn test_optimise() {
        // Small turns are left alone
        let t = optimise(&ModuleTarget::new(1.0, 0.5), 0.0);
        assert_eq!(t.speed_ms, 1.0);
        assert!((t.angle_rad - 0.5).abs() < 1e-12);

        // Reversing is preferred over a large turn
        let t = optimise(&ModuleTarget::new(1.0, PI - 0.1), 0.0);
        assert_eq!(t.speed_ms, -1.0);
        assert!((t.angle_rad + 0.1).abs() < 1e-12);

        // Expressed relative to a wound up measurement
        let t = optimise(&ModuleTarget::new(1.0, 0.1), 6.0 * PI + 0.05);
        assert!((t.angle_rad - (6.0 * PI + 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_optimise_idempotent() {
        let mut measured = -9.0f64;
        while measured < 9.0 {
            let mut angle = -4.0f64;
            while angle < 4.0 {
                let once = optimise(&ModuleTarget::new(1.5, angle), measured);
                let twice = optimise(&once, measured);

                assert_eq!(once.speed_ms, twice.speed_ms);
                assert!((once.angle_rad - twice.angle_rad).abs() < 1e-9);
                assert!((once.angle_rad - measured).abs() <= FRAC_PI_2 + 1e-9);

                angle += 0.29;
            }
            measured += 0.83;
        }
    }

    #[test]
    fn test_inverse_zero_motion() {
        let k = kinematics();
        let p = positions([1.0, 2.0, 3.0, 4.0], [0.1, 0.2, 0.3, 0.4]);
        let twist = k.inverse_displacement(&p, &p);

        assert_eq!(twist, Twist::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_forward_inverse_consistency() {
        let mut k = kinematics();
        let velocities = [
            ChassisVelocity::new(1.0, 0.0, 0.0),
            ChassisVelocity::new(-0.5, 1.2, 0.0),
            ChassisVelocity::new(0.0, 0.0, -2.0),
            ChassisVelocity::new(1.3, -0.7, 0.9),
        ];

        for v in velocities.iter() {
            let targets = k.forward(v);
            let dt_s = 0.02;

            let start = positions([0.0; 4], [0.0; 4]);
            let mut end = start;
            for i in 0..4 {
                end[i].distance_m = targets[i].speed_ms * dt_s;
                end[i].angle_rad = targets[i].angle_rad;
            }

            let twist = k.inverse_displacement(&start, &end);
            assert!((twist.dx_m - v.vx_ms * dt_s).abs() < 1e-9);
            assert!((twist.dy_m - v.vy_ms * dt_s).abs() < 1e-9);
            assert!((twist.dheading_rad - v.rate_rads * dt_s).abs() < 1e-9);

            let mut states = [ModuleState::default(); 4];
            for i in 0..4 {
                states[i] = ModuleState {
                    speed_ms: targets[i].speed_ms,
                    angle_rad: targets[i].angle_rad,
                };
            }
            let vel = k.inverse_velocity(&states);
            assert!((vel.vx_ms - v.vx_ms).abs() < 1e-9);
            assert!((vel.vy_ms - v.vy_ms).abs() < 1e-9);
            assert!((vel.rate_rads - v.rate_rads).abs() < 1e-9);
        }
    }
}
