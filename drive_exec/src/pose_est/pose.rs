//! Planar pose and twist

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use util::maths::wrap_to_pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Rotation below which the series expansions of exp and log are used.
const SMALL_ANGLE_RAD: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and heading) of the robot in the field frame.
///
/// The field frame has its origin at the corner of the field, x along the field length and y
/// along the field width.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Continuous heading, positive anticlockwise from the field x axis.
    ///
    /// Units: radians
    pub heading_rad: f64,
}

/// A rigid body displacement expressed in the body frame at the start of the motion.
///
/// The motion is a constant curvature arc: a twist of `(dx, 0, dtheta)` moves along an arc of
/// length `dx` while turning by `dtheta`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct Twist {
    /// Units: meters
    pub dx_m: f64,

    /// Units: meters
    pub dy_m: f64,

    /// Units: radians
    pub dheading_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self { x_m, y_m, heading_rad }
    }

    /// Returns true if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x_m.is_finite() && self.y_m.is_finite() && self.heading_rad.is_finite()
    }

    /// Apply a twist to this pose, giving the pose at the end of the motion.
    pub fn exp(&self, twist: &Twist) -> Pose {
        let dtheta = twist.dheading_rad;
        let (sin_theta, cos_theta) = dtheta.sin_cos();

        let (s, c) = if dtheta.abs() < SMALL_ANGLE_RAD {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        // Displacement in the body frame at the start of the motion
        let bx = twist.dx_m * s - twist.dy_m * c;
        let by = twist.dx_m * c + twist.dy_m * s;

        let (sin_h, cos_h) = self.heading_rad.sin_cos();

        Pose {
            x_m: self.x_m + bx * cos_h - by * sin_h,
            y_m: self.y_m + bx * sin_h + by * cos_h,
            heading_rad: self.heading_rad + dtheta,
        }
    }

    /// Find the twist that moves this pose onto `end`.
    ///
    /// The heading change is taken the short way round, in [-pi, pi).
    pub fn log(&self, end: &Pose) -> Twist {
        let (sin_h, cos_h) = self.heading_rad.sin_cos();
        let dx_field = end.x_m - self.x_m;
        let dy_field = end.y_m - self.y_m;

        // Displacement in this pose's body frame
        let bx = dx_field * cos_h + dy_field * sin_h;
        let by = -dx_field * sin_h + dy_field * cos_h;

        let dtheta = wrap_to_pi(end.heading_rad - self.heading_rad);
        let half_dtheta = 0.5 * dtheta;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan_half_theta = if cos_minus_one.abs() < SMALL_ANGLE_RAD {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        Twist {
            dx_m: bx * half_theta_by_tan_half_theta + by * half_dtheta,
            dy_m: -bx * half_dtheta + by * half_theta_by_tan_half_theta,
            dheading_rad: dtheta,
        }
    }
}

impl Twist {
    pub fn new(dx_m: f64, dy_m: f64, dheading_rad: f64) -> Self {
        Self { dx_m, dy_m, dheading_rad }
    }

    /// Scale each component of the twist.
    pub fn scaled(&self, gains: &[f64; 3]) -> Twist {
        Twist {
            dx_m: self.dx_m * gains[0],
            dy_m: self.dy_m * gains[1],
            dheading_rad: self.dheading_rad * gains[2],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_pose_eq(a: &Pose, b: &Pose) {
        assert!((a.x_m - b.x_m).abs() < 1e-9, "{:?} != {:?}", a, b);
        assert!((a.y_m - b.y_m).abs() < 1e-9, "{:?} != {:?}", a, b);
        assert!((a.heading_rad - b.heading_rad).abs() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_exp_straight() {
        let p = Pose::new(1.0, 2.0, FRAC_PI_2);
        let end = p.exp(&Twist::new(1.0, 0.0, 0.0));
        assert_pose_eq(&end, &Pose::new(1.0, 3.0, FRAC_PI_2));
    }

    #[test]
    fn test_exp_arc() {
        // Quarter circle of radius 1 to the left
        let end = Pose::default().exp(&Twist::new(FRAC_PI_2, 0.0, FRAC_PI_2));
        assert_pose_eq(&end, &Pose::new(1.0, 1.0, FRAC_PI_2));

        // Turn on the spot
        let end = Pose::new(3.0, 4.0, 0.0).exp(&Twist::new(0.0, 0.0, -PI));
        assert_pose_eq(&end, &Pose::new(3.0, 4.0, -PI));
    }

    #[test]
    fn test_log_inverts_exp() {
        let starts = [Pose::new(0.0, 0.0, 0.0), Pose::new(2.0, -1.0, 2.5), Pose::new(-3.0, 1.0, -7.0)];
        let twists = [
            Twist::new(0.3, 0.0, 0.0),
            Twist::new(1.0, -0.5, 0.8),
            Twist::new(-0.2, 0.4, -2.9),
            Twist::new(0.1, 0.1, 1e-12),
        ];

        for s in starts.iter() {
            for t in twists.iter() {
                let end = s.exp(t);
                let back = s.log(&end);
                assert!((back.dx_m - t.dx_m).abs() < 1e-9, "{:?} {:?}", t, back);
                assert!((back.dy_m - t.dy_m).abs() < 1e-9, "{:?} {:?}", t, back);
                assert!((back.dheading_rad - t.dheading_rad).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_log_short_way() {
        let t = Pose::new(0.0, 0.0, PI - 0.1).log(&Pose::new(0.0, 0.0, -PI + 0.1));
        assert!((t.dheading_rad - 0.2).abs() < 1e-9);
    }
}
