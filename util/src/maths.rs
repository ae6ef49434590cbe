//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value between a minimum and maximum.
///
/// If the value is NaN it is returned unchanged.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_to_pi<T>(angle_rad: T) -> T
where
    T: Float
{
    let pi_t = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t = pi_t + pi_t;

    let wrapped = rem_euclid(angle_rad + pi_t, tau_t) - pi_t;

    // Round-off in rem_euclid can land exactly on +pi
    if wrapped >= pi_t {
        wrapped - tau_t
    }
    else {
        wrapped
    }
}

/// Resolve a target angle against a continuous current angle.
///
/// The returned value is equivalent to `target_rad` modulo 2pi, but expressed
/// as `current_rad + delta` where `delta` is in the range (-pi, pi]. A
/// controller tracking the returned value never has to travel more than half a
/// turn, and never sees the discontinuity at the -pi/pi boundary.
///
/// `current_rad` may be any real value (i.e. it may have wound up over many
/// turns), `target_rad` may also be any real value.
pub fn continuous_setpoint<T>(current_rad: T, target_rad: T) -> T
where
    T: Float
{
    let pi_t = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t = pi_t + pi_t;

    let mut delta = rem_euclid(target_rad - current_rad, tau_t);

    if delta > pi_t {
        delta = delta - tau_t;
    }

    current_rad + delta
}

/// Return the sign of the value, with zero mapping to zero.
///
/// `Float::signum` maps `+0.0` to `1.0` which is not wanted for feedforward
/// static friction terms.
pub fn sign_or_zero<T>(value: T) -> T
where
    T: Float
{
    if value > T::zero() {
        T::one()
    }
    else if value < T::zero() {
        -T::one()
    }
    else {
        T::zero()
    }
}
