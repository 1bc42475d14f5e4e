//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value into `[min, max]`.
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

/// Clamp a value into `[-limit, limit]`.
pub fn clamp_sym<T>(value: T, limit: T) -> T
where
    T: Float
{
    clamp(&value, &-limit.abs(), &limit.abs())
}

/// The logistic function `1 / (1 + e^-x)`.
pub fn sigmoid<T>(x: T) -> T
where
    T: Float
{
    T::one() / (T::one() + (-x).exp())
}

/// Rate of change of `delta` over `delay_ms` milliseconds, in units per
/// second. A zero delay gives a zero rate.
pub fn discrete_derivative<T>(delta: T, delay_ms: T) -> T
where
    T: Float
{
    if delay_ms == T::zero() {
        return T::zero();
    }

    delta / (delay_ms / millis_per_second())
}

/// Advance `value` by `rate` (units per second) applied for `delay_ms`
/// milliseconds.
pub fn discrete_integrate<T>(value: T, rate: T, delay_ms: T) -> T
where
    T: Float
{
    value + rate * delay_ms / millis_per_second()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn millis_per_second<T: Float>() -> T {
    T::from(crate::time::MILLIS_PER_SECOND).unwrap_or_else(T::one)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&5.0, &0.0, &4.0), 4.0);
        assert_eq!(clamp(&-1.0, &0.0, &4.0), 0.0);
        assert_eq!(clamp_sym(-0.5, 0.22), -0.22);
        assert_eq!(clamp_sym(0.1, 0.22), 0.1);
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0f64), 0.5);
        assert!(sigmoid(40.0f64) > 0.999);
        assert!(sigmoid(-40.0f64) < 0.001);
    }

    #[test]
    fn test_discrete_calculus() {
        assert_eq!(discrete_derivative(1.0, 500.0), 2.0);
        assert_eq!(discrete_derivative(1.0, 0.0), 0.0);
        assert_eq!(discrete_integrate(10.0, 4.0, 250.0), 11.0);
        assert_eq!(discrete_integrate(10.0, 4.0, 0.0), 10.0);
    }
}
