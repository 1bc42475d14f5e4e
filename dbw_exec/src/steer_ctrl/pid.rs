//! Steering PID controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;
use util::maths::clamp_sym;

// Internal
use super::{Params, ANTI_WINDUP_LIMIT, BIAS_V};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller with a bounded integral, centred on [`BIAS_V`].
#[derive(Debug, Serialize, Clone)]
pub struct SteeringPid {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Derivative gain
    k_d: f64,

    /// Nominal time between updates
    sample_period_s: f64,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SteeringPid {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, sample_period_s: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            sample_period_s,
            prev_error: 0.0,
            integral: 0.0,
        }
    }

    pub fn from_params(params: &Params) -> Self {
        Self::new(params.k_p, params.k_i, params.k_d, params.sample_period_s)
    }

    /// Compute the output voltage for one step of `t` seconds.
    ///
    /// The error is `current - target`. With `t == 0` the derivative term is
    /// dropped and the integral does not move.
    pub fn update(&mut self, target: f64, current: f64, t: f64) -> f64 {
        let error = current - target;

        self.integral = clamp_sym(self.integral + error * t, ANTI_WINDUP_LIMIT);

        let deriv = if t > 0.0 {
            (error - self.prev_error) / t
        } else {
            0.0
        };

        self.prev_error = error;

        BIAS_V + self.k_p * error + self.k_i * self.integral + self.k_d * deriv
    }

    /// Clear the integral and the previous error.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> f64 {
        self.prev_error
    }

    pub fn sample_period_s(&self) -> f64 {
        self.sample_period_s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_error_gives_bias() {
        let mut pid = SteeringPid::new(25.0, 0.2, 0.4, 0.1);

        assert_eq!(pid.update(0.1, 0.1, 0.1), BIAS_V);
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_proportional_and_derivative() {
        let mut pid = SteeringPid::new(2.0, 0.0, 1.0, 0.5);

        // error 0.1, derivative (0.1 - 0) / 0.5 = 0.2
        let out = pid.update(0.0, 0.1, 0.5);
        assert!((out - (2.5 + 0.2 + 0.2)).abs() < 1e-12);

        // Same error again, no derivative
        let out = pid.update(0.0, 0.1, 0.5);
        assert!((out - 2.7).abs() < 1e-12);
        assert_eq!(pid.prev_error(), 0.1);
    }

    #[test]
    fn test_zero_dt_guard() {
        let mut pid = SteeringPid::new(1.0, 1.0, 1.0, 0.0);

        let out = pid.update(0.0, 0.3, 0.0);

        assert!(out.is_finite());
        assert!((out - 2.8).abs() < 1e-12);
    }

    #[test]
    fn test_integral_bounded() {
        let mut pid = SteeringPid::new(0.0, 1.0, 0.0, 0.1);

        for _ in 0..1000 {
            pid.update(0.0, 0.5, 0.1);
            assert!(pid.integral().abs() <= ANTI_WINDUP_LIMIT);
        }
        assert_eq!(pid.integral(), ANTI_WINDUP_LIMIT);

        for _ in 0..1000 {
            pid.update(0.5, 0.0, 0.1);
            assert!(pid.integral().abs() <= ANTI_WINDUP_LIMIT);
        }
        assert_eq!(pid.integral(), -ANTI_WINDUP_LIMIT);

        pid.reset();
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_run_steering_cycle() {
        let mut pid = SteeringPid::new(25.0, 0.2, 0.4, 0.1);

        // Current is left of target, voltage rises above bias
        let v = crate::steer_ctrl::run_steering_cycle(0.0, 0.02, &mut pid);
        assert!(v > BIAS_V);
    }
}
