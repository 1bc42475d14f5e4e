//! # Steering control module
//!
//! Closes the loop between the commanded road wheel angle and the angle
//! reported on the vehicle bus, producing the voltage for the power steering
//! input of the CST.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod pid;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use pid::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Output voltage at zero error, the centre of the power steering input.
///
/// Units: volts
pub const BIAS_V: f64 = 2.5;

/// Bound on the integral accumulator.
pub const ANTI_WINDUP_LIMIT: f64 = 0.22;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during SteerCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum SteerCtrlError {
    #[error("Steering angles must be finite, got target {target} rad, current {current} rad")]
    NonFiniteInput { target: f64, current: f64 },
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run one steering control step and return the raw controller voltage.
///
/// Uses the controller's own sample period.
pub fn run_steering_cycle(target_angle_rad: f64, current_angle_rad: f64, pid: &mut SteeringPid) -> f64 {
    let t = pid.sample_period_s();
    pid.update(target_angle_rad, current_angle_rad, t)
}
