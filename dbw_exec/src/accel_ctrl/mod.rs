//! # Acceleration control module
//!
//! Turns the error between the commanded and measured speed into a gas pedal
//! demand and a brake servo position. The speed is smoothed and
//! differentiated over a short sliding window, then the fuzzy controller
//! gives the rate of change of each demand which is integrated over the cycle
//! period.
//!
//! The brake only takes over once the gas demand has reached zero.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod predict;
mod state;
mod window;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use util::module::State;

// Internal
pub use params::*;
pub use predict::*;
pub use state::*;
pub use window::*;
use crate::veh_state::Telemetry;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Length of the speed, timestamp and error histories.
pub const WINDOW: usize = 3;

/// Full gas pedal demand.
///
/// Units: percent
pub const GAS_MAX: f64 = 50.0;

/// Largest rate of change of the gas demand.
///
/// Units: percent/second
pub const GAS_MAX_DELTA: f64 = 50.0;

/// Weight of the measured acceleration in the predicted acceleration error,
/// the model gets the rest.
pub const MEASURED_ACC_GAIN: f64 = 0.7;

/// Weight of the modelled acceleration.
pub const PREDICTED_ACC_GAIN: f64 = 0.3;

/// Sample spacing above which the history is considered stale and the
/// derivative or integral over it is skipped.
///
/// Units: milliseconds
pub const STALE_DELAY_MS: f64 = 1000.0;

/// Highest gear the gas loop will drive in.
pub const MAX_CONTROLLED_GEAR: u8 = 6;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during AccelCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum AccelCtrlError {
    #[error("Speeds must be finite, got measured {speed} m/s, commanded {cmd} m/s")]
    NonFiniteSpeed { speed: f64, cmd: f64 },

    #[error("Timestamp must be finite, got {0}")]
    NonFiniteTimestamp(f64),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run one acceleration control step against a telemetry snapshot.
///
/// The snapshot provides the measured speed, the gear, the brake servo
/// readiness and any stop request from the safety ECU.
pub fn run_acceleration_cycle(
    ctrl: &mut AccelCtrl,
    telemetry: &Telemetry,
    cmd_speed_mps: f64,
    timestamp_s: f64,
) -> Result<(OutputData, StatusReport), AccelCtrlError> {
    ctrl.proc(&InputData::from_telemetry(telemetry, cmd_speed_mps, timestamp_s))
}
