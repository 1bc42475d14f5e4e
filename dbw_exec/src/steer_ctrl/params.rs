//! Parameters structure for SteerCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for steering control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- GAINS ----

    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,

    /// Time between control cycles.
    ///
    /// Units: seconds
    pub sample_period_s: f64,

    // ---- OUTPUT LIMITS ----

    /// Lowest voltage the controller may command. Must not be below the
    /// physical limit of the power steering input.
    ///
    /// Units: volts
    pub min_output_v: f64,

    /// Highest voltage the controller may command. Must not be above the
    /// physical limit of the power steering input.
    ///
    /// Units: volts
    pub max_output_v: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            k_p: 25.0,
            k_i: 0.2,
            k_d: 0.4,
            sample_period_s: 0.1,
            min_output_v: 0.6,
            max_output_v: 4.4,
        }
    }
}
