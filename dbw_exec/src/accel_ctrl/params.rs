//! Parameters structure for AccelCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for acceleration control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- ENABLES ----

    /// Close the loop on the gas pedal. When off the gas demand is held at 0.
    pub enable_gas_ctrl: bool,

    /// Close the loop on the brake. When off the brake is held at its offset.
    pub enable_brake_ctrl: bool,

    // ---- CAR LIMITS ----

    /// Strongest deceleration the brake loop may drive the car to. Beyond it
    /// the brake demand is only allowed to decrease.
    ///
    /// Units: meters/second^2
    pub car_min_acc_mss: f64,

    /// Units: meters/second^2
    pub car_max_acc_mss: f64,

    // ---- BRAKE CALIBRATION ----

    /// Stroke over which the brake has useful authority.
    ///
    /// Units: millimeters
    pub brake_accurate_range_mm: f64,

    /// Servo position at which the brake starts to bite.
    ///
    /// Units: millimeters
    pub brake_accurate_offset_mm: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            enable_gas_ctrl: true,
            enable_brake_ctrl: true,
            car_min_acc_mss: -3.0,
            car_max_acc_mss: 2.0,
            brake_accurate_range_mm: 30.0,
            brake_accurate_offset_mm: 10.0,
        }
    }
}
