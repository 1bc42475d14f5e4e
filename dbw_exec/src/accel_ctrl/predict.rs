//! Open loop acceleration model of the car

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use util::maths::sigmoid;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Acceleration with the pedal released.
///
/// Units: meters/second^2
const COAST_ACC_MSS: f64 = -0.15;

/// Offset of the pedal fraction at the centre of the curve.
const PEDAL_OFFSET: f64 = -0.5;

/// Steepness of the curve.
const STEEPNESS: f64 = 6.0;

/// Full pedal acceleration per gear, starting from first.
///
/// Units: meters/second^2
const FULL_PEDAL_ACC_MSS: [f64; 5] = [2.7, 1.87, 1.27, 0.87, 0.56];

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Predict the acceleration the car reaches for a pedal fraction in [0, 1]
/// in the given gear.
///
/// Gears outside 1 to 5 have no model and give 0.
pub fn predict_acceleration(pedal_fraction: f64, gear: u8) -> f64 {
    let full = match gear {
        1..=5 => FULL_PEDAL_ACC_MSS[gear as usize - 1],
        _ => {
            warn!("No acceleration model for gear {}, predicting 0", gear);
            return 0.0;
        }
    };

    COAST_ACC_MSS
        + (full - COAST_ACC_MSS) * sigmoid((pedal_fraction + PEDAL_OFFSET) * STEEPNESS)
}
