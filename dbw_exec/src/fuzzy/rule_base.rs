//! Membership shapes and rule table of the acceleration controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::{Breakpoints, Class, NL, NS, PL, PS, ZE};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Outer foot of the two large classes, standing in for infinity.
pub const OUTER_LIMIT: f64 = 100.0;

/// Scale applied to the velocity error breakpoints.
pub const VELOCITY_SCALE: f64 = 1.2;

/// Predicted acceleration error.
pub const INPUT_1: Breakpoints = Breakpoints {
    ll: 3.75,
    ls: 1.67,
    sl: 3.33,
    ss: 2.50,
    ze: 1.63,
};

/// Velocity error, before [`VELOCITY_SCALE`].
pub const INPUT_2: Breakpoints = Breakpoints {
    ll: 43.08,
    ls: 12.92,
    sl: 43.8,
    ss: 7.00,
    ze: 14.0,
};

/// Pedal delta.
pub const OUTPUT: Breakpoints = Breakpoints {
    ll: 2.00,
    ls: 1.00,
    sl: 2.00,
    ss: 0.80,
    ze: 0.80,
};

/// Lower end of the defuzzification interval.
pub const OUTPUT_MIN: f64 = -4.0;

/// Upper end of the defuzzification interval.
pub const OUTPUT_MAX: f64 = 4.0;

/// Number of sample intervals across the output range, giving one more point.
pub const OUTPUT_RESOLUTION: usize = 100;

/// Output class fired by each (input 1, input 2) cell.
///
/// Indexed as `RULES[input_1 class][input_2 class]`.
pub const RULES: [[Class; 5]; 5] = [
    //  NL  NS  ZE  PS  PL    <- input 2
    [PL, PL, PL, PL, PL], // NL
    [NL, NS, PS, PS, PS], // NS
    [NS, NS, ZE, PS, PS], // ZE
    [NS, NS, NS, PS, PL], // PS
    [NL, NL, NL, NL, NL], // PL
];
