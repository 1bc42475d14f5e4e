//! # Drive-by-wire Executable Parameters
//!
//! This module provide parameters for the drive-by-wire executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbwExecParams {
    // ---- CYCLE ----

    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of cycles to run before stopping, 0 to run until interrupted.
    pub num_cycles: u64,

    /// Number of consecutive actuator transport errors after which safe mode
    /// is engaged.
    pub max_transport_errors: u64,

    /// Cycles between polls of the brake servo's actual position.
    pub lss_poll_cycles: u64,

    // ---- DEMAND ----

    /// Units: meters/second
    pub cmd_speed_mps: f64,

    /// Road wheel angle demand, left positive.
    ///
    /// Units: radians
    pub cmd_steer_angle_rad: f64,

    /// Send the power steering unit a fixed low speed every cycle.
    pub send_fake_speed: bool,

    // ---- BRAKE ----

    /// Home the brake servo against its upper end before driving.
    pub home_brake_on_start: bool,

    /// Release the servo's motor brake after initialisation.
    pub release_brake_on_start: bool,

    /// Units: millimeters
    pub brake_min_limit_mm: f64,

    /// Units: millimeters
    pub brake_max_limit_mm: f64,

    /// Fraction of the servo's maximum current allowed while moving.
    pub brake_max_current_moving: f64,

    /// Fraction of the servo's maximum current allowed while holding.
    pub brake_max_current_holding: f64,
}

impl Default for DbwExecParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.1,
            num_cycles: 0,
            max_transport_errors: 5,
            lss_poll_cycles: 1,
            cmd_speed_mps: 0.0,
            cmd_steer_angle_rad: 0.0,
            send_fake_speed: true,
            home_brake_on_start: true,
            release_brake_on_start: true,
            brake_min_limit_mm: 0.0,
            brake_max_limit_mm: 75.0,
            brake_max_current_moving: 1.0,
            brake_max_current_holding: 0.5,
        }
    }
}
