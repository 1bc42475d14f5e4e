//! # Drive-by-wire library
//!
//! Decodes vehicle telemetry from the vehicle bus, drives the brake servo (LSS)
//! and the analog output unit (CST) on the actuator bus, and closes the
//! steering and speed loops between them.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod accel_ctrl;
pub mod cst;
pub mod data_store;
pub mod fuzzy;
pub mod lss;
pub mod params;
pub mod sim_plant;
pub mod steer_ctrl;
pub mod veh_state;
