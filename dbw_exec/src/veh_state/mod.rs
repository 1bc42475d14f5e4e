//! # Vehicle State
//!
//! Telemetry decoded from the vehicle bus and from the brake servo's replies.
//!
//! Frame layouts are declared as data in [`layout`], [`codec`] turns a
//! received frame into a [`StateUpdate`], and [`store`] owns the single
//! shared copy of the telemetry that the control loop snapshots once per cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod codec;
pub mod layout;
pub mod store;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use codec::{decode, StateUpdate};
pub use store::{Telemetry, TelemetryHandler, TelemetryStore};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Full decoded state of the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct VehicleState {
    pub engine: EngineState,
    pub wheelspeed: WheelSpeeds,
    pub motion: MotionState,
}

/// Engine management telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct EngineState {
    pub drag_torque: f64,
    pub indicated_torque: f64,
    pub max_torque: f64,
    pub min_torque: f64,
    pub desired_torque: f64,

    /// Raw engine status byte
    pub status: u8,

    /// Units: revolutions per minute
    pub rpm: u16,

    /// Accelerator pedal position as reported by the engine ECU.
    ///
    /// Units: percent
    pub pedal: f64,

    pub actual_gear: u8,
    pub target_gear: u8,
}

/// Per-wheel rotational speeds and their plausibility flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct WheelSpeeds {
    /// Units: revolutions/second
    pub front_left: f64,
    /// Units: revolutions/second
    pub front_right: f64,
    /// Units: revolutions/second
    pub rear_left: f64,
    /// Units: revolutions/second
    pub rear_right: f64,

    pub front_left_not_plausible: bool,
    pub front_right_not_plausible: bool,
    pub rear_left_not_plausible: bool,
    pub rear_right_not_plausible: bool,
}

/// Longitudinal and lateral motion of the vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MotionState {
    /// Units: percent
    pub pedal: f64,

    /// Steering wheel angle mapped to the road wheels, left positive.
    ///
    /// Units: radians
    pub steering_angle_rad: f64,

    /// Units: meters/second
    pub speed_mps: f64,

    pub abs_active: bool,
    pub abs_led_on: bool,
    pub esp_led_on: bool,
    pub esp_led_blink: bool,

    pub driving_direction: DrivingDirection,
    pub brake_light_on: bool,

    /// Receive time of the last speed frame, seconds since the store was
    /// created.
    pub timestamp_s: f64,
}

/// Mirror of the safety ECU's status frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SafetyEcuMirror {
    pub vehicle_state: u8,
    pub max_brake_stroke: u8,
    pub brake_init_started: u8,
    pub got_first_max_brake: u8,
    pub request_pause: u8,
    pub request_stop: u8,
    pub control_lateral: u8,
    pub control_longitudinal: u8,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DrivingDirection {
    Unknown,
    Forward,
    Backward,
}

impl Default for DrivingDirection {
    fn default() -> Self {
        DrivingDirection::Unknown
    }
}

impl SafetyEcuMirror {
    /// True if the safety ECU asks for the vehicle to be stopped or paused.
    pub fn stop_requested(&self) -> bool {
        self.request_stop != 0 || self.request_pause != 0
    }
}
