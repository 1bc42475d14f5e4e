//! Shared telemetry store
//!
//! The frame handler is the only writer. The control loop takes one
//! [`Telemetry`] snapshot per cycle so every controller in that cycle sees the
//! same, mutually consistent, values.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::can::{BusId, Frame, FrameHandler};
use log::{trace, warn};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Instant;

// Internal
use super::codec::{self, StateUpdate};
use super::{SafetyEcuMirror, VehicleState};
use crate::lss::ActuatorStatus;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything decoded from the buses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Telemetry {
    pub vehicle: VehicleState,
    pub safety_ecu: SafetyEcuMirror,
    pub lss: ActuatorStatus,

    /// Number of frames applied since startup.
    pub num_updates: u64,
}

/// Owner of the shared telemetry.
#[derive(Clone)]
pub struct TelemetryStore {
    shared: Arc<RwLock<Telemetry>>,
    epoch: Instant,
}

/// Frame handler which decodes frames into the store.
pub struct TelemetryHandler {
    shared: Arc<RwLock<Telemetry>>,
    epoch: Instant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Telemetry {
    /// Apply a decoded update, stamping motion with `timestamp_s` when the
    /// update carries the vehicle speed.
    pub fn apply(&mut self, update: StateUpdate, timestamp_s: f64) {
        let vehicle = &mut self.vehicle;

        match update {
            StateUpdate::Speed(s) => {
                vehicle.motion.speed_mps = s.speed_mps;
                vehicle.motion.abs_led_on = s.abs_led_on;
                vehicle.motion.abs_active = s.abs_active;
                vehicle.motion.esp_led_on = s.esp_led_on;
                vehicle.motion.esp_led_blink = s.esp_led_blink;
                vehicle.motion.timestamp_s = timestamp_s;

                vehicle.wheelspeed.front_left_not_plausible = s.front_left_not_plausible;
                vehicle.wheelspeed.front_right_not_plausible = s.front_right_not_plausible;
                vehicle.wheelspeed.rear_left_not_plausible = s.rear_left_not_plausible;
                vehicle.wheelspeed.rear_right_not_plausible = s.rear_right_not_plausible;
            }
            StateUpdate::SafetyEcu(m) => self.safety_ecu = m,
            StateUpdate::EnginePedal(e) => {
                vehicle.engine.drag_torque = e.drag_torque;
                vehicle.engine.indicated_torque = e.indicated_torque;
                vehicle.engine.max_torque = e.max_torque;
                vehicle.engine.min_torque = e.min_torque;
                vehicle.engine.desired_torque = e.desired_torque;
                vehicle.engine.pedal = e.pedal;
                vehicle.engine.status = e.status;

                vehicle.motion.pedal = e.pedal;
                vehicle.motion.brake_light_on = e.brake_light_on;
                if let Some(d) = e.driving_direction {
                    vehicle.motion.driving_direction = d;
                }
            }
            StateUpdate::EngineRpmGear {
                rpm,
                actual_gear,
                target_gear,
            } => {
                vehicle.engine.rpm = rpm;
                vehicle.engine.actual_gear = actual_gear;
                vehicle.engine.target_gear = target_gear;
            }
            StateUpdate::SteeringAngle { steering_angle_rad } => {
                vehicle.motion.steering_angle_rad = steering_angle_rad;
            }
            StateUpdate::WheelSpeeds(w) => {
                vehicle.wheelspeed.front_left = w.front_left;
                vehicle.wheelspeed.front_right = w.front_right;
                vehicle.wheelspeed.rear_left = w.rear_left;
                vehicle.wheelspeed.rear_right = w.rear_right;
            }
            StateUpdate::Lss(status) => self.lss.apply(&status),
        }

        self.num_updates += 1;
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(RwLock::new(Telemetry::default())),
            epoch: Instant::now(),
        }
    }

    /// Create a handler to register with the receive dispatcher.
    pub fn handler(&self) -> Arc<TelemetryHandler> {
        Arc::new(TelemetryHandler {
            shared: self.shared.clone(),
            epoch: self.epoch,
        })
    }

    /// Seconds since the store was created, the time base of all telemetry
    /// timestamps.
    pub fn elapsed_s(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Copy out the current telemetry.
    pub fn snapshot(&self) -> Telemetry {
        match self.shared.read() {
            Ok(t) => *t,
            Err(poisoned) => {
                warn!("Telemetry lock poisoned, reading last written value");
                *poisoned.into_inner()
            }
        }
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryHandler {
    /// Decode and apply a frame with an explicit receive time.
    ///
    /// Returns true if the frame was recognised.
    pub fn apply_frame(&self, frame: &Frame, timestamp_s: f64) -> bool {
        let update = match codec::decode(frame) {
            Some(u) => u,
            None => return false,
        };

        let mut telemetry = match self.shared.write() {
            Ok(t) => t,
            Err(poisoned) => {
                warn!("Telemetry lock poisoned, continuing with last written value");
                poisoned.into_inner()
            }
        };

        trace!("Applying {:?}", update);
        telemetry.apply(update, timestamp_s);

        true
    }
}

impl FrameHandler for TelemetryHandler {
    fn on_frame(&self, _bus: BusId, frame: &Frame) {
        self.apply_frame(frame, self.epoch.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::veh_state::codec::ids;
    use crate::veh_state::DrivingDirection;
    use comms_if::can::Dispatcher;

    #[test]
    fn test_handler_updates_snapshot() {
        let store = TelemetryStore::new();
        let handler = store.handler();

        assert!(handler.apply_frame(
            &Frame::new(ids::SPEED, &[0, 0, 0, 0, 0, 0x40, 0x06, 0]).unwrap(),
            1.5
        ));
        assert!(handler.apply_frame(
            &Frame::new(ids::ENGINE_RPM_GEAR, &[0, 0x0b, 0xb8, 0x01]).unwrap(),
            1.6
        ));
        assert!(!handler.apply_frame(&Frame::new(0x7ff, &[0; 8]).unwrap(), 1.7));

        let snap = store.snapshot();
        assert!((snap.vehicle.motion.speed_mps - 100.0 / 3.6).abs() < 1e-9);
        assert_eq!(snap.vehicle.motion.timestamp_s, 1.5);
        assert_eq!(snap.vehicle.engine.rpm, 3000);
        assert_eq!(snap.vehicle.engine.actual_gear, 1);
        assert_eq!(snap.num_updates, 2);
    }

    #[test]
    fn test_direction_kept_without_bits() {
        let mut telemetry = Telemetry::default();

        let forward = Frame::new(ids::ENGINE_PEDAL, &[0, 0, 0, 0, 0, 0, 0x04]).unwrap();
        let none = Frame::new(ids::ENGINE_PEDAL, &[0, 0, 0, 0, 0, 0, 0x00]).unwrap();

        telemetry.apply(codec::decode(&forward).unwrap(), 0.0);
        assert_eq!(telemetry.vehicle.motion.driving_direction, DrivingDirection::Forward);

        telemetry.apply(codec::decode(&none).unwrap(), 0.1);
        assert_eq!(telemetry.vehicle.motion.driving_direction, DrivingDirection::Forward);
    }

    #[test]
    fn test_dispatch_into_store() {
        let store = TelemetryStore::new();
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(BusId::Vehicle, store.handler());

        let frame = Frame::new(ids::WHEEL_SPEEDS, &[0, 120, 0, 240, 0, 0, 0, 0]).unwrap();
        assert_eq!(dispatcher.dispatch(BusId::Vehicle, &frame), 1);

        let snap = store.snapshot();
        assert!((snap.vehicle.wheelspeed.front_right - 1.0).abs() < 1e-12);
        assert!((snap.vehicle.wheelspeed.front_left - 2.0).abs() < 1e-12);
        assert_eq!(snap.vehicle.wheelspeed.rear_left, 0.0);
    }
}
