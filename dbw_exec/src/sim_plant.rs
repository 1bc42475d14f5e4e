//! # Simulated vehicle
//!
//! A simple vehicle model standing in for the car when no CAN adapter is
//! present. It reads the frames the software sends to the actuators, moves a
//! point mass, the steering rack and the brake servo accordingly, and produces
//! the telemetry frames the real car would send back.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::can::{BusId, Frame, FrameError};
use log::{debug, trace};
use serde::Deserialize;

// Internal
use crate::cst::{self, PEDAL_ID, STEERING_ID};
use crate::lss::{self, attr};
use crate::steer_ctrl::BIAS_V;
use crate::veh_state::codec::{ids, STEERING_DEG_PER_COUNT, STEERING_RATIO};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed frame resolution.
///
/// Units: kilometers/hour
const SPEED_KMH_PER_COUNT: f64 = 0.0625;

/// Status bits reported once the servo has homed.
const LSS_HOMED_FLAGS: u8 = 0x80 | 0x20;

/// Status bit set when the servo is on its target.
const LSS_ON_TARGET: u8 = 0x04;

/// Units: RPM
const IDLE_RPM: f64 = 800.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the vehicle model.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Gear reported by the engine.
    pub gear: u8,

    /// Acceleration per percent of gas pedal.
    ///
    /// Units: (meters/second^2)/percent
    pub gas_gain: f64,

    /// Deceleration per millimeter of brake travel beyond the bite point.
    ///
    /// Units: (meters/second^2)/millimeter
    pub brake_gain: f64,

    /// Servo position at which the brake starts to bite.
    ///
    /// Units: millimeters
    pub brake_bite_mm: f64,

    /// Linear drag.
    ///
    /// Units: 1/second
    pub drag: f64,

    /// Rate of the road wheels per volt away from the steering centre.
    ///
    /// Units: (radians/second)/volt
    pub steer_rate_gain: f64,

    /// Units: radians
    pub max_steer_angle_rad: f64,

    /// Units: millimeters/second
    pub lss_speed_mm_s: f64,

    /// Engine speed per unit road speed.
    ///
    /// Units: RPM/(meters/second)
    pub rpm_per_mps: f64,
}

/// State of the simulated vehicle.
#[derive(Debug, Clone)]
pub struct SimPlant {
    params: Params,

    speed_mps: f64,
    steer_angle_rad: f64,

    gas_pedal_pct: f64,
    steering_v: f64,

    lss_homed: bool,
    lss_position_mm: f64,
    lss_target_mm: f64,

    /// Attributes the servo has been asked to report.
    pending_replies: Vec<u8>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            gear: 1,
            gas_gain: 0.05,
            brake_gain: 0.2,
            brake_bite_mm: 10.0,
            drag: 0.05,
            steer_rate_gain: 0.2,
            max_steer_angle_rad: 0.6,
            lss_speed_mm_s: 50.0,
            rpm_per_mps: 150.0,
        }
    }
}

impl SimPlant {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            speed_mps: 0.0,
            steer_angle_rad: 0.0,
            gas_pedal_pct: 0.0,
            steering_v: BIAS_V,
            lss_homed: false,
            lss_position_mm: lss::MIN_POSITION_MM,
            lss_target_mm: lss::MIN_POSITION_MM,
            pending_replies: Vec::new(),
        }
    }

    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    pub fn steer_angle_rad(&self) -> f64 {
        self.steer_angle_rad
    }

    pub fn gas_pedal_pct(&self) -> f64 {
        self.gas_pedal_pct
    }

    pub fn lss_position_mm(&self) -> f64 {
        self.lss_position_mm
    }

    /// Take in the frames sent to the actuators.
    pub fn absorb(&mut self, sent: &[(BusId, Frame)]) {
        for (bus, frame) in sent {
            if *bus != BusId::Actuator {
                continue;
            }

            match frame.id() {
                PEDAL_ID => {
                    if let Some(code) = frame.u16_le(0) {
                        let pct = cst::voltage_to_pedal(cst::code_to_voltage(code));
                        self.gas_pedal_pct = clamp(&pct, &0.0, &100.0);
                    }
                }
                STEERING_ID => {
                    if let Some(code) = frame.u16_le(0) {
                        self.steering_v = cst::code_to_voltage(code);
                    }
                }
                lss::REQUEST_ID => self.absorb_lss_request(frame),
                _ => (),
            }
        }
    }

    /// Advance the model by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        let p = &self.params;

        let brake_travel = (self.lss_position_mm - p.brake_bite_mm).max(0.0);
        let acc = p.gas_gain * self.gas_pedal_pct - p.brake_gain * brake_travel - p.drag * self.speed_mps;
        self.speed_mps = (self.speed_mps + acc * dt_s).max(0.0);

        let steer_rate = p.steer_rate_gain * (self.steering_v - BIAS_V);
        self.steer_angle_rad = clamp(
            &(self.steer_angle_rad + steer_rate * dt_s),
            &-p.max_steer_angle_rad,
            &p.max_steer_angle_rad,
        );

        if self.lss_homed {
            let max_move = p.lss_speed_mm_s * dt_s;
            let error = self.lss_target_mm - self.lss_position_mm;
            self.lss_position_mm += clamp(&error, &-max_move, &max_move);
        }

        trace!(
            "SimPlant speed {:.3} m/s, steer {:.4} rad, brake {:.2} mm",
            self.speed_mps,
            self.steer_angle_rad,
            self.lss_position_mm
        );
    }

    /// Frames the car sends back this cycle, with the bus each arrives on.
    pub fn telemetry_frames(&mut self) -> Result<Vec<(BusId, Frame)>, FrameError> {
        let mut frames = vec![
            (BusId::Vehicle, self.speed_frame()?),
            (BusId::Vehicle, self.engine_frame()?),
            (BusId::Vehicle, self.steering_frame()?),
        ];

        for attribute in std::mem::take(&mut self.pending_replies) {
            frames.push((BusId::Actuator, self.lss_reply(attribute)));
        }

        Ok(frames)
    }

    fn absorb_lss_request(&mut self, frame: &Frame) {
        // Only committed requests act on the servo
        if frame.byte(0) != Some(0x80) {
            return;
        }

        let get_attr = frame.byte(1).unwrap_or(attr::NO_ATTRIBUTE);
        let set_attr = frame.byte(3).unwrap_or(attr::NO_ATTRIBUTE);
        let value = frame.i32_le(4).unwrap_or(0);

        match set_attr {
            attr::TARGET_POSITION => self.lss_target_mm = lss::inc_to_mm(value),
            attr::EXEC_HOMING => {
                let home = if value == attr::MAX_HOMING {
                    lss::MAX_POSITION_MM
                } else {
                    lss::MIN_POSITION_MM
                };
                debug!("SimPlant brake servo homed at {} mm", home);
                self.lss_homed = true;
                self.lss_position_mm = home;
                self.lss_target_mm = home;
            }
            _ => (),
        }

        if get_attr != attr::NO_ATTRIBUTE {
            self.pending_replies.push(get_attr);
        }
    }

    fn speed_frame(&self) -> Result<Frame, FrameError> {
        let counts = (self.speed_mps * 3.6 / SPEED_KMH_PER_COUNT).round();
        let counts = clamp(&counts, &0.0, &(u16::MAX as f64)) as u16;
        let [lo, hi] = counts.to_le_bytes();

        Frame::new(ids::SPEED, &[0, 0, 0, 0, 0, lo, hi, 0])
    }

    fn engine_frame(&self) -> Result<Frame, FrameError> {
        let rpm = IDLE_RPM + self.params.rpm_per_mps * self.speed_mps;
        let rpm = clamp(&rpm.round(), &0.0, &(u16::MAX as f64)) as u16;
        let [hi, lo] = rpm.to_be_bytes();
        let gear = self.params.gear & 0x0f;

        Frame::new(ids::ENGINE_RPM_GEAR, &[0, hi, lo, gear | (gear << 4)])
    }

    fn steering_frame(&self) -> Result<Frame, FrameError> {
        let wheel_deg = self.steer_angle_rad.to_degrees() * STEERING_RATIO;
        let counts = (wheel_deg / STEERING_DEG_PER_COUNT).round() as i64;

        Frame::new(ids::STEERING_ANGLE, &encode_steer_counts(counts))
    }

    fn lss_reply(&self, attribute: u8) -> Frame {
        let mut flags = 0;
        if self.lss_homed {
            flags |= LSS_HOMED_FLAGS;
        }
        if (self.lss_position_mm - self.lss_target_mm).abs() < 0.1 {
            flags |= LSS_ON_TARGET;
        }

        let value = match attribute {
            attr::TARGET_POSITION => lss::mm_to_inc(self.lss_target_mm),
            _ => lss::mm_to_inc(self.lss_position_mm),
        };
        let selector = match attribute {
            attr::TARGET_POSITION => attr::TARGET_POSITION,
            _ => attr::ACTUAL_POSITION,
        };
        let v = value.to_le_bytes();

        Frame::from_array(lss::REPLY_ID, [flags, selector, 0, 0, v[0], v[1], v[2], v[3]])
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Encode signed steering counts as (low, high) bytes, high bytes of 128 and
/// above counting to the right.
fn encode_steer_counts(counts: i64) -> [u8; 2] {
    let counts = counts.max(-(127 << 8)).min((128 << 8) - 1);

    if counts >= 0 {
        [(counts & 0xff) as u8, (counts >> 8) as u8]
    } else {
        let m = -counts;
        let q = (m + 255) / 256;
        let low = q * 256 - m;
        [low as u8, (128 + q) as u8]
    }
}
