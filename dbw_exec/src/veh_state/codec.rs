//! Telemetry codec
//!
//! Turns received frames into [`StateUpdate`]s. Frames with an unknown
//! identifier or shorter than their layout requires are skipped silently.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::can::Frame;
use log::trace;
use serde::Serialize;

// Internal
use super::layout::{Encoding, Field, Flag, FrameLayout};
use super::{DrivingDirection, SafetyEcuMirror};
use crate::lss::{self, LssStatusUpdate};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Identifiers of the frames the codec understands.
pub mod ids {
    pub const WHEEL_SPEEDS: u32 = 0x080;
    pub const SAFETY_ECU: u32 = 0x088;
    pub const SPEED: u32 = 0x090;
    pub const STEERING_ANGLE: u32 = 0x0c2;
    pub const ENGINE_RPM_GEAR: u32 = 0x300;
    pub const ENGINE_PEDAL: u32 = 0x310;
}

/// Ratio between the steering wheel angle and the road wheel angle.
pub const STEERING_RATIO: f64 = 28.55;

/// Degrees per steering count.
pub const STEERING_DEG_PER_COUNT: f64 = 0.04375;

const KMH_TO_MPS: f64 = 1.0 / 3.6;

/// Wheel speed frames carry 120 counts per revolution/second.
const WHEEL_COUNTS_PER_RPS: f64 = 120.0;

/// Engine pedal byte is 2.5 counts per percent.
const PEDAL_COUNTS_PER_PCT: f64 = 2.5;

// ---- SPEED ----

const ABS_LED_ON: Flag = Flag::new("abs_led_on", 0, 0x01);
const ABS_ACTIVE: Flag = Flag::new("abs_active", 0, 0x02);
const ESP_LED_ON: Flag = Flag::new("esp_led_on", 0, 0x40);
const ESP_LED_BLINK: Flag = Flag::new("esp_led_blink", 0, 0x80);
const FL_NOT_PLAUSIBLE: Flag = Flag::new("front_left_not_plausible", 4, 0x01);
const FR_NOT_PLAUSIBLE: Flag = Flag::new("front_right_not_plausible", 4, 0x02);
const RL_NOT_PLAUSIBLE: Flag = Flag::new("rear_left_not_plausible", 4, 0x04);
const RR_NOT_PLAUSIBLE: Flag = Flag::new("rear_right_not_plausible", 4, 0x10);
const SPEED_MPS: Field = Field::new("speed_mps", 5, Encoding::U16Le, 0.0625 * KMH_TO_MPS);

pub const SPEED_LAYOUT: FrameLayout = FrameLayout {
    id: ids::SPEED,
    name: "speed",
    min_len: 7,
    fields: &[SPEED_MPS],
    flags: &[
        ABS_LED_ON,
        ABS_ACTIVE,
        ESP_LED_ON,
        ESP_LED_BLINK,
        FL_NOT_PLAUSIBLE,
        FR_NOT_PLAUSIBLE,
        RL_NOT_PLAUSIBLE,
        RR_NOT_PLAUSIBLE,
    ],
};

// ---- SAFETY ECU ----

const SAFETY_ECU_FIELDS: [Field; 8] = [
    Field::new("vehicle_state", 0, Encoding::U8, 1.0),
    Field::new("max_brake_stroke", 1, Encoding::U8, 1.0),
    Field::new("brake_init_started", 2, Encoding::U8, 1.0),
    Field::new("got_first_max_brake", 3, Encoding::U8, 1.0),
    Field::new("request_pause", 4, Encoding::U8, 1.0),
    Field::new("request_stop", 5, Encoding::U8, 1.0),
    Field::new("control_lateral", 6, Encoding::U8, 1.0),
    Field::new("control_longitudinal", 7, Encoding::U8, 1.0),
];

pub const SAFETY_ECU_LAYOUT: FrameLayout = FrameLayout {
    id: ids::SAFETY_ECU,
    name: "safety_ecu",
    min_len: 8,
    fields: &SAFETY_ECU_FIELDS,
    flags: &[],
};

// ---- ENGINE / PEDAL ----

const DRAG_TORQUE: Field = Field::new("drag_torque", 0, Encoding::U8, 1.0);
const INDICATED_TORQUE: Field = Field::new("indicated_torque", 1, Encoding::U8, 1.0);
const MAX_TORQUE: Field = Field::new("max_torque", 2, Encoding::U8, 1.0);
const MIN_TORQUE: Field = Field::new("min_torque", 3, Encoding::U8, 1.0);
const DESIRED_TORQUE: Field = Field::new("desired_torque", 4, Encoding::U8, 1.0);
const PEDAL_PCT: Field = Field::new("pedal", 5, Encoding::U8, 1.0 / PEDAL_COUNTS_PER_PCT);
const ENGINE_STATUS: Field = Field::new("status", 6, Encoding::U8, 1.0);
const DIR_FORWARD: Flag = Flag::new("forward", 6, 0x04);
const DIR_BACKWARD: Flag = Flag::new("backward", 6, 0x10);
const DIR_UNKNOWN: Flag = Flag::new("unknown", 6, 0x20);
const BRAKE_LIGHT: Flag = Flag::new("brake_light_on", 6, 0x40);

pub const ENGINE_PEDAL_LAYOUT: FrameLayout = FrameLayout {
    id: ids::ENGINE_PEDAL,
    name: "engine_pedal",
    min_len: 7,
    fields: &[
        DRAG_TORQUE,
        INDICATED_TORQUE,
        MAX_TORQUE,
        MIN_TORQUE,
        DESIRED_TORQUE,
        PEDAL_PCT,
        ENGINE_STATUS,
    ],
    flags: &[DIR_FORWARD, DIR_BACKWARD, DIR_UNKNOWN, BRAKE_LIGHT],
};

// ---- ENGINE RPM / GEAR ----

const RPM: Field = Field::new("rpm", 1, Encoding::U16Be, 1.0);
const ACTUAL_GEAR: Field = Field::new("actual_gear", 3, Encoding::LowNibble, 1.0);
const TARGET_GEAR: Field = Field::new("target_gear", 3, Encoding::HighNibble, 1.0);

pub const ENGINE_RPM_GEAR_LAYOUT: FrameLayout = FrameLayout {
    id: ids::ENGINE_RPM_GEAR,
    name: "engine_rpm_gear",
    min_len: 4,
    fields: &[RPM, ACTUAL_GEAR, TARGET_GEAR],
    flags: &[],
};

// ---- STEERING ANGLE ----

const STEERING_ANGLE_RAD: Field = Field::new(
    "steering_angle_rad",
    0,
    Encoding::SteerCounts,
    STEERING_DEG_PER_COUNT * std::f64::consts::PI / 180.0 / STEERING_RATIO,
);

pub const STEERING_ANGLE_LAYOUT: FrameLayout = FrameLayout {
    id: ids::STEERING_ANGLE,
    name: "steering_angle",
    min_len: 2,
    fields: &[STEERING_ANGLE_RAD],
    flags: &[],
};

// ---- WHEEL SPEEDS ----

const FRONT_RIGHT: Field = Field::new("front_right", 0, Encoding::U16Be, 1.0 / WHEEL_COUNTS_PER_RPS);
const FRONT_LEFT: Field = Field::new("front_left", 2, Encoding::U16Be, 1.0 / WHEEL_COUNTS_PER_RPS);
const REAR_RIGHT: Field = Field::new("rear_right", 4, Encoding::U16Be, 1.0 / WHEEL_COUNTS_PER_RPS);
const REAR_LEFT: Field = Field::new("rear_left", 6, Encoding::U16Be, 1.0 / WHEEL_COUNTS_PER_RPS);

pub const WHEEL_SPEEDS_LAYOUT: FrameLayout = FrameLayout {
    id: ids::WHEEL_SPEEDS,
    name: "wheel_speeds",
    min_len: 8,
    fields: &[FRONT_RIGHT, FRONT_LEFT, REAR_RIGHT, REAR_LEFT],
    flags: &[],
};

/// Every layout the codec decodes, including the brake servo's status reply.
pub const LAYOUTS: [FrameLayout; 7] = [
    SPEED_LAYOUT,
    SAFETY_ECU_LAYOUT,
    ENGINE_PEDAL_LAYOUT,
    ENGINE_RPM_GEAR_LAYOUT,
    STEERING_ANGLE_LAYOUT,
    WHEEL_SPEEDS_LAYOUT,
    lss::STATUS_LAYOUT,
];

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Contents of a speed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SpeedUpdate {
    pub speed_mps: f64,
    pub abs_led_on: bool,
    pub abs_active: bool,
    pub esp_led_on: bool,
    pub esp_led_blink: bool,
    pub front_left_not_plausible: bool,
    pub front_right_not_plausible: bool,
    pub rear_left_not_plausible: bool,
    pub rear_right_not_plausible: bool,
}

/// Contents of an engine/pedal frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct EnginePedalUpdate {
    pub drag_torque: f64,
    pub indicated_torque: f64,
    pub max_torque: f64,
    pub min_torque: f64,
    pub desired_torque: f64,
    pub pedal: f64,
    pub status: u8,

    /// `None` if no direction bit is set, in which case the last known
    /// direction stands.
    pub driving_direction: Option<DrivingDirection>,
    pub brake_light_on: bool,
}

/// Contents of a wheel speed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct WheelSpeedUpdate {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A decoded frame, ready to be applied to the telemetry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum StateUpdate {
    Speed(SpeedUpdate),
    SafetyEcu(SafetyEcuMirror),
    EnginePedal(EnginePedalUpdate),
    EngineRpmGear {
        rpm: u16,
        actual_gear: u8,
        target_gear: u8,
    },
    SteeringAngle {
        steering_angle_rad: f64,
    },
    WheelSpeeds(WheelSpeedUpdate),
    Lss(LssStatusUpdate),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the layout for a frame identifier.
pub fn layout_for(id: u32) -> Option<&'static FrameLayout> {
    LAYOUTS.iter().find(|l| l.id == id)
}

/// Decode a frame.
///
/// Returns `None` for unrecognised identifiers and for frames shorter than
/// their layout's minimum length.
pub fn decode(frame: &Frame) -> Option<StateUpdate> {
    let layout = layout_for(frame.id())?;

    if !layout.accepts(frame) {
        trace!(
            "Skipping short {} frame ({} < {} bytes)",
            layout.name,
            frame.len(),
            layout.min_len
        );
        return None;
    }

    match frame.id() {
        ids::SPEED => decode_speed(frame).map(StateUpdate::Speed),
        ids::SAFETY_ECU => decode_safety_ecu(frame).map(StateUpdate::SafetyEcu),
        ids::ENGINE_PEDAL => decode_engine_pedal(frame).map(StateUpdate::EnginePedal),
        ids::ENGINE_RPM_GEAR => Some(StateUpdate::EngineRpmGear {
            rpm: RPM.raw(frame)? as u16,
            actual_gear: ACTUAL_GEAR.raw(frame)? as u8,
            target_gear: TARGET_GEAR.raw(frame)? as u8,
        }),
        ids::STEERING_ANGLE => Some(StateUpdate::SteeringAngle {
            steering_angle_rad: STEERING_ANGLE_RAD.read(frame)?,
        }),
        ids::WHEEL_SPEEDS => Some(StateUpdate::WheelSpeeds(WheelSpeedUpdate {
            front_right: FRONT_RIGHT.read(frame)?,
            front_left: FRONT_LEFT.read(frame)?,
            rear_right: REAR_RIGHT.read(frame)?,
            rear_left: REAR_LEFT.read(frame)?,
        })),
        lss::REPLY_ID => lss::decode_status(frame).map(StateUpdate::Lss),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn decode_speed(frame: &Frame) -> Option<SpeedUpdate> {
    Some(SpeedUpdate {
        speed_mps: SPEED_MPS.read(frame)?,
        abs_led_on: ABS_LED_ON.read(frame)?,
        abs_active: ABS_ACTIVE.read(frame)?,
        esp_led_on: ESP_LED_ON.read(frame)?,
        esp_led_blink: ESP_LED_BLINK.read(frame)?,
        front_left_not_plausible: FL_NOT_PLAUSIBLE.read(frame)?,
        front_right_not_plausible: FR_NOT_PLAUSIBLE.read(frame)?,
        rear_left_not_plausible: RL_NOT_PLAUSIBLE.read(frame)?,
        rear_right_not_plausible: RR_NOT_PLAUSIBLE.read(frame)?,
    })
}

fn decode_safety_ecu(frame: &Frame) -> Option<SafetyEcuMirror> {
    let mut bytes = [0u8; 8];
    for (b, field) in bytes.iter_mut().zip(SAFETY_ECU_FIELDS.iter()) {
        *b = field.raw(frame)? as u8;
    }

    Some(SafetyEcuMirror {
        vehicle_state: bytes[0],
        max_brake_stroke: bytes[1],
        brake_init_started: bytes[2],
        got_first_max_brake: bytes[3],
        request_pause: bytes[4],
        request_stop: bytes[5],
        control_lateral: bytes[6],
        control_longitudinal: bytes[7],
    })
}

fn decode_engine_pedal(frame: &Frame) -> Option<EnginePedalUpdate> {
    // Direction bits are checked in this order, a later set bit overrides an
    // earlier one
    let mut driving_direction = None;
    if DIR_FORWARD.read(frame)? {
        driving_direction = Some(DrivingDirection::Forward);
    }
    if DIR_BACKWARD.read(frame)? {
        driving_direction = Some(DrivingDirection::Backward);
    }
    if DIR_UNKNOWN.read(frame)? {
        driving_direction = Some(DrivingDirection::Unknown);
    }

    Some(EnginePedalUpdate {
        drag_torque: DRAG_TORQUE.read(frame)?,
        indicated_torque: INDICATED_TORQUE.read(frame)?,
        max_torque: MAX_TORQUE.read(frame)?,
        min_torque: MIN_TORQUE.read(frame)?,
        desired_torque: DESIRED_TORQUE.read(frame)?,
        pedal: PEDAL_PCT.read(frame)?,
        status: ENGINE_STATUS.raw(frame)? as u8,
        driving_direction,
        brake_light_on: BRAKE_LIGHT.read(frame)?,
    })
}
