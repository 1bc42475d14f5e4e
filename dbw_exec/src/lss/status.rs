//! Decoding of the servo's status reply.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::can::Frame;
use serde::Serialize;

// Internal
use super::{attr, inc_to_mm, MAX_POSITION_MM, MIN_POSITION_MM, REPLY_ID};
use crate::veh_state::layout::{Encoding, Field, Flag, FrameLayout};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Value of a position which has not been reported, or which was reported
/// outside the stroke of the actuator.
pub const INVALID_POSITION_MM: f64 = -1.0;

const ENABLE_MOVING: Flag = Flag::new("enable_moving", 0, 0x80);
const HOMING_DONE: Flag = Flag::new("homing_done", 0, 0x20);
const SHAFT_MOVING_UP: Flag = Flag::new("shaft_moving_up", 0, 0x10);
const GENERAL_ERROR: Flag = Flag::new("general_error", 0, 0x08);
const ON_TARGET_POSITION: Flag = Flag::new("on_target_position", 0, 0x04);
const MOTOR_MOVING: Flag = Flag::new("motor_moving", 0, 0x01);

const COMMAND_LOADED: Flag = Flag::new("command_loaded", 2, 0x80);
const FOLLOWING_ERROR: Flag = Flag::new("following", 2, 0x20);
const NEGATIVE_LIMIT: Flag = Flag::new("negative_limit", 2, 0x10);
const POSITIVE_LIMIT: Flag = Flag::new("positive_limit", 2, 0x08);
const STROKE_REVERSE: Flag = Flag::new("stroke_reverse", 2, 0x04);
const STROKE_FORWARD: Flag = Flag::new("stroke_forward", 2, 0x02);
const INPUT_ERROR: Flag = Flag::new("input", 2, 0x01);

const SELECTOR: Field = Field::new("selector", 1, Encoding::U8, 1.0);
const POSITION_INC: Field = Field::new("position_inc", 4, Encoding::I32Le, 1.0);
const CURRENT_MOVING: Field = Field::new(
    "max_current_moving",
    4,
    Encoding::U8,
    1.0 / attr::MAX_CURRENT_MOVING as f64,
);
const CURRENT_HOLDING: Field = Field::new(
    "max_current_holding",
    6,
    Encoding::U8,
    1.0 / attr::MAX_CURRENT_HOLDING as f64,
);

pub const STATUS_LAYOUT: FrameLayout = FrameLayout {
    id: REPLY_ID,
    name: "lss_status",
    min_len: 8,
    fields: &[SELECTOR, POSITION_INC, CURRENT_MOVING, CURRENT_HOLDING],
    flags: &[
        ENABLE_MOVING,
        HOMING_DONE,
        SHAFT_MOVING_UP,
        GENERAL_ERROR,
        ON_TARGET_POSITION,
        MOTOR_MOVING,
        COMMAND_LOADED,
        FOLLOWING_ERROR,
        NEGATIVE_LIMIT,
        POSITIVE_LIMIT,
        STROKE_REVERSE,
        STROKE_FORWARD,
        INPUT_ERROR,
    ],
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Error bits of the status reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LssErrors {
    pub following: bool,
    pub negative_limit: bool,
    pub positive_limit: bool,
    pub stroke_reverse: bool,
    pub stroke_forward: bool,
    pub input: bool,
}

/// Status flags carried by every reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LssFlags {
    pub enable_moving: bool,
    pub homing_done: bool,
    pub shaft_moving_up: bool,
    pub general_error: bool,
    pub on_target_position: bool,
    pub motor_moving: bool,
    pub command_loaded: bool,
    pub errors: LssErrors,
}

/// Last known status of the brake servo.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ActuatorStatus {
    pub flags: LssFlags,

    /// Units: millimeters, or [`INVALID_POSITION_MM`]
    pub actual_position_mm: f64,

    /// Units: millimeters, or [`INVALID_POSITION_MM`]
    pub target_position_mm: f64,

    /// Fraction of the maximum moving current
    pub max_current_moving: f64,

    /// Fraction of the maximum holding current
    pub max_current_holding: f64,

    /// Number of replies received.
    pub num_replies: u64,
}

/// One decoded status reply.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LssStatusUpdate {
    pub flags: LssFlags,
    pub payload: LssPayload,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The attribute value a reply carries, chosen by its selector byte.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum LssPayload {
    ActualPosition(f64),
    TargetPosition(f64),
    DriveCurrent { moving: f64, holding: f64 },

    /// A reply to an attribute the software does not track.
    Other(u8),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ActuatorStatus {
    fn default() -> Self {
        Self {
            flags: LssFlags::default(),
            actual_position_mm: INVALID_POSITION_MM,
            target_position_mm: INVALID_POSITION_MM,
            max_current_moving: 0.0,
            max_current_holding: 0.0,
            num_replies: 0,
        }
    }
}

impl ActuatorStatus {
    /// Merge a reply into the status. Flags are always replaced, the payload
    /// only updates the attribute it carries.
    pub fn apply(&mut self, update: &LssStatusUpdate) {
        self.flags = update.flags;

        match update.payload {
            LssPayload::ActualPosition(mm) => self.actual_position_mm = mm,
            LssPayload::TargetPosition(mm) => self.target_position_mm = mm,
            LssPayload::DriveCurrent { moving, holding } => {
                self.max_current_moving = moving;
                self.max_current_holding = holding;
            }
            LssPayload::Other(_) => (),
        }

        self.num_replies += 1;
    }

    pub fn actual_position_valid(&self) -> bool {
        position_valid(self.actual_position_mm)
    }

    pub fn target_position_valid(&self) -> bool {
        position_valid(self.target_position_mm)
    }

    /// True once the servo has homed and reports no general error.
    pub fn ready_to_serve(&self) -> bool {
        self.flags.homing_done && !self.flags.general_error
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Decode a status reply, or `None` if the frame is not a complete reply.
pub fn decode_status(frame: &Frame) -> Option<LssStatusUpdate> {
    if !STATUS_LAYOUT.accepts(frame) {
        return None;
    }

    let flags = LssFlags {
        enable_moving: ENABLE_MOVING.read(frame)?,
        homing_done: HOMING_DONE.read(frame)?,
        shaft_moving_up: SHAFT_MOVING_UP.read(frame)?,
        general_error: GENERAL_ERROR.read(frame)?,
        on_target_position: ON_TARGET_POSITION.read(frame)?,
        motor_moving: MOTOR_MOVING.read(frame)?,
        command_loaded: COMMAND_LOADED.read(frame)?,
        errors: LssErrors {
            following: FOLLOWING_ERROR.read(frame)?,
            negative_limit: NEGATIVE_LIMIT.read(frame)?,
            positive_limit: POSITIVE_LIMIT.read(frame)?,
            stroke_reverse: STROKE_REVERSE.read(frame)?,
            stroke_forward: STROKE_FORWARD.read(frame)?,
            input: INPUT_ERROR.read(frame)?,
        },
    };

    let selector = SELECTOR.raw(frame)? as u8;
    let payload = match selector {
        attr::ACTUAL_POSITION => LssPayload::ActualPosition(decode_position(frame)?),
        attr::TARGET_POSITION => LssPayload::TargetPosition(decode_position(frame)?),
        attr::DRIVE_CURRENT => LssPayload::DriveCurrent {
            moving: CURRENT_MOVING.read(frame)?,
            holding: CURRENT_HOLDING.read(frame)?,
        },
        other => LssPayload::Other(other),
    };

    Some(LssStatusUpdate { flags, payload })
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn position_valid(mm: f64) -> bool {
    (MIN_POSITION_MM..=MAX_POSITION_MM).contains(&mm)
}

fn decode_position(frame: &Frame) -> Option<f64> {
    let mm = inc_to_mm(POSITION_INC.raw(frame)? as i32);

    if position_valid(mm) {
        Some(mm)
    } else {
        Some(INVALID_POSITION_MM)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn reply(bytes: [u8; 8]) -> Frame {
        Frame::from_array(REPLY_ID, bytes)
    }

    #[test]
    fn test_decode_flags() {
        let update = decode_status(&reply([0xa5, 0x00, 0x8b, 0, 0, 0, 0, 0])).unwrap();

        assert!(update.flags.enable_moving);
        assert!(update.flags.homing_done);
        assert!(!update.flags.shaft_moving_up);
        assert!(!update.flags.general_error);
        assert!(update.flags.on_target_position);
        assert!(update.flags.motor_moving);
        assert!(update.flags.command_loaded);
        assert!(update.flags.errors.positive_limit);
        assert!(update.flags.errors.stroke_forward);
        assert!(update.flags.errors.input);
        assert!(!update.flags.errors.following);
        assert_eq!(update.payload, LssPayload::Other(0));
    }

    #[test]
    fn test_decode_positions() {
        // 20000 increments is the full 75 mm stroke
        let full = decode_status(&reply([0, attr::ACTUAL_POSITION, 0, 0, 0x20, 0x4e, 0, 0]));
        assert_eq!(full.unwrap().payload, LssPayload::ActualPosition(75.0));

        let target = decode_status(&reply([0, attr::TARGET_POSITION, 0, 0, 0x40, 0x1f, 0, 0]));
        assert_eq!(target.unwrap().payload, LssPayload::TargetPosition(30.0));

        // Outside the stroke, and negative, give the sentinel
        let over = decode_status(&reply([0, attr::ACTUAL_POSITION, 0, 0, 0x21, 0x4e, 0, 0]));
        assert_eq!(
            over.unwrap().payload,
            LssPayload::ActualPosition(INVALID_POSITION_MM)
        );
        let negative = decode_status(&reply([0, attr::ACTUAL_POSITION, 0, 0, 0xff, 0xff, 0xff, 0xff]));
        assert_eq!(
            negative.unwrap().payload,
            LssPayload::ActualPosition(INVALID_POSITION_MM)
        );
    }

    #[test]
    fn test_decode_drive_current() {
        let update = decode_status(&reply([0, attr::DRIVE_CURRENT, 0, 0, 0xff, 0, 0x5a, 0])).unwrap();

        match update.payload {
            LssPayload::DriveCurrent { moving, holding } => {
                assert!((moving - 1.0).abs() < 1e-12);
                assert!((holding - 0.5).abs() < 1e-12);
            }
            p => panic!("Unexpected payload {:?}", p),
        }
    }

    #[test]
    fn test_apply_keeps_other_attributes() {
        let mut status = ActuatorStatus::default();
        assert!(!status.actual_position_valid());
        assert!(!status.ready_to_serve());

        status.apply(&decode_status(&reply([0x20, attr::ACTUAL_POSITION, 0, 0, 0x40, 0x1f, 0, 0])).unwrap());
        status.apply(&decode_status(&reply([0x20, attr::DRIVE_CURRENT, 0, 0, 0xff, 0, 0xb4, 0])).unwrap());

        assert_eq!(status.actual_position_mm, 30.0);
        assert!(status.actual_position_valid());
        assert!(!status.target_position_valid());
        assert!(status.ready_to_serve());
        assert_eq!(status.num_replies, 2);

        status.apply(&decode_status(&reply([0x28, 0, 0, 0, 0, 0, 0, 0])).unwrap());
        assert!(!status.ready_to_serve());
    }

    #[test]
    fn test_short_reply_rejected() {
        assert!(decode_status(&Frame::new(REPLY_ID, &[0x20, 0x0d, 0, 0, 0x20, 0x4e, 0]).unwrap()).is_none());
    }
}
