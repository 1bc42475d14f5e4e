//! # Linear Servo System (brake actuator)
//!
//! The brake pedal is pushed by a linear servo with a 75 mm stroke. Every
//! operation is a sequence of [`TwoPhaseRequest`]s on the actuator bus; the
//! servo answers on [`REPLY_ID`] with a status frame decoded by
//! [`decode_status`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod request;
mod status;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::can::{BusId, Frame, FrameError, Transport, TransportError};
use log::{debug, info, warn};

// Internal
pub use request::{Phase, TwoPhaseRequest};
pub use status::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Identifier of requests to the servo.
pub const REQUEST_ID: u32 = 0x23f;

/// Identifier of the servo's replies.
pub const REPLY_ID: u32 = 0x1bf;

/// Identifier of the network management frame.
pub const NMT_ID: u32 = 0x000;

/// Network management "start remote node" command.
const NMT_START: [u8; 2] = [0x01, 0x00];

pub const MIN_POSITION_MM: f64 = 0.0;
pub const MAX_POSITION_MM: f64 = 75.0;

/// Increments over the full stroke.
pub const MAX_POSITION_INC: i32 = 20000;

/// Memory addresses of the soft position limits.
const POSITIVE_LIMIT_ADDR: i32 = 0x7802;
const NEGATIVE_LIMIT_ADDR: i32 = 0x7803;

/// Attribute identifiers and their special values.
pub mod attr {
    pub const NO_ATTRIBUTE: u8 = 0x00;
    pub const OPERATING_MODE: u8 = 0x03;
    pub const TARGET_POSITION: u8 = 0x06;
    pub const TARGET_VELOCITY: u8 = 0x07;
    pub const TARGET_ACCEL: u8 = 0x08;
    pub const ACTUAL_POSITION: u8 = 0x0d;
    pub const ACTUAL_VELOCITY: u8 = 0x0e;
    pub const DRIVE_CURRENT: u8 = 0x19;
    pub const IN_POSITION_WIDTH: u8 = 0x87;
    pub const DEST_ADDR_DATA_WRITE: u8 = 0x88;
    pub const WRITE_DATA_TO_MEM: u8 = 0x89;
    pub const ACTUATOR_STATUS: u8 = 0x8a;
    pub const EXEC_HOMING: u8 = 0x8e;
    pub const BRAKE_CONTROL: u8 = 0x8f;
    pub const SAVE_EEPROM: u8 = 0x90;
    pub const RESET: u8 = 0x92;
    pub const JOG: u8 = 0x93;
    pub const EXEC_POSITIONING: u8 = 0x94;

    /// Full scale of the moving current in a drive current value.
    pub const MAX_CURRENT_MOVING: u8 = 0xff;

    /// Full scale of the holding current in a drive current value.
    pub const MAX_CURRENT_HOLDING: u8 = 0xb4;

    pub const MAX_HOMING: i32 = 0x0a;
    pub const MIN_HOMING: i32 = 0x09;

    pub const BRAKE_HOLD: i32 = 0x00;
    pub const BRAKE_RELEASE: i32 = 0x02;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Driver for the brake servo.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lss;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LssError {
    #[error("Position limits [{min}, {max}] mm are outside the [0, 75] mm stroke")]
    PositionOutOfRange { min: f64, max: f64 },

    #[error("Drive current fractions (moving {moving}, holding {holding}) must be in [0, 1]")]
    CurrentOutOfRange { moving: f64, holding: f64 },

    #[error("Stage frame could not be sent, nothing was committed: {0}")]
    StageFailed(TransportError),

    #[error("Commit frame could not be sent, the request is staged but not committed: {0}")]
    CommitFailed(TransportError),

    #[error("Could not send the network start frame: {0}")]
    NmtFailed(TransportError),

    #[error("Could not build frame: {0}")]
    FrameError(#[from] FrameError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LssError {
    /// True if the request was valid but a frame could not be sent.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LssError::StageFailed(_) | LssError::CommitFailed(_) | LssError::NmtFailed(_)
        )
    }
}

impl Lss {
    pub fn new() -> Self {
        Self
    }

    /// Start the servo node, write the full-stroke soft limits and ask for the
    /// current position and drive current.
    pub fn init<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        let nmt = Frame::new(NMT_ID, &NMT_START)?;
        tx.send(BusId::Actuator, &nmt).map_err(LssError::NmtFailed)?;

        self.save_position_limits(tx, MIN_POSITION_MM, MAX_POSITION_MM)?;

        self.get_actual_position(tx)?;
        self.get_commanded_position(tx)?;
        self.get_max_drive_current(tx)?;

        info!("LSS initialised");

        Ok(())
    }

    /// Write the soft position limits into the servo's memory.
    pub fn save_position_limits<T>(&self, tx: &mut T, min_mm: f64, max_mm: f64) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        let stroke = MIN_POSITION_MM..=MAX_POSITION_MM;
        if !stroke.contains(&min_mm) || !stroke.contains(&max_mm) || min_mm > max_mm {
            warn!("Rejected LSS position limits [{}, {}] mm", min_mm, max_mm);
            return Err(LssError::PositionOutOfRange {
                min: min_mm,
                max: max_mm,
            });
        }

        TwoPhaseRequest::set(attr::DEST_ADDR_DATA_WRITE, POSITIVE_LIMIT_ADDR).commit(tx)?;
        TwoPhaseRequest::set(attr::WRITE_DATA_TO_MEM, mm_to_inc(max_mm)).commit(tx)?;
        TwoPhaseRequest::set(attr::DEST_ADDR_DATA_WRITE, NEGATIVE_LIMIT_ADDR).commit(tx)?;
        TwoPhaseRequest::set(attr::WRITE_DATA_TO_MEM, mm_to_inc(min_mm)).commit(tx)?;

        debug!("LSS position limits set to [{}, {}] mm", min_mm, max_mm);

        Ok(())
    }

    /// Command a brake position. The position is clamped into the stroke and
    /// the clamped value returned.
    pub fn set_target_position<T>(&self, tx: &mut T, position_mm: f64) -> Result<f64, LssError>
    where
        T: Transport + ?Sized,
    {
        let position_mm = clamp_position(position_mm);

        TwoPhaseRequest::set(attr::TARGET_POSITION, mm_to_inc(position_mm)).commit(tx)?;

        Ok(position_mm)
    }

    /// Ask for the commanded position, reported as
    /// [`LssPayload::TargetPosition`].
    pub fn get_commanded_position<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        TwoPhaseRequest::get(attr::TARGET_POSITION).commit(tx)
    }

    /// Ask for the actual position, reported as
    /// [`LssPayload::ActualPosition`].
    pub fn get_actual_position<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        TwoPhaseRequest::get(attr::ACTUAL_POSITION).commit(tx)
    }

    /// Set the maximum moving and holding currents as fractions of full
    /// scale. The reply reports the actual position.
    pub fn set_max_drive_current<T>(&self, tx: &mut T, moving: f64, holding: f64) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        let valid = |f: f64| (0.0..=1.0).contains(&f);
        if !valid(moving) || !valid(holding) {
            warn!(
                "Rejected LSS drive current (moving {}, holding {})",
                moving, holding
            );
            return Err(LssError::CurrentOutOfRange { moving, holding });
        }

        TwoPhaseRequest::set(attr::DRIVE_CURRENT, drive_current_value(moving, holding))
            .reporting(attr::ACTUAL_POSITION)
            .commit(tx)
    }

    /// Ask for the drive current, reported as [`LssPayload::DriveCurrent`].
    pub fn get_max_drive_current<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        TwoPhaseRequest::get(attr::DRIVE_CURRENT).commit(tx)
    }

    /// Home against the fully extended end of the stroke.
    pub fn exec_max_homing<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        TwoPhaseRequest::set(attr::EXEC_HOMING, attr::MAX_HOMING).commit(tx)
    }

    /// Home against the retracted end of the stroke.
    pub fn exec_min_homing<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        TwoPhaseRequest::set(attr::EXEC_HOMING, attr::MIN_HOMING).commit(tx)
    }

    pub fn set_brake_hold<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        TwoPhaseRequest::set(attr::BRAKE_CONTROL, attr::BRAKE_HOLD).commit(tx)
    }

    pub fn set_brake_release<T>(&self, tx: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        TwoPhaseRequest::set(attr::BRAKE_CONTROL, attr::BRAKE_RELEASE).commit(tx)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert millimeters to servo increments, to the nearest increment.
pub fn mm_to_inc(mm: f64) -> i32 {
    (mm * MAX_POSITION_INC as f64 / MAX_POSITION_MM).round() as i32
}

/// Convert servo increments to millimeters.
pub fn inc_to_mm(inc: i32) -> f64 {
    inc as f64 * MAX_POSITION_MM / MAX_POSITION_INC as f64
}

/// Clamp a position into the stroke of the servo.
pub fn clamp_position(mm: f64) -> f64 {
    util::maths::clamp(&mm, &MIN_POSITION_MM, &MAX_POSITION_MM)
}

/// Pack moving and holding current fractions into a drive current value.
///
/// The holding current occupies bits 16..24, the moving current bits 0..8.
pub fn drive_current_value(moving: f64, holding: f64) -> i32 {
    let holding = (attr::MAX_CURRENT_HOLDING as f64 * holding) as i32;
    let moving = (attr::MAX_CURRENT_MOVING as f64 * moving) as i32;

    (holding << 16) + moving
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::can::sim::SimTransport;

    /// The (set attribute, value) of each committed request, checking every
    /// request was sent as a stage/commit pair.
    fn committed(tx: &SimTransport) -> Vec<(u8, i32)> {
        let frames = tx.sent_with_id(REQUEST_ID);
        assert_eq!(frames.len() % 2, 0);

        frames
            .chunks(2)
            .map(|pair| {
                assert_eq!(pair[0].data()[0], 0x81);
                assert_eq!(pair[1].data()[0], 0x80);
                assert_eq!(pair[0].data()[1..], pair[1].data()[1..]);

                let d = pair[1].data();
                (d[3], i32::from_le_bytes([d[4], d[5], d[6], d[7]]))
            })
            .collect()
    }

    #[test]
    fn test_mm_inc_conversion() {
        assert_eq!(mm_to_inc(75.0), 20000);
        assert_eq!(mm_to_inc(0.0), 0);
        assert_eq!(inc_to_mm(20000), 75.0);

        let mut mm = 0.0;
        while mm <= 75.0 {
            assert!((inc_to_mm(mm_to_inc(mm)) - mm).abs() < 0.00375);
            mm += 0.0137;
        }
    }

    #[test]
    fn test_save_position_limits() {
        let lss = Lss::new();
        let mut tx = SimTransport::new();

        lss.save_position_limits(&mut tx, 5.0, 70.0).unwrap();

        assert_eq!(
            committed(&tx),
            vec![
                (attr::DEST_ADDR_DATA_WRITE, 0x7802),
                (attr::WRITE_DATA_TO_MEM, mm_to_inc(70.0)),
                (attr::DEST_ADDR_DATA_WRITE, 0x7803),
                (attr::WRITE_DATA_TO_MEM, mm_to_inc(5.0)),
            ]
        );
    }

    #[test]
    fn test_invalid_limits_send_nothing() {
        let lss = Lss::new();
        let mut tx = SimTransport::new();

        assert!(matches!(
            lss.save_position_limits(&mut tx, -1.0, 70.0),
            Err(LssError::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            lss.save_position_limits(&mut tx, 0.0, 75.1),
            Err(LssError::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            lss.save_position_limits(&mut tx, 50.0, 10.0),
            Err(LssError::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            lss.save_position_limits(&mut tx, 0.0, f64::NAN),
            Err(LssError::PositionOutOfRange { .. })
        ));
        assert!(matches!(
            lss.save_position_limits(&mut tx, f64::NAN, 75.0),
            Err(LssError::PositionOutOfRange { .. })
        ));
        assert!(tx.sent().is_empty());
    }

    #[test]
    fn test_set_target_position_clamps() {
        let lss = Lss::new();
        let mut tx = SimTransport::new();

        assert_eq!(lss.set_target_position(&mut tx, 90.0).unwrap(), 75.0);
        assert_eq!(lss.set_target_position(&mut tx, -3.0).unwrap(), 0.0);
        assert_eq!(lss.set_target_position(&mut tx, 30.0).unwrap(), 30.0);

        assert_eq!(
            committed(&tx),
            vec![
                (attr::TARGET_POSITION, 20000),
                (attr::TARGET_POSITION, 0),
                (attr::TARGET_POSITION, 8000),
            ]
        );
    }

    #[test]
    fn test_drive_current() {
        assert_eq!(drive_current_value(1.0, 1.0), (0xb4 << 16) + 0xff);
        assert_eq!(drive_current_value(0.5, 0.5), (90 << 16) + 127);

        let lss = Lss::new();
        let mut tx = SimTransport::new();

        lss.set_max_drive_current(&mut tx, 1.0, 0.5).unwrap();
        assert!(matches!(
            lss.set_max_drive_current(&mut tx, 1.2, 0.5),
            Err(LssError::CurrentOutOfRange { .. })
        ));
        assert!(matches!(
            lss.set_max_drive_current(&mut tx, 0.5, -0.1),
            Err(LssError::CurrentOutOfRange { .. })
        ));

        let frames = tx.sent_with_id(REQUEST_ID);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].data()[1], attr::ACTUAL_POSITION);
        assert_eq!(frames[1].data()[3], attr::DRIVE_CURRENT);
    }

    #[test]
    fn test_commands() {
        let lss = Lss::new();
        let mut tx = SimTransport::new();

        lss.exec_max_homing(&mut tx).unwrap();
        lss.exec_min_homing(&mut tx).unwrap();
        lss.set_brake_hold(&mut tx).unwrap();
        lss.set_brake_release(&mut tx).unwrap();

        assert_eq!(
            committed(&tx),
            vec![
                (attr::EXEC_HOMING, attr::MAX_HOMING),
                (attr::EXEC_HOMING, attr::MIN_HOMING),
                (attr::BRAKE_CONTROL, attr::BRAKE_HOLD),
                (attr::BRAKE_CONTROL, attr::BRAKE_RELEASE),
            ]
        );
    }

    #[test]
    fn test_init_sequence() {
        let lss = Lss::new();
        let mut tx = SimTransport::new();

        lss.init(&mut tx).unwrap();

        let sent = tx.sent();
        assert_eq!(sent[0].1.id(), NMT_ID);
        assert_eq!(sent[0].1.data(), &[0x01, 0x00]);

        // 4 limit writes and 3 queries
        assert_eq!(tx.sent_with_id(REQUEST_ID).len(), 14);

        let gets: Vec<u8> = tx
            .sent_with_id(REQUEST_ID)
            .iter()
            .skip(8)
            .step_by(2)
            .map(|f| f.data()[1])
            .collect();
        assert_eq!(
            gets,
            vec![attr::ACTUAL_POSITION, attr::TARGET_POSITION, attr::DRIVE_CURRENT]
        );
    }

    #[test]
    fn test_init_stops_on_failure() {
        let lss = Lss::new();
        let mut tx = SimTransport::new();

        // The commit of the first limit write fails
        tx.fail_attempt(2);

        assert!(matches!(lss.init(&mut tx), Err(LssError::CommitFailed(_))));
        assert_eq!(tx.sent().len(), 2);
    }
}
