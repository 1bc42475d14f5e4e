//! Two-phase requests to the servo.
//!
//! The servo only acts on a request after it has seen it twice: once with the
//! load-data bit set (stage) and once with it clear (commit). A
//! [`TwoPhaseRequest`] can only be put on the bus through
//! [`TwoPhaseRequest::commit`], which always sends both frames in order.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use comms_if::can::{BusId, Frame, Transport};
use log::{trace, warn};

// Internal
use super::{attr, LssError, REQUEST_ID};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// First byte of every request, the load-data bit is added to it.
const DATA_HEADER: u8 = 0x80;

/// Message type byte of a command.
const COMMAND_MSG_TYPE: u8 = 0x3b;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A get/set request, not yet sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "a request does nothing until it is committed"]
pub struct TwoPhaseRequest {
    get_attr: u8,
    set_attr: u8,
    value: i32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The two frames of a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Stage,
    Commit,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TwoPhaseRequest {
    /// Request the value of an attribute.
    pub fn get(attribute: u8) -> Self {
        Self {
            get_attr: attribute,
            set_attr: attr::NO_ATTRIBUTE,
            value: 0,
        }
    }

    /// Set an attribute to a value.
    pub fn set(attribute: u8, value: i32) -> Self {
        Self {
            get_attr: attr::NO_ATTRIBUTE,
            set_attr: attribute,
            value,
        }
    }

    /// Also ask for an attribute to be reported in the reply.
    pub fn reporting(self, attribute: u8) -> Self {
        Self {
            get_attr: attribute,
            ..self
        }
    }

    pub fn get_attr(&self) -> u8 {
        self.get_attr
    }

    pub fn set_attr(&self) -> u8 {
        self.set_attr
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    /// Send the stage frame then the commit frame.
    ///
    /// If the stage frame fails nothing reached the servo. If the commit frame
    /// fails the servo holds a staged but uncommitted request, reported as
    /// [`LssError::CommitFailed`].
    pub fn commit<T>(&self, transport: &mut T) -> Result<(), LssError>
    where
        T: Transport + ?Sized,
    {
        trace!(
            "LSS request get {:#04x} set {:#04x} value {}",
            self.get_attr,
            self.set_attr,
            self.value
        );

        transport
            .send(BusId::Actuator, &self.frame(Phase::Stage))
            .map_err(|e| {
                warn!("LSS stage of {:#04x} failed: {}", self.set_attr, e);
                LssError::StageFailed(e)
            })?;

        transport
            .send(BusId::Actuator, &self.frame(Phase::Commit))
            .map_err(|e| {
                warn!(
                    "LSS commit of {:#04x} failed, request left staged: {}",
                    self.set_attr, e
                );
                LssError::CommitFailed(e)
            })
    }

    fn frame(&self, phase: Phase) -> Frame {
        let load_data = match phase {
            Phase::Stage => 1,
            Phase::Commit => 0,
        };
        let v = self.value.to_le_bytes();

        Frame::from_array(
            REQUEST_ID,
            [
                DATA_HEADER + load_data,
                self.get_attr,
                COMMAND_MSG_TYPE,
                self.set_attr,
                v[0],
                v[1],
                v[2],
                v[3],
            ],
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::can::sim::SimTransport;

    #[test]
    fn test_commit_sends_stage_then_commit() {
        let mut tx = SimTransport::new();

        TwoPhaseRequest::set(attr::TARGET_POSITION, 8000)
            .commit(&mut tx)
            .unwrap();

        let frames = tx.sent_with_id(REQUEST_ID);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data(), &[0x81, 0x00, 0x3b, 0x06, 0x40, 0x1f, 0x00, 0x00]);
        assert_eq!(frames[1].data(), &[0x80, 0x00, 0x3b, 0x06, 0x40, 0x1f, 0x00, 0x00]);
        assert!(tx.sent().iter().all(|(bus, _)| *bus == BusId::Actuator));
    }

    #[test]
    fn test_get_and_reporting() {
        let get = TwoPhaseRequest::get(attr::ACTUAL_POSITION);
        assert_eq!(get.get_attr(), attr::ACTUAL_POSITION);
        assert_eq!(get.set_attr(), attr::NO_ATTRIBUTE);

        let set = TwoPhaseRequest::set(attr::DRIVE_CURRENT, -1).reporting(attr::ACTUAL_POSITION);
        assert_eq!(set.get_attr(), attr::ACTUAL_POSITION);

        let mut tx = SimTransport::new();
        set.commit(&mut tx).unwrap();
        assert_eq!(&tx.sent()[0].1.data()[4..], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn test_stage_failure_sends_nothing() {
        let mut tx = SimTransport::new();
        tx.fail_attempt(0);

        let result = TwoPhaseRequest::set(attr::BRAKE_CONTROL, attr::BRAKE_HOLD).commit(&mut tx);

        assert!(matches!(result, Err(LssError::StageFailed(_))));
        assert!(tx.sent().is_empty());
    }

    #[test]
    fn test_commit_failure_is_partial() {
        let mut tx = SimTransport::new();
        tx.fail_attempt(1);

        let result = TwoPhaseRequest::set(attr::BRAKE_CONTROL, attr::BRAKE_HOLD).commit(&mut tx);

        assert!(matches!(result, Err(LssError::CommitFailed(_))));
        assert_eq!(tx.sent().len(), 1);
        assert_eq!(tx.sent()[0].1.data()[0], 0x81);
    }
}
