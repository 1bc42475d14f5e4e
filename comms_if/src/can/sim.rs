//! # Simulated transport
//!
//! An in-memory [`Transport`] which records every frame it is asked to send
//! and can be told to fail chosen sends. Inbound frames can be injected into a
//! [`Dispatcher`] as if they had arrived from the bus.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{trace, warn};
use std::collections::HashSet;
use std::sync::Arc;

use super::{BusId, Dispatcher, Frame, Transport, TransportError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Recording transport for simulation and tests.
#[derive(Default)]
pub struct SimTransport {
    sent: Vec<(BusId, Frame)>,

    /// Number of send attempts so far, including failed ones.
    attempts: usize,

    /// Attempt indices (zero based) which will fail.
    failing_attempts: HashSet<usize>,

    /// Buses on which every send fails.
    down_buses: HashSet<BusId>,

    dispatcher: Option<Arc<Dispatcher>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport which delivers injected frames to `dispatcher`.
    pub fn with_dispatcher(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher: Some(dispatcher),
            ..Self::default()
        }
    }

    /// Make the `attempt`-th send from now (zero based) fail.
    pub fn fail_attempt(&mut self, attempt: usize) {
        self.failing_attempts.insert(self.attempts + attempt);
    }

    /// Make every send on `bus` fail until [`SimTransport::bring_up`] is
    /// called.
    pub fn take_down(&mut self, bus: BusId) {
        self.down_buses.insert(bus);
    }

    pub fn bring_up(&mut self, bus: BusId) {
        self.down_buses.remove(&bus);
    }

    /// Frames successfully sent, in order.
    pub fn sent(&self) -> &[(BusId, Frame)] {
        &self.sent
    }

    /// Frames successfully sent with the given identifier.
    pub fn sent_with_id(&self, id: u32) -> Vec<Frame> {
        self.sent
            .iter()
            .filter(|(_, f)| f.id() == id)
            .map(|(_, f)| *f)
            .collect()
    }

    /// Remove and return all recorded frames.
    pub fn take_sent(&mut self) -> Vec<(BusId, Frame)> {
        std::mem::take(&mut self.sent)
    }

    /// Deliver a frame to the attached dispatcher as if it had been received
    /// on `bus`. Returns the number of handlers invoked.
    pub fn inject(&self, bus: BusId, frame: &Frame) -> usize {
        match &self.dispatcher {
            Some(d) => d.dispatch(bus, frame),
            None => {
                warn!("Frame {:?} injected into a transport with no dispatcher", frame);
                0
            }
        }
    }
}

impl Transport for SimTransport {
    fn send(&mut self, bus: BusId, frame: &Frame) -> Result<(), TransportError> {
        let attempt = self.attempts;
        self.attempts += 1;

        if self.down_buses.contains(&bus) {
            return Err(TransportError::BusUnavailable(bus));
        }

        if self.failing_attempts.remove(&attempt) {
            return Err(TransportError::SendFailed {
                bus,
                id: frame.id(),
                reason: format!("injected failure on attempt {}", attempt),
            });
        }

        trace!("{:?} -> {:?}", frame, bus);
        self.sent.push((bus, *frame));

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_records_and_fails() {
        let mut tx = SimTransport::new();
        let frame = Frame::new(0x35, &[0x00, 0x08]).unwrap();

        tx.fail_attempt(1);

        assert!(tx.send(BusId::Actuator, &frame).is_ok());
        assert!(matches!(
            tx.send(BusId::Actuator, &frame),
            Err(TransportError::SendFailed { id: 0x35, .. })
        ));
        assert!(tx.send(BusId::Actuator, &frame).is_ok());
        assert_eq!(tx.sent().len(), 2);

        tx.take_down(BusId::Vehicle);
        assert_eq!(
            tx.send(BusId::Vehicle, &frame),
            Err(TransportError::BusUnavailable(BusId::Vehicle))
        );
        tx.bring_up(BusId::Vehicle);
        assert!(tx.send(BusId::Vehicle, &frame).is_ok());

        assert_eq!(tx.sent_with_id(0x35).len(), 3);
        assert_eq!(tx.take_sent().len(), 3);
        assert!(tx.sent().is_empty());
    }
}
