//! Receive-side dispatch of frames to registered handlers.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use std::sync::Arc;

use super::{BusId, Frame};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Receiver of frames arriving on a bus.
///
/// Handlers may be invoked from the adapter's own thread, so they must not
/// block and must be shareable.
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, bus: BusId, frame: &Frame);
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Fans incoming frames out to the handlers registered for their bus.
#[derive(Default)]
pub struct Dispatcher {
    handlers: Vec<(BusId, Arc<dyn FrameHandler>)>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for frames arriving on `bus`.
    pub fn register(&mut self, bus: BusId, handler: Arc<dyn FrameHandler>) {
        self.handlers.push((bus, handler));
    }

    /// Deliver a frame to every handler registered for `bus`. Returns the
    /// number of handlers invoked.
    pub fn dispatch(&self, bus: BusId, frame: &Frame) -> usize {
        let mut delivered = 0;

        for (_, handler) in self.handlers.iter().filter(|(b, _)| *b == bus) {
            handler.on_frame(bus, frame);
            delivered += 1;
        }

        if delivered == 0 {
            trace!("No handler for {:?} on the {:?} bus", frame, bus);
        }

        delivered
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<u32>>,
    }

    impl FrameHandler for Recorder {
        fn on_frame(&self, _bus: BusId, frame: &Frame) {
            self.frames.lock().unwrap().push(frame.id());
        }
    }

    #[test]
    fn test_dispatch_by_bus() {
        let vehicle = Arc::new(Recorder::default());
        let actuator = Arc::new(Recorder::default());

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(BusId::Vehicle, vehicle.clone());
        dispatcher.register(BusId::Actuator, actuator.clone());

        let frame = Frame::new(0x90, &[0; 8]).unwrap();
        assert_eq!(dispatcher.dispatch(BusId::Vehicle, &frame), 1);

        let reply = Frame::new(0x1bf, &[0; 8]).unwrap();
        assert_eq!(dispatcher.dispatch(BusId::Actuator, &reply), 1);

        assert_eq!(*vehicle.frames.lock().unwrap(), vec![0x90]);
        assert_eq!(*actuator.frames.lock().unwrap(), vec![0x1bf]);
    }
}
