//! # CAN Module
//!
//! Frames are fixed-capacity (8 byte) payloads tagged with a numeric
//! identifier. The software talks to two buses: the vehicle bus, carrying
//! telemetry from the car's own ECUs, and the actuator bus, carrying commands to
//! and replies from the brake servo and the analog output unit.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod dispatch;
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use dispatch::{Dispatcher, FrameHandler};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of payload bytes in a classic CAN frame.
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Largest valid 29-bit identifier.
pub const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single CAN frame.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    id: u32,
    len: u8,
    data: [u8; MAX_PAYLOAD_LEN],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The physical buses the software is attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusId {
    /// The vehicle's own bus, telemetry only.
    Vehicle,

    /// The bus shared by the brake servo and the analog output unit.
    Actuator,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload of {0} bytes exceeds the maximum of {} bytes", MAX_PAYLOAD_LEN)]
    PayloadTooLong(usize),

    #[error("Identifier {0:#x} is outside the 29-bit range")]
    InvalidId(u32),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("The {0:?} bus is not available")]
    BusUnavailable(BusId),

    #[error("Sending frame {id:#x} on the {bus:?} bus failed: {reason}")]
    SendFailed {
        bus: BusId,
        id: u32,
        reason: String,
    },
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Outbound side of a bus adapter.
///
/// Sends are fire-and-forget: `Ok(())` means the adapter accepted the frame,
/// not that any node acknowledged it.
pub trait Transport {
    fn send(&mut self, bus: BusId, frame: &Frame) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, bus: BusId, frame: &Frame) -> Result<(), TransportError> {
        (**self).send(bus, frame)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, bus: BusId, frame: &Frame) -> Result<(), TransportError> {
        (**self).send(bus, frame)
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Frame {
    /// Build a frame from an identifier and up to 8 payload bytes.
    pub fn new(id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        if id > MAX_EXTENDED_ID {
            return Err(FrameError::InvalidId(id));
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong(payload.len()));
        }

        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// Build a frame with a full 8 byte payload.
    ///
    /// Infallible for any identifier in the 29-bit range, larger identifiers
    /// are masked.
    pub fn from_array(id: u32, data: [u8; MAX_PAYLOAD_LEN]) -> Self {
        Self {
            id: id & MAX_EXTENDED_ID,
            len: MAX_PAYLOAD_LEN as u8,
            data,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// The valid payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The byte at `offset`, or `None` if the frame is too short.
    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.data().get(offset).copied()
    }

    /// Big-endian `u16` starting at `offset`.
    pub fn u16_be(&self, offset: usize) -> Option<u16> {
        self.data().get(offset..offset + 2).map(BigEndian::read_u16)
    }

    /// Little-endian `u16` starting at `offset`.
    pub fn u16_le(&self, offset: usize) -> Option<u16> {
        self.data().get(offset..offset + 2).map(LittleEndian::read_u16)
    }

    /// Little-endian `i32` starting at `offset`.
    pub fn i32_le(&self, offset: usize) -> Option<i32> {
        self.data().get(offset..offset + 4).map(LittleEndian::read_i32)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:#05x}, {:02x?})", self.id, self.data())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(0x35, &[0x12, 0x34]).unwrap();
        assert_eq!(frame.id(), 0x35);
        assert_eq!(frame.data(), &[0x12, 0x34]);
        assert_eq!(frame.len(), 2);

        assert_eq!(
            Frame::new(0x35, &[0; 9]),
            Err(FrameError::PayloadTooLong(9))
        );
        assert_eq!(
            Frame::new(0x2000_0000, &[]),
            Err(FrameError::InvalidId(0x2000_0000))
        );
    }

    #[test]
    fn test_frame_readers() {
        let frame = Frame::new(0x1bf, &[0x01, 0x02, 0x03, 0x04, 0x20, 0x4e, 0x00, 0x00]).unwrap();

        assert_eq!(frame.byte(7), Some(0x00));
        assert_eq!(frame.u16_be(0), Some(0x0102));
        assert_eq!(frame.u16_le(0), Some(0x0201));
        assert_eq!(frame.i32_le(4), Some(20000));

        // Reads past the valid length are refused even though the backing
        // array is larger
        let short = Frame::new(0x90, &[0x01, 0x02, 0x03]).unwrap();
        assert_eq!(short.byte(3), None);
        assert_eq!(short.u16_be(2), None);
        assert_eq!(short.i32_le(0), None);
    }
}
