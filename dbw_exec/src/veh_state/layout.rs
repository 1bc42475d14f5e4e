//! Declarative frame layouts.
//!
//! Every value the software reads out of a frame is described by a [`Field`]
//! or a [`Flag`]: where it sits, how its bytes are encoded and how it is scaled.
//! A [`FrameLayout`] groups the descriptors of one message with the minimum
//! length a frame must have before any of them are read.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::can::Frame;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Byte encoding of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    U8,
    U16Be,
    U16Le,
    I32Le,

    /// Lower 4 bits of one byte
    LowNibble,

    /// Upper 4 bits of one byte
    HighNibble,

    /// Two byte steering count, low byte first. A high byte of 128 or more
    /// marks a rightward (negative) count of `((128 - high) << 8) + low`.
    SteerCounts,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A scaled numeric field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub encoding: Encoding,
    pub scale: f64,
}

/// A single-bit flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Flag {
    pub name: &'static str,
    pub offset: usize,
    pub mask: u8,
}

/// Layout of one message.
#[derive(Clone, Copy, Debug)]
pub struct FrameLayout {
    pub id: u32,
    pub name: &'static str,
    pub min_len: usize,
    pub fields: &'static [Field],
    pub flags: &'static [Flag],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Encoding {
    /// Number of bytes occupied.
    pub const fn width(&self) -> usize {
        match self {
            Encoding::U8 | Encoding::LowNibble | Encoding::HighNibble => 1,
            Encoding::U16Be | Encoding::U16Le | Encoding::SteerCounts => 2,
            Encoding::I32Le => 4,
        }
    }
}

impl Field {
    pub const fn new(name: &'static str, offset: usize, encoding: Encoding, scale: f64) -> Self {
        Self {
            name,
            offset,
            encoding,
            scale,
        }
    }

    /// One past the last byte this field reads.
    pub const fn end(&self) -> usize {
        self.offset + self.encoding.width()
    }

    /// The unscaled value, or `None` if the frame is too short.
    pub fn raw(&self, frame: &Frame) -> Option<i64> {
        let o = self.offset;

        let raw = match self.encoding {
            Encoding::U8 => frame.byte(o)? as i64,
            Encoding::U16Be => frame.u16_be(o)? as i64,
            Encoding::U16Le => frame.u16_le(o)? as i64,
            Encoding::I32Le => frame.i32_le(o)? as i64,
            Encoding::LowNibble => (frame.byte(o)? & 0x0f) as i64,
            Encoding::HighNibble => (frame.byte(o)? >> 4) as i64,
            Encoding::SteerCounts => {
                let low = frame.byte(o)? as i64;
                let high = frame.byte(o + 1)? as i64;

                if high < 128 {
                    (high << 8) + low
                } else {
                    ((128 - high) << 8) + low
                }
            }
        };

        Some(raw)
    }

    /// The scaled value, or `None` if the frame is too short.
    pub fn read(&self, frame: &Frame) -> Option<f64> {
        self.raw(frame).map(|r| r as f64 * self.scale)
    }
}

impl Flag {
    pub const fn new(name: &'static str, offset: usize, mask: u8) -> Self {
        Self { name, offset, mask }
    }

    pub fn read(&self, frame: &Frame) -> Option<bool> {
        frame.byte(self.offset).map(|b| b & self.mask != 0)
    }
}

impl FrameLayout {
    /// True if the frame is long enough for every descriptor of this layout.
    pub fn accepts(&self, frame: &Frame) -> bool {
        frame.id() == self.id && frame.len() >= self.min_len
    }

    /// Number of bytes the descriptors actually need.
    pub fn required_len(&self) -> usize {
        let fields = self.fields.iter().map(Field::end);
        let flags = self.flags.iter().map(|f| f.offset + 1);

        fields.chain(flags).max().unwrap_or(0)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_steer_counts() {
        let field = Field::new("steer", 0, Encoding::SteerCounts, 1.0);

        let left = Frame::new(0xc2, &[0x10, 127]).unwrap();
        assert_eq!(field.raw(&left), Some((127 << 8) + 0x10));

        let right = Frame::new(0xc2, &[0x10, 128]).unwrap();
        assert_eq!(field.raw(&right), Some(0x10));

        let far_right = Frame::new(0xc2, &[0x00, 200]).unwrap();
        assert_eq!(field.raw(&far_right), Some(-72 * 256));
    }

    #[test]
    fn test_nibbles_and_flags() {
        let frame = Frame::new(0x300, &[0, 0, 0, 0x53]).unwrap();

        assert_eq!(Field::new("a", 3, Encoding::LowNibble, 1.0).raw(&frame), Some(3));
        assert_eq!(Field::new("t", 3, Encoding::HighNibble, 1.0).raw(&frame), Some(5));
        assert_eq!(Flag::new("f", 3, 0x40).read(&frame), Some(true));
        assert_eq!(Flag::new("f", 3, 0x80).read(&frame), Some(false));
        assert_eq!(Flag::new("f", 4, 0x01).read(&frame), None);
    }

    #[test]
    fn test_scaled_read() {
        let field = Field::new("kmh", 5, Encoding::U16Le, 0.0625);
        let frame = Frame::new(0x90, &[0, 0, 0, 0, 0, 0x40, 0x06]).unwrap();

        assert_eq!(field.read(&frame), Some(0x0640 as f64 * 0.0625));
        assert_eq!(field.end(), 7);
    }
}
