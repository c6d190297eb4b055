//! Received CAN frame.

use core::fmt;

/// Maximum classic CAN payload.
pub const MAX_PAYLOAD: usize = 8;

/// A received CAN frame with a standard 11-bit (stored as 16-bit) identifier.
///
/// # Example
///
/// ```rust
/// use rs_motorboard::can::CanFrame;
///
/// let frame = CanFrame::new(0x0001, &[0x32, 0x00]).unwrap();
/// assert_eq!(frame.id(), 0x0001);
/// assert_eq!(frame.payload(), &[0x32, 0x00]);
///
/// assert!(CanFrame::new(0x0001, &[0; 9]).is_none());
/// ```
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    id: u16,
    data: [u8; MAX_PAYLOAD],
    len: u8,
}

impl CanFrame {
    /// Builds a frame from a payload slice. Returns `None` for payloads longer
    /// than 8 bytes.
    pub fn new(id: u16, payload: &[u8]) -> Option<Self> {
        if payload.len() > MAX_PAYLOAD {
            return None;
        }
        let mut data = [0u8; MAX_PAYLOAD];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            id,
            data,
            len: payload.len() as u8,
        })
    }

    /// Identifier.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Declared payload length (DLC).
    pub fn len(&self) -> u8 {
        self.len
    }

    /// Whether the frame carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The `len` valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }
}

impl fmt::Debug for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CanFrame {{ id: {:#06x}, data: {:02x?} }}", self.id, self.payload())
    }
}

/// Payload decoding failure inside a message handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The frame length does not match the table entry.
    PayloadLengthMismatch {
        /// Length declared in the dispatch table
        expected: u8,
        /// Length of the received frame
        actual: u8,
    },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::PayloadLengthMismatch { expected, actual } => write!(
                f,
                "payload length mismatch: expected {} bytes, got {}",
                expected, actual
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}
