use std::fmt;

/// Which side of the two-phase packet contract was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecState {
    /// A write was attempted on a sealed packet.
    Locked,
    /// A read was attempted on a packet that is still being built.
    Unlocked,
}

impl fmt::Display for CodecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecState::Locked => f.write_str("locked"),
            CodecState::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// Errors that can occur during frame reassembly and packet encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame does not start with the `AA 44 12` sync marker.
    #[error("invalid frame sync (expected AA 44 12, found {found:02X?})")]
    InvalidSync { found: [u8; 3] },

    /// The header-length byte is smaller than the fixed header block.
    #[error("malformed header (header length {header_length}, minimum {min})")]
    MalformedHeader { header_length: usize, min: usize },

    /// The declared frame size exceeds the reassembler capacity.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A buffer handed in as one frame does not match its declared size.
    #[error("frame length mismatch (declared {declared} bytes, got {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// Write on a sealed packet, or read on a packet still being built.
    #[error("packet is {0}")]
    CodecState(CodecState),

    /// Read past the declared payload length.
    #[error("read past end of payload ({requested} bytes requested, {remaining} remaining)")]
    CodecRange { requested: usize, remaining: usize },

    /// The checksum trailer does not match the header and payload.
    #[error("checksum mismatch (frame carries {expected:#06x}, computed {actual:#06x})")]
    ChecksumMismatch { expected: u16, actual: u16 },

    /// The payload does not fit the 16-bit payload-length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Text could not be encoded or decoded in the requested encoding.
    #[error("invalid {encoding} text: {reason}")]
    InvalidText {
        encoding: &'static str,
        reason: String,
    },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// True for malformed or oversized frames. These are fatal to a connection.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidSync { .. }
                | FrameError::MalformedHeader { .. }
                | FrameError::FrameTooLarge { .. }
                | FrameError::LengthMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
