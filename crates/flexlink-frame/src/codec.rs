use std::time::Duration;

use bytes::Bytes;

use crate::checksum::{checksum, trailer_checksum};
use crate::error::{FrameError, Result};
use crate::header::{
    frame_size, validate_prefix, FrameHeader, HEADER_LENGTH_OFFSET, OPCODE_OFFSET,
    PAYLOAD_LENGTH_OFFSET, SIZE_PREFIX_LEN, TRAILER_SIZE,
};

/// Default maximum frame size: 32 KiB, the receiver's own log buffer size.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 32 * 1024;

/// One complete frame as it appeared on the wire, header through trailer.
///
/// A `Frame` is only constructed once its byte length matches the size its
/// header declares; checksum verification is a separate step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
}

impl Frame {
    /// Wrap a buffer holding exactly one frame.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        validate_prefix(&bytes)?;
        let declared = frame_size(&bytes)?;
        if declared != bytes.len() {
            return Err(FrameError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Wrap a buffer the reassembler already sized from its own prefix.
    pub(crate) fn from_complete(bytes: Bytes) -> Self {
        debug_assert!(bytes.len() >= SIZE_PREFIX_LEN);
        Self { bytes }
    }

    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes([self.bytes[OPCODE_OFFSET], self.bytes[OPCODE_OFFSET + 1]])
    }

    pub fn header_length(&self) -> usize {
        self.bytes[HEADER_LENGTH_OFFSET] as usize
    }

    pub fn payload_length(&self) -> usize {
        u16::from_be_bytes([
            self.bytes[PAYLOAD_LENGTH_OFFSET],
            self.bytes[PAYLOAD_LENGTH_OFFSET + 1],
        ]) as usize
    }

    /// Decode the full header block.
    pub fn header(&self) -> Result<FrameHeader> {
        FrameHeader::parse(&self.bytes)
    }

    /// Payload bytes (shares the frame's buffer).
    pub fn payload(&self) -> Bytes {
        let start = self.header_length();
        self.bytes.slice(start..start + self.payload_length())
    }

    /// Checksum carried in the trailer.
    pub fn checksum(&self) -> u16 {
        let end = self.bytes.len();
        trailer_checksum(&self.bytes[end - TRAILER_SIZE..]).unwrap_or_default()
    }

    /// Checksum recomputed over header and payload.
    pub fn computed_checksum(&self) -> u16 {
        checksum(&self.bytes[..self.bytes.len() - TRAILER_SIZE])
    }

    /// Fail with `ChecksumMismatch` if the trailer does not match the content.
    pub fn verify_checksum(&self) -> Result<()> {
        let expected = self.checksum();
        let actual = self.computed_checksum();
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }

    /// The total wire size of this frame (header + payload + trailer).
    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Largest frame the reassembler will accept. Default: 32 KiB.
    pub max_frame_size: usize,
    /// Drop frames whose trailer does not match. Default: true.
    pub verify_checksum: bool,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            verify_checksum: true,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode;
    use crate::packet::Packet;
    use crate::port;

    fn wire(opcode: u16, payload: &[u8]) -> Bytes {
        Packet::with_payload(opcode, port::ETH1_ALL, payload)
            .serialize()
            .unwrap()
    }

    #[test]
    fn test_frame_accessors() {
        let bytes = wire(opcode::BESTPOS, b"hello");
        let frame = Frame::from_bytes(bytes.clone()).unwrap();

        assert_eq!(frame.opcode(), opcode::BESTPOS);
        assert_eq!(frame.header_length(), 28);
        assert_eq!(frame.payload_length(), 5);
        assert_eq!(frame.payload().as_ref(), b"hello");
        assert_eq!(frame.wire_size(), 28 + 5 + 4);
        assert_eq!(frame.as_bytes(), bytes.as_ref());
        assert!(frame.verify_checksum().is_ok());

        let header = frame.header().unwrap();
        assert_eq!(header.port_address, port::ETH1_ALL);
    }

    #[test]
    fn test_empty_payload() {
        let frame = Frame::from_bytes(wire(opcode::LOG, b"")).unwrap();
        assert!(frame.payload().is_empty());
        assert_eq!(frame.wire_size(), 32);
    }

    #[test]
    fn test_length_mismatch() {
        let mut bytes = wire(opcode::LOG, b"abc").to_vec();
        bytes.push(0);
        assert!(matches!(
            Frame::from_bytes(bytes),
            Err(FrameError::LengthMismatch {
                declared: 35,
                actual: 36
            })
        ));
    }

    #[test]
    fn test_invalid_sync() {
        let mut bytes = wire(opcode::LOG, b"abc").to_vec();
        bytes[0] = 0x00;
        assert!(matches!(
            Frame::from_bytes(bytes),
            Err(FrameError::InvalidSync { .. })
        ));
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = wire(opcode::BESTPOS, b"payload").to_vec();
        bytes[30] ^= 0xFF;
        let frame = Frame::from_bytes(bytes).unwrap();
        assert!(matches!(
            frame.verify_checksum(),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_default_config() {
        let cfg = FrameConfig::default();
        assert_eq!(cfg.max_frame_size, 0x8000);
        assert!(cfg.verify_checksum);
        assert!(cfg.read_timeout.is_none());
    }
}
