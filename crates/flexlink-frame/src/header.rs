//! Binary header layout.
//!
//! ```text
//! ┌──────────┬────┬────────┬──────┬──────┬─────────┬──────────┬──────┬────────┐
//! │ Sync (3) │ HL │ Opcode │ Type │ Port │ Pay.len │ Sequence │ Idle │ Time   │
//! │ AA 44 12 │ 1B │ 2B BE  │ 1B   │ 1B   │ 2B BE   │ 2B BE    │ 1B   │ status │
//! ├──────────┴────┴────────┴──────┴──────┴─────────┴──────────┴──────┴────────┤
//! │ Week (2) │ Milliseconds (4) │ Rx status (4) │ Reserved (2) │ Rx version (2)│
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Total frame size is `header_length + payload_length + TRAILER_SIZE`, read
//! from offsets 3 and 8..9. The reassembler and the serializer both go through
//! [`frame_size`] and the offsets below so the two can never disagree.

use bytes::{BufMut, BytesMut};

use crate::endian::read_be_at;
use crate::error::{FrameError, Result};

/// Sync marker opening every frame.
pub const SYNC: [u8; 3] = [0xAA, 0x44, 0x12];

/// Length of the fixed header block written by this crate.
pub const HEADER_LENGTH: usize = 28;

/// Trailer width counted by the frame-size formula.
pub const TRAILER_SIZE: usize = 4;

/// Width of the checksum at the front of the trailer.
pub const CHECKSUM_SIZE: usize = 2;

/// Largest payload the 16-bit length field can describe.
pub const MAX_PAYLOAD_LENGTH: usize = u16::MAX as usize;

pub const HEADER_LENGTH_OFFSET: usize = 3;
pub const OPCODE_OFFSET: usize = 4;
pub const MESSAGE_TYPE_OFFSET: usize = 6;
pub const PORT_ADDRESS_OFFSET: usize = 7;
pub const PAYLOAD_LENGTH_OFFSET: usize = 8;
pub const SEQUENCE_OFFSET: usize = 10;
pub const IDLE_TIME_OFFSET: usize = 12;
pub const TIME_STATUS_OFFSET: usize = 13;
pub const WEEK_OFFSET: usize = 14;
pub const MILLISECONDS_OFFSET: usize = 16;
pub const RECEIVER_STATUS_OFFSET: usize = 20;
pub const RESERVED_OFFSET: usize = 24;
pub const RECEIVER_VERSION_OFFSET: usize = 26;

/// Bytes needed before the frame size can be computed (through the payload-length field).
pub const SIZE_PREFIX_LEN: usize = PAYLOAD_LENGTH_OFFSET + 2;

/// Total wire size declared by a frame prefix.
///
/// `prefix` must hold at least [`SIZE_PREFIX_LEN`] bytes.
pub fn frame_size(prefix: &[u8]) -> Result<usize> {
    if prefix.len() < SIZE_PREFIX_LEN {
        return Err(FrameError::CodecRange {
            requested: SIZE_PREFIX_LEN,
            remaining: prefix.len(),
        });
    }
    let header_length = prefix[HEADER_LENGTH_OFFSET] as usize;
    let payload_length =
        u16::from_be_bytes([prefix[PAYLOAD_LENGTH_OFFSET], prefix[PAYLOAD_LENGTH_OFFSET + 1]]);
    Ok(header_length + payload_length as usize + TRAILER_SIZE)
}

/// Check the sync marker and header-length byte of a frame prefix.
pub fn validate_prefix(prefix: &[u8]) -> Result<()> {
    let found: [u8; 3] = match prefix.get(..SYNC.len()) {
        Some(sync) => [sync[0], sync[1], sync[2]],
        None => {
            return Err(FrameError::CodecRange {
                requested: SYNC.len(),
                remaining: prefix.len(),
            })
        }
    };
    if found != SYNC {
        return Err(FrameError::InvalidSync { found });
    }
    match prefix.get(HEADER_LENGTH_OFFSET) {
        Some(&hl) if (hl as usize) >= HEADER_LENGTH => Ok(()),
        Some(&hl) => Err(FrameError::MalformedHeader {
            header_length: hl as usize,
            min: HEADER_LENGTH,
        }),
        None => Err(FrameError::CodecRange {
            requested: HEADER_LENGTH_OFFSET + 1,
            remaining: prefix.len(),
        }),
    }
}

/// Message format carried in bits 5-6 of the message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MessageFormat {
    #[default]
    Binary = 0,
    Ascii = 1,
    AbbreviatedAscii = 2,
    Reserved = 3,
}

impl MessageFormat {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => MessageFormat::Binary,
            1 => MessageFormat::Ascii,
            2 => MessageFormat::AbbreviatedAscii,
            _ => MessageFormat::Reserved,
        }
    }
}

/// Message-type bitfield.
///
/// Bits 0-4 hold the measurement source, bits 5-6 the [`MessageFormat`] and
/// bit 7 marks a response (as opposed to an original message).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageType(u8);

impl MessageType {
    const SOURCE_MASK: u8 = 0b0001_1111;
    const FORMAT_SHIFT: u8 = 5;
    const FORMAT_MASK: u8 = 0b0110_0000;
    const RESPONSE_BIT: u8 = 0b1000_0000;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn source(self) -> u8 {
        self.0 & Self::SOURCE_MASK
    }

    pub fn format(self) -> MessageFormat {
        MessageFormat::from_bits((self.0 & Self::FORMAT_MASK) >> Self::FORMAT_SHIFT)
    }

    pub fn is_response(self) -> bool {
        self.0 & Self::RESPONSE_BIT != 0
    }

    pub fn with_source(self, source: u8) -> Self {
        Self((self.0 & !Self::SOURCE_MASK) | (source & Self::SOURCE_MASK))
    }

    pub fn with_format(self, format: MessageFormat) -> Self {
        Self((self.0 & !Self::FORMAT_MASK) | ((format as u8) << Self::FORMAT_SHIFT))
    }

    pub fn with_response(self, response: bool) -> Self {
        if response {
            Self(self.0 | Self::RESPONSE_BIT)
        } else {
            Self(self.0 & !Self::RESPONSE_BIT)
        }
    }
}

/// Decoded header block of a frame.
///
/// Time and receiver-status fields are only meaningful on frames received from
/// a device; outbound frames carry zeros there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub header_length: u8,
    pub opcode: u16,
    pub message_type: MessageType,
    pub port_address: u8,
    pub payload_length: u16,
    pub sequence: u16,
    pub idle_time: u8,
    pub time_status: u8,
    pub week: u16,
    pub milliseconds: u32,
    pub receiver_status: u32,
    pub reserved: u16,
    pub receiver_version: u16,
}

impl FrameHeader {
    /// Header for a new outbound message.
    pub fn outbound(opcode: u16, port_address: u8) -> Self {
        Self {
            header_length: HEADER_LENGTH as u8,
            opcode,
            port_address,
            ..Self::default()
        }
    }

    /// Parse the header at the front of `src` (which starts at the sync marker).
    pub fn parse(src: &[u8]) -> Result<Self> {
        validate_prefix(src)?;
        if src.len() < HEADER_LENGTH {
            return Err(FrameError::CodecRange {
                requested: HEADER_LENGTH,
                remaining: src.len(),
            });
        }

        Ok(Self {
            header_length: src[HEADER_LENGTH_OFFSET],
            opcode: read_be_at(src, OPCODE_OFFSET)?,
            message_type: MessageType::from_bits(src[MESSAGE_TYPE_OFFSET]),
            port_address: src[PORT_ADDRESS_OFFSET],
            payload_length: read_be_at(src, PAYLOAD_LENGTH_OFFSET)?,
            sequence: read_be_at(src, SEQUENCE_OFFSET)?,
            idle_time: src[IDLE_TIME_OFFSET],
            time_status: src[TIME_STATUS_OFFSET],
            week: read_be_at(src, WEEK_OFFSET)?,
            milliseconds: read_be_at(src, MILLISECONDS_OFFSET)?,
            receiver_status: read_be_at(src, RECEIVER_STATUS_OFFSET)?,
            reserved: read_be_at(src, RESERVED_OFFSET)?,
            receiver_version: read_be_at(src, RECEIVER_VERSION_OFFSET)?,
        })
    }

    /// Append the outbound header block for a payload of `payload_length` bytes.
    ///
    /// Always writes the fixed [`HEADER_LENGTH`]-byte block with the reserved
    /// time and version fields zeroed; the receiver-status field is ignored by
    /// devices and written as zero too.
    pub fn put_outbound(&self, payload_length: u16, dst: &mut BytesMut) {
        dst.reserve(HEADER_LENGTH);
        dst.put_slice(&SYNC);
        dst.put_u8(HEADER_LENGTH as u8);
        dst.put_u16(self.opcode);
        dst.put_u8(self.message_type.bits());
        dst.put_u8(self.port_address);
        dst.put_u16(payload_length);
        dst.put_u16(self.sequence);
        dst.put_u8(self.idle_time);
        dst.put_u8(0); // time status
        dst.put_u16(0); // week
        dst.put_u32(0); // milliseconds
        dst.put_u32(0); // receiver status
        dst.put_u16(0); // reserved
        dst.put_u16(0); // receiver version
    }

    /// Total wire size of the frame this header describes.
    pub fn frame_size(&self) -> usize {
        self.header_length as usize + self.payload_length as usize + TRAILER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_header_offsets() {
        let mut header = FrameHeader::outbound(0x012A, 20);
        header.sequence = 0xBEEF;
        header.idle_time = 7;
        header.message_type = MessageType::default().with_response(true);

        let mut buf = BytesMut::new();
        header.put_outbound(0x0102, &mut buf);

        assert_eq!(buf.len(), HEADER_LENGTH);
        assert_eq!(&buf[..3], &SYNC);
        assert_eq!(buf[HEADER_LENGTH_OFFSET], 28);
        assert_eq!(&buf[OPCODE_OFFSET..OPCODE_OFFSET + 2], &[0x01, 0x2A]);
        assert_eq!(buf[MESSAGE_TYPE_OFFSET], 0x80);
        assert_eq!(buf[PORT_ADDRESS_OFFSET], 20);
        assert_eq!(&buf[PAYLOAD_LENGTH_OFFSET..PAYLOAD_LENGTH_OFFSET + 2], &[0x01, 0x02]);
        assert_eq!(&buf[SEQUENCE_OFFSET..SEQUENCE_OFFSET + 2], &[0xBE, 0xEF]);
        assert_eq!(buf[IDLE_TIME_OFFSET], 7);
        assert!(buf[TIME_STATUS_OFFSET..].iter().all(|&b| b == 0));
    }

    #[test]
    fn frame_size_reads_both_length_fields() {
        let mut buf = BytesMut::new();
        FrameHeader::outbound(42, 0).put_outbound(100, &mut buf);
        assert_eq!(frame_size(&buf).unwrap(), 28 + 100 + 4);

        // A device-declared longer header shifts the total accordingly.
        buf[HEADER_LENGTH_OFFSET] = 32;
        assert_eq!(frame_size(&buf).unwrap(), 32 + 100 + 4);

        assert!(frame_size(&buf[..SIZE_PREFIX_LEN - 1]).is_err());
    }

    #[test]
    fn parse_roundtrips_outbound_fields() {
        let mut header = FrameHeader::outbound(42, 23);
        header.sequence = 9;
        header.idle_time = 100;
        header.message_type = MessageType::default()
            .with_source(3)
            .with_format(MessageFormat::Ascii);

        let mut buf = BytesMut::new();
        header.put_outbound(12, &mut buf);
        let parsed = FrameHeader::parse(&buf).unwrap();

        assert_eq!(parsed.opcode, 42);
        assert_eq!(parsed.port_address, 23);
        assert_eq!(parsed.payload_length, 12);
        assert_eq!(parsed.sequence, 9);
        assert_eq!(parsed.idle_time, 100);
        assert_eq!(parsed.message_type.source(), 3);
        assert_eq!(parsed.message_type.format(), MessageFormat::Ascii);
        assert!(!parsed.message_type.is_response());
        assert_eq!(parsed.frame_size(), 28 + 12 + 4);
    }

    #[test]
    fn parse_reads_device_time_fields() {
        let mut buf = BytesMut::new();
        FrameHeader::outbound(42, 0).put_outbound(0, &mut buf);
        buf[TIME_STATUS_OFFSET] = 180; // FINESTEERING
        buf[WEEK_OFFSET..WEEK_OFFSET + 2].copy_from_slice(&1819u16.to_be_bytes());
        buf[MILLISECONDS_OFFSET..MILLISECONDS_OFFSET + 4]
            .copy_from_slice(&340_033_000u32.to_be_bytes());
        buf[RECEIVER_STATUS_OFFSET..RECEIVER_STATUS_OFFSET + 4]
            .copy_from_slice(&0x0204_0000u32.to_be_bytes());

        let parsed = FrameHeader::parse(&buf).unwrap();
        assert_eq!(parsed.time_status, 180);
        assert_eq!(parsed.week, 1819);
        assert_eq!(parsed.milliseconds, 340_033_000);
        assert_eq!(parsed.receiver_status, 0x0204_0000);
    }

    #[test]
    fn rejects_bad_sync_and_short_header() {
        let mut buf = BytesMut::new();
        FrameHeader::outbound(1, 0).put_outbound(0, &mut buf);

        let mut bad_sync = buf.clone();
        bad_sync[1] = 0x45;
        assert!(matches!(
            FrameHeader::parse(&bad_sync),
            Err(FrameError::InvalidSync { .. })
        ));

        let mut short = buf.clone();
        short[HEADER_LENGTH_OFFSET] = 10;
        assert!(matches!(
            FrameHeader::parse(&short),
            Err(FrameError::MalformedHeader {
                header_length: 10,
                ..
            })
        ));
    }

    #[test]
    fn message_type_bits() {
        let mt = MessageType::from_bits(0b1010_0011);
        assert_eq!(mt.source(), 3);
        assert_eq!(mt.format(), MessageFormat::AbbreviatedAscii);
        assert!(mt.is_response());

        let cleared = mt.with_response(false).with_format(MessageFormat::Binary);
        assert_eq!(cleared.bits(), 0b0000_0011);
        assert_eq!(MessageType::default().bits(), 0);
    }
}
