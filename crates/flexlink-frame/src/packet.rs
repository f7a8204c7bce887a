//! In-memory message with a two-phase lifecycle.
//!
//! A [`Packet`] starts out *building*: fields are appended to its payload and
//! header fields may be changed, and [`Packet::serialize`] synthesises the
//! header and checksum trailer on every call. Sealing freezes the payload and
//! switches the packet to *reading*: typed reads advance a cursor through the
//! payload and nothing can be written any more. Inbound packets are sealed
//! from the start.
//!
//! Writes on a sealed packet fail with [`CodecState::Locked`]; reads on a
//! packet that is still building fail with [`CodecState::Unlocked`].

use bytes::{Bytes, BytesMut};

use crate::checksum::{checksum, put_trailer};
use crate::codec::Frame;
use crate::endian::{read_be, write_be, Scalar};
use crate::error::{CodecState, FrameError, Result};
use crate::header::{FrameHeader, MessageType, HEADER_LENGTH, MAX_PAYLOAD_LENGTH, TRAILER_SIZE};

/// Encoding of length-prefixed text fields.
///
/// The length prefix is always the encoded size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// 7-bit ASCII; anything else is rejected.
    Ascii,
    Utf8,
    /// UTF-16, big-endian code units.
    Utf16,
}

impl TextEncoding {
    fn name(self) -> &'static str {
        match self {
            TextEncoding::Ascii => "ascii",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16 => "utf-16",
        }
    }

    fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Ascii if !text.is_ascii() => Err(FrameError::InvalidText {
                encoding: self.name(),
                reason: "non-ASCII character".to_string(),
            }),
            TextEncoding::Ascii | TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Utf16 => Ok(text
                .encode_utf16()
                .flat_map(|unit| unit.to_be_bytes())
                .collect()),
        }
    }

    fn decode(self, raw: &[u8]) -> Result<String> {
        let invalid = |reason: String| FrameError::InvalidText {
            encoding: self.name(),
            reason,
        };
        match self {
            TextEncoding::Ascii if !raw.is_ascii() => {
                Err(invalid("non-ASCII byte".to_string()))
            }
            TextEncoding::Ascii | TextEncoding::Utf8 => {
                String::from_utf8(raw.to_vec()).map_err(|e| invalid(e.to_string()))
            }
            TextEncoding::Utf16 => {
                if raw.len() % 2 != 0 {
                    return Err(invalid(format!("odd byte length {}", raw.len())));
                }
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|e| invalid(e.to_string()))
            }
        }
    }
}

#[derive(Debug)]
enum PacketState {
    Building { payload: BytesMut },
    Sealed { payload: Bytes, cursor: usize },
}

/// One protocol message.
///
/// `&mut self` on every mutating or cursor-moving operation gives each
/// instance exclusive access; share a packet across threads by moving it.
#[derive(Debug)]
pub struct Packet {
    header: FrameHeader,
    state: PacketState,
    trace: Option<Vec<String>>,
}

impl Packet {
    /// Empty outbound packet for `opcode`, addressed to `port_address`.
    pub fn new(opcode: u16, port_address: u8) -> Self {
        Self {
            header: FrameHeader::outbound(opcode, port_address),
            state: PacketState::Building {
                payload: BytesMut::new(),
            },
            trace: None,
        }
    }

    /// Outbound packet pre-populated with `payload`.
    pub fn with_payload(opcode: u16, port_address: u8, payload: &[u8]) -> Self {
        Self {
            header: FrameHeader::outbound(opcode, port_address),
            state: PacketState::Building {
                payload: BytesMut::from(payload),
            },
            trace: None,
        }
    }

    /// Sealed packet over a reassembled frame. The payload is shared, not copied.
    ///
    /// The checksum is not checked here; see [`Frame::verify_checksum`].
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        Ok(Self {
            header: frame.header()?,
            state: PacketState::Sealed {
                payload: frame.payload(),
                cursor: 0,
            },
            trace: None,
        })
    }

    /// Decode one complete frame, verifying its checksum.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let frame = Frame::from_bytes(Bytes::copy_from_slice(bytes))?;
        frame.verify_checksum()?;
        Self::from_frame(&frame)
    }

    /// Header fields. On a building packet `payload_length` is only filled in by [`seal`](Self::seal).
    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn opcode(&self) -> u16 {
        self.header.opcode
    }

    pub fn message_type(&self) -> MessageType {
        self.header.message_type
    }

    pub fn port_address(&self) -> u8 {
        self.header.port_address
    }

    pub fn sequence(&self) -> u16 {
        self.header.sequence
    }

    pub fn idle_time(&self) -> u8 {
        self.header.idle_time
    }

    pub fn set_opcode(&mut self, opcode: u16) -> Result<()> {
        self.ensure_building()?;
        self.header.opcode = opcode;
        Ok(())
    }

    pub fn set_message_type(&mut self, message_type: MessageType) -> Result<()> {
        self.ensure_building()?;
        self.header.message_type = message_type;
        Ok(())
    }

    pub fn set_port_address(&mut self, port_address: u8) -> Result<()> {
        self.ensure_building()?;
        self.header.port_address = port_address;
        Ok(())
    }

    pub fn set_sequence(&mut self, sequence: u16) -> Result<()> {
        self.ensure_building()?;
        self.header.sequence = sequence;
        Ok(())
    }

    pub fn set_idle_time(&mut self, idle_time: u8) -> Result<()> {
        self.ensure_building()?;
        self.header.idle_time = idle_time;
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.state, PacketState::Sealed { .. })
    }

    /// Freeze the payload and switch to reading. Sealing twice is a no-op.
    ///
    /// A payload too long for the header's length field is rejected and the
    /// packet stays building.
    pub fn seal(&mut self) -> Result<()> {
        let PacketState::Building { payload } = &mut self.state else {
            return Ok(());
        };
        self.header.payload_length =
            u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_LENGTH,
            })?;
        let payload = std::mem::take(payload).freeze();
        self.state = PacketState::Sealed { payload, cursor: 0 };
        Ok(())
    }

    /// Raw payload bytes regardless of state.
    pub fn payload(&self) -> &[u8] {
        match &self.state {
            PacketState::Building { payload } => &payload[..],
            PacketState::Sealed { payload, .. } => &payload[..],
        }
    }

    pub fn payload_len(&self) -> usize {
        self.payload().len()
    }

    /// Total size of the frame [`serialize`](Self::serialize) would produce.
    pub fn wire_size(&self) -> usize {
        HEADER_LENGTH + self.payload_len() + TRAILER_SIZE
    }

    /// Synthesise the complete frame: header, payload and checksum trailer.
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.serialize_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Append the complete frame to `dst`.
    pub fn serialize_into(&self, dst: &mut BytesMut) -> Result<()> {
        let PacketState::Building { payload } = &self.state else {
            return Err(FrameError::CodecState(CodecState::Locked));
        };
        let payload_length =
            u16::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_LENGTH,
            })?;

        let start = dst.len();
        dst.reserve(self.wire_size());
        self.header.put_outbound(payload_length, dst);
        dst.extend_from_slice(payload);
        let sum = checksum(&dst[start..]);
        put_trailer(sum, dst);
        Ok(())
    }

    // --- writing ---

    /// Append a big-endian scalar.
    pub fn write<T: Scalar>(&mut self, value: T) -> Result<()> {
        write_be(value, self.buffer_mut()?);
        Ok(())
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.buffer_mut()?.extend_from_slice(bytes);
        Ok(())
    }

    /// Append a `u16` byte length followed by `text` in `encoding`.
    pub fn write_text(&mut self, text: &str, encoding: TextEncoding) -> Result<()> {
        let buf = self.buffer_mut()?;
        let raw = encoding.encode(text)?;
        let len = u16::try_from(raw.len()).map_err(|_| FrameError::InvalidText {
            encoding: encoding.name(),
            reason: format!("{} bytes exceeds the u16 length prefix", raw.len()),
        })?;
        write_be(len, buf);
        buf.extend_from_slice(&raw);
        Ok(())
    }

    /// Append every element of `values`, with no count prefix.
    pub fn write_array<T: Scalar>(&mut self, values: &[T]) -> Result<()> {
        let buf = self.buffer_mut()?;
        buf.reserve(values.len() * T::WIDTH);
        for &value in values {
            write_be(value, buf);
        }
        Ok(())
    }

    // --- reading ---

    /// Read a big-endian scalar at the cursor.
    pub fn read<T: Scalar>(&mut self) -> Result<T> {
        let raw = self.take(T::WIDTH, T::NAME)?;
        read_be(&raw)
    }

    /// Read `len` raw bytes at the cursor.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        self.take(len, "bytes")
    }

    /// Read a `u16` byte length and that many bytes of `encoding` text.
    pub fn read_text(&mut self, encoding: TextEncoding) -> Result<String> {
        let start = self.position()?;
        let len: u16 = self.read()?;
        match self.take(len as usize, encoding.name()) {
            Ok(raw) => encoding.decode(&raw),
            Err(err) => {
                self.seek(start)?;
                Err(err)
            }
        }
    }

    /// Read `count` consecutive scalars at the cursor.
    pub fn read_array<T: Scalar>(&mut self, count: usize) -> Result<Vec<T>> {
        let len = count.checked_mul(T::WIDTH).ok_or(FrameError::CodecRange {
            requested: usize::MAX,
            remaining: self.remaining()?,
        })?;
        let raw = self.take(len, T::NAME)?;
        raw.chunks_exact(T::WIDTH).map(read_be).collect()
    }

    /// Move the read cursor to `position` bytes into the payload.
    pub fn seek(&mut self, position: usize) -> Result<()> {
        let PacketState::Sealed { payload, cursor } = &mut self.state else {
            return Err(FrameError::CodecState(CodecState::Unlocked));
        };
        if position > payload.len() {
            return Err(FrameError::CodecRange {
                requested: position,
                remaining: payload.len(),
            });
        }
        *cursor = position;
        Ok(())
    }

    /// Read cursor, in bytes from the start of the payload.
    pub fn position(&self) -> Result<usize> {
        match &self.state {
            PacketState::Sealed { cursor, .. } => Ok(*cursor),
            PacketState::Building { .. } => Err(FrameError::CodecState(CodecState::Unlocked)),
        }
    }

    /// Unread payload bytes.
    pub fn remaining(&self) -> Result<usize> {
        match &self.state {
            PacketState::Sealed { payload, cursor } => Ok(payload.len() - cursor),
            PacketState::Building { .. } => Err(FrameError::CodecState(CodecState::Unlocked)),
        }
    }

    // --- diagnostics ---

    /// Record every subsequent read as an `offset: type hex` line.
    pub fn enable_trace(&mut self) {
        self.trace.get_or_insert_with(Vec::new);
    }

    pub fn trace(&self) -> &[String] {
        self.trace.as_deref().unwrap_or(&[])
    }

    fn ensure_building(&self) -> Result<()> {
        if self.is_sealed() {
            return Err(FrameError::CodecState(CodecState::Locked));
        }
        Ok(())
    }

    fn buffer_mut(&mut self) -> Result<&mut BytesMut> {
        match &mut self.state {
            PacketState::Building { payload } => Ok(payload),
            PacketState::Sealed { .. } => Err(FrameError::CodecState(CodecState::Locked)),
        }
    }

    fn take(&mut self, len: usize, label: &str) -> Result<Bytes> {
        let PacketState::Sealed { payload, cursor } = &mut self.state else {
            return Err(FrameError::CodecState(CodecState::Unlocked));
        };
        let start = *cursor;
        let remaining = payload.len() - start;
        if len > remaining {
            return Err(FrameError::CodecRange {
                requested: len,
                remaining,
            });
        }
        let chunk = payload.slice(start..start + len);
        *cursor += len;

        if let Some(trace) = self.trace.as_mut() {
            trace.push(format!("{start:04x}: {label} {}", hex(&chunk)));
        }
        Ok(chunk)
    }
}

macro_rules! typed_accessors {
    ($($ty:ty => $write:ident, $read:ident;)*) => {
        impl Packet {$(
            #[doc = concat!("Append a big-endian `", stringify!($ty), "`.")]
            pub fn $write(&mut self, value: $ty) -> Result<()> {
                self.write(value)
            }

            #[doc = concat!("Read a big-endian `", stringify!($ty), "` at the cursor.")]
            pub fn $read(&mut self) -> Result<$ty> {
                self.read()
            }
        )*}
    };
}

typed_accessors! {
    u8 => write_u8, read_u8;
    i8 => write_i8, read_i8;
    u16 => write_u16, read_u16;
    i16 => write_i16, read_i16;
    u32 => write_u32, read_u32;
    i32 => write_i32, read_i32;
    u64 => write_u64, read_u64;
    i64 => write_i64, read_i64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

/// Copies never carry the read trace.
///
/// A sealed copy shares the frozen payload and gets its own cursor at the
/// start. A building copy duplicates the payload, stays building and starts
/// over with a default message type.
impl Clone for Packet {
    fn clone(&self) -> Self {
        match &self.state {
            PacketState::Sealed { payload, .. } => Self {
                header: self.header,
                state: PacketState::Sealed {
                    payload: payload.clone(),
                    cursor: 0,
                },
                trace: None,
            },
            PacketState::Building { payload } => Self {
                header: FrameHeader {
                    message_type: MessageType::default(),
                    ..self.header
                },
                state: PacketState::Building {
                    payload: payload.clone(),
                },
                trace: None,
            },
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
