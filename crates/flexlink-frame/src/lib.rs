//! Frame reassembly and binary message codec for GNSS receiver logs.
//!
//! This is the core layer of flexlink. Every message on the wire is framed as:
//! - A 3-byte sync marker `AA 44 12`
//! - A header-length byte and a fixed big-endian header block
//! - A payload whose length is carried in the header
//! - A checksum trailer (low 16 bits of CRC-32 over header and payload)
//!
//! [`StreamReassembler`] turns an arbitrarily fragmented byte stream into
//! complete [`Frame`]s, and [`Packet`] builds outbound frames and decodes
//! inbound ones.

pub mod checksum;
pub mod codec;
pub mod endian;
pub mod error;
pub mod header;
pub mod opcode;
pub mod packet;
pub mod port;
pub mod reader;
pub mod reassembler;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{Frame, FrameConfig, DEFAULT_MAX_FRAME_SIZE};
pub use endian::Scalar;
pub use error::{CodecState, FrameError, Result};
pub use header::{FrameHeader, MessageFormat, MessageType, HEADER_LENGTH, SYNC, TRAILER_SIZE};
pub use packet::{Packet, TextEncoding};
pub use reader::FrameReader;
pub use reassembler::StreamReassembler;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::DeviceCodec;
