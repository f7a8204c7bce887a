//! Frame checksum.
//!
//! The trailer carries the low 16 bits of a standard (reflected, IEEE) CRC-32
//! computed over the header and payload, big-endian, padded with two zero
//! bytes to the 4-byte trailer width the frame-size formula expects.

use bytes::{BufMut, BytesMut};

use crate::header::{CHECKSUM_SIZE, TRAILER_SIZE};

/// Compute the 16-bit frame checksum over `data` (header followed by payload).
pub fn checksum(data: &[u8]) -> u16 {
    (crc32fast::hash(data) & 0xFFFF) as u16
}

/// Append a trailer carrying `checksum` to `dst`.
pub fn put_trailer(checksum: u16, dst: &mut BytesMut) {
    dst.put_u16(checksum);
    dst.put_bytes(0, TRAILER_SIZE - CHECKSUM_SIZE);
}

/// Extract the checksum carried in a trailer.
pub fn trailer_checksum(trailer: &[u8]) -> Option<u16> {
    let raw = trailer.get(..CHECKSUM_SIZE)?;
    Some(u16::from_be_bytes([raw[0], raw[1]]))
}
