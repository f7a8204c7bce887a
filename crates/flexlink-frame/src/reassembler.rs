use bytes::BytesMut;
use tracing::trace;

use crate::codec::{Frame, DEFAULT_MAX_FRAME_SIZE};
use crate::error::{FrameError, Result};
use crate::header::{frame_size, validate_prefix, SIZE_PREFIX_LEN};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Frame being filled toward its declared size.
#[derive(Debug)]
struct Accumulator {
    buf: BytesMut,
    target: usize,
}

impl Accumulator {
    fn new(target: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(target),
            target,
        }
    }

    fn missing(&self) -> usize {
        self.target - self.buf.len()
    }
}

/// Turns an arbitrarily fragmented byte stream into complete frames.
///
/// Bytes are buffered until the size prefix (sync marker through the
/// payload-length field) is available; the declared size then fixes an
/// accumulator that is filled across as many [`feed`](Self::feed) calls as it
/// takes. Frames come out in stream order and no byte is skipped or reordered,
/// regardless of how the input was split.
///
/// A malformed prefix or a declared size above the configured maximum is a
/// framing error. The stream cannot be resynchronised after one, so the
/// reassembler clears itself and the connection is expected to be dropped.
/// Frames completed ahead of the bad bytes in the same call are still
/// returned; the error is then held and reported by the next `feed` or by
/// [`take_error`](Self::take_error).
#[derive(Debug)]
pub struct StreamReassembler {
    pending: BytesMut,
    current: Option<Accumulator>,
    failed: Option<FrameError>,
    max_frame_size: usize,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            current: None,
            failed: None,
            max_frame_size,
        }
    }

    /// Append `data` and return every frame it completes, in order.
    ///
    /// An empty slice is valid and returns no frames.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        if let Some(err) = self.failed.take() {
            return Err(err);
        }
        self.pending.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            if self.current.is_none() {
                if self.pending.len() < SIZE_PREFIX_LEN {
                    break;
                }
                let target = match self.declared_size() {
                    Ok(target) => target,
                    Err(err) => {
                        self.reset();
                        if frames.is_empty() {
                            return Err(err);
                        }
                        self.failed = Some(err);
                        break;
                    }
                };
                trace!(size = target, "frame started");
                self.current = Some(Accumulator::new(target));
            }
            let Some(acc) = self.current.as_mut() else {
                break;
            };

            // split_to keeps the leftover bytes at the front of `pending`.
            let take = acc.missing().min(self.pending.len());
            acc.buf.extend_from_slice(&self.pending.split_to(take));
            if acc.missing() > 0 {
                break;
            }

            if let Some(done) = self.current.take() {
                frames.push(Frame::from_complete(done.buf.freeze()));
            }
        }

        Ok(frames)
    }

    fn declared_size(&self) -> Result<usize> {
        validate_prefix(&self.pending)?;
        let size = frame_size(&self.pending)?;
        if size > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(size)
    }

    /// Bytes held but not yet emitted as part of a frame.
    pub fn buffered(&self) -> usize {
        self.pending.len() + self.current.as_ref().map_or(0, |acc| acc.buf.len())
    }

    /// True while a frame's size is known but its bytes are still arriving.
    pub fn in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// True when a framing error is being held for the next call.
    pub fn has_failed(&self) -> bool {
        self.failed.is_some()
    }

    /// Take the held framing error, if any.
    pub fn take_error(&mut self) -> Option<FrameError> {
        self.failed.take()
    }

    /// Discard all buffered bytes, any partial frame and any held error.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.current = None;
        self.failed = None;
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::header::HEADER_LENGTH_OFFSET;
    use crate::opcode;
    use crate::packet::Packet;
    use crate::port;

    fn wire(opcode: u16, payload: &[u8]) -> Bytes {
        Packet::with_payload(opcode, port::ETH1_ALL, payload)
            .serialize()
            .unwrap()
    }

    #[test]
    fn test_single_frame_in_one_feed() {
        let bytes = wire(opcode::BESTPOS, b"position");
        let mut reassembler = StreamReassembler::new();

        let frames = reassembler.feed(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), bytes.as_ref());
        assert_eq!(reassembler.buffered(), 0);
        assert!(!reassembler.in_progress());
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = wire(opcode::BESTPOS, b"one byte per call");
        let mut reassembler = StreamReassembler::new();

        let mut frames = Vec::new();
        for byte in bytes.iter() {
            frames.extend(reassembler.feed(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), bytes.as_ref());
    }

    #[test]
    fn test_fragmentation_invariance() {
        let bytes = wire(opcode::TIME, &[0x5A; 300]);
        let whole = StreamReassembler::new().feed(&bytes).unwrap();

        for chunk_size in [1, 2, 3, 7, 9, 10, 11, 27, 28, 29, 64, 331] {
            let mut reassembler = StreamReassembler::new();
            let mut frames = Vec::new();
            for chunk in bytes.chunks(chunk_size) {
                frames.extend(reassembler.feed(chunk).unwrap());
            }
            assert_eq!(frames, whole, "chunk size {chunk_size}");
        }
    }

    #[test]
    fn test_header_split_across_calls() {
        let bytes = wire(opcode::BESTPOS, b"split");
        let mut reassembler = StreamReassembler::new();

        // Sync only: size not known yet.
        assert!(reassembler.feed(&bytes[..3]).unwrap().is_empty());
        assert!(!reassembler.in_progress());

        // Through the payload-length field: accumulator allocated.
        assert!(reassembler.feed(&bytes[3..12]).unwrap().is_empty());
        assert!(reassembler.in_progress());
        assert_eq!(reassembler.buffered(), 12);

        let frames = reassembler.feed(&bytes[12..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload().as_ref(), b"split");
    }

    #[test]
    fn test_multiple_frames_in_one_feed() {
        let mut stream = BytesMut::new();
        stream.extend_from_slice(&wire(opcode::BESTPOS, b"first"));
        stream.extend_from_slice(&wire(opcode::TIME, b"second"));

        let frames = StreamReassembler::new().feed(&stream).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].opcode(), opcode::BESTPOS);
        assert_eq!(frames[0].payload().as_ref(), b"first");
        assert_eq!(frames[1].opcode(), opcode::TIME);
        assert_eq!(frames[1].payload().as_ref(), b"second");
    }

    #[test]
    fn test_leftover_bytes_carry_to_next_frame() {
        let first = wire(opcode::BESTPOS, b"first");
        let second = wire(opcode::TIME, b"second");
        let mut stream = BytesMut::new();
        stream.extend_from_slice(&first);
        stream.extend_from_slice(&second[..5]);

        let mut reassembler = StreamReassembler::new();
        let frames = reassembler.feed(&stream).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(reassembler.buffered(), 5);

        let frames = reassembler.feed(&second[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), second.as_ref());
    }

    #[test]
    fn test_zero_byte_feed() {
        let bytes = wire(opcode::BESTPOS, b"x");
        let mut reassembler = StreamReassembler::new();

        assert!(reassembler.feed(&[]).unwrap().is_empty());
        assert!(reassembler.feed(&bytes[..20]).unwrap().is_empty());
        assert!(reassembler.feed(&[]).unwrap().is_empty());
        assert_eq!(reassembler.buffered(), 20);
        assert_eq!(reassembler.feed(&bytes[20..]).unwrap().len(), 1);
    }

    #[test]
    fn test_oversized_frame_is_fatal() {
        let bytes = wire(opcode::BESTPOS, &[0u8; 100]);
        let mut reassembler = StreamReassembler::with_max_frame_size(64);

        let err = reassembler.feed(&bytes).unwrap_err();
        assert!(matches!(
            err,
            FrameError::FrameTooLarge { size: 132, max: 64 }
        ));
        assert!(err.is_framing());
        assert_eq!(reassembler.buffered(), 0);
    }

    #[test]
    fn test_invalid_sync_is_fatal() {
        let mut reassembler = StreamReassembler::new();
        let err = reassembler.feed(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidSync { .. }));
        assert!(err.is_framing());
    }

    #[test]
    fn test_frames_before_bad_sync_are_kept() {
        let mut stream = BytesMut::new();
        stream.extend_from_slice(&wire(opcode::BESTPOS, b"good"));
        stream.extend_from_slice(&[0u8; 16]);

        let mut reassembler = StreamReassembler::new();
        let frames = reassembler.feed(&stream).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload().as_ref(), b"good");
        assert!(reassembler.has_failed());
        assert_eq!(reassembler.buffered(), 0);

        let err = reassembler.feed(&[]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidSync { .. }));
        assert!(!reassembler.has_failed());
    }

    #[test]
    fn test_held_error_can_be_taken() {
        let mut stream = BytesMut::new();
        stream.extend_from_slice(&wire(opcode::TIME, b"t"));
        stream.extend_from_slice(&[0xAA, 0x44, 0x12, 4, 0, 0, 0, 0, 0, 0]);

        let mut reassembler = StreamReassembler::new();
        assert_eq!(reassembler.feed(&stream).unwrap().len(), 1);
        assert!(matches!(
            reassembler.take_error(),
            Some(FrameError::MalformedHeader { .. })
        ));
        assert!(reassembler.take_error().is_none());
        assert!(reassembler.feed(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_short_header_length_is_fatal() {
        let mut bytes = wire(opcode::BESTPOS, b"x").to_vec();
        bytes[HEADER_LENGTH_OFFSET] = 4;
        let err = StreamReassembler::new().feed(&bytes).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeader { .. }));
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let bytes = wire(opcode::BESTPOS, b"partial");
        let mut reassembler = StreamReassembler::new();
        reassembler.feed(&bytes[..15]).unwrap();
        assert!(reassembler.in_progress());

        reassembler.reset();
        assert_eq!(reassembler.buffered(), 0);
        assert_eq!(reassembler.feed(&bytes).unwrap().len(), 1);
    }
}
