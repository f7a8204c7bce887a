use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use flexlink_transport::{DeviceStream, TransportError};
use tracing::warn;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::packet::Packet;
use crate::reassembler::StreamReassembler;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    reassembler: StreamReassembler,
    ready: VecDeque<Frame>,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            reassembler: StreamReassembler::with_max_frame_size(config.max_frame_size),
            ready: VecDeque::new(),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }
            if let Some(err) = self.reassembler.take_error() {
                return Err(err);
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.ready.extend(self.reassembler.feed(&chunk[..read])?);
        }
    }

    /// Read the next frame that passes checksum verification and decode it.
    ///
    /// With `verify_checksum` set, mismatching frames are dropped and logged.
    pub fn read_packet(&mut self) -> Result<Packet> {
        loop {
            let frame = self.read_frame()?;
            if self.config.verify_checksum {
                if let Err(err) = frame.verify_checksum() {
                    warn!(opcode = frame.opcode(), error = %err, "dropping frame");
                    continue;
                }
            }
            return Packet::from_frame(&frame);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<DeviceStream> {
    /// Create a frame reader for `DeviceStream` and apply read timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        TransportError::Resolve { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        TransportError::Shutdown => FrameError::ConnectionClosed,
    }
}
