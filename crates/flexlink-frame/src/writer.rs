use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use flexlink_transport::DeviceStream;

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::packet::Packet;
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Serialize a building packet and send it. Returns the bytes written.
    pub fn write_packet(&mut self, packet: &Packet) -> Result<usize> {
        self.buf.clear();
        packet.serialize_into(&mut self.buf)?;
        if self.buf.len() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: self.buf.len(),
                max: self.config.max_frame_size,
            });
        }

        let buf = std::mem::take(&mut self.buf);
        let result = self.write_all_retrying(&buf);
        self.buf = buf;
        result?;
        self.flush()?;
        Ok(self.buf.len())
    }

    /// Send a frame exactly as received (for relaying).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<usize> {
        self.write_raw(frame.as_bytes())?;
        Ok(frame.wire_size())
    }

    /// Send pre-framed bytes unchanged.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all_retrying(bytes)?;
        self.flush()
    }

    /// With a write timeout configured, `WouldBlock` means the timeout expired
    /// and is returned instead of retried.
    fn write_all_retrying(&mut self, bytes: &[u8]) -> Result<()> {
        let retry_would_block = self.config.write_timeout.is_none();
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock && retry_would_block => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<DeviceStream> {
    /// Create a frame writer for `DeviceStream` and apply write timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
