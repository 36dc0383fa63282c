use std::io::{ErrorKind, Read};

use amqpmux_transport::AmqpStream;
use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
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
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.next_buffered()? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Decode a frame that is already fully buffered, without touching the stream.
    pub fn next_buffered(&mut self) -> Result<Option<Frame>> {
        decode_frame(&mut self.buf, self.config.max_frame_size)
    }

    /// Bytes received but not yet decoded into a frame.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Give back read-buffer memory grown by large frames, if nothing is pending.
    pub fn release_buffers(&mut self) {
        if self.buf.is_empty() && self.buf.capacity() > INITIAL_BUFFER_CAPACITY {
            trace!(capacity = self.buf.capacity(), "releasing frame read buffer");
            self.buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Apply the frame-max negotiated in connection.tune.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
    }
}

impl FrameReader<AmqpStream> {
    /// Create a frame reader for `AmqpStream` and apply read timeout from config.
    pub fn with_config_stream(inner: AmqpStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: amqpmux_transport::TransportError) -> FrameError {
    match err {
        amqpmux_transport::TransportError::Io(io) | amqpmux_transport::TransportError::Poll(io) => {
            FrameError::Io(io)
        }
        amqpmux_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
