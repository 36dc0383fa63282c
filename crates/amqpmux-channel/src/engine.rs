//! The lower-level protocol engine the channel core drives.
//!
//! The core never touches sockets or bytes itself; it sends methods and pulls
//! typed frames through [`ProtocolEngine`]. [`StreamEngine`] is the socket
//! implementation: frame codec on top of an [`AmqpStream`], with readiness
//! polling to bound reads.

#[cfg(unix)]
use std::io::{Read, Write};
#[cfg(unix)]
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use amqpmux_frame::{Frame, FrameConfig, Method};
#[cfg(unix)]
use amqpmux_frame::{FrameReader, FrameWriter};
#[cfg(unix)]
use amqpmux_transport::{wait_readable, AmqpStream, Readiness};
#[cfg(unix)]
use tracing::trace;

use crate::error::EngineError;

/// Interface consumed from the protocol engine.
pub trait ProtocolEngine {
    /// Send one method frame on `channel`.
    fn send_method(&mut self, channel: u16, method: &Method) -> Result<(), EngineError>;

    /// Pull the next frame off the transport, whatever channel it belongs to.
    ///
    /// `None` waits forever. `Ok(None)` means `timeout` elapsed first.
    fn pull_frame(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>, EngineError>;

    /// Broker-advertised channel-max; 0 means unbounded.
    fn channel_max(&self) -> u16;

    /// Advisory: give back buffer memory no longer in use.
    fn release_buffers(&mut self) {}
}

/// Configuration for a [`StreamEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Frame codec limits and socket timeouts.
    pub frame: FrameConfig,
    /// Channel-max negotiated during connection tune; 0 means unbounded.
    pub channel_max: u16,
}

/// Protocol engine over a connected, already-negotiated broker stream.
#[cfg(unix)]
pub struct StreamEngine<S> {
    reader: FrameReader<S>,
    writer: FrameWriter<S>,
    channel_max: u16,
    fd: RawFd,
}

#[cfg(unix)]
impl StreamEngine<AmqpStream> {
    /// Split `stream` into a reader and writer half and wrap them.
    pub fn new(stream: AmqpStream, config: EngineConfig) -> Result<Self, EngineError> {
        let reader_stream = stream.try_clone()?;
        let reader = FrameReader::with_config_stream(reader_stream, config.frame.clone())?;
        let writer = FrameWriter::with_config_stream(stream, config.frame)?;
        Ok(Self::from_parts(reader, writer, config.channel_max))
    }
}

#[cfg(unix)]
impl<S: Read + Write + AsRawFd> StreamEngine<S> {
    /// Wrap an existing reader/writer pair. The reader's descriptor is polled.
    pub fn from_parts(reader: FrameReader<S>, writer: FrameWriter<S>, channel_max: u16) -> Self {
        let fd = reader.get_ref().as_raw_fd();
        Self {
            reader,
            writer,
            channel_max,
            fd,
        }
    }

    /// Update channel-max, e.g. after connection.tune.
    pub fn set_channel_max(&mut self, channel_max: u16) {
        self.channel_max = channel_max;
    }

    /// Update frame-max on both halves, e.g. after connection.tune.
    pub fn set_frame_max(&mut self, frame_max: usize) {
        self.reader.set_max_frame_size(frame_max);
        self.writer.set_max_frame_size(frame_max);
    }

    /// Socket descriptor used for readiness polling.
    pub fn socket_handle(&self) -> RawFd {
        self.fd
    }

    pub fn reader(&self) -> &FrameReader<S> {
        &self.reader
    }

    pub fn writer(&self) -> &FrameWriter<S> {
        &self.writer
    }
}

#[cfg(unix)]
impl<S: Read + Write + AsRawFd> ProtocolEngine for StreamEngine<S> {
    fn send_method(&mut self, channel: u16, method: &Method) -> Result<(), EngineError> {
        trace!(channel, method = %method.id, "sending method");
        self.writer.send_method(channel, method)?;
        Ok(())
    }

    fn pull_frame(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>, EngineError> {
        // A frame already sitting in the read buffer would never wake poll().
        if let Some(frame) = self.reader.next_buffered()? {
            return Ok(Some(frame));
        }

        if let Some(timeout) = timeout {
            if wait_readable(self.fd, Some(timeout))? == Readiness::TimedOut {
                return Ok(None);
            }
        }

        Ok(Some(self.reader.read_frame()?))
    }

    fn channel_max(&self) -> u16 {
        self.channel_max
    }

    fn release_buffers(&mut self) {
        self.reader.release_buffers();
        self.writer.release_buffers();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;

    use amqpmux_frame::{FrameError, MethodId};
    use bytes::Bytes;

    use super::*;

    fn engine_pair() -> (StreamEngine<AmqpStream>, FrameReader<UnixStream>, FrameWriter<UnixStream>) {
        let (client, broker) = UnixStream::pair().unwrap();
        let engine = StreamEngine::new(
            AmqpStream::from_unix(client),
            EngineConfig {
                channel_max: 16,
                ..EngineConfig::default()
            },
        )
        .unwrap();
        let broker_reader = FrameReader::new(broker.try_clone().unwrap());
        let broker_writer = FrameWriter::new(broker);
        (engine, broker_reader, broker_writer)
    }

    #[test]
    fn sends_methods_to_peer() {
        let (mut engine, mut broker_reader, _broker_writer) = engine_pair();
        engine.send_method(3, &Method::channel_open()).unwrap();

        let frame = broker_reader.read_frame().unwrap();
        assert_eq!(frame.channel, 3);
        assert!(frame.is_method(MethodId::CHANNEL_OPEN));
        assert_eq!(engine.channel_max(), 16);
    }

    #[test]
    fn pull_times_out_without_data() {
        let (mut engine, _broker_reader, _broker_writer) = engine_pair();
        let pulled = engine.pull_frame(Some(Duration::from_millis(10))).unwrap();
        assert!(pulled.is_none());
    }

    #[test]
    fn pull_serves_buffered_frames_without_polling() {
        let (mut engine, _broker_reader, mut broker_writer) = engine_pair();
        broker_writer
            .write_frame(&Frame::body(1, Bytes::from_static(b"a")))
            .unwrap();
        broker_writer
            .write_frame(&Frame::body(1, Bytes::from_static(b"b")))
            .unwrap();

        let first = engine.pull_frame(None).unwrap().unwrap();
        assert_eq!(first, Frame::body(1, Bytes::from_static(b"a")));

        // The second frame arrived with the first read; the socket is now drained.
        let second = engine.pull_frame(Some(Duration::ZERO)).unwrap().unwrap();
        assert_eq!(second, Frame::body(1, Bytes::from_static(b"b")));
        assert!(engine.pull_frame(Some(Duration::ZERO)).unwrap().is_none());
    }

    #[test]
    fn pull_reports_peer_hangup() {
        let (mut engine, broker_reader, broker_writer) = engine_pair();
        drop(broker_reader);
        drop(broker_writer);

        let err = engine.pull_frame(Some(Duration::from_secs(1))).unwrap_err();
        assert!(matches!(err, EngineError::Frame(FrameError::ConnectionClosed)));
    }

    #[test]
    fn set_channel_max_after_tune() {
        let (mut engine, _r, _w) = engine_pair();
        engine.set_channel_max(0);
        assert_eq!(engine.channel_max(), 0);
        engine.set_frame_max(4096);
        assert!(matches!(
            engine.send_method(1, &Method::new(MethodId::BASIC_PUBLISH, vec![0u8; 8192])),
            Err(EngineError::Frame(FrameError::FrameTooLarge { max: 4096, .. }))
        ));
        assert!(engine.socket_handle() >= 0);
        engine.release_buffers();
    }
}
