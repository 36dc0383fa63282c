//! Frame demultiplexing.
//!
//! There is no reader thread: whoever asks for a frame on a channel drives the
//! transport. Frames pulled for other channels are parked in their queues, so
//! per-channel order is preserved and nothing is lost while a caller waits.

use std::time::{Duration, Instant};

use amqpmux_frame::{Frame, MethodId, CONNECTION_CHANNEL};
use tracing::{debug, trace, warn};

use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};
use crate::manager::ChannelManager;

impl<E: ProtocolEngine> ChannelManager<E> {
    /// Next frame for `channel`, waiting at most `timeout` (`None` waits forever).
    ///
    /// Buffered frames are returned first without touching the transport.
    /// `Ok(None)` means the deadline passed with no frame for this channel;
    /// frames buffered meanwhile for other channels stay queued.
    ///
    /// A channel.close for `channel` (or a connection.close) is never returned
    /// as data: the close handshake is completed and the peer close surfaces
    /// as an error.
    pub fn next_frame(&mut self, channel: u16, timeout: Option<Duration>) -> Result<Option<Frame>> {
        self.ensure_connection_open()?;
        self.next_frame_unchecked(channel, timeout)
    }

    /// [`next_frame`](Self::next_frame) without the connection-state gate,
    /// for the close handshake itself.
    pub(crate) fn next_frame_unchecked(
        &mut self,
        channel: u16,
        timeout: Option<Duration>,
    ) -> Result<Option<Frame>> {
        if let Some(frame) = self.queue_mut(channel)?.pop_front() {
            trace!(channel, kind = %frame.kind(), "delivering buffered frame");
            return self.check_frame_for_close(channel, frame, "next_frame").map(Some);
        }

        self.pull_for_channel(channel, timeout)
    }

    /// Complete the close handshake if `frame` is a peer close for `channel`.
    ///
    /// Returns the frame unchanged otherwise.
    pub fn check_frame_for_close(
        &mut self,
        channel: u16,
        frame: Frame,
        context: &'static str,
    ) -> Result<Frame> {
        match frame.as_method() {
            Some(method) if method.id == MethodId::CHANNEL_CLOSE && channel != CONNECTION_CHANNEL => {
                Err(self.peer_closed_channel(channel, method, context))
            }
            Some(method) if method.id == MethodId::CONNECTION_CLOSE => {
                Err(self.peer_closed_connection(method, context))
            }
            _ => Ok(frame),
        }
    }

    fn pull_for_channel(&mut self, channel: u16, timeout: Option<Duration>) -> Result<Option<Frame>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut remaining = timeout;

        loop {
            let Some(frame) = self
                .engine
                .pull_frame(remaining)
                .map_err(ChannelError::engine("pull frame"))?
            else {
                return Ok(None);
            };

            if frame.channel == channel {
                return self.check_frame_for_close(channel, frame, "next_frame").map(Some);
            }

            if frame.channel == CONNECTION_CHANNEL {
                self.route_connection_frame(frame)?;
            } else {
                self.route_to_queue(frame)?;
            }

            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(None);
                }
                remaining = Some(deadline - now);
            }
        }
    }

    /// Only connection.close matters on channel 0 while another channel is read.
    fn route_connection_frame(&mut self, frame: Frame) -> Result<()> {
        match frame.as_method() {
            Some(method) if method.id == MethodId::CONNECTION_CLOSE => {
                Err(self.peer_closed_connection(method, "next_frame"))
            }
            Some(method) => {
                debug!(method = %method.id, "ignoring connection-level method");
                Ok(())
            }
            None => {
                trace!(kind = %frame.kind(), "ignoring connection-level frame");
                Ok(())
            }
        }
    }

    fn route_to_queue(&mut self, frame: Frame) -> Result<()> {
        let channel = frame.channel;
        let limit = self.config.max_buffered_frames;

        let Some(queue) = self.open_channels.get_mut(&channel) else {
            warn!(channel, kind = %frame.kind(), "dropping frame for channel that is not open");
            return Ok(());
        };

        if limit.is_some_and(|max| queue.len() >= max) {
            warn!(channel, queued = queue.len(), "channel buffer full, dropping frame");
            return Err(ChannelError::BufferFull(channel));
        }

        queue.push_back(frame);
        trace!(channel, queued = queue.len(), "buffered frame for another channel");
        Ok(())
    }
}
