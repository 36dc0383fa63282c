use amqpmux_frame::{effective_channel_max, Method, MethodId, CONNECTION_CHANNEL};
use tracing::{debug, warn};

use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};
use crate::manager::{ChannelManager, ConnectionState};

impl<E: ProtocolEngine> ChannelManager<E> {
    /// Hand out a channel ready for use.
    ///
    /// Idle pooled channels are reused first, without talking to the broker.
    /// Otherwise a fresh id is reserved and opened with channel.open (and
    /// confirm.select unless disabled in [`ChannelConfig`](crate::ChannelConfig)).
    pub fn acquire_channel(&mut self) -> Result<u16> {
        self.ensure_connection_open()?;

        if let Some(channel) = self.free_channels.pop_front() {
            debug!(channel, "reusing pooled channel");
            return Ok(channel);
        }

        let channel = self.reserve_channel_id()?;
        if let Err(err) = self.open_reserved_channel(channel) {
            self.abandon_channel(channel, &err);
            return Err(err);
        }
        debug!(channel, open = self.open_channel_count(), "channel opened");
        Ok(channel)
    }

    /// Return an open channel to the idle pool. The broker is not told.
    pub fn release_channel(&mut self, channel: u16) -> Result<()> {
        if channel == CONNECTION_CHANNEL {
            return Err(ChannelError::InvalidChannel(channel));
        }
        if !self.is_channel_open(channel) {
            return Err(ChannelError::ChannelNotFound(channel));
        }
        if self.free_channels.contains(&channel) {
            return Err(ChannelError::ChannelAlreadyReleased(channel));
        }

        self.free_channels.push_back(channel);
        self.engine.release_buffers();
        debug!(channel, pooled = self.free_channels.len(), "channel released");
        Ok(())
    }

    /// Claim the next unused id after the last one assigned, wrapping past
    /// channel-max back to 1, with an empty frame queue.
    fn reserve_channel_id(&mut self) -> Result<u16> {
        let max = effective_channel_max(self.engine.channel_max());
        if self.open_channel_count() >= usize::from(max) {
            return Err(ChannelError::TooManyChannels { max });
        }

        let mut candidate = self.next_channel_id;
        for _ in 0..max {
            candidate = if candidate >= max { 1 } else { candidate + 1 };
            if !self.open_channels.contains_key(&candidate) {
                self.open_channels.insert(candidate, Default::default());
                self.next_channel_id = candidate;
                return Ok(candidate);
            }
        }
        Err(ChannelError::TooManyChannels { max })
    }

    /// Undo a reservation whose open sequence failed.
    ///
    /// The broker may already hold the channel open, so it is closed before
    /// the id goes back into circulation. If that close fails the id stays
    /// reserved and is never handed out again on this connection.
    fn abandon_channel(&mut self, channel: u16, cause: &ChannelError) {
        // A broker close already ran the handshake and erased the entry.
        if !self.is_channel_open(channel) {
            return;
        }
        if cause.is_connection_fatal() || self.state != ConnectionState::Open {
            self.open_channels.remove(&channel);
            return;
        }

        match self.close_channel(channel) {
            Ok(()) => debug!(channel, "closed channel after failed open"),
            Err(err) => {
                warn!(channel, error = %err, "channel close failed, keeping id reserved");
            }
        }
    }

    fn open_reserved_channel(&mut self, channel: u16) -> Result<()> {
        self.call(channel, Method::channel_open(), &[MethodId::CHANNEL_OPEN_OK])?;
        if self.config.confirm_select {
            self.call(
                channel,
                Method::confirm_select(false),
                &[MethodId::CONFIRM_SELECT_OK],
            )?;
        }
        Ok(())
    }
}
