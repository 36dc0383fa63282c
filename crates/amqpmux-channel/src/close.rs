//! Channel and connection close handshakes.
//!
//! ```text
//! channel:     Open --close sent------> ClosingLocal  --close-ok received--> Closed
//!              Open --close received--> ClosingRemote --close-ok sent------> Closed
//! connection:  same shape on channel 0, tracked in ConnectionState
//! ```
//!
//! A closed channel has no open-channel table entry, no buffered frames, no
//! free-pool slot and no consumer tags. A closed connection keeps only the
//! channel 0 entry and rejects every further operation.

use amqpmux_frame::{CloseReason, Method, MethodId, CONNECTION_CHANNEL};
use tracing::{debug, trace, warn};

use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};
use crate::manager::{ChannelManager, ConnectionState};

impl<E: ProtocolEngine> ChannelManager<E> {
    /// Acknowledge a broker channel.close and drop the channel's bookkeeping.
    ///
    /// Runs once per close event; a second call finds no entry and fails
    /// with `ChannelNotFound`.
    pub fn finish_channel_close(&mut self, channel: u16) -> Result<()> {
        if channel == CONNECTION_CHANNEL {
            return Err(ChannelError::InvalidChannel(channel));
        }
        if !self.forget_channel(channel) {
            return Err(ChannelError::ChannelNotFound(channel));
        }
        self.engine
            .send_method(channel, &Method::channel_close_ok())
            .map_err(ChannelError::engine("channel.close-ok"))?;
        debug!(channel, "channel close acknowledged");
        Ok(())
    }

    /// Acknowledge a broker connection.close.
    ///
    /// Clears every channel; tearing down the transport is left to the owner
    /// of the engine.
    pub fn finish_connection_close(&mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(ChannelError::ConnectionClosed);
        }
        self.reset_channels();
        self.state = ConnectionState::Closed;
        self.engine
            .send_method(CONNECTION_CHANNEL, &Method::connection_close_ok())
            .map_err(ChannelError::engine("connection.close-ok"))?;
        debug!("connection close acknowledged");
        Ok(())
    }

    /// Close `channel` from this side and wait for the broker's close-ok.
    ///
    /// Frames still in flight for the channel are discarded. If the broker
    /// closes the channel at the same time, its close is acknowledged and the
    /// channel counts as closed.
    pub fn close_channel(&mut self, channel: u16) -> Result<()> {
        self.ensure_connection_open()?;
        if channel == CONNECTION_CHANNEL {
            return Err(ChannelError::InvalidChannel(channel));
        }
        if !self.is_channel_open(channel) {
            return Err(ChannelError::ChannelNotFound(channel));
        }

        self.engine
            .send_method(channel, &Method::channel_close(&CloseReason::normal()))
            .map_err(ChannelError::engine("channel.close"))?;
        debug!(channel, "channel close sent");

        loop {
            match self.next_frame(channel, None) {
                Ok(Some(frame)) if frame.is_method(MethodId::CHANNEL_CLOSE_OK) => {
                    self.forget_channel(channel);
                    debug!(channel, "channel closed");
                    return Ok(());
                }
                Ok(Some(frame)) => {
                    trace!(channel, kind = %frame.kind(), "discarding frame during close");
                }
                Ok(None) => {
                    return Err(ChannelError::EmptyReply {
                        channel,
                        context: "channel.close",
                    })
                }
                Err(ChannelError::ChannelClosedByPeer { channel: closed, reason, .. })
                    if closed == channel =>
                {
                    debug!(channel, %reason, "channel close crossed with broker close");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the connection from this side and wait for connection.close-ok.
    ///
    /// While the handshake runs every other operation fails with
    /// `ConnectionClosing`. If it cannot complete (send failure, transport
    /// error) the connection is marked closed anyway and the error returned.
    pub fn close_connection(&mut self) -> Result<()> {
        self.ensure_connection_open()?;
        self.state = ConnectionState::ClosingLocal;

        match self.await_connection_close_ok() {
            Ok(()) => {
                debug!("connection closed");
                Ok(())
            }
            Err(ChannelError::ConnectionClosedByPeer { reason, .. }) => {
                debug!(%reason, "connection close crossed with broker close");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "connection close failed, marking connection closed");
                self.reset_channels();
                self.state = ConnectionState::Closed;
                Err(err)
            }
        }
    }

    fn await_connection_close_ok(&mut self) -> Result<()> {
        self.engine
            .send_method(
                CONNECTION_CHANNEL,
                &Method::connection_close(&CloseReason::normal()),
            )
            .map_err(ChannelError::engine("connection.close"))?;
        debug!("connection close sent");

        loop {
            match self.next_frame_unchecked(CONNECTION_CHANNEL, None)? {
                Some(frame) if frame.is_method(MethodId::CONNECTION_CLOSE_OK) => {
                    self.reset_channels();
                    self.state = ConnectionState::Closed;
                    return Ok(());
                }
                Some(frame) => {
                    trace!(kind = %frame.kind(), "discarding frame during connection close");
                }
                None => {
                    return Err(ChannelError::EmptyReply {
                        channel: CONNECTION_CHANNEL,
                        context: "connection.close",
                    })
                }
            }
        }
    }

    /// Complete a broker-initiated channel close and build the error the
    /// waiting caller sees.
    pub(crate) fn peer_closed_channel(
        &mut self,
        channel: u16,
        close: &Method,
        context: &'static str,
    ) -> ChannelError {
        warn!(channel, context, "channel closed by peer");
        if let Err(err) = self.finish_channel_close(channel) {
            return err;
        }
        match CloseReason::decode(&close.args) {
            Ok(reason) => ChannelError::ChannelClosedByPeer {
                channel,
                reason,
                context,
            },
            Err(source) => ChannelError::MalformedMethod {
                method: close.id,
                source,
            },
        }
    }

    /// Complete a broker-initiated connection close and build the error the
    /// waiting caller sees.
    pub(crate) fn peer_closed_connection(
        &mut self,
        close: &Method,
        context: &'static str,
    ) -> ChannelError {
        warn!(context, "connection closed by peer");
        self.state = ConnectionState::ClosingRemote;
        if let Err(err) = self.finish_connection_close() {
            return err;
        }
        match CloseReason::decode(&close.args) {
            Ok(reason) => ChannelError::ConnectionClosedByPeer { reason, context },
            Err(source) => ChannelError::MalformedMethod {
                method: close.id,
                source,
            },
        }
    }

    /// Erase every trace of `channel`. Returns false if it was not open.
    fn forget_channel(&mut self, channel: u16) -> bool {
        let Some(pending) = self.open_channels.remove(&channel) else {
            return false;
        };
        if !pending.is_empty() {
            debug!(channel, dropped = pending.len(), "discarding buffered frames");
        }
        self.free_channels.retain(|&id| id != channel);
        let cancelled = self.consumers.remove_channel(channel);
        if cancelled > 0 {
            debug!(channel, cancelled, "invalidated consumer tags");
        }
        true
    }

    fn reset_channels(&mut self) {
        self.open_channels.retain(|&id, _| id == CONNECTION_CHANNEL);
        if let Some(control) = self.open_channels.get_mut(&CONNECTION_CHANNEL) {
            control.clear();
        }
        self.free_channels.clear();
        self.consumers.clear();
    }
}
