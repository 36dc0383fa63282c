use amqpmux_frame::{CloseReason, FrameError, FrameKind, MethodId};
use amqpmux_transport::TransportError;

use crate::content::ReturnedMessage;

/// Failures reported by a [`ProtocolEngine`](crate::ProtocolEngine).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// Errors that can occur in channel operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The protocol engine failed while doing `context`.
    #[error("{context}: {source}")]
    Engine {
        context: &'static str,
        #[source]
        source: EngineError,
    },

    /// No channel id is free under the broker's channel-max.
    #[error("too many channels open (max {max})")]
    TooManyChannels { max: u16 },

    /// The channel has no open-channel table entry.
    #[error("channel {0} not found")]
    ChannelNotFound(u16),

    /// The operation is not valid on this channel id (channel 0).
    #[error("operation not valid on channel {0}")]
    InvalidChannel(u16),

    /// The channel is already idle in the free pool.
    #[error("channel {0} already released")]
    ChannelAlreadyReleased(u16),

    /// No consumer is registered under this tag.
    #[error("consumer tag '{0}' not found")]
    ConsumerTagNotFound(String),

    /// A consumer is already registered under this tag.
    #[error("consumer tag '{0}' already registered")]
    DuplicateConsumerTag(String),

    /// The broker closed the channel.
    #[error("{context}: channel {channel} closed by peer: {reason}")]
    ChannelClosedByPeer {
        channel: u16,
        reason: CloseReason,
        context: &'static str,
    },

    /// The broker closed the connection.
    #[error("{context}: connection closed by peer: {reason}")]
    ConnectionClosedByPeer {
        reason: CloseReason,
        context: &'static str,
    },

    /// The broker answered a synchronous request by closing the channel.
    #[error("{context}: server rejected request on channel {channel}: {reason}")]
    ServerRejected {
        channel: u16,
        reason: CloseReason,
        context: &'static str,
    },

    /// The broker answered a synchronous request by closing the connection.
    #[error("{context}: connection rejected request: {reason}")]
    ConnectionRejected {
        reason: CloseReason,
        context: &'static str,
    },

    /// A frame of the wrong type arrived where a specific type is mandated.
    #[error("channel {channel}: received unexpected {actual} frame (was expecting {expected})")]
    UnexpectedFrame {
        channel: u16,
        expected: FrameKind,
        actual: FrameKind,
    },

    /// A method that is not one of the expected replies arrived during an RPC.
    #[error("{context}: unexpected method {actual} on channel {channel}")]
    UnexpectedMethod {
        channel: u16,
        actual: MethodId,
        context: &'static str,
    },

    /// Body frames carried more bytes than the content header declared.
    #[error("channel {channel}: body overruns declared size ({received} of {declared} bytes)")]
    BodyOverflow {
        channel: u16,
        declared: u64,
        received: u64,
    },

    /// A wait-forever pull returned without a frame: an engine defect.
    #[error("{context}: engine returned no frame on channel {channel} without a timeout")]
    EmptyReply {
        channel: u16,
        context: &'static str,
    },

    /// Method arguments could not be decoded.
    #[error("malformed {method} arguments: {source}")]
    MalformedMethod {
        method: MethodId,
        #[source]
        source: FrameError,
    },

    /// Channel buffer is full while waiting on another channel.
    #[error("channel {0} buffer full")]
    BufferFull(u16),

    /// A published message was returned by the broker as unroutable.
    #[error("message returned: {0}")]
    MessageReturned(Box<ReturnedMessage>),

    /// The connection has completed its close handshake.
    #[error("connection is closed")]
    ConnectionClosed,

    /// A connection close handshake is in progress; no new work is accepted.
    #[error("connection is closing")]
    ConnectionClosing,

    /// A thread panicked while holding the shared manager lock.
    #[error("channel manager lock poisoned")]
    LockPoisoned,
}

impl ChannelError {
    /// The close reason carried by any peer-initiated close.
    pub fn close_reason(&self) -> Option<&CloseReason> {
        match self {
            ChannelError::ChannelClosedByPeer { reason, .. }
            | ChannelError::ConnectionClosedByPeer { reason, .. }
            | ChannelError::ServerRejected { reason, .. }
            | ChannelError::ConnectionRejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// True if the broker closed the channel or connection.
    pub fn is_peer_close(&self) -> bool {
        self.close_reason().is_some()
    }

    /// True if the connection is no longer usable for any channel.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            ChannelError::ConnectionClosedByPeer { .. }
                | ChannelError::ConnectionRejected { .. }
                | ChannelError::ConnectionClosed
                | ChannelError::ConnectionClosing
                | ChannelError::Engine { .. }
        )
    }

    /// Recast a peer close observed while waiting for an RPC reply as a rejection of it.
    pub(crate) fn into_rejection(self, context: &'static str) -> Self {
        match self {
            ChannelError::ChannelClosedByPeer { channel, reason, .. } => {
                ChannelError::ServerRejected {
                    channel,
                    reason,
                    context,
                }
            }
            ChannelError::ConnectionClosedByPeer { reason, .. } => {
                ChannelError::ConnectionRejected { reason, context }
            }
            other => other,
        }
    }

    pub(crate) fn engine(context: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |source| ChannelError::Engine { context, source }
    }
}

impl From<ReturnedMessage> for ChannelError {
    fn from(message: ReturnedMessage) -> Self {
        ChannelError::MessageReturned(Box::new(message))
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
