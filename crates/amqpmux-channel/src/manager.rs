use std::collections::{HashMap, VecDeque};

use amqpmux_frame::{Frame, CONNECTION_CHANNEL};
use tracing::debug;

use crate::config::ChannelConfig;
use crate::consumer::ConsumerRegistry;
use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};

/// Connection-scope close state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// connection.close sent, waiting for connection.close-ok.
    ClosingLocal,
    /// connection.close received, acknowledgement being sent.
    ClosingRemote,
    /// Handshake finished; the transport is expected to be torn down.
    Closed,
}

/// Owner of every logical channel multiplexed over one broker connection.
///
/// All bookkeeping (open-channel table, free pool, consumer registry) lives
/// here and is mutated only through `&mut self`. Use
/// [`SharedChannelManager`](crate::SharedChannelManager) to share one
/// manager between threads.
pub struct ChannelManager<E> {
    pub(crate) engine: E,
    pub(crate) config: ChannelConfig,
    /// Open channel id -> frames received for it but not yet consumed.
    pub(crate) open_channels: HashMap<u16, VecDeque<Frame>>,
    /// Open but idle channels, reused in FIFO order.
    pub(crate) free_channels: VecDeque<u16>,
    pub(crate) consumers: ConsumerRegistry,
    pub(crate) next_channel_id: u16,
    pub(crate) state: ConnectionState,
}

impl<E: ProtocolEngine> ChannelManager<E> {
    /// Create a manager with default configuration.
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, ChannelConfig::default())
    }

    /// Create a manager with explicit configuration.
    pub fn with_config(engine: E, config: ChannelConfig) -> Self {
        let mut open_channels = HashMap::new();
        // Channel 0 is always open.
        open_channels.insert(CONNECTION_CHANNEL, VecDeque::new());
        debug!(channel_max = engine.channel_max(), "channel manager created");
        Self {
            engine,
            config,
            open_channels,
            free_channels: VecDeque::new(),
            consumers: ConsumerRegistry::new(),
            next_channel_id: 0,
            state: ConnectionState::Open,
        }
    }

    /// Whether `channel` has an open-channel table entry.
    pub fn is_channel_open(&self, channel: u16) -> bool {
        self.open_channels.contains_key(&channel)
    }

    /// Open logical channels, channel 0 excluded.
    pub fn open_channel_count(&self) -> usize {
        self.open_channels.len().saturating_sub(1)
    }

    /// Channels idle in the free pool.
    pub fn free_channel_count(&self) -> usize {
        self.free_channels.len()
    }

    /// Frames buffered for `channel` and not yet consumed.
    pub fn buffered_frames(&self, channel: u16) -> Result<usize> {
        self.open_channels
            .get(&channel)
            .map(VecDeque::len)
            .ok_or(ChannelError::ChannelNotFound(channel))
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Consume the manager and return the engine, e.g. to tear down the transport.
    pub fn into_engine(self) -> E {
        self.engine
    }

    /// New work is accepted only while the connection is fully open.
    pub(crate) fn ensure_connection_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::ClosingLocal | ConnectionState::ClosingRemote => {
                Err(ChannelError::ConnectionClosing)
            }
            ConnectionState::Closed => Err(ChannelError::ConnectionClosed),
        }
    }

    pub(crate) fn queue_mut(&mut self, channel: u16) -> Result<&mut VecDeque<Frame>> {
        self.open_channels
            .get_mut(&channel)
            .ok_or(ChannelError::ChannelNotFound(channel))
    }
}
