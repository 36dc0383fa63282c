//! Channel multiplexing over one AMQP 0-9-1 connection.
//!
//! [`ChannelManager`] owns every logical channel of a connection:
//! - allocates channel ids under the broker's channel-max and pools idle ones
//! - demultiplexes frames, buffering those meant for channels nobody is reading
//! - runs synchronous method calls and their expected replies
//! - completes close handshakes for channels and the connection
//!
//! There is no background reader. Callers drive the transport through
//! [`ChannelManager::next_frame`] with a timeout, and frames for other
//! channels wait in per-channel FIFO queues.

mod allocator;
mod close;
pub mod config;
pub mod consumer;
pub mod content;
pub mod engine;
pub mod error;
pub mod manager;
mod router;
mod rpc;
pub mod shared;

#[cfg(test)]
mod testing;

pub use config::{ChannelConfig, UnexpectedReplyPolicy};
pub use consumer::ConsumerRegistry;
pub use content::{Message, ReturnedMessage};
pub use engine::{EngineConfig, ProtocolEngine};
#[cfg(unix)]
pub use engine::StreamEngine;
pub use error::{ChannelError, EngineError, Result};
pub use manager::{ChannelManager, ConnectionState};
pub use shared::SharedChannelManager;
