//! Channel multiplexing core for AMQP 0-9-1 clients.
//!
//! amqpmux manages the logical channels of one broker connection: channel id
//! allocation and pooling, frame demultiplexing with timeouts, synchronous
//! method calls and close handshakes.
//!
//! # Crate Structure
//!
//! - [`transport`]: Connected broker socket and readiness polling
//! - [`frame`]: AMQP frame envelope codec and the methods the core acts on
//! - [`channel`]: Channel manager, protocol engine interface and errors

/// Re-export transport types.
pub mod transport {
    pub use amqpmux_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use amqpmux_frame::*;
}

/// Re-export channel management types.
pub mod channel {
    pub use amqpmux_channel::*;
}
