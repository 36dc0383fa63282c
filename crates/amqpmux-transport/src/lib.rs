//! Socket transport for the amqpmux channel core.
//!
//! Provides the connected byte stream a broker connection runs over and the
//! OS-level readiness polling used to bound blocking frame reads:
//! - TCP streams (any platform)
//! - Unix domain streams (Linux/macOS, mostly for local brokers and tests)
//!
//! This is the lowest layer of amqpmux. Everything else builds on top of
//! the [`AmqpStream`] type provided here.

pub mod error;
#[cfg(unix)]
pub mod poll;
pub mod stream;

pub use error::{Result, TransportError};
#[cfg(unix)]
pub use poll::{wait_readable, Readiness};
pub use stream::AmqpStream;
