//! AMQP 0-9-1 frames as seen by the channel core.
//!
//! Every frame on the wire is an envelope of:
//! - A 1-byte frame type (method, header, body, heartbeat)
//! - A 2-byte big-endian channel id
//! - A 4-byte big-endian payload size
//! - The payload, followed by the frame-end octet `0xCE`
//!
//! Method payloads are kept as a [`MethodId`] plus raw argument bytes; only
//! the handful of methods the channel core acts on are decoded.

pub mod channel;
pub mod codec;
pub mod error;
pub mod method;
pub mod reader;
pub mod writer;

pub use channel::{channel_name, effective_channel_max, CONNECTION_CHANNEL, MAX_CHANNEL_ID};
pub use codec::{
    decode_frame, encode_frame, ContentHeader, Frame, FrameConfig, FrameKind, FramePayload,
    DEFAULT_FRAME_MAX, FRAME_END, FRAME_OVERHEAD,
};
pub use error::{FrameError, Result};
pub use method::{BasicReturn, CloseReason, Method, MethodId};
pub use reader::FrameReader;
pub use writer::FrameWriter;
