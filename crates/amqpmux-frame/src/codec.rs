use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::channel::CONNECTION_CHANNEL;
use crate::error::{FrameError, Result};
use crate::method::{Method, MethodId};

/// Envelope header: type (1) + channel (2) + size (4) = 7 bytes.
pub const FRAME_HEADER_SIZE: usize = 7;

/// Envelope header plus the trailing frame-end octet.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + 1;

/// Frame-end octet terminating every frame.
pub const FRAME_END: u8 = 0xCE;

/// Default maximum frame size (RabbitMQ's default `frame_max`): 128 KiB.
pub const DEFAULT_FRAME_MAX: usize = 128 * 1024;

const FRAME_METHOD: u8 = 1;
const FRAME_HEADER: u8 = 2;
const FRAME_BODY: u8 = 3;
const FRAME_HEARTBEAT: u8 = 8;

/// Content header: announces the size of the body frames that follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHeader {
    pub class_id: u16,
    pub body_size: u64,
    /// Property flags and property list, still encoded.
    pub properties: Bytes,
}

/// The typed payload of a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Method(Method),
    Header(ContentHeader),
    Body(Bytes),
    Heartbeat,
}

/// Frame type tag, used in diagnostics and protocol-violation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Method,
    Header,
    Body,
    Heartbeat,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameKind::Method => "method",
            FrameKind::Header => "header",
            FrameKind::Body => "body",
            FrameKind::Heartbeat => "heartbeat",
        })
    }
}

/// A frame with channel routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this frame belongs to.
    pub channel: u16,
    /// The frame payload.
    pub payload: FramePayload,
}

impl Frame {
    pub fn method(channel: u16, method: Method) -> Self {
        Self {
            channel,
            payload: FramePayload::Method(method),
        }
    }

    pub fn header(channel: u16, class_id: u16, body_size: u64, properties: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: FramePayload::Header(ContentHeader {
                class_id,
                body_size,
                properties: properties.into(),
            }),
        }
    }

    pub fn body(channel: u16, fragment: impl Into<Bytes>) -> Self {
        Self {
            channel,
            payload: FramePayload::Body(fragment.into()),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            channel: CONNECTION_CHANNEL,
            payload: FramePayload::Heartbeat,
        }
    }

    pub fn kind(&self) -> FrameKind {
        match self.payload {
            FramePayload::Method(_) => FrameKind::Method,
            FramePayload::Header(_) => FrameKind::Header,
            FramePayload::Body(_) => FrameKind::Body,
            FramePayload::Heartbeat => FrameKind::Heartbeat,
        }
    }

    pub fn as_method(&self) -> Option<&Method> {
        match &self.payload {
            FramePayload::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn method_id(&self) -> Option<MethodId> {
        self.as_method().map(|method| method.id)
    }

    /// True if this is a method frame carrying `id`.
    pub fn is_method(&self, id: MethodId) -> bool {
        self.method_id() == Some(id)
    }

    /// The total wire size of this frame (envelope + payload + frame end).
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + payload_len(&self.payload)
    }
}

fn payload_len(payload: &FramePayload) -> usize {
    match payload {
        FramePayload::Method(method) => 4 + method.args.len(),
        FramePayload::Header(header) => 12 + header.properties.len(),
        FramePayload::Body(fragment) => fragment.len(),
        FramePayload::Heartbeat => 0,
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬───────────┬───────────┬─────────────────┬───────────┐
/// │ Type(1B) │ Channel   │ Size      │ Payload         │ End (1B)  │
/// │          │ (2B BE)   │ (4B BE)   │ (Size bytes)    │ 0xCE      │
/// └──────────┴───────────┴───────────┴─────────────────┴───────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let size = payload_len(&frame.payload);
    if size > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size,
            max: u32::MAX as usize,
        });
    }

    dst.reserve(FRAME_OVERHEAD + size);
    let frame_type = match frame.payload {
        FramePayload::Method(_) => FRAME_METHOD,
        FramePayload::Header(_) => FRAME_HEADER,
        FramePayload::Body(_) => FRAME_BODY,
        FramePayload::Heartbeat => FRAME_HEARTBEAT,
    };
    dst.put_u8(frame_type);
    dst.put_u16(frame.channel);
    dst.put_u32(size as u32);

    match &frame.payload {
        FramePayload::Method(method) => {
            dst.put_u16(method.id.class_id());
            dst.put_u16(method.id.method_id());
            dst.put_slice(&method.args);
        }
        FramePayload::Header(header) => {
            dst.put_u16(header.class_id);
            dst.put_u16(0); // weight, always zero
            dst.put_u64(header.body_size);
            dst.put_slice(&header.properties);
        }
        FramePayload::Body(fragment) => dst.put_slice(fragment),
        FramePayload::Heartbeat => {}
    }

    dst.put_u8(FRAME_END);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame: usize) -> Result<Option<Frame>> {
    if src.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let frame_type = src[0];
    if !matches!(
        frame_type,
        FRAME_METHOD | FRAME_HEADER | FRAME_BODY | FRAME_HEARTBEAT
    ) {
        return Err(FrameError::InvalidFrameType(frame_type));
    }

    let channel = u16::from_be_bytes([src[1], src[2]]);
    let size = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;

    if size + FRAME_OVERHEAD > max_frame {
        return Err(FrameError::FrameTooLarge {
            size: size + FRAME_OVERHEAD,
            max: max_frame,
        });
    }

    let total = FRAME_HEADER_SIZE + size + 1;
    if src.len() < total {
        return Ok(None);
    }

    let end = src[total - 1];
    if end != FRAME_END {
        return Err(FrameError::MissingFrameEnd(end));
    }

    src.advance(FRAME_HEADER_SIZE);
    let mut payload = src.split_to(size).freeze();
    src.advance(1);

    let payload = match frame_type {
        FRAME_METHOD => {
            if payload.len() < 4 {
                return Err(FrameError::Malformed(format!(
                    "method frame payload of {} bytes",
                    payload.len()
                )));
            }
            let class_id = payload.get_u16();
            let method_id = payload.get_u16();
            FramePayload::Method(Method::new(MethodId::new(class_id, method_id), payload))
        }
        FRAME_HEADER => {
            if payload.len() < 12 {
                return Err(FrameError::Malformed(format!(
                    "header frame payload of {} bytes",
                    payload.len()
                )));
            }
            let class_id = payload.get_u16();
            let _weight = payload.get_u16();
            let body_size = payload.get_u64();
            FramePayload::Header(ContentHeader {
                class_id,
                body_size,
                properties: payload,
            })
        }
        FRAME_BODY => FramePayload::Body(payload),
        _ => FramePayload::Heartbeat,
    };

    Ok(Some(Frame { channel, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, envelope included. Default: 128 KiB.
    pub max_frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_FRAME_MAX,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
