use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// An AMQP method identifier: class id in the high 16 bits, method id in the low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(u32);

impl MethodId {
    pub const CONNECTION_CLOSE: MethodId = MethodId::new(10, 50);
    pub const CONNECTION_CLOSE_OK: MethodId = MethodId::new(10, 51);

    pub const CHANNEL_OPEN: MethodId = MethodId::new(20, 10);
    pub const CHANNEL_OPEN_OK: MethodId = MethodId::new(20, 11);
    pub const CHANNEL_FLOW: MethodId = MethodId::new(20, 20);
    pub const CHANNEL_FLOW_OK: MethodId = MethodId::new(20, 21);
    pub const CHANNEL_CLOSE: MethodId = MethodId::new(20, 40);
    pub const CHANNEL_CLOSE_OK: MethodId = MethodId::new(20, 41);

    pub const BASIC_CONSUME: MethodId = MethodId::new(60, 20);
    pub const BASIC_CONSUME_OK: MethodId = MethodId::new(60, 21);
    pub const BASIC_CANCEL: MethodId = MethodId::new(60, 30);
    pub const BASIC_CANCEL_OK: MethodId = MethodId::new(60, 31);
    pub const BASIC_PUBLISH: MethodId = MethodId::new(60, 40);
    pub const BASIC_RETURN: MethodId = MethodId::new(60, 50);
    pub const BASIC_DELIVER: MethodId = MethodId::new(60, 60);
    pub const BASIC_GET_OK: MethodId = MethodId::new(60, 71);
    pub const BASIC_GET_EMPTY: MethodId = MethodId::new(60, 72);
    pub const BASIC_ACK: MethodId = MethodId::new(60, 80);
    pub const BASIC_NACK: MethodId = MethodId::new(60, 120);

    pub const CONFIRM_SELECT: MethodId = MethodId::new(85, 10);
    pub const CONFIRM_SELECT_OK: MethodId = MethodId::new(85, 11);

    pub const fn new(class_id: u16, method_id: u16) -> Self {
        Self(((class_id as u32) << 16) | method_id as u32)
    }

    pub const fn from_u32(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub const fn class_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn method_id(self) -> u16 {
        self.0 as u16
    }

    /// Dotted AMQP name for known methods, `"unknown"` otherwise.
    pub fn name(self) -> &'static str {
        match self {
            Self::CONNECTION_CLOSE => "connection.close",
            Self::CONNECTION_CLOSE_OK => "connection.close-ok",
            Self::CHANNEL_OPEN => "channel.open",
            Self::CHANNEL_OPEN_OK => "channel.open-ok",
            Self::CHANNEL_FLOW => "channel.flow",
            Self::CHANNEL_FLOW_OK => "channel.flow-ok",
            Self::CHANNEL_CLOSE => "channel.close",
            Self::CHANNEL_CLOSE_OK => "channel.close-ok",
            Self::BASIC_CONSUME => "basic.consume",
            Self::BASIC_CONSUME_OK => "basic.consume-ok",
            Self::BASIC_CANCEL => "basic.cancel",
            Self::BASIC_CANCEL_OK => "basic.cancel-ok",
            Self::BASIC_PUBLISH => "basic.publish",
            Self::BASIC_RETURN => "basic.return",
            Self::BASIC_DELIVER => "basic.deliver",
            Self::BASIC_GET_OK => "basic.get-ok",
            Self::BASIC_GET_EMPTY => "basic.get-empty",
            Self::BASIC_ACK => "basic.ack",
            Self::BASIC_NACK => "basic.nack",
            Self::CONFIRM_SELECT => "confirm.select",
            Self::CONFIRM_SELECT_OK => "confirm.select-ok",
            _ => "unknown",
        }
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "unknown" => write!(f, "method({}.{})", self.class_id(), self.method_id()),
            name => f.write_str(name),
        }
    }
}

/// A decoded method frame payload: the id plus its still-encoded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub id: MethodId,
    pub args: Bytes,
}

impl Method {
    pub fn new(id: MethodId, args: impl Into<Bytes>) -> Self {
        Self {
            id,
            args: args.into(),
        }
    }

    /// A method without arguments (the `*-ok` acknowledgements).
    pub fn empty(id: MethodId) -> Self {
        Self::new(id, Bytes::new())
    }

    /// channel.open with the reserved out-of-band shortstr left empty.
    pub fn channel_open() -> Self {
        Self::new(MethodId::CHANNEL_OPEN, Bytes::from_static(&[0]))
    }

    /// confirm.select, enabling publisher confirms on the channel.
    pub fn confirm_select(nowait: bool) -> Self {
        Self::new(MethodId::CONFIRM_SELECT, vec![u8::from(nowait)])
    }

    pub fn channel_close(reason: &CloseReason) -> Self {
        Self::new(MethodId::CHANNEL_CLOSE, reason.encode())
    }

    pub fn channel_close_ok() -> Self {
        Self::empty(MethodId::CHANNEL_CLOSE_OK)
    }

    pub fn connection_close(reason: &CloseReason) -> Self {
        Self::new(MethodId::CONNECTION_CLOSE, reason.encode())
    }

    pub fn connection_close_ok() -> Self {
        Self::empty(MethodId::CONNECTION_CLOSE_OK)
    }

    /// Whether this is a channel.close or connection.close.
    pub fn is_close(&self) -> bool {
        self.id == MethodId::CHANNEL_CLOSE || self.id == MethodId::CONNECTION_CLOSE
    }
}

/// Arguments of channel.close / connection.close: why the peer is closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub reply_code: u16,
    pub reply_text: String,
    /// Class of the method that caused the close, 0 if none.
    pub class_id: u16,
    pub method_id: u16,
}

impl CloseReason {
    /// The reason a client gives for an orderly local close.
    pub fn normal() -> Self {
        Self {
            reply_code: 200,
            reply_text: "OK".to_string(),
            class_id: 0,
            method_id: 0,
        }
    }

    pub fn decode(args: &[u8]) -> Result<Self> {
        let mut args = ArgReader::new(args);
        Ok(Self {
            reply_code: args.read_u16("reply-code")?,
            reply_text: args.read_shortstr("reply-text")?,
            class_id: args.read_u16("class-id")?,
            method_id: args.read_u16("method-id")?,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(7 + self.reply_text.len());
        dst.put_u16(self.reply_code);
        put_shortstr(&mut dst, &self.reply_text);
        dst.put_u16(self.class_id);
        dst.put_u16(self.method_id);
        dst.freeze()
    }

    /// The method the broker blames for the close, if it named one.
    pub fn failing_method(&self) -> Option<MethodId> {
        (self.class_id != 0).then(|| MethodId::new(self.class_id, self.method_id))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.reply_code, self.reply_text)?;
        if let Some(method) = self.failing_method() {
            write!(f, " (caused by {method})")?;
        }
        Ok(())
    }
}

/// Arguments of basic.return: an unroutable published message coming back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicReturn {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
}

impl BasicReturn {
    pub fn decode(args: &[u8]) -> Result<Self> {
        let mut args = ArgReader::new(args);
        Ok(Self {
            reply_code: args.read_u16("reply-code")?,
            reply_text: args.read_shortstr("reply-text")?,
            exchange: args.read_shortstr("exchange")?,
            routing_key: args.read_shortstr("routing-key")?,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        dst.put_u16(self.reply_code);
        put_shortstr(&mut dst, &self.reply_text);
        put_shortstr(&mut dst, &self.exchange);
        put_shortstr(&mut dst, &self.routing_key);
        dst.freeze()
    }
}

/// Shortstr fields are capped at 255 bytes; longer text is truncated on a char boundary.
fn put_shortstr(dst: &mut BytesMut, value: &str) {
    let mut end = value.len().min(u8::MAX as usize);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    dst.put_u8(end as u8);
    dst.put_slice(&value.as_bytes()[..end]);
}

struct ArgReader<'a> {
    buf: &'a [u8],
}

impl<'a> ArgReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn read_u16(&mut self, field: &str) -> Result<u16> {
        if self.buf.remaining() < 2 {
            return Err(truncated(field));
        }
        Ok(self.buf.get_u16())
    }

    fn read_shortstr(&mut self, field: &str) -> Result<String> {
        if self.buf.remaining() < 1 {
            return Err(truncated(field));
        }
        let len = self.buf.get_u8() as usize;
        if self.buf.remaining() < len {
            return Err(truncated(field));
        }
        let value = String::from_utf8_lossy(&self.buf[..len]).into_owned();
        self.buf.advance(len);
        Ok(value)
    }
}

fn truncated(field: &str) -> FrameError {
    FrameError::Malformed(format!("method arguments truncated at {field}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_id_parts() {
        let id = MethodId::CHANNEL_CLOSE;
        assert_eq!(id.class_id(), 20);
        assert_eq!(id.method_id(), 40);
        assert_eq!(id.as_u32(), 0x0014_0028);
        assert_eq!(MethodId::from_u32(0x0014_0028), id);
    }

    #[test]
    fn method_id_display() {
        assert_eq!(MethodId::CONFIRM_SELECT_OK.to_string(), "confirm.select-ok");
        assert_eq!(MethodId::new(50, 10).to_string(), "method(50.10)");
    }

    #[test]
    fn close_reason_decodes_broker_close() {
        let reason = CloseReason {
            reply_code: 404,
            reply_text: "NOT_FOUND - no queue 'q'".to_string(),
            class_id: 50,
            method_id: 10,
        };
        let decoded = CloseReason::decode(&reason.encode()).unwrap();
        assert_eq!(decoded, reason);
        assert_eq!(decoded.failing_method(), Some(MethodId::new(50, 10)));
        assert_eq!(
            decoded.to_string(),
            "404 NOT_FOUND - no queue 'q' (caused by method(50.10))"
        );
    }

    #[test]
    fn close_reason_without_failing_method() {
        let reason = CloseReason::normal();
        assert_eq!(reason.failing_method(), None);
        assert_eq!(reason.to_string(), "200 OK");
    }

    #[test]
    fn truncated_close_reason_is_malformed() {
        let encoded = CloseReason::normal().encode();
        let err = CloseReason::decode(&encoded[..4]).unwrap_err();
        assert!(matches!(err, FrameError::Malformed(msg) if msg.contains("reply-text")));
    }

    #[test]
    fn basic_return_decodes() {
        let ret = BasicReturn {
            reply_code: 312,
            reply_text: "NO_ROUTE".to_string(),
            exchange: "amq.direct".to_string(),
            routing_key: "missing".to_string(),
        };
        assert_eq!(BasicReturn::decode(&ret.encode()).unwrap(), ret);
    }

    #[test]
    fn long_text_is_truncated_to_shortstr() {
        let reason = CloseReason {
            reply_text: "é".repeat(200),
            ..CloseReason::normal()
        };
        let decoded = CloseReason::decode(&reason.encode()).unwrap();
        assert_eq!(decoded.reply_text.len(), 254);
    }

    #[test]
    fn open_and_confirm_arguments() {
        assert_eq!(Method::channel_open().args.as_ref(), &[0]);
        assert_eq!(Method::confirm_select(false).args.as_ref(), &[0]);
        assert_eq!(Method::confirm_select(true).args.as_ref(), &[1]);
        assert!(Method::channel_close_ok().args.is_empty());
        assert!(Method::channel_close(&CloseReason::normal()).is_close());
        assert!(!Method::connection_close_ok().is_close());
    }
}
