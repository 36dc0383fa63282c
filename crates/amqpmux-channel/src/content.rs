use std::fmt;

use amqpmux_frame::{BasicReturn, Frame, FrameKind, FramePayload, Method, MethodId};
use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};
use crate::manager::ChannelManager;

/// Upper bound on the body buffer reserved up front from a header's declared size.
const MAX_BODY_PREALLOC: u64 = 16 * 1024 * 1024;

/// Message content: the header's properties plus the reassembled body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub class_id: u16,
    /// Property flags and property list, still encoded.
    pub properties: Bytes,
    pub body: Bytes,
}

/// A published message the broker could not route, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnedMessage {
    pub reply: BasicReturn,
    pub message: Message,
}

impl fmt::Display for ReturnedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (exchange '{}', routing key '{}')",
            self.reply.reply_code, self.reply.reply_text, self.reply.exchange, self.reply.routing_key
        )
    }
}

impl<E: ProtocolEngine> ChannelManager<E> {
    /// Read the content that follows a content-bearing method on `channel`:
    /// one header frame, then body frames up to the declared size.
    pub fn read_content(&mut self, channel: u16) -> Result<Message> {
        let frame = self.next_content_frame(channel)?;
        let kind = frame.kind();
        let FramePayload::Header(header) = frame.payload else {
            return Err(ChannelError::UnexpectedFrame {
                channel,
                expected: FrameKind::Header,
                actual: kind,
            });
        };

        let declared = header.body_size;
        let mut body = BytesMut::with_capacity(declared.min(MAX_BODY_PREALLOC) as usize);

        while (body.len() as u64) < declared {
            let frame = self.next_content_frame(channel)?;
            let kind = frame.kind();
            let FramePayload::Body(fragment) = frame.payload else {
                return Err(ChannelError::UnexpectedFrame {
                    channel,
                    expected: FrameKind::Body,
                    actual: kind,
                });
            };

            let received = (body.len() + fragment.len()) as u64;
            if received > declared {
                return Err(ChannelError::BodyOverflow {
                    channel,
                    declared,
                    received,
                });
            }
            body.extend_from_slice(&fragment);
        }

        trace!(channel, size = declared, "content read");
        Ok(Message {
            class_id: header.class_id,
            properties: header.properties,
            body: body.freeze(),
        })
    }

    /// Decode a basic.return received on `channel` and read its content.
    pub fn read_returned_message(&mut self, channel: u16, method: &Method) -> Result<ReturnedMessage> {
        if method.id != MethodId::BASIC_RETURN {
            return Err(ChannelError::UnexpectedMethod {
                channel,
                actual: method.id,
                context: "read_returned_message",
            });
        }
        let reply = BasicReturn::decode(&method.args).map_err(|source| ChannelError::MalformedMethod {
            method: method.id,
            source,
        })?;
        let message = self.read_content(channel)?;
        Ok(ReturnedMessage { reply, message })
    }

    fn next_content_frame(&mut self, channel: u16) -> Result<Frame> {
        self.next_frame(channel, None)?.ok_or(ChannelError::EmptyReply {
            channel,
            context: "read_content",
        })
    }
}
