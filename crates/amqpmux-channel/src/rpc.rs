use amqpmux_frame::{FrameKind, FramePayload, Method, MethodId};
use tracing::{trace, warn};

use crate::config::UnexpectedReplyPolicy;
use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};
use crate::manager::ChannelManager;

impl<E: ProtocolEngine> ChannelManager<E> {
    /// Send `method` on `channel` and block until one of `expected` comes back.
    ///
    /// A broker close arriving instead of the reply is acknowledged and
    /// reported as `ServerRejected` (channel close) or `ConnectionRejected`
    /// (connection close), carrying the broker's reason. Anything else that
    /// arrives in the meantime is handled per
    /// [`ChannelConfig::unexpected_reply`](crate::ChannelConfig::unexpected_reply).
    pub fn call(&mut self, channel: u16, method: Method, expected: &[MethodId]) -> Result<Method> {
        self.ensure_connection_open()?;
        let context = method.id.name();

        if !self.is_channel_open(channel) {
            return Err(ChannelError::ChannelNotFound(channel));
        }
        self.engine
            .send_method(channel, &method)
            .map_err(ChannelError::engine(context))?;
        trace!(channel, method = %method.id, "rpc sent");

        loop {
            let frame = match self.next_frame(channel, None) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Err(ChannelError::EmptyReply { channel, context }),
                Err(err) => return Err(err.into_rejection(context)),
            };

            let kind = frame.kind();
            match frame.payload {
                FramePayload::Method(reply) if expected.contains(&reply.id) => {
                    trace!(channel, reply = %reply.id, "rpc answered");
                    return Ok(reply);
                }
                FramePayload::Method(reply) => match self.config.unexpected_reply {
                    UnexpectedReplyPolicy::Fail => {
                        return Err(ChannelError::UnexpectedMethod {
                            channel,
                            actual: reply.id,
                            context,
                        })
                    }
                    UnexpectedReplyPolicy::Ignore => {
                        warn!(channel, context, method = %reply.id, "ignoring unexpected method");
                    }
                },
                _ => match self.config.unexpected_reply {
                    UnexpectedReplyPolicy::Fail => {
                        return Err(ChannelError::UnexpectedFrame {
                            channel,
                            expected: FrameKind::Method,
                            actual: kind,
                        })
                    }
                    UnexpectedReplyPolicy::Ignore => {
                        warn!(channel, context, %kind, "ignoring unexpected frame");
                    }
                },
            }
        }
    }
}
