/// What an RPC does with a method that is not one of its expected replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnexpectedReplyPolicy {
    /// Log and keep waiting for an expected reply.
    #[default]
    Ignore,
    /// Fail the call with `ChannelError::UnexpectedMethod` / `UnexpectedFrame`.
    Fail,
}

/// Controls channel management behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Put every newly opened channel into publisher-confirm mode.
    pub confirm_select: bool,
    /// Handling of stray methods while an RPC waits for its reply.
    pub unexpected_reply: UnexpectedReplyPolicy,
    /// Cap on frames buffered per channel while another channel is being read.
    /// `None` buffers without limit.
    pub max_buffered_frames: Option<usize>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            confirm_select: true,
            unexpected_reply: UnexpectedReplyPolicy::Ignore,
            max_buffered_frames: None,
        }
    }
}
