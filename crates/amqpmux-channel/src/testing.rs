//! In-memory engine for deterministic tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use amqpmux_frame::{CloseReason, Frame, FrameError, Method, MethodId, CONNECTION_CHANNEL};
use amqpmux_transport::TransportError;

use crate::engine::ProtocolEngine;
use crate::error::EngineError;

pub(crate) enum Step {
    Frame(Frame),
    /// The pull's timeout elapses with nothing received.
    Timeout,
}

/// Plays back scripted frames and records everything sent.
///
/// With auto-replies enabled it answers channel.open, confirm.select and the
/// close methods the way a well-behaved broker does.
pub(crate) struct ScriptedEngine {
    pub incoming: VecDeque<Step>,
    pub sent: Vec<(u16, Method)>,
    pub channel_max: u16,
    pub auto_replies: HashMap<MethodId, MethodId>,
    pub pulls: usize,
    pub timeouts_seen: Vec<Option<Duration>>,
    pub fail_sends: bool,
    pub released: usize,
}

impl ScriptedEngine {
    pub fn broker(channel_max: u16) -> Self {
        let mut engine = Self::silent(channel_max);
        engine.auto_replies = HashMap::from([
            (MethodId::CHANNEL_OPEN, MethodId::CHANNEL_OPEN_OK),
            (MethodId::CONFIRM_SELECT, MethodId::CONFIRM_SELECT_OK),
            (MethodId::CHANNEL_CLOSE, MethodId::CHANNEL_CLOSE_OK),
            (MethodId::CONNECTION_CLOSE, MethodId::CONNECTION_CLOSE_OK),
        ]);
        engine
    }

    pub fn silent(channel_max: u16) -> Self {
        Self {
            incoming: VecDeque::new(),
            sent: Vec::new(),
            channel_max,
            auto_replies: HashMap::new(),
            pulls: 0,
            timeouts_seen: Vec::new(),
            fail_sends: false,
            released: 0,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.incoming.push_back(Step::Frame(frame));
    }

    pub fn push_timeout(&mut self) {
        self.incoming.push_back(Step::Timeout);
    }

    pub fn sent_ids(&self) -> Vec<(u16, MethodId)> {
        self.sent.iter().map(|(ch, m)| (*ch, m.id)).collect()
    }
}

impl ProtocolEngine for ScriptedEngine {
    fn send_method(&mut self, channel: u16, method: &Method) -> Result<(), EngineError> {
        if self.fail_sends {
            return Err(EngineError::Transport(TransportError::Shutdown));
        }
        self.sent.push((channel, method.clone()));
        if let Some(reply) = self.auto_replies.get(&method.id) {
            self.incoming
                .push_back(Step::Frame(Frame::method(channel, Method::empty(*reply))));
        }
        Ok(())
    }

    fn pull_frame(&mut self, timeout: Option<Duration>) -> Result<Option<Frame>, EngineError> {
        self.pulls += 1;
        self.timeouts_seen.push(timeout);
        match self.incoming.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Timeout) => Ok(None),
            // Script exhausted: a bounded wait times out, an unbounded one
            // would hang forever, so report the connection gone instead.
            None if timeout.is_some() => Ok(None),
            None => Err(EngineError::Frame(FrameError::ConnectionClosed)),
        }
    }

    fn channel_max(&self) -> u16 {
        self.channel_max
    }

    fn release_buffers(&mut self) {
        self.released += 1;
    }
}

pub(crate) fn channel_close_frame(channel: u16, reply_code: u16, reply_text: &str) -> Frame {
    Frame::method(
        channel,
        Method::channel_close(&CloseReason {
            reply_code,
            reply_text: reply_text.to_string(),
            class_id: 50,
            method_id: 10,
        }),
    )
}

pub(crate) fn connection_close_frame(reply_code: u16, reply_text: &str) -> Frame {
    Frame::method(
        CONNECTION_CHANNEL,
        Method::connection_close(&CloseReason {
            reply_code,
            reply_text: reply_text.to_string(),
            class_id: 0,
            method_id: 0,
        }),
    )
}
