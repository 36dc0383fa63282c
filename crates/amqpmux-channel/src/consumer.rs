use std::collections::HashMap;

use tracing::debug;

use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};
use crate::manager::ChannelManager;

/// Consumer tag -> channel that issued the subscription.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    tags: HashMap<String, u16>,
}

impl ConsumerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `tag` as consuming on `channel`. Tags are unique while registered.
    pub fn register(&mut self, tag: String, channel: u16) -> Result<()> {
        if self.tags.contains_key(&tag) {
            return Err(ChannelError::DuplicateConsumerTag(tag));
        }
        self.tags.insert(tag, channel);
        Ok(())
    }

    /// Remove `tag` and return the channel it was registered on.
    pub fn unregister(&mut self, tag: &str) -> Result<u16> {
        self.tags
            .remove(tag)
            .ok_or_else(|| ChannelError::ConsumerTagNotFound(tag.to_string()))
    }

    pub fn lookup(&self, tag: &str) -> Result<u16> {
        self.tags
            .get(tag)
            .copied()
            .ok_or_else(|| ChannelError::ConsumerTagNotFound(tag.to_string()))
    }

    /// Drop every tag registered on `channel`, returning how many were dropped.
    pub fn remove_channel(&mut self, channel: u16) -> usize {
        let before = self.tags.len();
        self.tags.retain(|_, &mut registered| registered != channel);
        before - self.tags.len()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<E: ProtocolEngine> ChannelManager<E> {
    /// Remember which channel a successful basic.consume was issued on.
    pub fn register_consumer(&mut self, tag: impl Into<String>, channel: u16) -> Result<()> {
        let tag = tag.into();
        debug!(%tag, channel, "consumer registered");
        self.consumers.register(tag, channel)
    }

    /// Forget a cancelled consumer, returning its channel.
    pub fn unregister_consumer(&mut self, tag: &str) -> Result<u16> {
        let channel = self.consumers.unregister(tag)?;
        debug!(tag, channel, "consumer unregistered");
        Ok(channel)
    }

    /// Channel the consumer `tag` was registered on.
    pub fn consumer_channel(&self, tag: &str) -> Result<u16> {
        self.consumers.lookup(tag)
    }

    pub fn consumers(&self) -> &ConsumerRegistry {
        &self.consumers
    }
}
