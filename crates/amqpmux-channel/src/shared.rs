//! Thread-shared channel manager.
//!
//! Every operation holds one lock for its whole duration, so a thread blocked
//! in `next_frame` or `call` keeps the others out until it returns.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use amqpmux_frame::{Frame, Method, MethodId};

use crate::config::ChannelConfig;
use crate::content::{Message, ReturnedMessage};
use crate::engine::ProtocolEngine;
use crate::error::{ChannelError, Result};
use crate::manager::{ChannelManager, ConnectionState};

/// A [`ChannelManager`] behind one coarse mutex.
pub struct SharedChannelManager<E> {
    inner: Arc<Mutex<ChannelManager<E>>>,
}

impl<E> Clone for SharedChannelManager<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: ProtocolEngine> SharedChannelManager<E> {
    pub fn new(engine: E) -> Self {
        Self::from_manager(ChannelManager::new(engine))
    }

    pub fn with_config(engine: E, config: ChannelConfig) -> Self {
        Self::from_manager(ChannelManager::with_config(engine, config))
    }

    pub fn from_manager(manager: ChannelManager<E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    /// Run `f` with exclusive access to the manager.
    pub fn with<T>(&self, f: impl FnOnce(&mut ChannelManager<E>) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.lock().map_err(|_| ChannelError::LockPoisoned)?;
        f(&mut guard)
    }

    pub fn acquire_channel(&self) -> Result<u16> {
        self.with(|manager| manager.acquire_channel())
    }

    pub fn release_channel(&self, channel: u16) -> Result<()> {
        self.with(|manager| manager.release_channel(channel))
    }

    pub fn call(&self, channel: u16, method: Method, expected: &[MethodId]) -> Result<Method> {
        self.with(|manager| manager.call(channel, method, expected))
    }

    pub fn next_frame(&self, channel: u16, timeout: Option<Duration>) -> Result<Option<Frame>> {
        self.with(|manager| manager.next_frame(channel, timeout))
    }

    pub fn read_content(&self, channel: u16) -> Result<Message> {
        self.with(|manager| manager.read_content(channel))
    }

    pub fn read_returned_message(&self, channel: u16, method: &Method) -> Result<ReturnedMessage> {
        self.with(|manager| manager.read_returned_message(channel, method))
    }

    pub fn register_consumer(&self, tag: impl Into<String>, channel: u16) -> Result<()> {
        let tag = tag.into();
        self.with(|manager| manager.register_consumer(tag, channel))
    }

    pub fn unregister_consumer(&self, tag: &str) -> Result<u16> {
        self.with(|manager| manager.unregister_consumer(tag))
    }

    pub fn consumer_channel(&self, tag: &str) -> Result<u16> {
        self.with(|manager| manager.consumer_channel(tag))
    }

    pub fn close_channel(&self, channel: u16) -> Result<()> {
        self.with(|manager| manager.close_channel(channel))
    }

    pub fn close_connection(&self) -> Result<()> {
        self.with(|manager| manager.close_connection())
    }

    pub fn is_channel_open(&self, channel: u16) -> Result<bool> {
        self.with(|manager| Ok(manager.is_channel_open(channel)))
    }

    pub fn open_channel_count(&self) -> Result<usize> {
        self.with(|manager| Ok(manager.open_channel_count()))
    }

    pub fn connection_state(&self) -> Result<ConnectionState> {
        self.with(|manager| Ok(manager.connection_state()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;
    use crate::testing::ScriptedEngine;

    #[test]
    fn threads_never_share_a_channel() {
        let shared = SharedChannelManager::new(ScriptedEngine::broker(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    (0..4)
                        .map(|_| shared.acquire_channel().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().unwrap());
        }
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), 32);
        assert_eq!(shared.open_channel_count().unwrap(), 32);
    }

    #[test]
    fn consumer_registry_through_shared_handle() {
        let shared = SharedChannelManager::new(ScriptedEngine::broker(0));
        let channel = shared.acquire_channel().unwrap();
        shared.register_consumer("ctag", channel).unwrap();
        assert_eq!(shared.consumer_channel("ctag").unwrap(), channel);

        shared.close_channel(channel).unwrap();
        assert!(!shared.is_channel_open(channel).unwrap());
        assert!(matches!(
            shared.consumer_channel("ctag"),
            Err(ChannelError::ConsumerTagNotFound(_))
        ));
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let shared = SharedChannelManager::new(ScriptedEngine::broker(0));
        let poisoner = shared.clone();
        let _ = thread::spawn(move || {
            poisoner
                .with(|_| -> Result<()> { panic!("boom") })
                .ok();
        })
        .join();

        assert!(matches!(shared.acquire_channel(), Err(ChannelError::LockPoisoned)));
    }
}
