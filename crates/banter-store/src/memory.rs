use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use banter_core::Message;

use crate::error::StoreError;
use crate::MessageStore;

/// In-memory message log for tests and store-less development.
///
/// Flip `set_unavailable` to make every operation fail the way an
/// unreachable MongoDB would, so callers' degraded paths can be exercised.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("memory store marked down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &Message) -> Result<String, StoreError> {
        self.check_available()?;
        let id = Uuid::now_v7().simple().to_string();
        let mut stored = message.clone();
        stored.id = id.clone();
        // Display fields are not authoritative; the store never keeps them.
        stored.login.clear();
        stored.avatar.clear();
        self.messages.lock().push(stored);
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Message>, StoreError> {
        self.check_available()?;
        let messages = self.messages.lock();
        Ok(messages.iter().rev().take(limit).cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
