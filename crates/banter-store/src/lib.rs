pub mod error;
pub mod memory;
pub mod mongo;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use banter_core::Message;

/// Append-only persistence for the message log.
///
/// Implementations must bound every operation with a timeout: a caller in
/// the receive path degrades on error but must never hang on storage.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message and return its store-assigned identifier.
    async fn append(&self, message: &Message) -> Result<String, StoreError>;

    /// The most recent `limit` messages, newest first. Display fields come
    /// back empty; history readers re-enrich from the directory.
    async fn recent(&self, limit: usize) -> Result<Vec<Message>, StoreError>;

    /// Reachability probe for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}
