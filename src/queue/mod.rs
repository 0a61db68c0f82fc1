//! Link queues
//!
//! This module supplies the next page the client should visit. Each queue has
//! two tiers: an ephemeral FIFO behind the [`LinkQueue`] trait, and a refill
//! query against durable storage that runs when the FIFO is empty.

mod manager;
mod memory;

pub use manager::{recrawl_due_since_publish, LinkQueueManager};
pub use memory::MemoryQueue;

use crate::storage::StorageError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(String),

    #[error("Refill query failed: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Named ephemeral queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKey {
    /// Article links for the forward walk
    Articles,
    /// Account history links for the backward walk
    Accounts,
}

impl QueueKey {
    /// Returns the backend name of the queue
    pub fn name(&self) -> &'static str {
        match self {
            QueueKey::Articles => "pending-articles",
            QueueKey::Accounts => "pending-accounts",
        }
    }
}

/// Ephemeral FIFO storage for pending links
///
/// `pop` must be atomic: two concurrent callers never receive the same link.
/// `push` appends in order and never drops elements. Duplicates are allowed.
#[async_trait]
pub trait LinkQueue: Send + Sync {
    /// Removes and returns the oldest link of a queue
    async fn pop(&self, key: QueueKey) -> QueueResult<Option<String>>;

    /// Appends links to the back of a queue
    async fn push(&self, key: QueueKey, links: Vec<String>) -> QueueResult<()>;

    /// Number of links waiting in a queue
    async fn len(&self, key: QueueKey) -> QueueResult<usize>;
}
