use crate::queue::{LinkQueue, QueueKey, QueueResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// In-process link queue
///
/// Contents are lost on restart; the refill query rebuilds them.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<QueueKey, VecDeque<String>>>,
}

impl MemoryQueue {
    /// Creates an empty queue set
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkQueue for MemoryQueue {
    async fn pop(&self, key: QueueKey) -> QueueResult<Option<String>> {
        let mut queues = self.queues.lock().await;
        Ok(queues.get_mut(&key).and_then(VecDeque::pop_front))
    }

    async fn push(&self, key: QueueKey, links: Vec<String>) -> QueueResult<()> {
        if links.is_empty() {
            return Ok(());
        }

        let mut queues = self.queues.lock().await;
        queues.entry(key).or_default().extend(links);
        Ok(())
    }

    async fn len(&self, key: QueueKey) -> QueueResult<usize> {
        let queues = self.queues.lock().await;
        Ok(queues.get(&key).map_or(0, VecDeque::len))
    }
}
