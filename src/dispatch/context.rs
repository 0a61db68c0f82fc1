use crate::config::Config;
use crate::queue::{LinkQueue, LinkQueueManager};
use crate::storage::Storage;
use std::sync::Arc;

/// Shared state every handler and the proxy rule work against
#[derive(Clone)]
pub struct SpiderContext {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub links: Arc<LinkQueueManager>,
}

impl SpiderContext {
    /// Wires configuration, storage and the ephemeral queue together
    pub fn new(config: Config, storage: Arc<dyn Storage>, queue: Arc<dyn LinkQueue>) -> Self {
        let links = Arc::new(LinkQueueManager::new(queue, Arc::clone(&storage), &config));
        Self {
            config: Arc::new(config),
            storage,
            links,
        }
    }
}
