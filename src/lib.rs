//! mp-spider: content harvesting through an intercepting proxy
//!
//! This crate classifies the traffic a proxy host intercepts between a client
//! and a paginated publishing platform, extracts articles, accounts, comments
//! and read metrics from it, and rewrites selected pages so the client keeps
//! walking through content on its own.

pub mod config;
pub mod crawl;
pub mod dispatch;
pub mod extract;
pub mod output;
pub mod proxy;
pub mod queue;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for mp-spider operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Extraction error: {0}")]
    Extract(#[from] extract::ExtractError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for mp-spider operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawl::HistoryState;
pub use dispatch::Dispatcher;
pub use proxy::ProxyRule;
pub use url::{classify_url, ExchangeKind};
