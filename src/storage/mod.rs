//! Storage module for persisting harvested records
//!
//! This module handles all database operations for the spider, including:
//! - SQLite database initialization and schema management
//! - Merge-upserts of articles, accounts and comments by natural key
//! - Append-only read metric samples
//! - Per-account publication spans
//! - Refill queries feeding the link queues

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Natural key of an article: (account id, message id, message index)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleKey {
    /// Platform business id of the publishing account (`__biz`)
    pub account_id: String,
    /// Id of the push the article was published in (`mid`)
    pub message_id: String,
    /// Position of the article inside its push, 1 for the headline (`idx`)
    pub message_index: String,
}

impl ArticleKey {
    pub fn new(
        account_id: impl Into<String>,
        message_id: impl Into<String>,
        message_index: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            message_id: message_id.into(),
            message_index: message_index.into(),
        }
    }
}

/// Partial set of article fields; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub link: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub read_count: Option<i64>,
    pub like_count: Option<i64>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub source_url: Option<String>,
    pub content: Option<String>,
    pub failed: Option<bool>,
    pub metrics_updated_at: Option<DateTime<Utc>>,
    pub account_handle: Option<String>,
}

/// An article row
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRecord {
    pub id: i64,
    pub key: ArticleKey,
    pub title: Option<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub link: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub read_count: Option<i64>,
    pub like_count: Option<i64>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub source_url: Option<String>,
    pub content: Option<String>,
    pub failed: bool,
    pub metrics_updated_at: Option<DateTime<Utc>>,
    pub account_handle: Option<String>,
}

impl ArticleRecord {
    /// True once title, link and account handle are all known
    pub fn has_basic_info(&self) -> bool {
        self.title.is_some() && self.link.is_some() && self.account_handle.is_some()
    }
}

/// Partial set of account fields; `None` leaves the stored value untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountPatch {
    pub nickname: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub handle: Option<String>,
    pub history_opened_at: Option<DateTime<Utc>>,
    pub first_publish_at: Option<DateTime<Utc>>,
}

/// An account row
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    pub id: i64,
    pub account_id: String,
    pub nickname: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
    pub handle: Option<String>,
    pub history_opened_at: Option<DateTime<Utc>>,
    pub first_publish_at: Option<DateTime<Utc>>,
}

/// A reply owned by a comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub like_count: i64,
}

/// A comment row, keyed by the platform content id
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub content_id: String,
    pub article_id: i64,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub like_count: Option<i64>,
    pub replies: Vec<Reply>,
}

/// One observation of an article's engagement counters
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub article_id: i64,
    pub observed_at: DateTime<Utc>,
    pub read_count: i64,
    pub like_count: i64,
}

/// Span of publish times listed for an account without holes
///
/// Every push published between `earliest_publish_at` and
/// `latest_publish_at` has been seen in some listing.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicationRecord {
    pub account_id: String,
    pub earliest_publish_at: DateTime<Utc>,
    pub latest_publish_at: DateTime<Utc>,
    pub article_count: u64,
    pub updated_at: DateTime<Utc>,
}

/// Durable refill query for the article queue
#[derive(Debug, Clone)]
pub struct ArticleRefillFilter {
    pub min_publish_at: DateTime<Utc>,
    pub max_publish_at: DateTime<Utc>,
    /// Empty means every account
    pub target_accounts: Vec<String>,
    /// Only articles that never had metrics recorded
    pub only_unmeasured: bool,
}

/// An article the refill query considers visiting
#[derive(Debug, Clone, PartialEq)]
pub struct RefillCandidate {
    pub link: String,
    pub publish_at: DateTime<Utc>,
    pub metrics_updated_at: Option<DateTime<Utc>>,
}

/// Durable refill query for the account queue
#[derive(Debug, Clone)]
pub struct AccountRefillFilter {
    /// Accounts whose history page was opened at or after this are skipped
    pub opened_before: DateTime<Utc>,
    /// Empty means every account
    pub target_accounts: Vec<String>,
}

/// Row counts per record kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub articles: u64,
    pub failed_articles: u64,
    pub measured_articles: u64,
    pub accounts: u64,
    pub comments: u64,
    pub metric_samples: u64,
    pub publication_records: u64,
}
