//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    AccountPatch, AccountRecord, AccountRefillFilter, ArticleKey, ArticlePatch, ArticleRecord,
    ArticleRefillFilter, CommentRecord, MetricSample, PublicationRecord, RecordCounts,
    RefillCandidate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Storage connection lock poisoned")]
    LockPoisoned,

    #[error("Invalid stored value in {column}: {value}")]
    InvalidValue { column: &'static str, value: i64 },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write is an upsert by natural key that merges the given fields onto
/// the stored row, so repeating a call or racing another caller for the same
/// key never duplicates rows.
#[async_trait]
pub trait Storage: Send + Sync {
    // ===== Articles =====

    /// Creates or enriches the article identified by `key`
    ///
    /// Fields left `None` in `patch` keep their stored value.
    ///
    /// # Returns
    ///
    /// The internal id of the article row
    async fn upsert_article(&self, key: &ArticleKey, patch: &ArticlePatch) -> StorageResult<i64>;

    /// Gets an article by natural key
    async fn get_article(&self, key: &ArticleKey) -> StorageResult<Option<ArticleRecord>>;

    // ===== Accounts =====

    /// Creates or enriches the account identified by `account_id`
    async fn upsert_account(&self, account_id: &str, patch: &AccountPatch) -> StorageResult<i64>;

    /// Gets an account by business id
    async fn get_account(&self, account_id: &str) -> StorageResult<Option<AccountRecord>>;

    // ===== Comments =====

    /// Creates or updates a comment by content id, replacing its replies
    async fn upsert_comment(&self, comment: &CommentRecord) -> StorageResult<()>;

    /// Gets a comment by content id
    async fn get_comment(&self, content_id: &str) -> StorageResult<Option<CommentRecord>>;

    // ===== Read metrics =====

    /// Appends one metric sample
    async fn record_metric_sample(&self, sample: &MetricSample) -> StorageResult<()>;

    /// Gets all samples of an article, oldest first
    async fn metric_samples(&self, article_id: i64) -> StorageResult<Vec<MetricSample>>;

    // ===== Publication records =====

    /// Forgets the history walk in progress for an account
    ///
    /// Called when the account's history page opens; the listings that
    /// follow belong to a new walk starting at the newest push.
    async fn start_history_walk(&self, account_id: &str) -> StorageResult<()>;

    /// Records one listing page `[earliest, latest]` of the walk in progress
    ///
    /// A walk lists downwards without holes. Its coverage joins the stored
    /// span only once it overlaps it; until then the span is left as is.
    async fn record_publications(
        &self,
        account_id: &str,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Gets the discovered span of an account
    async fn get_publication_record(
        &self,
        account_id: &str,
    ) -> StorageResult<Option<PublicationRecord>>;

    // ===== Refill queries =====

    /// Selects article links eligible for the forward walk
    ///
    /// Failed articles and articles without a link are never returned.
    async fn article_refill_candidates(
        &self,
        filter: &ArticleRefillFilter,
    ) -> StorageResult<Vec<RefillCandidate>>;

    /// Selects account ids eligible for a history walk, least recently opened first
    async fn account_refill_candidates(
        &self,
        filter: &AccountRefillFilter,
    ) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    /// Counts rows of every record kind
    async fn count_records(&self) -> StorageResult<RecordCounts>;
}
