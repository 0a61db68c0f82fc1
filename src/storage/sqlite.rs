//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! The connection lives behind a mutex and every call runs on tokio's
//! blocking pool, so handlers never stall an async worker on disk I/O.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    AccountPatch, AccountRecord, AccountRefillFilter, ArticleKey, ArticlePatch, ArticleRecord,
    ArticleRefillFilter, CommentRecord, MetricSample, PublicationRecord, RecordCounts,
    RefillCandidate, Reply,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

const ARTICLE_COLUMNS: &str = "id, account_id, message_id, message_index, title, author, \
     copyright, link, publish_at, read_count, like_count, cover, digest, source_url, content, \
     failed, metrics_updated_at, account_handle";

const ACCOUNT_COLUMNS: &str = "id, account_id, nickname, description, avatar, handle, \
     history_opened_at, first_publish_at";

/// SQLite storage backend
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        // Initialize schema
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `op` against the connection on the blocking pool
    async fn run<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            op(&conn)
        })
        .await?
    }
}

fn to_millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|at| at.timestamp_millis())
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

fn required_millis(column: &'static str, ms: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(StorageError::InvalidValue { column, value: ms })
}

/// Builds `?n, ?n+1, ...` for an IN clause starting after `bound` parameters
fn placeholders(bound: usize, count: usize) -> String {
    (bound + 1..=bound + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn article_from_row(row: &Row<'_>) -> rusqlite::Result<ArticleRecord> {
    Ok(ArticleRecord {
        id: row.get(0)?,
        key: ArticleKey {
            account_id: row.get(1)?,
            message_id: row.get(2)?,
            message_index: row.get(3)?,
        },
        title: row.get(4)?,
        author: row.get(5)?,
        copyright: row.get(6)?,
        link: row.get(7)?,
        publish_at: from_millis(row.get(8)?),
        read_count: row.get(9)?,
        like_count: row.get(10)?,
        cover: row.get(11)?,
        digest: row.get(12)?,
        source_url: row.get(13)?,
        content: row.get(14)?,
        failed: row.get(15)?,
        metrics_updated_at: from_millis(row.get(16)?),
        account_handle: row.get(17)?,
    })
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<AccountRecord> {
    Ok(AccountRecord {
        id: row.get(0)?,
        account_id: row.get(1)?,
        nickname: row.get(2)?,
        description: row.get(3)?,
        avatar: row.get(4)?,
        handle: row.get(5)?,
        history_opened_at: from_millis(row.get(6)?),
        first_publish_at: from_millis(row.get(7)?),
    })
}

/// Joins a walk's coverage `(bottom, top)` to the stored span `(earliest, latest)`
///
/// The result only ever describes hole-free coverage: a walk that has not yet
/// come down to the stored span leaves it untouched.
fn merge_walk(stored: Option<(i64, i64)>, walk: (i64, i64)) -> (i64, i64) {
    let (bottom, top) = walk;
    match stored {
        None => walk,
        Some((earliest, latest)) if bottom <= latest && top >= earliest => {
            (earliest.min(bottom), latest.max(top))
        }
        Some(span) => span,
    }
}

fn count(conn: &Connection, sql: &str) -> StorageResult<u64> {
    let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(count as u64)
}

#[async_trait]
impl Storage for SqliteStorage {
    // ===== Articles =====

    async fn upsert_article(&self, key: &ArticleKey, patch: &ArticlePatch) -> StorageResult<i64> {
        let key = key.clone();
        let patch = patch.clone();
        self.run(move |conn| {
            let now = Utc::now().timestamp_millis();
            let id = conn.query_row(
                "INSERT INTO articles (account_id, message_id, message_index, title, author,
                     copyright, link, publish_at, read_count, like_count, cover, digest,
                     source_url, content, failed, metrics_updated_at, account_handle,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     COALESCE(?15, 0), ?16, ?17, ?18, ?18)
                 ON CONFLICT(account_id, message_id, message_index) DO UPDATE SET
                     title = COALESCE(?4, title),
                     author = COALESCE(?5, author),
                     copyright = COALESCE(?6, copyright),
                     link = COALESCE(?7, link),
                     publish_at = COALESCE(?8, publish_at),
                     read_count = COALESCE(?9, read_count),
                     like_count = COALESCE(?10, like_count),
                     cover = COALESCE(?11, cover),
                     digest = COALESCE(?12, digest),
                     source_url = COALESCE(?13, source_url),
                     content = COALESCE(?14, content),
                     failed = COALESCE(?15, failed),
                     metrics_updated_at = COALESCE(?16, metrics_updated_at),
                     account_handle = COALESCE(?17, account_handle),
                     updated_at = ?18
                 RETURNING id",
                params![
                    key.account_id,
                    key.message_id,
                    key.message_index,
                    patch.title,
                    patch.author,
                    patch.copyright,
                    patch.link,
                    to_millis(patch.publish_at),
                    patch.read_count,
                    patch.like_count,
                    patch.cover,
                    patch.digest,
                    patch.source_url,
                    patch.content,
                    patch.failed,
                    to_millis(patch.metrics_updated_at),
                    patch.account_handle,
                    now,
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    async fn get_article(&self, key: &ArticleKey) -> StorageResult<Option<ArticleRecord>> {
        let key = key.clone();
        self.run(move |conn| {
            let article = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM articles
                         WHERE account_id = ?1 AND message_id = ?2 AND message_index = ?3",
                        ARTICLE_COLUMNS
                    ),
                    params![key.account_id, key.message_id, key.message_index],
                    article_from_row,
                )
                .optional()?;
            Ok(article)
        })
        .await
    }

    // ===== Accounts =====

    async fn upsert_account(&self, account_id: &str, patch: &AccountPatch) -> StorageResult<i64> {
        let account_id = account_id.to_string();
        let patch = patch.clone();
        self.run(move |conn| {
            let now = Utc::now().timestamp_millis();
            let id = conn.query_row(
                "INSERT INTO accounts (account_id, nickname, description, avatar, handle,
                     history_opened_at, first_publish_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
                 ON CONFLICT(account_id) DO UPDATE SET
                     nickname = COALESCE(?2, nickname),
                     description = COALESCE(?3, description),
                     avatar = COALESCE(?4, avatar),
                     handle = COALESCE(?5, handle),
                     history_opened_at = COALESCE(?6, history_opened_at),
                     first_publish_at = COALESCE(?7, first_publish_at),
                     updated_at = ?8
                 RETURNING id",
                params![
                    account_id,
                    patch.nickname,
                    patch.description,
                    patch.avatar,
                    patch.handle,
                    to_millis(patch.history_opened_at),
                    to_millis(patch.first_publish_at),
                    now,
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await
    }

    async fn get_account(&self, account_id: &str) -> StorageResult<Option<AccountRecord>> {
        let account_id = account_id.to_string();
        self.run(move |conn| {
            let account = conn
                .query_row(
                    &format!("SELECT {} FROM accounts WHERE account_id = ?1", ACCOUNT_COLUMNS),
                    params![account_id],
                    account_from_row,
                )
                .optional()?;
            Ok(account)
        })
        .await
    }

    // ===== Comments =====

    async fn upsert_comment(&self, comment: &CommentRecord) -> StorageResult<()> {
        let comment = comment.clone();
        self.run(move |conn| {
            let replies = serde_json::to_string(&comment.replies)?;
            conn.execute(
                "INSERT INTO comments (content_id, article_id, nickname, avatar, content,
                     created_at, like_count, replies, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(content_id) DO UPDATE SET
                     article_id = ?2,
                     nickname = COALESCE(?3, nickname),
                     avatar = COALESCE(?4, avatar),
                     content = COALESCE(?5, content),
                     created_at = COALESCE(?6, created_at),
                     like_count = COALESCE(?7, like_count),
                     replies = ?8,
                     updated_at = ?9",
                params![
                    comment.content_id,
                    comment.article_id,
                    comment.nickname,
                    comment.avatar,
                    comment.content,
                    to_millis(comment.created_at),
                    comment.like_count,
                    replies,
                    Utc::now().timestamp_millis(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_comment(&self, content_id: &str) -> StorageResult<Option<CommentRecord>> {
        let content_id = content_id.to_string();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT content_id, article_id, nickname, avatar, content, created_at,
                         like_count, replies
                     FROM comments WHERE content_id = ?1",
                    params![content_id],
                    |row| {
                        Ok((
                            CommentRecord {
                                content_id: row.get(0)?,
                                article_id: row.get(1)?,
                                nickname: row.get(2)?,
                                avatar: row.get(3)?,
                                content: row.get(4)?,
                                created_at: from_millis(row.get(5)?),
                                like_count: row.get(6)?,
                                replies: Vec::new(),
                            },
                            row.get::<_, String>(7)?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((mut comment, replies)) => {
                    comment.replies = serde_json::from_str::<Vec<Reply>>(&replies)?;
                    Ok(Some(comment))
                }
                None => Ok(None),
            }
        })
        .await
    }

    // ===== Read metrics =====

    async fn record_metric_sample(&self, sample: &MetricSample) -> StorageResult<()> {
        let sample = sample.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO metric_samples (article_id, observed_at, read_count, like_count)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    sample.article_id,
                    sample.observed_at.timestamp_millis(),
                    sample.read_count,
                    sample.like_count
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn metric_samples(&self, article_id: i64) -> StorageResult<Vec<MetricSample>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT observed_at, read_count, like_count FROM metric_samples
                 WHERE article_id = ?1 ORDER BY observed_at, id",
            )?;

            let rows = stmt
                .query_map(params![article_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(observed_at, read_count, like_count)| {
                    Ok(MetricSample {
                        article_id,
                        observed_at: required_millis("observed_at", observed_at)?,
                        read_count,
                        like_count,
                    })
                })
                .collect()
        })
        .await
    }

    // ===== Publication records =====

    async fn start_history_walk(&self, account_id: &str) -> StorageResult<()> {
        let account_id = account_id.to_string();
        self.run(move |conn| {
            conn.execute(
                "UPDATE publication_records SET walk_bottom_at = NULL, walk_top_at = NULL
                 WHERE account_id = ?1",
                params![account_id],
            )?;
            Ok(())
        })
        .await
    }

    async fn record_publications(
        &self,
        account_id: &str,
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    ) -> StorageResult<()> {
        let account_id = account_id.to_string();
        self.run(move |conn| {
            let tx = conn.unchecked_transaction()?;

            let stored = tx
                .query_row(
                    "SELECT earliest_publish_at, latest_publish_at, walk_bottom_at, walk_top_at
                     FROM publication_records WHERE account_id = ?1",
                    params![account_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<i64>>(2)?,
                            row.get::<_, Option<i64>>(3)?,
                        ))
                    },
                )
                .optional()?;

            let page = (earliest.timestamp_millis(), latest.timestamp_millis());
            let walk = match stored {
                Some((_, _, Some(bottom), Some(top))) => (bottom.min(page.0), top.max(page.1)),
                _ => page,
            };
            let span = merge_walk(stored.map(|(earliest, latest, _, _)| (earliest, latest)), walk);

            tx.execute(
                "INSERT INTO publication_records (account_id, earliest_publish_at,
                     latest_publish_at, walk_bottom_at, walk_top_at, article_count, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, (SELECT COUNT(*) FROM articles WHERE account_id = ?1), ?6)
                 ON CONFLICT(account_id) DO UPDATE SET
                     earliest_publish_at = ?2,
                     latest_publish_at = ?3,
                     walk_bottom_at = ?4,
                     walk_top_at = ?5,
                     article_count = (SELECT COUNT(*) FROM articles WHERE account_id = ?1),
                     updated_at = ?6",
                params![
                    account_id,
                    span.0,
                    span.1,
                    walk.0,
                    walk.1,
                    Utc::now().timestamp_millis(),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_publication_record(
        &self,
        account_id: &str,
    ) -> StorageResult<Option<PublicationRecord>> {
        let account_id = account_id.to_string();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT earliest_publish_at, latest_publish_at, article_count, updated_at
                     FROM publication_records WHERE account_id = ?1",
                    params![account_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((earliest, latest, article_count, updated_at)) = row else {
                return Ok(None);
            };

            Ok(Some(PublicationRecord {
                account_id,
                earliest_publish_at: required_millis("earliest_publish_at", earliest)?,
                latest_publish_at: required_millis("latest_publish_at", latest)?,
                article_count: article_count as u64,
                updated_at: required_millis("updated_at", updated_at)?,
            }))
        })
        .await
    }

    // ===== Refill queries =====

    async fn article_refill_candidates(
        &self,
        filter: &ArticleRefillFilter,
    ) -> StorageResult<Vec<RefillCandidate>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let mut sql = String::from(
                "SELECT link, publish_at, metrics_updated_at FROM articles
                 WHERE failed = 0
                   AND link IS NOT NULL AND link <> ''
                   AND publish_at >= ?1 AND publish_at <= ?2",
            );
            let mut values = vec![
                Value::Integer(filter.min_publish_at.timestamp_millis()),
                Value::Integer(filter.max_publish_at.timestamp_millis()),
            ];

            if filter.only_unmeasured {
                sql.push_str(" AND metrics_updated_at IS NULL");
            }

            if !filter.target_accounts.is_empty() {
                sql.push_str(&format!(
                    " AND account_id IN ({})",
                    placeholders(values.len(), filter.target_accounts.len())
                ));
                values.extend(filter.target_accounts.into_iter().map(Value::Text));
            }

            sql.push_str(" ORDER BY id");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(link, publish_at, metrics_updated_at)| {
                    Ok(RefillCandidate {
                        link,
                        publish_at: required_millis("publish_at", publish_at)?,
                        metrics_updated_at: from_millis(metrics_updated_at),
                    })
                })
                .collect()
        })
        .await
    }

    async fn account_refill_candidates(
        &self,
        filter: &AccountRefillFilter,
    ) -> StorageResult<Vec<String>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let mut sql = String::from(
                "SELECT account_id FROM accounts
                 WHERE (history_opened_at IS NULL OR history_opened_at < ?1)",
            );
            let mut values = vec![Value::Integer(filter.opened_before.timestamp_millis())];

            if !filter.target_accounts.is_empty() {
                sql.push_str(&format!(
                    " AND account_id IN ({})",
                    placeholders(values.len(), filter.target_accounts.len())
                ));
                values.extend(filter.target_accounts.into_iter().map(Value::Text));
            }

            // Never-opened accounts first, then least recently opened
            sql.push_str(" ORDER BY history_opened_at IS NOT NULL, history_opened_at, id");

            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(params_from_iter(values), |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;

            Ok(ids)
        })
        .await
    }

    // ===== Statistics =====

    async fn count_records(&self) -> StorageResult<RecordCounts> {
        self.run(|conn| {
            Ok(RecordCounts {
                articles: count(conn, "SELECT COUNT(*) FROM articles")?,
                failed_articles: count(conn, "SELECT COUNT(*) FROM articles WHERE failed = 1")?,
                measured_articles: count(
                    conn,
                    "SELECT COUNT(*) FROM articles WHERE metrics_updated_at IS NOT NULL",
                )?,
                accounts: count(conn, "SELECT COUNT(*) FROM accounts")?,
                comments: count(conn, "SELECT COUNT(*) FROM comments")?,
                metric_samples: count(conn, "SELECT COUNT(*) FROM metric_samples")?,
                publication_records: count(conn, "SELECT COUNT(*) FROM publication_records")?,
            })
        })
        .await
    }
}
