//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the mp-spider database.
//! Timestamps are stored as epoch milliseconds so range queries stay numeric.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Articles, unique by (account, push, position)
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL,
    message_id TEXT NOT NULL,
    message_index TEXT NOT NULL,
    title TEXT,
    author TEXT,
    copyright TEXT,
    link TEXT,
    publish_at INTEGER,
    read_count INTEGER,
    like_count INTEGER,
    cover TEXT,
    digest TEXT,
    source_url TEXT,
    content TEXT,
    failed INTEGER NOT NULL DEFAULT 0,
    metrics_updated_at INTEGER,
    account_handle TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(account_id, message_id, message_index)
);

CREATE INDEX IF NOT EXISTS idx_articles_publish ON articles(publish_at);
CREATE INDEX IF NOT EXISTS idx_articles_metrics ON articles(metrics_updated_at);
CREATE INDEX IF NOT EXISTS idx_articles_account_publish ON articles(account_id, publish_at);

-- Publishing accounts
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id TEXT NOT NULL UNIQUE,
    nickname TEXT,
    description TEXT,
    avatar TEXT,
    handle TEXT,
    history_opened_at INTEGER,
    first_publish_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_accounts_opened ON accounts(history_opened_at);

-- Comments with their replies inlined as a JSON array
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_id TEXT NOT NULL UNIQUE,
    article_id INTEGER NOT NULL REFERENCES articles(id),
    nickname TEXT,
    avatar TEXT,
    content TEXT,
    created_at INTEGER,
    like_count INTEGER,
    replies TEXT NOT NULL DEFAULT '[]',
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_article ON comments(article_id);

-- Append-only read/like observations
CREATE TABLE IF NOT EXISTS metric_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    article_id INTEGER NOT NULL REFERENCES articles(id),
    observed_at INTEGER NOT NULL,
    read_count INTEGER NOT NULL,
    like_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_metric_samples_article ON metric_samples(article_id, observed_at);
CREATE INDEX IF NOT EXISTS idx_metric_samples_observed ON metric_samples(observed_at);

-- Contiguously listed publish span per account, plus the walk in progress
CREATE TABLE IF NOT EXISTS publication_records (
    account_id TEXT PRIMARY KEY,
    earliest_publish_at INTEGER NOT NULL,
    latest_publish_at INTEGER NOT NULL,
    walk_bottom_at INTEGER,
    walk_top_at INTEGER,
    article_count INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_publication_records_updated ON publication_records(updated_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
