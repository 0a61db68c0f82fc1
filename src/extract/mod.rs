//! Content extraction
//!
//! This module turns the payloads the platform serves into typed field sets:
//! - Article pages (script variables and the article body)
//! - Account history pages (nickname, avatar, embedded listing)
//! - Listing payloads, including multi-article pushes
//! - Elected comments with their replies
//! - Read and like counters
//!
//! Every parser is a pure function of its input.

mod article;
mod comment;
mod message_list;
mod metrics;
pub mod patterns;
mod profile;

pub use article::{parse_article_page, ArticleInfo, ArticlePage};
pub use comment::{parse_comments, ParsedComment};
pub use message_list::{parse_article_list, parse_message_list, ArticleCandidate};
pub use metrics::{parse_read_metrics, ReadMetrics};
pub use profile::{decode_embedded_list, parse_profile_page, ProfilePage};

use serde_json::Value;
use thiserror::Error;

/// Errors raised by payload parsers
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload is missing '{0}'")]
    MissingField(&'static str),
}

/// Result type for extraction
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Reads ids and counters the platform sends either as strings or numbers
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Drops empty strings
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
