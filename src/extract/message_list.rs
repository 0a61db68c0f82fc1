//! History listing payloads
//!
//! Listings arrive in two shapes: embedded in the history page as `msgList`,
//! and as the `getmsg` response whose `general_msg_list` field holds the same
//! listing as JSON text.

use crate::extract::{non_empty, value_to_string, ExtractError, ExtractResult};
use crate::storage::ArticleKey;
use crate::url::article_key_from_link;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// An article announced by a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCandidate {
    pub key: ArticleKey,
    pub title: String,
    pub link: String,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    pub source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    general_msg_list: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    list: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ListingItem {
    comm_msg_info: Option<CommonInfo>,
    app_msg_ext_info: Option<AppMessage>,
}

#[derive(Debug, Deserialize)]
struct CommonInfo {
    datetime: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AppMessage {
    title: Option<String>,
    content_url: Option<String>,
    author: Option<String>,
    copyright_stat: Option<Value>,
    cover: Option<String>,
    digest: Option<String>,
    source_url: Option<String>,
    multi_app_msg_item_list: Option<Vec<Value>>,
}

/// Parses a `getmsg` response body
///
/// # Returns
///
/// * `Ok(Vec<ArticleCandidate>)` - Every usable article, secondary items included
/// * `Err(ExtractError)` - The envelope or the inner listing is not valid JSON
pub fn parse_message_list(body: &str) -> ExtractResult<Vec<ArticleCandidate>> {
    let envelope: Envelope = serde_json::from_str(body)?;
    let inner = envelope
        .general_msg_list
        .ok_or(ExtractError::MissingField("general_msg_list"))?;
    parse_article_list(&inner)
}

/// Parses a listing object of the form `{"list": [...]}`
///
/// Items and secondary articles whose fields have the wrong types are
/// skipped one by one; the rest of the listing is still read.
pub fn parse_article_list(json: &str) -> ExtractResult<Vec<ArticleCandidate>> {
    let listing: Listing = serde_json::from_str(json)?;
    let mut candidates = Vec::new();

    for value in listing.list {
        let Ok(item) = serde_json::from_value::<ListingItem>(value) else {
            tracing::debug!("Skipping malformed listing item");
            continue;
        };
        let Some(message) = item.app_msg_ext_info else {
            continue;
        };

        // Secondary articles of a push share its timestamp
        let publish_at = item
            .comm_msg_info
            .and_then(|info| info.datetime)
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        let secondary = message
            .multi_app_msg_item_list
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| serde_json::from_value::<AppMessage>(value).ok());
        let primary = AppMessage {
            multi_app_msg_item_list: None,
            ..message
        };

        for message in std::iter::once(primary).chain(secondary) {
            if let Some(candidate) = to_candidate(message, publish_at) {
                candidates.push(candidate);
            }
        }
    }

    Ok(candidates)
}

fn to_candidate(message: AppMessage, publish_at: Option<DateTime<Utc>>) -> Option<ArticleCandidate> {
    let title = non_empty(message.title)?;
    let link = non_empty(message.content_url)?;
    let key = article_key_from_link(&link)?;

    Some(ArticleCandidate {
        key,
        title,
        link,
        author: non_empty(message.author),
        copyright: message.copyright_stat.as_ref().and_then(value_to_string),
        publish_at,
        cover: non_empty(message.cover),
        digest: non_empty(message.digest),
        source_url: non_empty(message.source_url),
    })
}
