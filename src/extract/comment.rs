//! Elected comment payloads

use crate::extract::{non_empty, value_to_string, ExtractResult};
use crate::storage::Reply;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// A comment as read from the payload, not yet tied to an article row
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedComment {
    pub content_id: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub content: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub like_count: Option<i64>,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    elected_comment: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    content_id: Option<Value>,
    nick_name: Option<String>,
    logo_url: Option<String>,
    content: Option<String>,
    create_time: Option<i64>,
    like_num: Option<i64>,
    reply: Option<RawReplies>,
}

#[derive(Debug, Deserialize)]
struct RawReplies {
    reply_list: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    content: Option<String>,
    create_time: Option<i64>,
    reply_like_num: Option<i64>,
}

fn from_epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Parses an `appmsg_comment` response body
///
/// Comments without a content id and replies without text are skipped, and
/// so is any entry whose fields have the wrong types.
/// A payload without `elected_comment` yields no comments.
pub fn parse_comments(body: &str) -> ExtractResult<Vec<ParsedComment>> {
    let envelope: Envelope = serde_json::from_str(body)?;

    let comments = envelope
        .elected_comment
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| serde_json::from_value::<RawComment>(value).ok())
        .filter_map(|raw| {
            let content_id = raw.content_id.as_ref().and_then(value_to_string)?;

            let replies = raw
                .reply
                .and_then(|reply| reply.reply_list)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|value| serde_json::from_value::<RawReply>(value).ok())
                .filter_map(|reply| {
                    Some(Reply {
                        content: non_empty(reply.content)?,
                        created_at: from_epoch(reply.create_time),
                        like_count: reply.reply_like_num.unwrap_or(0),
                    })
                })
                .collect();

            Some(ParsedComment {
                content_id,
                nickname: raw.nick_name,
                avatar: raw.logo_url,
                content: raw.content,
                created_at: from_epoch(raw.create_time),
                like_count: raw.like_num,
                replies,
            })
        })
        .collect();

    Ok(comments)
}
