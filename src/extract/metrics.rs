//! Read and like counters

use crate::extract::{ExtractError, ExtractResult};
use serde::Deserialize;

/// Engagement counters of one article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMetrics {
    pub read_count: i64,
    pub like_count: i64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    appmsgstat: Option<AppMessageStat>,
}

#[derive(Debug, Deserialize)]
struct AppMessageStat {
    read_num: Option<i64>,
    like_num: Option<i64>,
}

/// Parses a `getappmsgext` response body
///
/// `read_num` is required. Accounts with likes disabled omit `like_num`,
/// which is read as zero.
pub fn parse_read_metrics(body: &str) -> ExtractResult<ReadMetrics> {
    let envelope: Envelope = serde_json::from_str(body)?;
    let stat = envelope
        .appmsgstat
        .ok_or(ExtractError::MissingField("appmsgstat"))?;

    Ok(ReadMetrics {
        read_count: stat.read_num.ok_or(ExtractError::MissingField("read_num"))?,
        like_count: stat.like_num.unwrap_or(0),
    })
}
