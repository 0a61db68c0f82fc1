//! Backward pagination through an account's history
//!
//! The history page lists an account's pushes newest first and loads older
//! ones as the client scrolls. The injected controller reads the bottom of
//! the listing after every scroll and classifies it with the same rules as
//! [`classify_history_panel`].

use crate::config::ProfileConfig;
use crate::crawl::controller::{inject_history_controller, render_history_controller};
use crate::extract::patterns;
use crate::storage::{PublicationRecord, Storage, StorageResult};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use std::fmt;
use std::sync::Arc;

/// Panel text shown when the client does not follow the account
pub const NOT_FOLLOWING_MARKER: &str = "关注公众帐号，接收更多消息";

/// Panel text shown once the first push of the account is loaded
pub const NO_MORE_MARKER: &str = "已无更多";

/// Offset of the dates the platform renders (China Standard Time)
const PLATFORM_UTC_OFFSET_SECS: i32 = 8 * 60 * 60;

/// Safety margin applied to every cutoff
fn cutoff_margin() -> Duration {
    Duration::hours(24)
}

/// State of a rendered history page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryState {
    /// Older pushes may follow, keep scrolling
    KeepScrolling,

    /// The oldest visible push precedes the cutoff
    ReachedCutoff,

    /// The platform reports no more pushes; the oldest is the first post
    ReachedFirstPost,

    /// The client does not follow the account, nothing more will load
    NotFollowing,
}

impl HistoryState {
    /// Returns true if the controller stops scrolling in this state
    pub fn is_stop(&self) -> bool {
        !matches!(self, Self::KeepScrolling)
    }

    /// Numeric code used by the injected controller
    pub fn code(&self) -> u8 {
        match self {
            Self::KeepScrolling => 0,
            Self::ReachedCutoff => 1,
            Self::ReachedFirstPost => 2,
            Self::NotFollowing => 3,
        }
    }

    /// Parses a controller code
    ///
    /// Returns None if the code doesn't match any known state.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::KeepScrolling),
            1 => Some(Self::ReachedCutoff),
            2 => Some(Self::ReachedFirstPost),
            3 => Some(Self::NotFollowing),
            _ => None,
        }
    }
}

impl fmt::Display for HistoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::KeepScrolling => "keep_scrolling",
            Self::ReachedCutoff => "reached_cutoff",
            Self::ReachedFirstPost => "reached_first_post",
            Self::NotFollowing => "not_following",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of classifying the history panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryClassification {
    pub state: HistoryState,
    /// Date of the oldest visible push, carried by `ReachedFirstPost`
    pub oldest_publish_at: Option<DateTime<Utc>>,
}

impl HistoryClassification {
    fn new(state: HistoryState) -> Self {
        Self {
            state,
            oldest_publish_at: None,
        }
    }
}

/// Parses a history date line as midnight platform time
pub fn parse_history_date(line: &str) -> Option<DateTime<Utc>> {
    let (year, month, day) = patterns::history_date(line)?;
    let midnight = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    let offset = FixedOffset::east_opt(PLATFORM_UTC_OFFSET_SECS)?;

    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|at| at.with_timezone(&Utc))
}

/// Classifies the visible text of the history panel
///
/// The last line is the loading status and the line before it is the date of
/// the oldest visible push.
///
/// # Arguments
///
/// * `panel_text` - Text content of the `.weui-panel` element
/// * `cutoff` - Pushes older than this are not needed
///
/// # Returns
///
/// Exactly one state. A date line that does not parse never stops the walk
/// on its own.
pub fn classify_history_panel(panel_text: &str, cutoff: DateTime<Utc>) -> HistoryClassification {
    let mut lines: Vec<&str> = panel_text.trim().split('\n').collect();

    let status = lines.pop().unwrap_or_default();
    if status.contains(NOT_FOLLOWING_MARKER) {
        return HistoryClassification::new(HistoryState::NotFollowing);
    }

    let oldest = lines.pop().and_then(|line| parse_history_date(line.trim()));

    if status.contains(NO_MORE_MARKER) {
        return HistoryClassification {
            state: HistoryState::ReachedFirstPost,
            oldest_publish_at: oldest,
        };
    }

    match oldest {
        Some(oldest) if oldest < cutoff => HistoryClassification::new(HistoryState::ReachedCutoff),
        _ => HistoryClassification::new(HistoryState::KeepScrolling),
    }
}

/// Computes how far back the history walk of an account has to go
///
/// The base cutoff is `min_time` minus a day. When earlier walks already
/// reached back to the base cutoff, only the pushes newer than the latest one
/// seen (minus the same margin) are missing, so the cutoff moves up to there.
/// The record's span has no holes, so nothing below its latest push is skipped.
pub fn history_cutoff(
    min_time: DateTime<Utc>,
    record: Option<&PublicationRecord>,
) -> DateTime<Utc> {
    let base = min_time - cutoff_margin();

    match record {
        Some(record) if record.earliest_publish_at <= base => {
            base.max(record.latest_publish_at - cutoff_margin())
        }
        _ => base,
    }
}

/// Turns account history pages into self-scrolling pages
pub struct HistoryPager {
    storage: Arc<dyn Storage>,
    profile: ProfileConfig,
}

impl HistoryPager {
    pub fn new(storage: Arc<dyn Storage>, profile: ProfileConfig) -> Self {
        Self { storage, profile }
    }

    /// Cutoff for one account, refined by its publication record
    pub async fn cutoff_for(&self, account_id: &str) -> StorageResult<DateTime<Utc>> {
        let record = self.storage.get_publication_record(account_id).await?;
        let cutoff = history_cutoff(self.profile.min_time, record.as_ref());

        tracing::debug!(
            "History cutoff for {}: {} (base {}, span {:?})",
            account_id,
            cutoff,
            self.profile.min_time - cutoff_margin(),
            record.map(|r| (r.earliest_publish_at, r.latest_publish_at))
        );

        Ok(cutoff)
    }

    /// Injects the history controller into a history page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(page))` - The rewritten page
    /// * `Ok(None)` - The page has no `</body>` to inject before
    pub async fn controller_page(&self, account_id: &str, html: &str) -> StorageResult<Option<String>> {
        let cutoff = self.cutoff_for(account_id).await?;
        let poll_interval_ms = self.profile.jump_interval.saturating_mul(1000);
        let script = render_history_controller(cutoff, poll_interval_ms);

        Ok(inject_history_controller(html, &script))
    }
}
