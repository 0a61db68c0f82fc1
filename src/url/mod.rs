//! Traffic classification for mp-spider
//!
//! This module names which platform endpoint an intercepted URL belongs to
//! and resolves natural keys out of links and form bodies.

mod key;

use regex::Regex;
use std::sync::OnceLock;

// Re-export main functions
pub use key::{
    account_id_from_link, article_key_from_form, article_key_from_link, comment_article_key,
    history_page_link,
};

/// Path of the control endpoint the history controller reports completion to
pub const FIRST_POST_PATH: &str = "/ws/profiles/first_post";

/// Path of the control endpoint the history controller polls for the next account
pub const NEXT_LINK_PATH: &str = "/wx/profiles/next_link";

/// Kinds of intercepted exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    /// Read and like counters of an article (`/mp/getappmsgext`)
    ReadMetrics,
    /// A single article page, new (`/s?__biz=`) or old (`/mp/appmsg/show`) style
    ArticlePage,
    /// Elected comments of an article (`/mp/appmsg_comment`)
    Comments,
    /// An account's history page (`/mp/profile_ext?action=home&__biz=`)
    ProfileHome,
    /// A further page of an account's history (`/mp/profile_ext?action=getmsg&__biz=`)
    MessageList,
    /// Completion report from the history controller
    FirstPostReport,
    /// Next-account poll from the history controller
    NextAccountLink,
    /// Anything else
    Other,
}

impl ExchangeKind {
    /// Returns true for the exchanges the history controller itself issues
    pub fn is_control(&self) -> bool {
        matches!(self, Self::FirstPostReport | Self::NextAccountLink)
    }
}

fn is_article_page(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"mp\.weixin\.qq\.com/s\?__biz|mp/appmsg/show").unwrap());
    re.is_match(url)
}

fn is_profile_home(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/mp/profile_ext\?action=home&__biz=").unwrap());
    re.is_match(url)
}

fn is_message_list(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"/mp/profile_ext\?action=getmsg&__biz=").unwrap());
    re.is_match(url)
}

/// Classifies an intercepted URL
///
/// This function checks the URL against the known endpoints in the
/// following priority order:
/// 1. Read metrics
/// 2. Article page
/// 3. Comments
/// 4. Profile home
/// 5. Message list
/// 6. Control endpoints
/// 7. Other (default)
///
/// # Arguments
///
/// * `url` - The full request URL
///
/// # Returns
///
/// The kind of exchange the URL belongs to
///
/// # Examples
///
/// ```
/// use mp_spider::url::{classify_url, ExchangeKind};
///
/// assert_eq!(
///     classify_url("https://mp.weixin.qq.com/s?__biz=MzI4&mid=1&idx=1"),
///     ExchangeKind::ArticlePage
/// );
/// assert_eq!(
///     classify_url("https://mp.weixin.qq.com/wx/profiles/next_link"),
///     ExchangeKind::NextAccountLink
/// );
/// ```
pub fn classify_url(url: &str) -> ExchangeKind {
    if url.contains("mp/getappmsgext") {
        return ExchangeKind::ReadMetrics;
    }

    if is_article_page(url) {
        return ExchangeKind::ArticlePage;
    }

    if url.contains("/mp/appmsg_comment") {
        return ExchangeKind::Comments;
    }

    if is_profile_home(url) {
        return ExchangeKind::ProfileHome;
    }

    if is_message_list(url) {
        return ExchangeKind::MessageList;
    }

    if url.contains(FIRST_POST_PATH) {
        return ExchangeKind::FirstPostReport;
    }

    if url.contains(NEXT_LINK_PATH) {
        return ExchangeKind::NextAccountLink;
    }

    ExchangeKind::Other
}
