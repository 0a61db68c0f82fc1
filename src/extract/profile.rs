//! Account history page parser

use crate::extract::message_list::{parse_article_list, ArticleCandidate};
use crate::extract::{patterns, ExtractResult};

/// Fields read from an account's history page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePage {
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    /// Raw `msgList` payload, still entity-escaped
    pub embedded_list: Option<String>,
}

/// Parses an account's history page
pub fn parse_profile_page(html: &str) -> ProfilePage {
    ProfilePage {
        nickname: patterns::nickname(html),
        avatar: patterns::headimg(html),
        embedded_list: patterns::msg_list(html),
    }
}

/// Decodes the listing embedded in a history page
///
/// # Arguments
///
/// * `raw` - The `msgList` payload as found in the page
///
/// # Returns
///
/// * `Ok(Vec<ArticleCandidate>)` - The decoded articles
/// * `Err(ExtractError)` - The unescaped payload is not a valid listing
pub fn decode_embedded_list(raw: &str) -> ExtractResult<Vec<ArticleCandidate>> {
    parse_article_list(&patterns::unescape_embedded(raw))
}
