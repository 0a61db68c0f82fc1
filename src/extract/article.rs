//! Article page parser

use crate::config::ContentFormat;
use crate::extract::patterns;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

/// Fields read from a live article page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleInfo {
    pub title: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub source_url: Option<String>,
    pub cover: Option<String>,
    pub digest: Option<String>,
    /// Platform handle of the publishing account
    pub account_handle: Option<String>,
    /// Body of `#js_content`, when requested
    pub content: Option<String>,
}

/// Result of parsing an article page
#[derive(Debug, Clone, PartialEq)]
pub enum ArticlePage {
    /// The platform reports the article as removed
    Removed,
    Live(ArticleInfo),
}

/// Parses an article page
///
/// # Arguments
///
/// * `html` - The raw page
/// * `body_format` - Extracts the article body in this format when set
///
/// # Returns
///
/// `ArticlePage::Removed` when a removal marker is present, otherwise the
/// fields found on the page. Missing fields stay `None`.
pub fn parse_article_page(html: &str, body_format: Option<ContentFormat>) -> ArticlePage {
    if patterns::is_removed_article(html) {
        return ArticlePage::Removed;
    }

    ArticlePage::Live(ArticleInfo {
        title: patterns::msg_title(html),
        publish_at: patterns::publish_time(html).and_then(|secs| DateTime::from_timestamp(secs, 0)),
        source_url: patterns::msg_source_url(html),
        cover: patterns::msg_cdn_url(html),
        digest: patterns::msg_desc(html),
        account_handle: account_handle(html),
        content: body_format.map(|format| extract_body(html, format)),
    })
}

/// Reads the account handle
///
/// Accounts without a handle show their display name in its place, in which
/// case the page's internal `user_name` is used instead.
fn account_handle(html: &str) -> Option<String> {
    let handle = patterns::profile_meta_value(html)?;
    if patterns::contains_cjk(&handle) {
        patterns::user_name(html)
    } else {
        Some(handle)
    }
}

/// Extracts `#js_content` as HTML or text, trimmed, empty when missing
fn extract_body(html: &str, format: ContentFormat) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("#js_content") else {
        return String::new();
    };

    let Some(element) = document.select(&selector).next() else {
        return String::new();
    };

    let content = match format {
        ContentFormat::Html => element.inner_html(),
        ContentFormat::Text => element.text().collect::<String>(),
    };

    content.trim().to_string()
}
