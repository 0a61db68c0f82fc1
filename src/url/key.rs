use crate::storage::ArticleKey;
use url::{form_urlencoded, Url};

/// Base of the history page the platform serves for one account
const HISTORY_PAGE_BASE: &str = "https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=";

/// Looks up a query parameter, trying each name in order
///
/// History listings escape `&` as `&amp;` inside content links, which leaves
/// keys such as `amp;mid` after parsing, so callers pass both spellings.
fn first_value(pairs: &[(String, String)], names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        pairs
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.clone())
    })
}

fn query_pairs(link: &str) -> Option<Vec<(String, String)>> {
    let url = Url::parse(link).ok()?;
    Some(url.query_pairs().into_owned().collect())
}

fn key_from_pairs(
    pairs: &[(String, String)],
    message_id_names: &[&str],
    index_names: &[&str],
) -> Option<ArticleKey> {
    Some(ArticleKey::new(
        first_value(pairs, &["__biz"])?,
        first_value(pairs, message_id_names)?,
        first_value(pairs, index_names)?,
    ))
}

/// Resolves the natural key of an article from its link
///
/// # Arguments
///
/// * `link` - An absolute article link carrying `__biz`, `mid` and `idx`
///
/// # Returns
///
/// * `Some(ArticleKey)` - All three parts were present
/// * `None` - The link does not parse or a part is missing
///
/// # Examples
///
/// ```
/// use mp_spider::url::article_key_from_link;
///
/// let key = article_key_from_link(
///     "http://mp.weixin.qq.com/s?__biz=MzA3&amp;mid=2650&amp;idx=2&amp;sn=9a",
/// )
/// .unwrap();
/// assert_eq!(key.message_id, "2650");
/// assert_eq!(key.message_index, "2");
/// ```
pub fn article_key_from_link(link: &str) -> Option<ArticleKey> {
    let pairs = query_pairs(link)?;
    key_from_pairs(&pairs, &["mid", "amp;mid"], &["idx", "amp;idx"])
}

/// Resolves the article key of a comment listing request
///
/// The comment endpoint names the message id `appmsgid`.
pub fn comment_article_key(link: &str) -> Option<ArticleKey> {
    let pairs = query_pairs(link)?;
    key_from_pairs(&pairs, &["appmsgid", "mid"], &["idx"])
}

/// Resolves the article key from a form-encoded request body
pub fn article_key_from_form(body: &[u8]) -> Option<ArticleKey> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(body).into_owned().collect();
    key_from_pairs(&pairs, &["mid"], &["idx"])
}

/// Extracts the account id (`__biz`) from a link
pub fn account_id_from_link(link: &str) -> Option<String> {
    let pairs = query_pairs(link)?;
    first_value(&pairs, &["__biz"])
}

/// Builds the history page link of an account
pub fn history_page_link(account_id: &str) -> String {
    format!("{}{}&scene=124#wechat_redirect", HISTORY_PAGE_BASE, account_id)
}
