//! Named markup patterns
//!
//! Every regular expression the extractors rely on lives here, behind a
//! function named after the page variable it reads. When a pattern occurs
//! more than once in a page the first occurrence is used.

use regex::Regex;
use std::sync::OnceLock;

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `var msg_title = "...";`
pub fn msg_title(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"var msg_title = "(.+?)";"#).unwrap());
    first_capture(re, html)
}

/// `var ct = "<epoch seconds>";`
pub fn publish_time(html: &str) -> Option<i64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"var ct = "(\d+)";"#).unwrap());
    first_capture(re, html).and_then(|secs| secs.parse().ok())
}

/// `var msg_source_url = '...';` (may be empty)
pub fn msg_source_url(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"var msg_source_url = '(.*?)';").unwrap());
    first_capture(re, html)
}

/// `var msg_cdn_url = "...";`
pub fn msg_cdn_url(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"var msg_cdn_url = "(.+?)";"#).unwrap());
    first_capture(re, html)
}

/// `var msg_desc = "...";`
pub fn msg_desc(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"var msg_desc = "(.+?)";"#).unwrap());
    first_capture(re, html)
}

/// `<span class="profile_meta_value">...</span>`
pub fn profile_meta_value(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re =
        RE.get_or_init(|| Regex::new(r#"<span class="profile_meta_value">(.+?)</span>"#).unwrap());
    first_capture(re, html)
}

/// `var user_name = "...";`
pub fn user_name(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"var user_name = "(.+?)""#).unwrap());
    first_capture(re, html)
}

/// `var nickname = "...";`
pub fn nickname(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"var nickname = "(.+?)""#).unwrap());
    first_capture(re, html)
}

/// `var headimg = "...";`
pub fn headimg(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r#"var headimg = "(.+?)""#).unwrap());
    first_capture(re, html)
}

/// `var msgList = '...';` terminated by a newline
pub fn msg_list(html: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"var msgList = '(.+)';\n").unwrap());
    first_capture(re, html)
}

/// Visible article body, from its opening tag up to the trailing script
///
/// Returns the byte range of the body so callers can splice it.
pub fn rich_media_body(html: &str) -> Option<std::ops::Range<usize>> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?s)<div class="rich_media_content " id="js_content">(.+?)</div>\s+?<script nonce="#)
            .unwrap()
    });
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
}

/// CJK unified ideographs, used to reject display names posing as handles
pub fn contains_cjk(text: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[\x{4e00}-\x{9fa5}]").unwrap());
    re.is_match(text)
}

/// Unescapes the entities the platform applies to embedded JSON
///
/// Handles `&lt;`, `&gt;`, `&nbsp;`, `&amp;` and `&quot;` in any letter case,
/// then turns escaped slashes (`\/`) back into plain ones.
pub fn unescape_embedded(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)&(lt|gt|nbsp|amp|quot);").unwrap());
    let unescaped = re.replace_all(text, |caps: &regex::Captures| {
        match caps[1].to_ascii_lowercase().as_str() {
            "lt" => "<",
            "gt" => ">",
            "nbsp" => " ",
            "amp" => "&",
            _ => "\"",
        }
        .to_string()
    });
    unescaped.replace("\\/", "/")
}

/// Date line of a history page, `YYYY年M月D日`, as (year, month, day)
pub fn history_date(text: &str) -> Option<(i32, u32, u32)> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日").unwrap());
    let caps = re.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?))
}

/// Markers the platform renders in place of a removed article
pub fn is_removed_article(html: &str) -> bool {
    html.contains("global_error_msg") || html.contains("icon_msg warn")
}
