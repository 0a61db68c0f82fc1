//! Markup injected into intercepted pages
//!
//! Two pieces: the history controller script that keeps an account's history
//! page scrolling, and the meta refresh that moves an article page on to the
//! next article.

use crate::url::{FIRST_POST_PATH, NEXT_LINK_PATH};
use chrono::{DateTime, Utc};

/// Script template; placeholders are the only values the server emits
const HISTORY_CONTROLLER_TEMPLATE: &str = include_str!("history_controller.js");

/// Comments the platform plants around its markup; both contain a `</body>`
const TRAP_COMMENTS: [&str; 2] = [
    "<!--headTrap<body></body><head></head><html></html>-->",
    "<!--tailTrap<body></body><head></head><html></html>-->",
];

/// Renders the history controller as a `<script>` element
///
/// # Arguments
///
/// * `cutoff` - The controller stops once the oldest visible push is older
/// * `poll_interval_ms` - Delay between scroll steps and between next-link polls
pub fn render_history_controller(cutoff: DateTime<Utc>, poll_interval_ms: u64) -> String {
    let script = HISTORY_CONTROLLER_TEMPLATE
        .replace("__CUTOFF_MS__", &cutoff.timestamp_millis().to_string())
        .replace("__POLL_INTERVAL_MS__", &poll_interval_ms.to_string())
        .replace("__FIRST_POST_PATH__", FIRST_POST_PATH)
        .replace("__NEXT_LINK_PATH__", NEXT_LINK_PATH);

    format!("<script type=\"text/javascript\">\n{}</script>", script)
}

/// Inserts a rendered controller right before `</body>`
///
/// Returns None when the page has no `</body>`.
pub fn inject_history_controller(html: &str, script: &str) -> Option<String> {
    let mut page = TRAP_COMMENTS
        .iter()
        .fold(html.to_string(), |page, trap| page.replace(trap, ""));

    let position = page.find("</body>")?;
    page.insert_str(position, &format!("{}\n", script));
    Some(page)
}

/// Builds the meta refresh that sends the client to `link` after `delay_secs`
pub fn meta_refresh(delay_secs: u64, link: &str) -> String {
    format!(
        "<meta http-equiv=\"refresh\" content=\"{};url={}\" />",
        delay_secs, link
    )
}

/// Inserts a tag right after `</title>`
///
/// Returns None when the page has no `</title>`.
pub fn insert_after_title(html: &str, tag: &str) -> Option<String> {
    const TITLE_END: &str = "</title>";

    let position = html.find(TITLE_END)? + TITLE_END.len();
    let mut page = String::with_capacity(html.len() + tag.len());
    page.push_str(&html[..position]);
    page.push_str(tag);
    page.push_str(&html[position..]);
    Some(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_fills_every_placeholder() {
        let cutoff = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let script = render_history_controller(cutoff, 5000);

        assert!(!script.contains("__"));
        assert!(script.contains(&format!("var CUTOFF_MS = {};", cutoff.timestamp_millis())));
        assert!(script.contains("var POLL_INTERVAL_MS = 5000;"));
        assert!(script.contains("'/ws/profiles/first_post'"));
        assert!(script.contains("'/wx/profiles/next_link'"));
        assert!(script.starts_with("<script type=\"text/javascript\">"));
        assert!(script.ends_with("</script>"));
    }

    #[test]
    fn test_inject_before_body_end_and_strip_traps() {
        let html = format!(
            "<html>{}<head></head><body><div class=\"weui-panel\"></div></body>{}</html>",
            TRAP_COMMENTS[0], TRAP_COMMENTS[1]
        );

        let page = inject_history_controller(&html, "<script>x</script>").unwrap();
        assert!(!page.contains("headTrap"));
        assert!(!page.contains("tailTrap"));
        assert!(page.contains("<div class=\"weui-panel\"></div><script>x</script>\n</body>"));
    }

    #[test]
    fn test_inject_without_body() {
        assert!(inject_history_controller("{\"ret\":0}", "<script></script>").is_none());
    }

    #[test]
    fn test_meta_refresh_after_title() {
        let tag = meta_refresh(7, "https://mp.weixin.qq.com/s?__biz=MzI4&mid=1&idx=1");
        assert_eq!(
            tag,
            "<meta http-equiv=\"refresh\" content=\"7;url=https://mp.weixin.qq.com/s?__biz=MzI4&mid=1&idx=1\" />"
        );

        let page = insert_after_title("<head><title>T</title></head>", &tag).unwrap();
        assert_eq!(page, format!("<head><title>T</title>{}</head>", tag));

        assert!(insert_after_title("<head></head>", &tag).is_none());
    }
}
