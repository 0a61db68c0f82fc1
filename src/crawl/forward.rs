//! Forward pagination from one article page to the next

use crate::config::PageConfig;
use crate::crawl::controller::{insert_after_title, meta_refresh};
use crate::extract::patterns;
use crate::queue::{LinkQueueManager, QueueResult};
use rand::Rng;
use std::sync::Arc;

/// Delay before the client moves on: base plus `1..=random` seconds of jitter
pub fn jump_delay<R: Rng + ?Sized>(base: u64, random: u64, rng: &mut R) -> u64 {
    if random == 0 {
        return base;
    }
    base.saturating_add(rng.gen_range(1..=random))
}

/// Replaces the visible article body with the number of pending articles
///
/// Returns None when the page has no recognizable body.
pub fn replace_article_body(html: &str, pending: usize) -> Option<String> {
    let range = patterns::rich_media_body(html)?;
    let mut page = html.to_string();
    page.replace_range(range, &format!("剩余文章抓取长度: {}", pending));
    Some(page)
}

/// Rewrites article pages so the client advances on its own
pub struct ForwardPager {
    links: Arc<LinkQueueManager>,
    page: PageConfig,
    replace_body: bool,
}

impl ForwardPager {
    pub fn new(links: Arc<LinkQueueManager>, page: PageConfig, replace_body: bool) -> Self {
        Self {
            links,
            page,
            replace_body,
        }
    }

    /// Rewrites an article page
    ///
    /// # Returns
    ///
    /// * `Ok(Some(page))` - The body was replaced, a refresh was added, or both
    /// * `Ok(None)` - Nothing to change; the page is served as is
    /// * `Err(QueueError)` - The link queue failed
    pub async fn advance(&self, html: &str) -> QueueResult<Option<String>> {
        let mut page: Option<String> = None;

        if self.replace_body {
            let pending = self.links.pending_articles().await?;
            page = replace_article_body(html, pending);
        }

        if !self.page.disable {
            match self.links.next_article_link().await? {
                Some(link) => {
                    let delay =
                        jump_delay(self.page.jump_interval, self.page.jump_random, &mut rand::thread_rng());
                    let current = page.as_deref().unwrap_or(html);
                    if let Some(advanced) = insert_after_title(current, &meta_refresh(delay, &link)) {
                        tracing::debug!("Next article in {}s: {}", delay, link);
                        page = Some(advanced);
                    }
                }
                None => tracing::info!("All articles have been visited"),
            }
        }

        Ok(page)
    }
}
