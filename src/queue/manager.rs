//! Two-tier link supply
//!
//! The manager pops from the ephemeral queue and, when it is empty, refills it
//! once from durable storage before popping again. Refills never look at what
//! is already queued; duplicate links are absorbed by the article upsert key.

use crate::config::{Config, PageConfig, ProfileConfig};
use crate::queue::{LinkQueue, QueueKey, QueueResult};
use crate::storage::{AccountRefillFilter, ArticleRefillFilter, Storage};
use crate::url::history_page_link;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Decides whether an already measured article is revisited
///
/// An article is due when it was never measured, or when its last measurement
/// happened no more than `interval` after it was published. The window is
/// measured from the publish time, so once an article has been measured past
/// the window it is never revisited, however old that measurement gets.
///
/// # Arguments
///
/// * `publish_at` - When the article was published
/// * `metrics_updated_at` - When its counters were last recorded, if ever
/// * `interval` - The revisit window
pub fn recrawl_due_since_publish(
    publish_at: DateTime<Utc>,
    metrics_updated_at: Option<DateTime<Utc>>,
    interval: Duration,
) -> bool {
    match metrics_updated_at {
        None => true,
        Some(updated_at) => updated_at - publish_at <= interval,
    }
}

/// Converts configured seconds into a duration, saturating on overflow
fn seconds(secs: u64) -> Duration {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Supplies the next article and account links
pub struct LinkQueueManager {
    queue: Arc<dyn LinkQueue>,
    storage: Arc<dyn Storage>,
    page: PageConfig,
    profile: ProfileConfig,
}

impl LinkQueueManager {
    /// Creates a manager over an ephemeral queue and the durable store
    pub fn new(queue: Arc<dyn LinkQueue>, storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self {
            queue,
            storage,
            page: config.page.clone(),
            profile: config.profile.clone(),
        }
    }

    /// Returns the next article link to visit
    ///
    /// # Returns
    ///
    /// * `Ok(Some(link))` - The next link
    /// * `Ok(None)` - Both the queue and the refill query are exhausted
    /// * `Err(QueueError)` - The queue backend or the refill query failed
    pub async fn next_article_link(&self) -> QueueResult<Option<String>> {
        self.next_link(QueueKey::Articles).await
    }

    /// Returns the next account history link to visit
    pub async fn next_account_link(&self) -> QueueResult<Option<String>> {
        self.next_link(QueueKey::Accounts).await
    }

    /// Queues article links ahead of any refill
    pub async fn push_article_links(&self, links: Vec<String>) -> QueueResult<()> {
        self.queue.push(QueueKey::Articles, links).await
    }

    /// Queues account history links ahead of any refill
    pub async fn push_account_links(&self, links: Vec<String>) -> QueueResult<()> {
        self.queue.push(QueueKey::Accounts, links).await
    }

    /// Number of article links waiting
    pub async fn pending_articles(&self) -> QueueResult<usize> {
        self.queue.len(QueueKey::Articles).await
    }

    /// Number of account links waiting
    pub async fn pending_accounts(&self) -> QueueResult<usize> {
        self.queue.len(QueueKey::Accounts).await
    }

    async fn next_link(&self, key: QueueKey) -> QueueResult<Option<String>> {
        if let Some(link) = self.queue.pop(key).await? {
            return Ok(Some(link));
        }

        let links = match key {
            QueueKey::Articles => self.refill_articles().await?,
            QueueKey::Accounts => self.refill_accounts().await?,
        };

        if links.is_empty() {
            tracing::debug!("{} exhausted, nothing to refill", key.name());
            return Ok(None);
        }

        tracing::info!("Refilled {} with {} links", key.name(), links.len());
        self.queue.push(key, links).await?;

        // One retry only; a concurrent caller may have drained the refill
        self.queue.pop(key).await
    }

    async fn refill_articles(&self) -> QueueResult<Vec<String>> {
        let filter = ArticleRefillFilter {
            min_publish_at: self.page.min_time,
            max_publish_at: self.page.max_time.unwrap_or_else(Utc::now),
            target_accounts: self.page.target_accounts.clone(),
            only_unmeasured: !self.page.crawl_existing,
        };

        let candidates = self.storage.article_refill_candidates(&filter).await?;
        let interval = seconds(self.page.crawl_existing_interval);

        let links = candidates
            .into_iter()
            .filter(|candidate| {
                !self.page.crawl_existing
                    || recrawl_due_since_publish(
                        candidate.publish_at,
                        candidate.metrics_updated_at,
                        interval,
                    )
            })
            .map(|candidate| candidate.link)
            .collect();

        Ok(links)
    }

    async fn refill_accounts(&self) -> QueueResult<Vec<String>> {
        let now = Utc::now();
        let opened_before = now
            .checked_sub_signed(seconds(self.profile.revisit_interval))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let filter = AccountRefillFilter {
            opened_before,
            target_accounts: self.profile.target_accounts.clone(),
        };

        let ids = self.storage.account_refill_candidates(&filter).await?;
        Ok(ids.iter().map(|id| history_page_link(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContentFormat, RuleConfig, StorageConfig};
    use crate::queue::MemoryQueue;
    use crate::storage::{AccountPatch, ArticleKey, ArticlePatch, SqliteStorage};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap()
    }

    fn config(crawl_existing: bool) -> Config {
        Config {
            storage: StorageConfig {
                database_path: ":memory:".to_string(),
            },
            rule: RuleConfig::default(),
            page: PageConfig {
                disable: false,
                jump_interval: 3,
                jump_random: 3,
                min_time: at(1),
                max_time: Some(at(31)),
                crawl_existing,
                crawl_existing_interval: 24 * 60 * 60,
                target_accounts: vec![],
                save_content: false,
                content_format: ContentFormat::Html,
            },
            profile: ProfileConfig {
                disable: false,
                min_time: at(1),
                jump_interval: 5,
                revisit_interval: 24 * 60 * 60,
                target_accounts: vec![],
            },
            auth: None,
        }
    }

    fn manager(storage: Arc<SqliteStorage>, crawl_existing: bool) -> LinkQueueManager {
        LinkQueueManager::new(
            Arc::new(MemoryQueue::new()),
            storage,
            &config(crawl_existing),
        )
    }

    async fn store_article(
        storage: &SqliteStorage,
        mid: &str,
        publish_at: DateTime<Utc>,
        metrics_updated_at: Option<DateTime<Utc>>,
    ) {
        storage
            .upsert_article(
                &ArticleKey::new("MzI4", mid, "1"),
                &ArticlePatch {
                    title: Some(format!("article {}", mid)),
                    link: Some(format!("https://mp.weixin.qq.com/s?__biz=MzI4&mid={}&idx=1", mid)),
                    publish_at: Some(publish_at),
                    metrics_updated_at,
                    ..ArticlePatch::default()
                },
            )
            .await
            .unwrap();
    }

    #[test]
    fn test_recrawl_window_is_measured_from_publish_not_now() {
        let published = at(1);
        let window = Duration::hours(24);

        assert!(recrawl_due_since_publish(published, None, window));
        assert!(recrawl_due_since_publish(
            published,
            Some(published + Duration::hours(2)),
            window
        ));
        assert!(recrawl_due_since_publish(
            published,
            Some(published + window),
            window
        ));
        // Measured two days after publish: never due again, even years later
        assert!(!recrawl_due_since_publish(
            published,
            Some(published + Duration::days(2)),
            window
        ));
    }

    #[test]
    fn test_seconds_saturates() {
        assert_eq!(seconds(60), Duration::minutes(1));
        assert_eq!(seconds(u64::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn test_queued_links_come_first() {
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        store_article(&storage, "1", at(5), None).await;
        let manager = manager(storage, false);

        manager
            .push_article_links(vec!["https://queued".to_string()])
            .await
            .unwrap();

        assert_eq!(
            manager.next_article_link().await.unwrap().as_deref(),
            Some("https://queued")
        );
    }

    #[tokio::test]
    async fn test_refill_then_exhaustion_is_terminal() {
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        store_article(&storage, "1", at(5), None).await;
        store_article(&storage, "2", at(6), None).await;
        let manager = manager(Arc::clone(&storage), false);

        let first = manager.next_article_link().await.unwrap().unwrap();
        assert!(first.contains("mid=1"));
        assert_eq!(manager.pending_articles().await.unwrap(), 1);

        let second = manager.next_article_link().await.unwrap().unwrap();
        assert!(second.contains("mid=2"));

        // Record metrics as the read-metrics handler would
        for mid in ["1", "2"] {
            storage
                .upsert_article(
                    &ArticleKey::new("MzI4", mid, "1"),
                    &ArticlePatch {
                        metrics_updated_at: Some(at(7)),
                        ..ArticlePatch::default()
                    },
                )
                .await
                .unwrap();
        }

        assert_eq!(manager.next_article_link().await.unwrap(), None);
        assert_eq!(manager.next_article_link().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_store_is_exhausted() {
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        let manager = manager(storage, false);

        assert_eq!(manager.next_article_link().await.unwrap(), None);
        assert_eq!(manager.next_account_link().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_crawl_existing_applies_window() {
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        store_article(&storage, "fresh", at(5), Some(at(5) + Duration::hours(3))).await;
        store_article(&storage, "settled", at(5), Some(at(8))).await;
        store_article(&storage, "new", at(6), None).await;

        let existing = manager(Arc::clone(&storage), true);

        let first = existing.next_article_link().await.unwrap().unwrap();
        assert_eq!(existing.pending_articles().await.unwrap(), 1);
        let second = existing.next_article_link().await.unwrap().unwrap();

        assert!(first.contains("mid=fresh"));
        assert!(second.contains("mid=new"));
    }

    #[tokio::test]
    async fn test_account_refill_builds_history_links() {
        let storage = Arc::new(SqliteStorage::new_in_memory().unwrap());
        storage
            .upsert_account("MzI4MjEwNzg3NQ==", &AccountPatch::default())
            .await
            .unwrap();
        storage
            .upsert_account(
                "opened-just-now",
                &AccountPatch {
                    history_opened_at: Some(Utc::now()),
                    ..AccountPatch::default()
                },
            )
            .await
            .unwrap();
        let manager = manager(storage, false);

        assert_eq!(
            manager.next_account_link().await.unwrap(),
            Some(history_page_link("MzI4MjEwNzg3NQ=="))
        );
        assert_eq!(manager.pending_accounts().await.unwrap(), 0);
    }
}
