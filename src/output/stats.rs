//! Statistics generation from the spider database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{Storage, StorageResult};

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStatistics {
    /// Total number of articles on record
    pub total_articles: u64,

    /// Articles the platform reported as removed
    pub failed_articles: u64,

    /// Articles with read metrics recorded at least once
    pub measured_articles: u64,

    /// Number of accounts on record
    pub accounts: u64,

    /// Accounts with a known publication span
    pub accounts_with_history: u64,

    /// Number of elected comments
    pub comments: u64,

    /// Number of read metric samples
    pub metric_samples: u64,
}

impl CrawlStatistics {
    /// Share of live articles that have metrics, in percent
    pub fn coverage(&self) -> f64 {
        let live = self.total_articles.saturating_sub(self.failed_articles);
        if live == 0 {
            return 0.0;
        }
        (self.measured_articles as f64 / live as f64) * 100.0
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub async fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    let counts = storage.count_records().await?;

    Ok(CrawlStatistics {
        total_articles: counts.articles,
        failed_articles: counts.failed_articles,
        measured_articles: counts.measured_articles,
        accounts: counts.accounts,
        accounts_with_history: counts.publication_records,
        comments: counts.comments,
        metric_samples: counts.metric_samples,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Articles:");
    println!("  Total: {}", stats.total_articles);
    println!("  Removed by the platform: {}", stats.failed_articles);
    println!("  With read metrics: {}", stats.measured_articles);
    println!("  Metric samples: {}", stats.metric_samples);
    println!("  Comments: {}", stats.comments);
    println!();

    println!("Accounts:");
    println!("  Total: {}", stats.accounts);
    println!("  With history listed: {}", stats.accounts_with_history);
    println!();

    println!(
        "Metrics Coverage: {:.1}% ({} / {} live articles measured)",
        stats.coverage(),
        stats.measured_articles,
        stats.total_articles.saturating_sub(stats.failed_articles)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ArticleKey, ArticlePatch, SqliteStorage};
    use chrono::Utc;

    #[test]
    fn test_coverage() {
        let stats = CrawlStatistics {
            total_articles: 150,
            failed_articles: 50,
            measured_articles: 25,
            ..CrawlStatistics::default()
        };
        assert_eq!(stats.coverage(), 25.0);
        assert_eq!(CrawlStatistics::default().coverage(), 0.0);
    }

    #[tokio::test]
    async fn test_load_statistics() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .upsert_article(
                &ArticleKey::new("MzI4", "100", "1"),
                &ArticlePatch {
                    read_count: Some(10),
                    metrics_updated_at: Some(Utc::now()),
                    ..ArticlePatch::default()
                },
            )
            .await
            .unwrap();
        storage
            .upsert_article(
                &ArticleKey::new("MzI4", "100", "2"),
                &ArticlePatch {
                    failed: Some(true),
                    ..ArticlePatch::default()
                },
            )
            .await
            .unwrap();

        let stats = load_statistics(&storage).await.unwrap();
        assert_eq!(stats.total_articles, 2);
        assert_eq!(stats.failed_articles, 1);
        assert_eq!(stats.measured_articles, 1);
        assert_eq!(stats.coverage(), 100.0);
    }
}
