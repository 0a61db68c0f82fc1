use crate::dispatch::handlers::body_text;
use crate::dispatch::{ResponseHandler, ResponseRewrite, SpiderContext};
use crate::extract::parse_read_metrics;
use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::storage::{ArticlePatch, MetricSample};
use crate::url::{article_key_from_form, classify_url, ExchangeKind};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;

/// Records read and like counters reported by `getappmsgext`
///
/// The article key travels in the form-encoded request body. Every response
/// updates the article and appends one metric sample.
pub struct ReadMetricsHandler {
    context: SpiderContext,
}

impl ReadMetricsHandler {
    pub fn new(context: SpiderContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ResponseHandler for ReadMetricsHandler {
    fn name(&self) -> &'static str {
        "read_metrics"
    }

    async fn handle(
        &self,
        request: &InterceptedRequest,
        response: &ProxyResponse,
    ) -> Result<Option<ResponseRewrite>> {
        if classify_url(&request.url) != ExchangeKind::ReadMetrics {
            return Ok(None);
        }

        let metrics = match parse_read_metrics(&body_text(response)) {
            Ok(metrics) => metrics,
            Err(e) => {
                tracing::warn!("Unreadable read metrics for {}: {}", request.url, e);
                return Ok(None);
            }
        };

        let Some(key) = article_key_from_form(&request.body) else {
            tracing::debug!("Read metrics request without article key: {}", request.url);
            return Ok(None);
        };

        let now = Utc::now();
        let storage = &self.context.storage;
        let article_id = storage
            .upsert_article(
                &key,
                &ArticlePatch {
                    read_count: Some(metrics.read_count),
                    like_count: Some(metrics.like_count),
                    metrics_updated_at: Some(now),
                    ..ArticlePatch::default()
                },
            )
            .await?;

        storage
            .record_metric_sample(&MetricSample {
                article_id,
                observed_at: now,
                read_count: metrics.read_count,
                like_count: metrics.like_count,
            })
            .await?;

        let title = storage
            .get_article(&key)
            .await?
            .and_then(|article| article.title);
        let pending = self.context.links.pending_articles().await?;

        tracing::info!(
            "{}: {} reads, {} likes ({} articles pending)",
            title.unwrap_or_else(|| format!("article {}", article_id)),
            metrics.read_count,
            metrics.like_count,
            pending
        );

        Ok(None)
    }
}
