use crate::dispatch::handlers::body_text;
use crate::dispatch::{ResponseHandler, ResponseRewrite, SpiderContext};
use crate::extract::{parse_message_list, ArticleCandidate};
use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::storage::ArticlePatch;
use crate::url::{classify_url, ExchangeKind};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Saves a page of listed articles and records it in each account's history walk
///
/// Listings carry no metrics, so the articles are left unmeasured and become
/// refill candidates for the forward walk.
pub(super) async fn save_listing(
    context: &SpiderContext,
    candidates: Vec<ArticleCandidate>,
) -> Result<()> {
    if candidates.is_empty() {
        return Ok(());
    }

    let mut spans: BTreeMap<String, (DateTime<Utc>, DateTime<Utc>)> = BTreeMap::new();
    let count = candidates.len();

    for candidate in candidates {
        if let Some(publish_at) = candidate.publish_at {
            spans
                .entry(candidate.key.account_id.clone())
                .and_modify(|(earliest, latest)| {
                    *earliest = (*earliest).min(publish_at);
                    *latest = (*latest).max(publish_at);
                })
                .or_insert((publish_at, publish_at));
        }

        context
            .storage
            .upsert_article(
                &candidate.key,
                &ArticlePatch {
                    title: Some(candidate.title.clone()),
                    link: Some(candidate.link),
                    author: candidate.author,
                    copyright: candidate.copyright,
                    publish_at: candidate.publish_at,
                    cover: candidate.cover,
                    digest: candidate.digest,
                    source_url: candidate.source_url,
                    ..ArticlePatch::default()
                },
            )
            .await?;

        tracing::debug!("Listed article: {}", candidate.title);
    }

    for (account_id, (earliest, latest)) in spans {
        context
            .storage
            .record_publications(&account_id, earliest, latest)
            .await?;
    }

    let pending = context.links.pending_accounts().await?;
    tracing::info!(
        "Saved {} listed articles ({} accounts pending)",
        count,
        pending
    );

    Ok(())
}

/// Saves the articles of a history page's `getmsg` continuation
pub struct MessageListHandler {
    context: SpiderContext,
}

impl MessageListHandler {
    pub fn new(context: SpiderContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ResponseHandler for MessageListHandler {
    fn name(&self) -> &'static str {
        "message_list"
    }

    async fn handle(
        &self,
        request: &InterceptedRequest,
        response: &ProxyResponse,
    ) -> Result<Option<ResponseRewrite>> {
        if classify_url(&request.url) != ExchangeKind::MessageList {
            return Ok(None);
        }

        match parse_message_list(&body_text(response)) {
            Ok(candidates) => save_listing(&self.context, candidates).await?,
            Err(e) => tracing::warn!("Unreadable message list for {}: {}", request.url, e),
        }

        Ok(None)
    }
}
