//! Article page handlers

use crate::crawl::ForwardPager;
use crate::dispatch::handlers::body_text;
use crate::dispatch::{ResponseHandler, ResponseRewrite, SpiderContext};
use crate::extract::{parse_article_page, ArticlePage};
use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::storage::{AccountPatch, ArticlePatch};
use crate::url::{article_key_from_link, classify_url, ExchangeKind};
use crate::Result;
use async_trait::async_trait;

/// Saves the basic fields of an article page
///
/// Removed articles are flagged as failed so refills skip them. Articles
/// that already carry title, link and handle only get their body refreshed;
/// listed articles with title and link only gain the handle and body.
pub struct ArticleInfoHandler {
    context: SpiderContext,
}

impl ArticleInfoHandler {
    pub fn new(context: SpiderContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ResponseHandler for ArticleInfoHandler {
    fn name(&self) -> &'static str {
        "article_info"
    }

    async fn handle(
        &self,
        request: &InterceptedRequest,
        response: &ProxyResponse,
    ) -> Result<Option<ResponseRewrite>> {
        if classify_url(&request.url) != ExchangeKind::ArticlePage {
            return Ok(None);
        }

        let Some(key) = article_key_from_link(&request.url) else {
            tracing::debug!("Article page without article key: {}", request.url);
            return Ok(None);
        };

        let page = &self.context.config.page;
        let body_format = page.save_content.then_some(page.content_format);
        let storage = &self.context.storage;

        let info = match parse_article_page(&body_text(response), body_format) {
            ArticlePage::Removed => {
                storage
                    .upsert_article(
                        &key,
                        &ArticlePatch {
                            failed: Some(true),
                            ..ArticlePatch::default()
                        },
                    )
                    .await?;
                tracing::info!("Article removed by the platform: {}", request.url);
                return Ok(None);
            }
            ArticlePage::Live(info) => info,
        };

        let existing = storage.get_article(&key).await?;
        if existing.as_ref().is_some_and(|article| article.has_basic_info()) {
            if info.content.is_some() {
                storage
                    .upsert_article(
                        &key,
                        &ArticlePatch {
                            content: info.content,
                            ..ArticlePatch::default()
                        },
                    )
                    .await?;
                tracing::debug!("Refreshed article body: {}", request.url);
            }
            return Ok(None);
        }

        // Listed articles already carry title and link; only the handle is new
        let listed = existing
            .as_ref()
            .is_some_and(|article| article.title.is_some() && article.link.is_some());
        if listed {
            storage
                .upsert_article(
                    &key,
                    &ArticlePatch {
                        account_handle: info.account_handle.clone(),
                        content: info.content,
                        ..ArticlePatch::default()
                    },
                )
                .await?;
            storage
                .upsert_account(
                    &key.account_id,
                    &AccountPatch {
                        handle: info.account_handle,
                        ..AccountPatch::default()
                    },
                )
                .await?;
            tracing::debug!("Completed listed article: {}", request.url);
            return Ok(None);
        }

        storage
            .upsert_article(
                &key,
                &ArticlePatch {
                    title: info.title.clone(),
                    link: Some(request.url.clone()),
                    publish_at: info.publish_at,
                    source_url: info.source_url,
                    cover: info.cover,
                    digest: info.digest,
                    account_handle: info.account_handle.clone(),
                    content: info.content,
                    ..ArticlePatch::default()
                },
            )
            .await?;

        storage
            .upsert_account(
                &key.account_id,
                &AccountPatch {
                    handle: info.account_handle,
                    ..AccountPatch::default()
                },
            )
            .await?;

        tracing::info!(
            "Saved article: {}",
            info.title.as_deref().unwrap_or(request.url.as_str())
        );

        Ok(None)
    }
}

/// Rewrites article pages to walk on to the next queued article
pub struct ArticleAdvanceHandler {
    pager: ForwardPager,
}

impl ArticleAdvanceHandler {
    pub fn new(context: &SpiderContext) -> Self {
        let pager = ForwardPager::new(
            context.links.clone(),
            context.config.page.clone(),
            context.config.rule.replace_post_body,
        );
        Self { pager }
    }
}

#[async_trait]
impl ResponseHandler for ArticleAdvanceHandler {
    fn name(&self) -> &'static str {
        "article_advance"
    }

    async fn handle(
        &self,
        request: &InterceptedRequest,
        response: &ProxyResponse,
    ) -> Result<Option<ResponseRewrite>> {
        if classify_url(&request.url) != ExchangeKind::ArticlePage {
            return Ok(None);
        }

        let page = self.pager.advance(&body_text(response)).await?;
        Ok(page.map(ResponseRewrite::body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handlers::test_support::{config, context, context_with};
    use crate::storage::ArticleKey;
    use chrono::{TimeZone, Utc};
    use reqwest::{Method, StatusCode};

    const LINK: &str = "https://mp.weixin.qq.com/s?__biz=MzI4&mid=100&idx=1&sn=abc";

    const PAGE: &str = r#"<html><head><title>Weekly digest</title></head><body>
<span class="profile_meta_value">daily_news</span>
<div class="rich_media_content " id="js_content">
    <p>Hello</p>
</div>
<script nonce="1">
    var msg_title = "Weekly digest";
    var ct = "1700000000";
</script>
</body></html>"#;

    fn key() -> ArticleKey {
        ArticleKey::new("MzI4", "100", "1")
    }

    fn request() -> InterceptedRequest {
        InterceptedRequest::new(Method::GET, LINK)
    }

    #[tokio::test]
    async fn test_saves_basic_info_and_account_handle() {
        let context = context();
        let handler = ArticleInfoHandler::new(context.clone());
        let response = ProxyResponse::html(StatusCode::OK, PAGE);

        assert!(handler.handle(&request(), &response).await.unwrap().is_none());

        let article = context.storage.get_article(&key()).await.unwrap().unwrap();
        assert_eq!(article.title.as_deref(), Some("Weekly digest"));
        assert_eq!(article.link.as_deref(), Some(LINK));
        assert_eq!(article.account_handle.as_deref(), Some("daily_news"));
        assert!(article.content.is_none());
        assert!(!article.failed);

        let account = context.storage.get_account("MzI4").await.unwrap().unwrap();
        assert_eq!(account.handle.as_deref(), Some("daily_news"));
    }

    #[tokio::test]
    async fn test_known_article_only_refreshes_body() {
        let mut config = config();
        config.page.save_content = true;
        let context = context_with(config);
        let handler = ArticleInfoHandler::new(context.clone());

        handler
            .handle(&request(), &ProxyResponse::html(StatusCode::OK, PAGE))
            .await
            .unwrap();

        let edited = PAGE
            .replace("\"Weekly digest\"", "\"Renamed\"")
            .replace("<p>Hello</p>", "<p>Updated</p>");
        handler
            .handle(&request(), &ProxyResponse::html(StatusCode::OK, edited))
            .await
            .unwrap();

        let article = context.storage.get_article(&key()).await.unwrap().unwrap();
        assert_eq!(article.title.as_deref(), Some("Weekly digest"));
        assert_eq!(article.content.as_deref(), Some("<p>Updated</p>"));
    }

    #[tokio::test]
    async fn test_listed_article_only_gains_handle() {
        let context = context();
        let listed_at = Utc.with_ymd_and_hms(2023, 11, 14, 22, 0, 0).unwrap();
        context
            .storage
            .upsert_article(
                &key(),
                &ArticlePatch {
                    title: Some("Listed title".to_string()),
                    link: Some(LINK.to_string()),
                    publish_at: Some(listed_at),
                    digest: Some("listed digest".to_string()),
                    ..ArticlePatch::default()
                },
            )
            .await
            .unwrap();

        let handler = ArticleInfoHandler::new(context.clone());
        handler
            .handle(&request(), &ProxyResponse::html(StatusCode::OK, PAGE))
            .await
            .unwrap();

        let article = context.storage.get_article(&key()).await.unwrap().unwrap();
        assert_eq!(article.title.as_deref(), Some("Listed title"));
        assert_eq!(article.digest.as_deref(), Some("listed digest"));
        assert_eq!(article.publish_at, Some(listed_at));
        assert_eq!(article.account_handle.as_deref(), Some("daily_news"));

        let account = context.storage.get_account("MzI4").await.unwrap().unwrap();
        assert_eq!(account.handle.as_deref(), Some("daily_news"));
    }

    #[tokio::test]
    async fn test_removed_article_is_flagged() {
        let context = context();
        let handler = ArticleInfoHandler::new(context.clone());
        let response = ProxyResponse::html(
            StatusCode::OK,
            r#"<div class="global_error_msg warn">deleted</div>"#,
        );

        handler.handle(&request(), &response).await.unwrap();

        let article = context.storage.get_article(&key()).await.unwrap().unwrap();
        assert!(article.failed);
        assert!(article.title.is_none());
    }

    #[tokio::test]
    async fn test_advance_appends_refresh_to_next_link() {
        let context = context();
        context
            .links
            .push_article_links(vec!["https://mp.weixin.qq.com/s?__biz=MzI4&mid=101&idx=1".to_string()])
            .await
            .unwrap();
        let handler = ArticleAdvanceHandler::new(&context);

        let rewrite = handler
            .handle(&request(), &ProxyResponse::html(StatusCode::OK, PAGE))
            .await
            .unwrap()
            .unwrap();

        let body = String::from_utf8(rewrite.body.unwrap()).unwrap();
        assert!(body.contains(
            r#"<title>Weekly digest</title><meta http-equiv="refresh" content="3;url=https://mp.weixin.qq.com/s?__biz=MzI4&mid=101&idx=1" />"#
        ));
    }

    #[tokio::test]
    async fn test_advance_leaves_page_when_queue_is_exhausted() {
        let context = context();
        let handler = ArticleAdvanceHandler::new(&context);

        let rewrite = handler
            .handle(&request(), &ProxyResponse::html(StatusCode::OK, PAGE))
            .await
            .unwrap();

        assert!(rewrite.is_none());
    }
}
