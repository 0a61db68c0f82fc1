use crate::dispatch::handlers::body_text;
use crate::dispatch::{ResponseHandler, ResponseRewrite, SpiderContext};
use crate::extract::parse_comments;
use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::storage::CommentRecord;
use crate::url::{classify_url, comment_article_key, ExchangeKind};
use crate::Result;
use async_trait::async_trait;

/// Saves elected comments of articles already on record
pub struct CommentsHandler {
    context: SpiderContext,
}

impl CommentsHandler {
    pub fn new(context: SpiderContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ResponseHandler for CommentsHandler {
    fn name(&self) -> &'static str {
        "comments"
    }

    async fn handle(
        &self,
        request: &InterceptedRequest,
        response: &ProxyResponse,
    ) -> Result<Option<ResponseRewrite>> {
        if !self.context.config.rule.crawl_comments
            || classify_url(&request.url) != ExchangeKind::Comments
        {
            return Ok(None);
        }

        let comments = match parse_comments(&body_text(response)) {
            Ok(comments) => comments,
            Err(e) => {
                tracing::warn!("Unreadable comments for {}: {}", request.url, e);
                return Ok(None);
            }
        };
        if comments.is_empty() {
            return Ok(None);
        }

        let Some(key) = comment_article_key(&request.url) else {
            tracing::debug!("Comment request without article key: {}", request.url);
            return Ok(None);
        };

        // Comments arrive after the article page, so an unknown article was never seen
        let Some(article) = self.context.storage.get_article(&key).await? else {
            tracing::debug!("Comments for unknown article: {}", request.url);
            return Ok(None);
        };

        let count = comments.len();
        for comment in comments {
            let record = CommentRecord {
                content_id: comment.content_id,
                article_id: article.id,
                nickname: comment.nickname,
                avatar: comment.avatar,
                content: comment.content,
                created_at: comment.created_at,
                like_count: comment.like_count,
                replies: comment.replies,
            };
            self.context.storage.upsert_comment(&record).await?;
        }

        tracing::info!(
            "Saved {} comments of {}",
            count,
            article.title.as_deref().unwrap_or("untitled article")
        );

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handlers::test_support::{config, context, context_with};
    use crate::storage::{ArticleKey, ArticlePatch};
    use reqwest::{Method, StatusCode};

    const BODY: &str = r#"{"base_resp":{"ret":0},"elected_comment":[{
        "content_id":"6872104861","nick_name":"reader","logo_url":"http://wx.qlogo.cn/a",
        "content":"Nice","create_time":1700000100,"like_num":4,
        "reply":{"reply_list":[{"content":"Thanks","create_time":1700000200,"reply_like_num":1}]}
    }]}"#;

    fn request() -> InterceptedRequest {
        InterceptedRequest::new(
            Method::GET,
            "https://mp.weixin.qq.com/mp/appmsg_comment?action=getcomment&__biz=MzI4&appmsgid=100&idx=1&comment_id=1&offset=0&limit=100",
        )
    }

    async fn seed(context: &SpiderContext) -> i64 {
        context
            .storage
            .upsert_article(
                &ArticleKey::new("MzI4", "100", "1"),
                &ArticlePatch {
                    title: Some("Weekly digest".to_string()),
                    ..ArticlePatch::default()
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_saves_comments_with_replies() {
        let context = context();
        let article_id = seed(&context).await;
        let handler = CommentsHandler::new(context.clone());

        handler
            .handle(&request(), &ProxyResponse::json(StatusCode::OK, BODY))
            .await
            .unwrap();

        let comment = context.storage.get_comment("6872104861").await.unwrap().unwrap();
        assert_eq!(comment.article_id, article_id);
        assert_eq!(comment.content.as_deref(), Some("Nice"));
        assert_eq!(comment.replies.len(), 1);
        assert_eq!(comment.replies[0].content, "Thanks");
    }

    #[tokio::test]
    async fn test_unknown_article_is_skipped() {
        let context = context();
        let handler = CommentsHandler::new(context.clone());

        handler
            .handle(&request(), &ProxyResponse::json(StatusCode::OK, BODY))
            .await
            .unwrap();

        assert!(context.storage.get_comment("6872104861").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disabled_comment_crawling() {
        let mut config = config();
        config.rule.crawl_comments = false;
        let context = context_with(config);
        seed(&context).await;
        let handler = CommentsHandler::new(context.clone());

        handler
            .handle(&request(), &ProxyResponse::json(StatusCode::OK, BODY))
            .await
            .unwrap();

        assert_eq!(context.storage.count_records().await.unwrap().comments, 0);
    }
}
