//! Endpoints served to the injected history controller
//!
//! The controller runs inside the client's history page, so its requests
//! reach the proxy with the platform's host. They are answered here and
//! never forwarded.

use crate::crawl::{FirstPostReport, NextLinkResponse};
use crate::dispatch::SpiderContext;
use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::storage::AccountPatch;
use crate::url::{account_id_from_link, ExchangeKind};
use crate::Result;
use reqwest::{Method, StatusCode};

pub struct ControlEndpoints {
    context: SpiderContext,
}

impl ControlEndpoints {
    pub fn new(context: SpiderContext) -> Self {
        Self { context }
    }

    /// Answers a control request
    ///
    /// # Returns
    ///
    /// * `Ok(Some(response))` - The synthesized response
    /// * `Ok(None)` - `kind` is not a control endpoint
    /// * `Err(SpiderError)` - Storage or queue failure
    pub async fn answer(
        &self,
        kind: ExchangeKind,
        request: &InterceptedRequest,
    ) -> Result<Option<ProxyResponse>> {
        let response = match kind {
            ExchangeKind::FirstPostReport if request.method == Method::POST => {
                self.first_post(request).await?
            }
            ExchangeKind::NextAccountLink if request.method == Method::GET => {
                self.next_link().await?
            }
            ExchangeKind::FirstPostReport | ExchangeKind::NextAccountLink => {
                ProxyResponse::text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
            }
            _ => return Ok(None),
        };

        Ok(Some(response))
    }

    /// Records that a history walk reached the account's first post
    async fn first_post(&self, request: &InterceptedRequest) -> Result<ProxyResponse> {
        let report: FirstPostReport = match serde_json::from_slice(&request.body) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!("Malformed first post report: {}", e);
                return Ok(ProxyResponse::text(StatusCode::BAD_REQUEST, "malformed report"));
            }
        };

        let Some(account_id) = account_id_from_link(&report.link) else {
            tracing::warn!("First post report without account id: {}", report.link);
            return Ok(ProxyResponse::text(StatusCode::BAD_REQUEST, "missing __biz"));
        };

        let first_publish_at = report.publish_at();
        self.context
            .storage
            .upsert_account(
                &account_id,
                &AccountPatch {
                    first_publish_at,
                    ..AccountPatch::default()
                },
            )
            .await?;

        match first_publish_at {
            Some(at) => tracing::info!("Reached first post of {} ({})", account_id, at),
            None => tracing::info!("Reached first post of {}", account_id),
        }

        Ok(ProxyResponse::text(StatusCode::OK, "ok"))
    }

    /// Hands the controller the next account history page, if any
    async fn next_link(&self) -> Result<ProxyResponse> {
        let link = if self.context.config.profile.disable {
            None
        } else {
            self.context.links.next_account_link().await?
        };

        match &link {
            Some(link) => tracing::info!("Next account: {}", link),
            None => tracing::debug!("No account to visit next"),
        }

        let body = serde_json::to_vec(&NextLinkResponse {
            data: link.unwrap_or_default(),
        })?;
        Ok(ProxyResponse::json(StatusCode::OK, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handlers::test_support::{config, context, context_with};
    use chrono::{DateTime, Utc};

    const FIRST_POST: &str = "https://mp.weixin.qq.com/ws/profiles/first_post";
    const NEXT_LINK: &str = "https://mp.weixin.qq.com/wx/profiles/next_link";

    fn report(body: &str) -> InterceptedRequest {
        InterceptedRequest::new(Method::POST, FIRST_POST).with_body(body.to_string())
    }

    async fn next_link(endpoints: &ControlEndpoints) -> NextLinkResponse {
        let request = InterceptedRequest::new(Method::GET, NEXT_LINK);
        let response = endpoints
            .answer(ExchangeKind::NextAccountLink, &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        serde_json::from_slice(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_first_post_sets_first_publish_time() {
        let context = context();
        let endpoints = ControlEndpoints::new(context.clone());
        let request = report(
            r#"{"link":"https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=MzI4&scene=124","publishAt":1562083200000}"#,
        );

        let response = endpoints
            .answer(ExchangeKind::FirstPostReport, &request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.text_body(), "ok");

        let account = context.storage.get_account("MzI4").await.unwrap().unwrap();
        assert_eq!(
            account.first_publish_at,
            DateTime::<Utc>::from_timestamp_millis(1_562_083_200_000)
        );
    }

    #[tokio::test]
    async fn test_malformed_report_is_rejected() {
        let endpoints = ControlEndpoints::new(context());

        for body in ["not json", r#"{"publishAt":1}"#, r#"{"link":"https://mp.weixin.qq.com/"}"#] {
            let response = endpoints
                .answer(ExchangeKind::FirstPostReport, &report(body))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(response.status, StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_next_link_hands_out_queued_accounts() {
        let context = context();
        context
            .links
            .push_account_links(vec!["https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=MzI4".to_string()])
            .await
            .unwrap();
        let endpoints = ControlEndpoints::new(context);

        assert_eq!(
            next_link(&endpoints).await.data,
            "https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=MzI4"
        );
        assert_eq!(next_link(&endpoints).await.data, "");
    }

    #[tokio::test]
    async fn test_next_link_is_empty_when_profile_crawling_is_disabled() {
        let mut config = config();
        config.profile.disable = true;
        let context = context_with(config);
        context
            .links
            .push_account_links(vec!["https://mp.weixin.qq.com/mp/profile_ext?action=home&__biz=MzI4".to_string()])
            .await
            .unwrap();

        assert_eq!(next_link(&ControlEndpoints::new(context)).await.data, "");
    }

    #[tokio::test]
    async fn test_other_kinds_are_not_answered() {
        let endpoints = ControlEndpoints::new(context());
        let request = InterceptedRequest::new(Method::GET, "https://mp.weixin.qq.com/s?__biz=MzI4");

        assert!(endpoints
            .answer(ExchangeKind::ArticlePage, &request)
            .await
            .unwrap()
            .is_none());
    }
}
