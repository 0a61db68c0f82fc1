use crate::crawl::HistoryPager;
use crate::dispatch::handlers::body_text;
use crate::dispatch::{ResponseHandler, ResponseRewrite, SpiderContext};
use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::url::{account_id_from_link, classify_url, ExchangeKind};
use crate::Result;
use async_trait::async_trait;

/// Injects the self-scrolling controller into history pages
pub struct HistoryControllerHandler {
    pager: HistoryPager,
}

impl HistoryControllerHandler {
    pub fn new(context: &SpiderContext) -> Self {
        Self {
            pager: HistoryPager::new(context.storage.clone(), context.config.profile.clone()),
        }
    }
}

#[async_trait]
impl ResponseHandler for HistoryControllerHandler {
    fn name(&self) -> &'static str {
        "history_controller"
    }

    async fn handle(
        &self,
        request: &InterceptedRequest,
        response: &ProxyResponse,
    ) -> Result<Option<ResponseRewrite>> {
        if classify_url(&request.url) != ExchangeKind::ProfileHome {
            return Ok(None);
        }

        let Some(account_id) = account_id_from_link(&request.url) else {
            return Ok(None);
        };

        let page = self
            .pager
            .controller_page(&account_id, &body_text(response))
            .await?;

        if page.is_none() {
            tracing::warn!("History page has no body to inject into: {}", request.url);
        }

        Ok(page.map(ResponseRewrite::body))
    }
}
