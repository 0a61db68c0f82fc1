use crate::dispatch::handlers::body_text;
use crate::dispatch::handlers::listing::save_listing;
use crate::dispatch::{ResponseHandler, ResponseRewrite, SpiderContext};
use crate::extract::{decode_embedded_list, parse_profile_page};
use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::storage::AccountPatch;
use crate::url::{account_id_from_link, classify_url, ExchangeKind};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;

/// Saves the account behind a history page and the articles embedded in it
///
/// Opening the page stamps the account so the account queue does not hand
/// it out again before the revisit interval has passed.
pub struct ProfileHandler {
    context: SpiderContext,
}

impl ProfileHandler {
    pub fn new(context: SpiderContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl ResponseHandler for ProfileHandler {
    fn name(&self) -> &'static str {
        "profile"
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
            tracing::debug!("History page without account id: {}", request.url);
            return Ok(None);
        };

        let page = parse_profile_page(&body_text(response));

        self.context
            .storage
            .upsert_account(
                &account_id,
                &AccountPatch {
                    nickname: page.nickname.clone(),
                    avatar: page.avatar,
                    history_opened_at: Some(Utc::now()),
                    ..AccountPatch::default()
                },
            )
            .await?;

        self.context.storage.start_history_walk(&account_id).await?;

        tracing::info!(
            "Opened history of {}",
            page.nickname.as_deref().unwrap_or(account_id.as_str())
        );

        let Some(raw) = page.embedded_list else {
            return Ok(None);
        };

        match decode_embedded_list(&raw) {
            Ok(candidates) => save_listing(&self.context, candidates).await?,
            Err(e) => tracing::warn!("Unreadable listing in history of {}: {}", account_id, e),
        }

        Ok(None)
    }
}
