//! Response dispatch
//!
//! Every intercepted response is offered to an ordered chain of handlers.
//! A handler either passes (returns `None`) or asks for a rewrite; the first
//! rewrite ends the chain and is merged onto the original response.
//!
//! Extraction handlers always pass, so they run for every matching exchange.
//! Rewriting handlers sit after the extraction handlers of the same exchange.

mod context;
pub(crate) mod handlers;

pub use context::SpiderContext;
pub use handlers::{
    ArticleAdvanceHandler, ArticleInfoHandler, CommentsHandler, HistoryControllerHandler,
    MessageListHandler, ProfileHandler, ReadMetricsHandler,
};

use crate::proxy::{InterceptedRequest, ProxyResponse};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::StatusCode;

/// Partial replacement of a response; unset parts keep the original
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseRewrite {
    pub status: Option<StatusCode>,
    pub headers: Option<HeaderMap>,
    pub body: Option<Vec<u8>>,
}

impl ResponseRewrite {
    /// A rewrite that only replaces the body
    pub fn body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Merges the rewrite onto a response
    ///
    /// Rewritten headers replace headers of the same name. A new body drops
    /// the original `Content-Length`; the host recomputes it.
    pub fn apply(self, mut response: ProxyResponse) -> ProxyResponse {
        if let Some(status) = self.status {
            response.status = status;
        }

        if let Some(headers) = self.headers {
            for (name, value) in headers.iter() {
                response.headers.insert(name.clone(), value.clone());
            }
        }

        if let Some(body) = self.body {
            response.headers.remove(CONTENT_LENGTH);
            response.body = body;
        }

        response
    }
}

/// One stage of the dispatch chain
#[async_trait]
pub trait ResponseHandler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Inspects an exchange
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Not applicable, or extraction only; the chain continues
    /// * `Ok(Some(rewrite))` - The chain stops and the rewrite is applied
    /// * `Err(SpiderError)` - Storage or queue failure; the chain aborts
    async fn handle(
        &self,
        request: &InterceptedRequest,
        response: &ProxyResponse,
    ) -> Result<Option<ResponseRewrite>>;
}

/// Ordered chain of response handlers
pub struct Dispatcher {
    handlers: Vec<Box<dyn ResponseHandler>>,
}

impl Dispatcher {
    /// Creates a dispatcher over handlers in the given order
    pub fn new(handlers: Vec<Box<dyn ResponseHandler>>) -> Self {
        Self { handlers }
    }

    /// Creates the standard chain
    ///
    /// Order:
    /// 1. Read metrics
    /// 2. Article basic info
    /// 3. Article auto-advance
    /// 4. Comments
    /// 5. Account profile
    /// 6. Account message list
    /// 7. History controller injection
    pub fn standard(context: &SpiderContext) -> Self {
        Self::new(vec![
            Box::new(ReadMetricsHandler::new(context.clone())),
            Box::new(ArticleInfoHandler::new(context.clone())),
            Box::new(ArticleAdvanceHandler::new(context)),
            Box::new(CommentsHandler::new(context.clone())),
            Box::new(ProfileHandler::new(context.clone())),
            Box::new(MessageListHandler::new(context.clone())),
            Box::new(HistoryControllerHandler::new(context)),
        ])
    }

    /// Names of the handlers, in order
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|handler| handler.name()).collect()
    }

    /// Offers an exchange to each handler until one rewrites it
    ///
    /// # Returns
    ///
    /// * `Ok(Some(response))` - The merged replacement response
    /// * `Ok(None)` - No handler rewrote the response
    /// * `Err(SpiderError)` - A handler failed
    pub async fn dispatch(
        &self,
        request: &InterceptedRequest,
        response: ProxyResponse,
    ) -> Result<Option<ProxyResponse>> {
        for handler in &self.handlers {
            if let Some(rewrite) = handler.handle(request, &response).await? {
                tracing::debug!("{} rewrote {}", handler.name(), request.url);
                return Ok(Some(rewrite.apply(response)));
            }
        }

        Ok(None)
    }
}
