//! The rule a proxy host calls into
//!
//! The host owns the listener, TLS interception and forwarding. For every
//! exchange it calls two hooks on [`ProxyRule`]:
//! - `before_send_request` may answer a request without forwarding it
//! - `before_send_response` may replace the platform's response
//!
//! Both return `None` to let the exchange pass unchanged.

mod auth;
mod control;
mod exchange;
mod images;

pub use auth::BasicAuth;
pub use control::ControlEndpoints;
pub use exchange::{InterceptedRequest, ProxyResponse};
pub use images::ImageSubstitute;

use crate::dispatch::{Dispatcher, SpiderContext};
use crate::url::classify_url;
use crate::{Result, SpiderError};
use std::path::Path;

/// Request filters and the response dispatch chain, wired to one context
pub struct ProxyRule {
    auth: Option<BasicAuth>,
    images: Option<ImageSubstitute>,
    control: ControlEndpoints,
    dispatcher: Dispatcher,
}

impl ProxyRule {
    /// Builds the standard rule
    ///
    /// # Returns
    ///
    /// * `Ok(ProxyRule)` - Ready to serve
    /// * `Err(SpiderError)` - The replacement image could not be read
    pub fn new(context: SpiderContext) -> Result<Self> {
        let config = &context.config;
        let auth = config.auth.as_ref().map(BasicAuth::new);

        let images = match (config.rule.replace_images, &config.rule.replacement_image) {
            (true, Some(path)) => Some(ImageSubstitute::load(Path::new(path))?),
            (true, None) => {
                return Err(SpiderError::Config(crate::ConfigError::Validation(
                    "replace-images requires replacement-image".to_string(),
                )))
            }
            (false, _) => None,
        };

        tracing::info!(
            "Proxy rule ready (auth: {}, image substitution: {})",
            auth.is_some(),
            images.is_some()
        );

        Ok(Self {
            auth,
            images,
            control: ControlEndpoints::new(context.clone()),
            dispatcher: Dispatcher::standard(&context),
        })
    }

    /// Names of the response handlers, in dispatch order
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.dispatcher.handler_names()
    }

    /// Pre-request hook
    ///
    /// Checks, in order: proxy credentials, control endpoints, image
    /// substitution.
    pub async fn before_send_request(
        &self,
        request: &InterceptedRequest,
    ) -> Result<Option<ProxyResponse>> {
        if let Some(challenge) = self.auth.as_ref().and_then(|auth| auth.challenge(request)) {
            return Ok(Some(challenge));
        }

        let kind = classify_url(&request.url);
        if kind.is_control() {
            return self.control.answer(kind, request).await;
        }

        Ok(self.images.as_ref().and_then(|images| images.substitute(request)))
    }

    /// Pre-response hook
    pub async fn before_send_response(
        &self,
        request: &InterceptedRequest,
        response: ProxyResponse,
    ) -> Result<Option<ProxyResponse>> {
        tracing::trace!("{} {} -> {}", request.method, request.url, response.status);
        self.dispatcher.dispatch(request, response).await
    }
}
