//! Proxy basic authentication

use crate::config::AuthConfig;
use crate::proxy::{InterceptedRequest, ProxyResponse};
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderValue, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION};
use reqwest::StatusCode;

const CHALLENGE: &str = "Basic realm=\"mp-spider\"";

/// Rejects requests that do not carry the configured proxy credentials
pub struct BasicAuth {
    expected: String,
}

impl BasicAuth {
    pub fn new(auth: &AuthConfig) -> Self {
        let token = general_purpose::STANDARD.encode(format!("{}:{}", auth.username, auth.password));
        Self {
            expected: format!("Basic {}", token),
        }
    }

    /// Returns the `407` challenge for unauthenticated requests
    pub fn challenge(&self, request: &InterceptedRequest) -> Option<ProxyResponse> {
        let presented = request.header(&PROXY_AUTHORIZATION).map(str::trim);
        if presented == Some(self.expected.as_str()) {
            return None;
        }

        tracing::debug!("Rejected unauthenticated request: {}", request.url);

        let mut response = ProxyResponse::text(
            StatusCode::PROXY_AUTHENTICATION_REQUIRED,
            "Proxy authentication required",
        );
        response
            .headers
            .insert(PROXY_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
        Some(response)
    }
}
