//! Image substitution
//!
//! Serving one small local image for every image request keeps the client
//! from downloading article media while it walks.

use crate::proxy::{InterceptedRequest, ProxyResponse};
use reqwest::header::ACCEPT;
use std::path::Path;

pub struct ImageSubstitute {
    png: Vec<u8>,
}

impl ImageSubstitute {
    pub fn new(png: Vec<u8>) -> Self {
        Self { png }
    }

    /// Loads the replacement PNG from disk
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let png = std::fs::read(path)?;
        tracing::debug!("Loaded replacement image {} ({} bytes)", path.display(), png.len());
        Ok(Self::new(png))
    }

    /// Answers requests whose `Accept` header asks for an image
    pub fn substitute(&self, request: &InterceptedRequest) -> Option<ProxyResponse> {
        let accept = request.header(&ACCEPT)?;
        if !accept.starts_with("image") {
            return None;
        }

        Some(ProxyResponse::png(self.png.clone()))
    }
}
