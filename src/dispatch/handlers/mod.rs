//! The standard response handlers, in dispatch order

mod article;
mod comments;
mod history;
mod listing;
mod metrics;
mod profile;

pub use article::{ArticleAdvanceHandler, ArticleInfoHandler};
pub use comments::CommentsHandler;
pub use history::HistoryControllerHandler;
pub use listing::MessageListHandler;
pub use metrics::ReadMetricsHandler;
pub use profile::ProfileHandler;

use crate::proxy::ProxyResponse;
use std::borrow::Cow;

/// Response body as text; the host hands over decoded bodies
fn body_text(response: &ProxyResponse) -> Cow<'_, str> {
    String::from_utf8_lossy(&response.body)
}
