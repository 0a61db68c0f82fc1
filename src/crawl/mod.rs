//! Crawl progress
//!
//! This module drives the client through the platform in two directions:
//! - Forward, from one article page to the next, via a timed meta refresh
//! - Backward, through an account's history, via an injected controller that
//!   scrolls until it reaches the cutoff or the account's first post

pub mod controller;
mod forward;
mod history;
mod protocol;

pub use forward::{jump_delay, replace_article_body, ForwardPager};
pub use history::{
    classify_history_panel, history_cutoff, parse_history_date, HistoryClassification,
    HistoryPager, HistoryState, NOT_FOLLOWING_MARKER, NO_MORE_MARKER,
};
pub use protocol::{FirstPostReport, NextLinkResponse};
