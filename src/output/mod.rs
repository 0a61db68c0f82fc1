//! Output module for reporting harvest progress
//!
//! This module handles loading record counts from storage and printing
//! them as a summary.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
