//! Crawler module for listing discovery and article export
//!
//! This module contains the core archiving logic, including:
//! - Page-by-page discovery of article links on the listing
//! - Bounded-concurrency article download and export
//! - Overall run coordination, resume, and stop handling

mod coordinator;
mod discovery;
mod pipeline;

pub use coordinator::{run_crawl, Coordinator, CrawlOutcome, CrawlSummary, StopHandle};
pub use discovery::{Discoverer, DiscoveryOutcome};
pub use pipeline::{BatchReport, FetchPipeline};

use crate::config::{Config, RunOptions};
use crate::events::NullObserver;
use crate::Result;
use std::sync::Arc;

/// Runs a complete archiving run without progress reporting
///
/// This is the simplest entry point. It will:
/// 1. Open the progress ledger in the output directory
/// 2. Walk listing pages from the first uncommitted one
/// 3. Download and export every not-yet-exported article
/// 4. Commit each fully exported page
///
/// Callers that need progress events or a stop handle should use
/// [`run_crawl`] or [`Coordinator`] directly.
///
/// # Arguments
///
/// * `config` - The listing profile
/// * `options` - Per-run parameters
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The run reached a terminal state
/// * `Err(CrawlError)` - The run failed
pub async fn crawl(config: Config, options: RunOptions) -> Result<CrawlSummary> {
    run_crawl(config, options, Arc::new(NullObserver)).await
}
