//! Listing-page discovery
//!
//! Walks the paginated listing one page at a time through a single long-lived
//! render session and answers the only question the coordinator asks: which
//! article URLs on this page still need exporting, or is the listing over?

use crate::config::ListingConfig;
use crate::render::{RenderClient, RenderClientFactory, SessionGuard, SessionRegistry};
use crate::{CrawlError, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// What one listing page yielded
#[derive(Debug)]
pub enum DiscoveryOutcome {
    /// Article URLs not exported yet, in document order
    Links(Vec<String>),

    /// The page lies past the end of the listing
    EndOfListing,
}

/// Reads article links off consecutive listing pages
///
/// The discovery session is registered with the crawl's `SessionRegistry`,
/// so a stop request tears it down mid-navigation like any worker session.
pub struct Discoverer {
    client: Box<dyn RenderClient>,
    guard: SessionGuard,
    listing: ListingConfig,
}

impl Discoverer {
    /// Opens the render session used for all listing pages of this run.
    pub async fn open(
        factory: &dyn RenderClientFactory,
        registry: &Arc<SessionRegistry>,
        listing: ListingConfig,
    ) -> Result<Self> {
        let guard = registry.register();
        let client = match guard.run(factory.create()).await {
            Some(client) => client?,
            None => return Err(CrawlError::Stopped),
        };

        Ok(Self {
            client,
            guard,
            listing,
        })
    }

    /// URL of listing page `page`. Page 1 is the bare base URL; later pages
    /// append a `page/N/` segment.
    fn page_url(&self, page: u32) -> String {
        if page <= 1 {
            self.listing.base_url.clone()
        } else {
            format!("{}page/{}/", self.listing.base_url, page)
        }
    }

    /// Collects the not-yet-visited article URLs on `page`.
    ///
    /// Two conditions mean the listing has ended rather than failed: the item
    /// container never appearing within its wait, and a page past the first
    /// carrying no item links at all. Already-visited links are dropped; the
    /// survivors keep their document order.
    pub async fn discover(
        &mut self,
        page: u32,
        visited: &HashSet<String>,
    ) -> Result<DiscoveryOutcome> {
        let url = self.page_url(page);
        tracing::debug!("Loading listing page {} from {}", page, url);

        match self.guard.run(self.client.navigate(&url)).await {
            Some(result) => result?,
            None => return Err(CrawlError::Stopped),
        }

        let wait = self.listing.wait();
        let ready = match self
            .guard
            .run(self.client.wait_for_presence(&self.listing.container, wait))
            .await
        {
            Some(result) => result?,
            None => return Err(CrawlError::Stopped),
        };
        if !ready {
            tracing::info!(
                "Item container never appeared on page {}; treating as end of listing",
                page
            );
            return Ok(DiscoveryOutcome::EndOfListing);
        }

        let hrefs = match self
            .guard
            .run(self.client.extract_all_hrefs(&self.listing.item_links))
            .await
        {
            Some(result) => result?,
            None => return Err(CrawlError::Stopped),
        };

        if hrefs.is_empty() && page > 1 {
            tracing::info!("No article links on page {}; treating as end of listing", page);
            return Ok(DiscoveryOutcome::EndOfListing);
        }

        let total = hrefs.len();
        let fresh: Vec<String> = hrefs
            .into_iter()
            .filter(|href| !visited.contains(href))
            .collect();

        tracing::info!(
            "Page {}: {} links found, {} not exported yet",
            page,
            total,
            fresh.len()
        );

        Ok(DiscoveryOutcome::Links(fresh))
    }

    /// Tears the discovery session down.
    pub async fn close(&mut self) {
        self.client.close().await;
    }
}
