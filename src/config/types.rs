use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Washi-Press
///
/// Describes the one listing source this archiver walks. Every field has a
/// default reproducing the stock profile, so a missing or empty file is a
/// valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub article: ArticleConfig,
}

/// Listing-source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Base URL of the paginated listing. Page 1 is the bare base; page N>1
    /// appends a `page/N/` path segment.
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Locator for the item-list container, the listing readiness marker
    #[serde(default = "default_container")]
    pub container: String,

    /// Locator selecting the item anchors, in document order
    #[serde(rename = "item-links", default = "default_item_links")]
    pub item_links: String,

    /// Seconds to wait for the container before treating the page as past
    /// the end of the listing
    #[serde(rename = "wait-seconds", default = "default_listing_wait")]
    pub wait_seconds: u64,
}

impl ListingConfig {
    /// Readiness wait as a duration
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            container: default_container(),
            item_links: default_item_links(),
            wait_seconds: default_listing_wait(),
        }
    }
}

/// Article-page configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleConfig {
    /// Locator whose presence marks an article as ready to export
    #[serde(rename = "content-root", default = "default_content_root")]
    pub content_root: String,

    /// Locator for the display-title element
    #[serde(default = "default_title")]
    pub title: String,

    /// Seconds to wait for the content root before failing the item
    #[serde(rename = "wait-seconds", default = "default_article_wait")]
    pub wait_seconds: u64,
}

impl ArticleConfig {
    /// Readiness wait as a duration
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_seconds)
    }
}

impl Default for ArticleConfig {
    fn default() -> Self {
        Self {
            content_root: default_content_root(),
            title: default_title(),
            wait_seconds: default_article_wait(),
        }
    }
}

// Stock profile defaults. The container and content-root locators are
// structural translations of the source site's markup.
fn default_base_url() -> String {
    "https://www.speedhunters.com/category/content/".to_string()
}

fn default_container() -> String {
    "body > div:nth-of-type(4) > section > div > section > div:first-of-type > ul".to_string()
}

fn default_item_links() -> String {
    "body > div:nth-of-type(4) > section > div > section > div:first-of-type > ul > li article h2 a"
        .to_string()
}

fn default_content_root() -> String {
    "body > div:nth-of-type(4)".to_string()
}

fn default_title() -> String {
    "h1".to_string()
}

fn default_listing_wait() -> u64 {
    10
}

fn default_article_wait() -> u64 {
    20
}

/// Per-run parameters supplied by the caller
///
/// These are deliberately not part of the TOML profile: they change run to
/// run (output location, page ceiling, worker count) while the profile
/// describes the listing source itself.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory artifacts and the progress ledger are written into
    pub output_dir: PathBuf,

    /// Absolute listing-page ceiling; `None` walks to the end of the listing
    pub max_pages: Option<u32>,

    /// Maximum number of concurrent article fetches
    pub concurrency: usize,

    /// Settle delay applied after an article's readiness marker appears
    pub request_delay: Duration,

    /// Resume from the persisted progress ledger instead of starting over
    pub resume: bool,

    /// Ask the render engine to run without a visible window
    pub headless: bool,
}

impl RunOptions {
    /// Creates run options with the stock defaults for everything but the
    /// output directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_pages: None,
            concurrency: 4,
            request_delay: Duration::from_secs(1),
            resume: true,
            headless: true,
        }
    }
}
