//! Render client capability
//!
//! The crawler never talks to a render engine directly. It drives a narrow
//! session capability: navigate, wait for a readiness marker, extract text
//! and links, export the page to bytes. Engines implement `RenderClient`,
//! hand out sessions through a `RenderClientFactory`, and every live session
//! is tracked in a `SessionRegistry` so a global stop can tear them all down.
//!
//! One concrete engine ships with the crate: `HttpRenderClient`, which
//! fetches documents over plain HTTP and answers locator queries with CSS
//! selectors.

mod http;
mod registry;

pub use http::{HttpRenderClient, HttpRenderFactory};
pub use registry::{SessionGuard, SessionRegistry};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a render session
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create render session: {0}")]
    Session(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Locator '{0}' is not supported by this engine")]
    Locator(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("No document loaded")]
    NoDocument,
}

/// Engine-level options shared by every session a factory creates
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Run without a visible window. Engines without a window ignore this.
    pub headless: bool,

    /// Per-request network timeout
    pub request_timeout: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            headless: true,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// One live automation session
///
/// Sessions are cheap to create and are created per task; nothing observed
/// through one session leaks into another. Navigation and the readiness wait
/// are the only suspending operations.
#[async_trait]
pub trait RenderClient: Send {
    /// Loads `url`, replacing whatever document the session held.
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Waits up to `timeout` for `locator` to match the current document.
    ///
    /// Returns `Ok(false)` when the deadline passes without a match; errors
    /// are reserved for a broken session, not a missing element.
    async fn wait_for_presence(
        &mut self,
        locator: &str,
        timeout: Duration,
    ) -> Result<bool, RenderError>;

    /// Text content of the first element matching `locator`, if any.
    async fn extract_text(&mut self, locator: &str) -> Result<Option<String>, RenderError>;

    /// Href target of every anchor matching `locator`, in document order.
    async fn extract_all_hrefs(&mut self, locator: &str) -> Result<Vec<String>, RenderError>;

    /// Renders the current document to an exportable byte blob.
    async fn export_to_bytes(&mut self) -> Result<Vec<u8>, RenderError>;

    /// The document URL after redirects, once a navigation has succeeded.
    fn current_url(&self) -> Option<&str>;

    /// Tears the session down. Best-effort: never raises, safe to call twice.
    async fn close(&mut self);
}

/// Source of render sessions, one per concurrent task
#[async_trait]
pub trait RenderClientFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn RenderClient>, RenderError>;
}
