//! Washi-Press: a resumable article-listing archiver
//!
//! This crate walks one paginated article listing page by page, discovers
//! articles that have not been exported yet, renders each one through a
//! pluggable render client, and writes the result as a named artifact file.
//! A crash-safe JSON progress ledger makes interrupted runs resumable, and a
//! cooperative stop signal tears down all live render sessions promptly.

pub mod config;
pub mod crawler;
pub mod events;
pub mod output;
pub mod render;
pub mod state;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Washi-Press operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] render::RenderError),

    #[error("Timed out waiting for '{locator}' on {url}")]
    ReadyTimeout { url: String, locator: String },

    #[error("Progress ledger error: {0}")]
    Progress(#[from] state::ProgressError),

    #[error("Failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised internally when a stop request interrupts in-flight work.
    ///
    /// `Coordinator::run` converts this into the stopped outcome; it is never
    /// returned through the public API.
    #[error("Crawl stopped")]
    Stopped,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid locator in config: {0}")]
    InvalidLocator(String),
}

/// Result type alias for Washi-Press operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, RunOptions};
pub use crawler::{run_crawl, Coordinator, CrawlOutcome, CrawlSummary, StopHandle};
pub use events::{CrawlEvent, CrawlObserver, NullObserver};
pub use render::{RenderClient, RenderClientFactory, RenderError, SessionRegistry};
pub use state::{ProgressJournal, ProgressState, ProgressStore};
