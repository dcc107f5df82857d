//! Configuration module for Washi-Press
//!
//! This module holds the listing profile (where the paginated listing lives
//! and which locators identify its parts), loaded from TOML, plus the per-run
//! options a caller supplies programmatically or through the CLI.
//!
//! # Example
//!
//! ```no_run
//! use washi_press::config::{load_config, RunOptions};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("listing.toml")).unwrap();
//! let options = RunOptions::new("./archive");
//! println!("Crawling {} with {} workers", config.listing.base_url, options.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ArticleConfig, Config, ListingConfig, RunOptions};

// Re-export parser and validation functions
pub use parser::load_config;
pub use validation::{validate, validate_options};
