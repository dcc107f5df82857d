//! Artifact output
//!
//! Every successfully fetched article becomes one file in the output
//! directory. This module owns the naming rules:
//! - filesystem-hostile characters are remapped to underscores
//! - file stems are capped at 200 characters
//! - articles without a usable title fall back to a URL-derived slug

mod artifact;

pub use artifact::{sanitize_filename, slug_from_url, write_artifact};
