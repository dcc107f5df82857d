//! State module for tracking crawl progress
//!
//! This module owns the resumable progress ledger: which listing page has
//! been fully committed and which article URLs have already been exported.
//!
//! # Components
//!
//! - `ProgressState`: the in-memory ledger value
//! - `ProgressStore`: loads/saves the ledger as one JSON document
//! - `ProgressJournal`: lock-guarded write-through wrapper shared between the
//!   per-item success path and the page-commit path

mod progress;

// Re-export main types
pub use progress::{ProgressError, ProgressJournal, ProgressState, ProgressStore};
