//! Progress ledger persistence
//!
//! The ledger is a single small JSON document saved after every mutation
//! (write-through), so a crash loses at most the one item that had not been
//! acknowledged yet. Loading is deliberately forgiving: a missing, malformed,
//! or legacy-format file degrades to a fresh ledger with a logged warning
//! rather than failing the run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Errors from persisting the progress ledger
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Failed to write progress file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode progress state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The resumable crawl state
///
/// `completed_page` only ever advances after every article discovered on
/// that page has been exported; `visited_urls` only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub completed_page: u32,
    pub visited_urls: HashSet<String>,
}

impl ProgressState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited_urls.contains(url)
    }
}

/// Current on-disk encoding
#[derive(Serialize)]
struct ProgressDocument<'a> {
    completed_page_for_collection: u32,
    visited_urls: Vec<&'a str>,
}

/// Encodings accepted on load
///
/// Older versions persisted just the visited-URL list as a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum PersistedProgress {
    Document {
        #[serde(default)]
        completed_page_for_collection: u32,
        #[serde(default)]
        visited_urls: Vec<String>,
    },
    Legacy(Vec<String>),
}

/// Loads and saves the progress ledger at a fixed path
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted ledger
    ///
    /// Returns a fresh default when `resume` is false, when the file does
    /// not exist, or when its contents cannot be decoded. Never fails.
    pub fn load(&self, resume: bool) -> ProgressState {
        if !resume {
            return ProgressState::new();
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ProgressState::new();
            }
            Err(e) => {
                tracing::warn!(
                    "Could not read progress file {}, starting over: {}",
                    self.path.display(),
                    e
                );
                return ProgressState::new();
            }
        };

        match serde_json::from_str::<PersistedProgress>(&content) {
            Ok(PersistedProgress::Document {
                completed_page_for_collection,
                visited_urls,
            }) => ProgressState {
                completed_page: completed_page_for_collection,
                visited_urls: visited_urls.into_iter().collect(),
            },
            Ok(PersistedProgress::Legacy(urls)) => {
                tracing::info!(
                    "Progress file {} uses the legacy format, upgrading on next save",
                    self.path.display()
                );
                ProgressState {
                    completed_page: 0,
                    visited_urls: urls.into_iter().collect(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Progress file {} is malformed, starting over: {}",
                    self.path.display(),
                    e
                );
                ProgressState::new()
            }
        }
    }

    /// Persists the ledger
    ///
    /// Writes to a temporary file and renames it into place so a concurrent
    /// reader never observes a partial document. URLs are saved sorted to
    /// keep the file diff-friendly.
    pub fn save(&self, state: &ProgressState) -> Result<(), ProgressError> {
        let mut urls: Vec<&str> = state.visited_urls.iter().map(String::as_str).collect();
        urls.sort_unstable();

        let document = ProgressDocument {
            completed_page_for_collection: state.completed_page,
            visited_urls: urls,
        };
        let json = serde_json::to_string_pretty(&document)?;

        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| ProgressError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;

        // On Windows rename fails if the target exists.
        #[cfg(target_os = "windows")]
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| ProgressError::Write {
                path: self.path.clone(),
                source: e,
            })?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| ProgressError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }
}

/// Lock-guarded write-through view of the ledger
///
/// The fetch pipeline records individual successes and the coordinator
/// commits whole pages; both read-modify-write the same state, so both go
/// through this journal's single mutex. Every mutation is persisted before
/// the lock is released.
pub struct ProgressJournal {
    store: ProgressStore,
    state: Mutex<ProgressState>,
}

impl ProgressJournal {
    /// Opens the journal, loading persisted state when `resume` is true.
    pub fn open(store: ProgressStore, resume: bool) -> Self {
        let state = store.load(resume);
        if state.completed_page > 0 || !state.visited_urls.is_empty() {
            tracing::info!(
                "Loaded progress: {} pages completed, {} articles already exported",
                state.completed_page,
                state.visited_urls.len()
            );
        }
        Self {
            store,
            state: Mutex::new(state),
        }
    }

    pub fn completed_page(&self) -> u32 {
        self.guard().completed_page
    }

    pub fn visited_count(&self) -> usize {
        self.guard().visited_urls.len()
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.guard().is_visited(url)
    }

    /// Copy of the visited set, for diffing a freshly discovered page.
    pub fn visited_snapshot(&self) -> HashSet<String> {
        self.guard().visited_urls.clone()
    }

    /// Records one exported article and persists immediately.
    pub fn record_visited(&self, url: &str) -> Result<(), ProgressError> {
        let mut state = self.guard();
        state.visited_urls.insert(url.to_string());
        self.store.save(&state)
    }

    /// Marks a listing page fully committed and persists immediately.
    pub fn complete_page(&self, page: u32) -> Result<(), ProgressError> {
        let mut state = self.guard();
        state.completed_page = page;
        self.store.save(&state)
    }

    fn guard(&self) -> MutexGuard<'_, ProgressState> {
        // Every mutation leaves the state consistent, even mid-panic.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
