//! Article fetch pipeline
//!
//! Downloads one page's worth of newly discovered articles with bounded
//! concurrency. Every article gets its own render session, so a failure in
//! one never aborts its siblings, and a success lands in the progress ledger
//! before it is reported. A stop request force-terminates running sessions
//! and drains queued work without starting it.

use crate::config::{ArticleConfig, RunOptions};
use crate::events::{CrawlEvent, CrawlObserver};
use crate::output::{sanitize_filename, slug_from_url, write_artifact};
use crate::render::{RenderClient, RenderClientFactory, SessionRegistry};
use crate::state::ProgressJournal;
use crate::{CrawlError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What one page's batch produced
#[derive(Debug, Default)]
pub struct BatchReport {
    /// URLs exported and persisted to the ledger
    pub successes: Vec<String>,

    /// URL and error text for every item that failed
    pub failures: Vec<(String, String)>,

    /// A stop request interrupted the batch
    pub stopped: bool,
}

impl BatchReport {
    /// True when every item succeeded and no stop interfered; only then may
    /// the page be committed.
    pub fn all_succeeded(&self) -> bool {
        !self.stopped && self.failures.is_empty()
    }
}

/// Fetches and exports a single article per call
///
/// Shared by every worker task of a run; all fields are either immutable or
/// internally synchronized.
struct ItemWorker {
    factory: Arc<dyn RenderClientFactory>,
    registry: Arc<SessionRegistry>,
    journal: Arc<ProgressJournal>,
    article: ArticleConfig,
    settle_delay: Duration,
    output_dir: PathBuf,
    stop: CancellationToken,
}

impl ItemWorker {
    /// Runs the single-item protocol for `url` in a fresh render session.
    ///
    /// The session is always closed, on success and on failure, and its
    /// registry entry is released when the guard drops.
    async fn fetch_one(&self, url: &str) -> Result<PathBuf> {
        let guard = self.registry.register();
        // Check the stop flag only after registering: a session registered
        // after the terminate sweep would otherwise never observe the stop.
        if self.stop.is_cancelled() {
            return Err(CrawlError::Stopped);
        }

        let mut client = match guard.run(self.factory.create()).await {
            Some(client) => client?,
            None => return Err(CrawlError::Stopped),
        };

        let result = guard.run(self.export_article(client.as_mut(), url)).await;
        client.close().await;

        match result {
            // Errors raised while a stop was tearing the session down are
            // consequences of the stop, not real failures.
            Some(Err(_)) if self.stop.is_cancelled() => Err(CrawlError::Stopped),
            Some(result) => result,
            None => Err(CrawlError::Stopped),
        }
    }

    async fn export_article(&self, client: &mut dyn RenderClient, url: &str) -> Result<PathBuf> {
        client.navigate(url).await?;

        let ready = client
            .wait_for_presence(&self.article.content_root, self.article.wait())
            .await?;
        if !ready {
            return Err(CrawlError::ReadyTimeout {
                url: url.to_string(),
                locator: self.article.content_root.clone(),
            });
        }

        // Give late-rendering parts of the page a moment to land.
        tokio::time::sleep(self.settle_delay).await;

        let stem = match client.extract_text(&self.article.title).await? {
            Some(title) => sanitize_filename(&title),
            None => slug_from_url(client.current_url().unwrap_or(url)),
        };

        let bytes = client.export_to_bytes().await?;
        let path = write_artifact(&self.output_dir, &stem, &bytes)?;

        // The ledger entry must land before this item counts as done.
        self.journal.record_visited(url)?;

        Ok(path)
    }
}

/// Bounded-concurrency executor for one page's batch of articles
pub struct FetchPipeline {
    worker: Arc<ItemWorker>,
    observer: Arc<dyn CrawlObserver>,
    concurrency: usize,
}

impl FetchPipeline {
    pub fn new(
        factory: Arc<dyn RenderClientFactory>,
        registry: Arc<SessionRegistry>,
        journal: Arc<ProgressJournal>,
        article: ArticleConfig,
        options: &RunOptions,
        observer: Arc<dyn CrawlObserver>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            worker: Arc::new(ItemWorker {
                factory,
                registry,
                journal,
                article,
                settle_delay: options.request_delay,
                output_dir: options.output_dir.clone(),
                stop,
            }),
            observer,
            concurrency: options.concurrency.max(1),
        }
    }

    /// Downloads every URL in `urls`, at most `concurrency` at a time.
    ///
    /// Each URL is attempted exactly once. Results are aggregated in
    /// completion order; items interrupted by a stop request are reported
    /// through `BatchReport::stopped` rather than as failures.
    pub async fn fetch_all(&self, page: u32, urls: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        if urls.is_empty() {
            return report;
        }

        let total = urls.len();
        self.observer.notify(CrawlEvent::BatchStarted { page, total });
        tracing::info!(
            "Page {}: downloading {} articles with up to {} workers",
            page,
            total,
            self.concurrency
        );

        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<(String, Result<PathBuf>)> = JoinSet::new();
        let mut inflight: HashMap<tokio::task::Id, String> = HashMap::new();

        for url in urls {
            let worker = Arc::clone(&self.worker);
            let slots = Arc::clone(&slots);
            let task_url = url.clone();
            let handle = tasks.spawn(async move {
                let _permit = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (task_url, Err(CrawlError::Stopped)),
                };
                let result = worker.fetch_one(&task_url).await;
                (task_url, result)
            });
            inflight.insert(handle.id(), url.clone());
        }

        let mut done = 0;
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, (url, result))) => {
                    inflight.remove(&id);
                    match result {
                        Ok(path) => {
                            done += 1;
                            tracing::info!("Exported {} -> {}", url, path.display());
                            self.observer.notify(CrawlEvent::ItemFinished {
                                page,
                                done,
                                total,
                                url: url.clone(),
                                error: None,
                            });
                            report.successes.push(url);
                        }
                        Err(CrawlError::Stopped) => {
                            report.stopped = true;
                        }
                        Err(error) => {
                            done += 1;
                            tracing::error!("Failed to export {}: {}", url, error);
                            self.observer.notify(CrawlEvent::ItemFinished {
                                page,
                                done,
                                total,
                                url: url.clone(),
                                error: Some(error.to_string()),
                            });
                            report.failures.push((url, error.to_string()));
                        }
                    }
                }
                // A panicked worker counts as that URL's failure; the batch
                // must not look clean when an item silently vanished.
                Err(error) => {
                    let url = inflight.remove(&error.id()).unwrap_or_default();
                    done += 1;
                    tracing::error!("Worker for {} aborted: {}", url, error);
                    self.observer.notify(CrawlEvent::ItemFinished {
                        page,
                        done,
                        total,
                        url: url.clone(),
                        error: Some(error.to_string()),
                    });
                    report.failures.push((url, error.to_string()));
                }
            }
        }

        tracing::info!(
            "Page {}: batch finished with {} exported, {} failed{}",
            page,
            report.successes.len(),
            report.failures.len(),
            if report.stopped { ", interrupted by stop" } else { "" }
        );

        report
    }
}
