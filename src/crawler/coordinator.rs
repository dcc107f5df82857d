//! Crawl coordination - main run orchestration logic
//!
//! This module contains the main page loop that coordinates all aspects of
//! an archiving run, including:
//! - Opening the progress ledger and resuming from it
//! - Walking listing pages strictly in order
//! - Handing each page's new articles to the fetch pipeline
//! - Committing a page only once every new article persisted
//! - Translating stop requests and faults into terminal outcomes

use crate::config::{validate, validate_options, Config, RunOptions};
use crate::crawler::discovery::{Discoverer, DiscoveryOutcome};
use crate::crawler::pipeline::FetchPipeline;
use crate::events::{CrawlEvent, CrawlObserver, NullObserver};
use crate::render::{HttpRenderFactory, RenderClientFactory, RenderOptions, SessionRegistry};
use crate::state::{ProgressJournal, ProgressStore};
use crate::{CrawlError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// File name of the progress ledger inside the output directory
const PROGRESS_FILE: &str = "progress.json";

/// How a crawl run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The listing was exhausted or the page ceiling was reached
    Completed,

    /// A stop request ended the run
    Stopped,

    /// A page had failing articles and was left uncommitted for retry
    HaltedOnFailures,
}

/// Tally of one finished crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub outcome: CrawlOutcome,

    /// Pages committed to the ledger by this run
    pub pages_completed: u32,

    /// Articles exported and recorded by this run
    pub articles_exported: usize,

    /// Articles that failed during this run
    pub articles_failed: usize,
}

/// Stops a running crawl from another task
///
/// Cloneable, and safe to trigger any number of times from anywhere.
#[derive(Clone)]
pub struct StopHandle {
    stop: CancellationToken,
    registry: Arc<SessionRegistry>,
}

impl StopHandle {
    /// Requests a cooperative stop and force-terminates every live render
    /// session.
    ///
    /// The flag is raised before the sweep so a session registered while
    /// the sweep runs still observes the request.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            tracing::info!("Stop requested; terminating live sessions");
        }
        self.stop.cancel();
        self.registry.terminate_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

/// Main crawl coordinator structure
pub struct Coordinator {
    config: Config,
    options: RunOptions,
    journal: Arc<ProgressJournal>,
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn RenderClientFactory>,
    observer: Arc<dyn CrawlObserver>,
    stop: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Validates the profile and the run options, creates the output
    /// directory, and opens the progress ledger stored inside it. The
    /// render engine defaults to the bundled HTTP engine and the observer
    /// to a no-op.
    ///
    /// # Arguments
    ///
    /// * `config` - The listing profile
    /// * `options` - Per-run parameters (output directory, ceiling, workers)
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - Invalid inputs or an unusable output directory
    pub fn new(config: Config, options: RunOptions) -> Result<Self> {
        validate(&config)?;
        validate_options(&options)?;

        std::fs::create_dir_all(&options.output_dir)?;

        let store = ProgressStore::new(options.output_dir.join(PROGRESS_FILE));
        let journal = Arc::new(ProgressJournal::open(store, options.resume));

        let render_options = RenderOptions {
            headless: options.headless,
            ..RenderOptions::default()
        };
        let factory = Arc::new(HttpRenderFactory::new(&render_options)?);

        Ok(Self {
            config,
            options,
            journal,
            registry: Arc::new(SessionRegistry::new()),
            factory,
            observer: Arc::new(NullObserver),
            stop: CancellationToken::new(),
        })
    }

    /// Replaces the event observer.
    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the render engine.
    pub fn with_factory(mut self, factory: Arc<dyn RenderClientFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Returns a handle that can stop this crawl from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stop: self.stop.clone(),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Runs the crawl to a terminal state
    ///
    /// This is the core loop that:
    /// 1. Resumes after the last committed page
    /// 2. Discovers each page's not-yet-exported articles
    /// 3. Downloads them through the fetch pipeline
    /// 4. Commits the page once every new article persisted
    ///
    /// A stop request and a halt on failures are normal terminal states
    /// and return `Ok` with the corresponding outcome. Only faults that
    /// end the run abnormally return `Err`, after a `Failed` event.
    pub async fn run(&self) -> Result<CrawlSummary> {
        let started = std::time::Instant::now();

        match self.run_inner().await {
            Ok(summary) => {
                let event = match summary.outcome {
                    CrawlOutcome::Completed => CrawlEvent::Completed,
                    CrawlOutcome::Stopped => CrawlEvent::Stopped,
                    CrawlOutcome::HaltedOnFailures => CrawlEvent::Failed {
                        message: format!(
                            "{} articles failed; run halted for retry",
                            summary.articles_failed
                        ),
                    },
                };
                self.observer.notify(event);

                tracing::info!(
                    "Run ended ({:?}): {} pages committed, {} articles exported, {} failed in {:?}",
                    summary.outcome,
                    summary.pages_completed,
                    summary.articles_exported,
                    summary.articles_failed,
                    started.elapsed()
                );
                Ok(summary)
            }
            // A stop can interrupt setup before the page loop ever observes
            // it; map it to the stopped outcome like any later stop.
            Err(CrawlError::Stopped) => {
                self.observer.notify(CrawlEvent::Stopped);
                Ok(CrawlSummary {
                    outcome: CrawlOutcome::Stopped,
                    pages_completed: 0,
                    articles_exported: 0,
                    articles_failed: 0,
                })
            }
            Err(error) => {
                tracing::error!("Crawl failed: {}", error);
                self.observer.notify(CrawlEvent::Failed {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn run_inner(&self) -> Result<CrawlSummary> {
        let mut discoverer = Discoverer::open(
            self.factory.as_ref(),
            &self.registry,
            self.config.listing.clone(),
        )
        .await?;

        let result = self.drive(&mut discoverer).await;
        discoverer.close().await;
        result
    }

    /// The page loop proper, kept separate so the discovery session is
    /// closed on every exit path.
    async fn drive(&self, discoverer: &mut Discoverer) -> Result<CrawlSummary> {
        let pipeline = FetchPipeline::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.registry),
            Arc::clone(&self.journal),
            self.config.article.clone(),
            &self.options,
            Arc::clone(&self.observer),
            self.stop.clone(),
        );

        let mut pages_completed = 0u32;
        let mut articles_exported = 0usize;
        let mut articles_failed = 0usize;

        let start_page = self.journal.completed_page() + 1;
        if start_page > 1 {
            tracing::info!(
                "Resuming from page {} ({} articles already exported)",
                start_page,
                self.journal.visited_count()
            );
        }

        let mut page = start_page;
        let outcome = loop {
            if self.stop.is_cancelled() {
                break CrawlOutcome::Stopped;
            }

            if let Some(max) = self.options.max_pages {
                if page > max {
                    tracing::info!("Reached the configured ceiling of {} pages", max);
                    break CrawlOutcome::Completed;
                }
            }

            self.observer.notify(CrawlEvent::PageStarted { page });

            let visited = self.journal.visited_snapshot();
            let links = match discoverer.discover(page, &visited).await {
                Ok(DiscoveryOutcome::Links(links)) => links,
                Ok(DiscoveryOutcome::EndOfListing) => break CrawlOutcome::Completed,
                Err(CrawlError::Stopped) => break CrawlOutcome::Stopped,
                Err(error) => return Err(error),
            };

            if !links.is_empty() {
                let report = pipeline.fetch_all(page, &links).await;
                articles_exported += report.successes.len();
                articles_failed += report.failures.len();

                if report.stopped {
                    break CrawlOutcome::Stopped;
                }
                if !report.failures.is_empty() {
                    tracing::warn!(
                        "{} of {} articles failed on page {}; leaving the page uncommitted",
                        report.failures.len(),
                        links.len(),
                        page
                    );
                    break CrawlOutcome::HaltedOnFailures;
                }
            }

            self.journal.complete_page(page)?;
            pages_completed += 1;
            self.observer.notify(CrawlEvent::PageCompleted {
                page,
                new_items: links.len(),
            });

            page += 1;
        };

        Ok(CrawlSummary {
            outcome,
            pages_completed,
            articles_exported,
            articles_failed,
        })
    }
}

/// Runs a complete archiving run with the bundled HTTP render engine
///
/// This function orchestrates the entire run:
///
/// 1. Validate the profile and run options
/// 2. Open (or create) the progress ledger in the output directory
/// 3. Walk listing pages from the first uncommitted one
/// 4. Download every not-yet-exported article, bounded-concurrently
/// 5. Commit each fully exported page before moving to the next
///
/// # Arguments
///
/// * `config` - The listing profile
/// * `options` - Per-run parameters
/// * `observer` - Receiver for progress events
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - The run reached a terminal state (stop included)
/// * `Err(CrawlError)` - The run ended on an unrecoverable fault
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use washi_press::config::{Config, RunOptions};
/// use washi_press::crawler::run_crawl;
/// use washi_press::events::NullObserver;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let options = RunOptions::new("./archive");
/// let summary = run_crawl(Config::default(), options, Arc::new(NullObserver)).await?;
/// println!("exported {} articles", summary.articles_exported);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    options: RunOptions,
    observer: Arc<dyn CrawlObserver>,
) -> Result<CrawlSummary> {
    let coordinator = Coordinator::new(config, options)?.with_observer(observer);
    coordinator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_coordinator(dir: &std::path::Path) -> Coordinator {
        Coordinator::new(Config::default(), RunOptions::new(dir)).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_options() {
        let dir = tempdir().unwrap();
        let mut options = RunOptions::new(dir.path());
        options.concurrency = 0;

        let result = Coordinator::new(Config::default(), options);
        assert!(result.is_err());
    }

    #[test]
    fn test_new_creates_output_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("archive").join("run-1");

        let _coordinator = test_coordinator(&nested);
        assert!(nested.is_dir());
    }

    #[test]
    fn test_stop_handle_is_idempotent() {
        let dir = tempdir().unwrap();
        let coordinator = test_coordinator(dir.path());
        let handle = coordinator.stop_handle();

        assert!(!handle.is_stopped());
        handle.stop();
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_before_run_yields_stopped_outcome() {
        let dir = tempdir().unwrap();
        let coordinator = test_coordinator(dir.path());

        coordinator.stop_handle().stop();
        let summary = coordinator.run().await.unwrap();

        assert_eq!(summary.outcome, CrawlOutcome::Stopped);
        assert_eq!(summary.pages_completed, 0);
        assert_eq!(summary.articles_exported, 0);
    }
}
