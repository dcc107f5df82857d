//! Integration tests for the full archiving run
//!
//! These drive the coordinator end-to-end against the scripted in-memory
//! render engine from `common`: the two-page happy path, failure
//! containment, the page ceiling, the concurrency bound, and stop handling.

mod common;

use common::{
    count_artifacts, load_ledger, test_config, test_options, ArticleScript, ScriptedFactory,
    ScriptedSite,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use washi_press::config::ArticleConfig;
use washi_press::crawler::FetchPipeline;
use washi_press::events::{CrawlEvent, CrawlObserver, NullObserver};
use washi_press::render::SessionRegistry;
use washi_press::state::{ProgressJournal, ProgressStore};
use washi_press::{Coordinator, CrawlOutcome};

const ALPHA: &str = "https://listing.example/2024/alpha/";
const BRAVO: &str = "https://listing.example/2024/bravo/";
const CHARLIE: &str = "https://listing.example/2024/charlie/";

#[tokio::test]
async fn test_listing_walk_archives_every_article_then_stops_at_the_end() {
    let mut site = ScriptedSite::new();
    site.add_page(&[ALPHA, BRAVO, CHARLIE]);
    site.script(
        ALPHA,
        ArticleScript::Ok {
            title: Some("Alpha Run".to_string()),
        },
    );
    // bravo and charlie keep the URL-slug fallback

    let dir = tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(site));
    let stats = factory.stats();

    let coordinator = Coordinator::new(test_config(), test_options(dir.path()))
        .unwrap()
        .with_factory(factory.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.pages_completed, 1);
    assert_eq!(summary.articles_exported, 3);
    assert_eq!(summary.articles_failed, 0);

    let ledger = load_ledger(dir.path());
    assert_eq!(ledger.completed_page, 1);
    assert_eq!(ledger.visited_urls.len(), 3);
    assert!(ledger.is_visited(ALPHA));
    assert!(ledger.is_visited(CHARLIE));

    assert_eq!(count_artifacts(dir.path()), 3);
    assert!(dir.path().join("Alpha Run.pdf").exists());
    assert!(dir.path().join("2024_bravo.pdf").exists());

    // The walk ended by probing page 2 and finding no listing there.
    assert!(factory.navigated_to(&ScriptedSite::listing_url(2)));
    assert_eq!(stats.open_sessions(), 0);
}

#[tokio::test]
async fn test_failing_article_leaves_the_page_uncommitted() {
    let mut site = ScriptedSite::new();
    site.add_page(&[ALPHA, BRAVO, CHARLIE]);
    site.script(BRAVO, ArticleScript::NeverReady);

    let dir = tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(site));

    let coordinator = Coordinator::new(test_config(), test_options(dir.path()))
        .unwrap()
        .with_factory(factory.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::HaltedOnFailures);
    assert_eq!(summary.pages_completed, 0);
    assert_eq!(summary.articles_exported, 2);
    assert_eq!(summary.articles_failed, 1);

    // The exported articles are persisted, the page itself is not.
    let ledger = load_ledger(dir.path());
    assert_eq!(ledger.completed_page, 0);
    assert!(ledger.is_visited(ALPHA));
    assert!(ledger.is_visited(CHARLIE));
    assert!(!ledger.is_visited(BRAVO));
    assert_eq!(count_artifacts(dir.path()), 2);
}

#[tokio::test]
async fn test_page_ceiling_ends_the_walk_without_probing_further() {
    let mut site = ScriptedSite::new();
    site.add_page(&[ALPHA, BRAVO]);
    site.add_page(&[CHARLIE]);

    let dir = tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(site));

    let mut options = test_options(dir.path());
    options.max_pages = Some(1);

    let coordinator = Coordinator::new(test_config(), options)
        .unwrap()
        .with_factory(factory.clone());
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Completed);
    assert_eq!(summary.pages_completed, 1);
    assert_eq!(summary.articles_exported, 2);

    let ledger = load_ledger(dir.path());
    assert_eq!(ledger.completed_page, 1);
    assert!(!ledger.is_visited(CHARLIE));

    assert!(!factory.navigated_to(&ScriptedSite::listing_url(2)));
    assert!(!factory.navigated_to(CHARLIE));
}

#[tokio::test]
async fn test_pipeline_never_exceeds_the_concurrency_limit() {
    let urls: Vec<String> = (0..6)
        .map(|n| format!("https://listing.example/2024/item-{n}/"))
        .collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();

    let mut site = ScriptedSite::new();
    site.add_page(&url_refs);

    let dir = tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(site));
    let stats = factory.stats();
    let registry = Arc::new(SessionRegistry::new());
    let journal = Arc::new(ProgressJournal::open(
        ProgressStore::new(dir.path().join("progress.json")),
        true,
    ));

    let mut options = test_options(dir.path());
    options.concurrency = 2;
    // Hold each export open long enough for the workers to overlap.
    options.request_delay = Duration::from_millis(25);

    let pipeline = FetchPipeline::new(
        factory.clone(),
        Arc::clone(&registry),
        journal,
        ArticleConfig {
            wait_seconds: 1,
            ..ArticleConfig::default()
        },
        &options,
        Arc::new(NullObserver),
        CancellationToken::new(),
    );

    let report = pipeline.fetch_all(1, &urls).await;

    assert!(report.all_succeeded());
    assert_eq!(report.successes.len(), 6);
    assert_eq!(stats.peak_sessions(), 2, "both workers busy, never a third");
    assert_eq!(stats.open_sessions(), 0);
    assert_eq!(registry.live_sessions(), 0);
}

#[tokio::test]
async fn test_stop_mid_batch_returns_promptly_and_clears_every_session() {
    let urls: Vec<String> = (0..4)
        .map(|n| format!("https://listing.example/2024/slow-{n}/"))
        .collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();

    let mut site = ScriptedSite::new();
    site.add_page(&url_refs);
    for url in &urls {
        site.script(url, ArticleScript::Hang);
    }

    let dir = tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(site));
    let stats = factory.stats();
    let registry = Arc::new(SessionRegistry::new());
    let journal = Arc::new(ProgressJournal::open(
        ProgressStore::new(dir.path().join("progress.json")),
        true,
    ));

    let stop = CancellationToken::new();
    let pipeline = FetchPipeline::new(
        factory.clone(),
        Arc::clone(&registry),
        journal,
        ArticleConfig {
            wait_seconds: 60,
            ..ArticleConfig::default()
        },
        &test_options(dir.path()),
        Arc::new(NullObserver),
        stop.clone(),
    );

    let sweeper_registry = Arc::clone(&registry);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Same order as StopHandle: raise the flag, then sweep.
        stop.cancel();
        sweeper_registry.terminate_all();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), pipeline.fetch_all(1, &urls))
        .await
        .expect("pipeline must return promptly after a stop");

    assert!(report.stopped);
    assert!(report.successes.is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(registry.live_sessions(), 0);
    assert_eq!(stats.open_sessions(), 0);
    assert!(load_ledger(dir.path()).visited_urls.is_empty());
}

#[tokio::test]
async fn test_stop_handle_ends_a_running_crawl() {
    let mut site = ScriptedSite::new();
    site.add_page(&[ALPHA, BRAVO]);
    site.script(ALPHA, ArticleScript::Hang);
    site.script(BRAVO, ArticleScript::Hang);

    let dir = tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(site));
    let stats = factory.stats();

    let mut config = test_config();
    config.article.wait_seconds = 60;

    let coordinator = Coordinator::new(config, test_options(dir.path()))
        .unwrap()
        .with_factory(factory.clone());
    let handle = coordinator.stop_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();
    });

    let summary = tokio::time::timeout(Duration::from_secs(5), coordinator.run())
        .await
        .expect("run must end promptly after a stop")
        .unwrap();

    assert_eq!(summary.outcome, CrawlOutcome::Stopped);
    assert_eq!(summary.articles_exported, 0);
    assert_eq!(load_ledger(dir.path()).completed_page, 0);
    assert_eq!(stats.open_sessions(), 0);
}

#[tokio::test]
async fn test_events_arrive_in_emission_order() {
    let mut site = ScriptedSite::new();
    site.add_page(&[ALPHA, BRAVO]);

    let dir = tempdir().unwrap();
    let factory = Arc::new(ScriptedFactory::new(site));

    let events: Arc<Mutex<Vec<CrawlEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let observer: Arc<dyn CrawlObserver> =
        Arc::new(move |event: CrawlEvent| sink.lock().unwrap().push(event));

    let coordinator = Coordinator::new(test_config(), test_options(dir.path()))
        .unwrap()
        .with_factory(factory)
        .with_observer(observer);
    coordinator.run().await.unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 7);
    assert_eq!(events[0], CrawlEvent::PageStarted { page: 1 });
    assert_eq!(events[1], CrawlEvent::BatchStarted { page: 1, total: 2 });
    assert!(matches!(
        events[2],
        CrawlEvent::ItemFinished {
            done: 1,
            total: 2,
            error: None,
            ..
        }
    ));
    assert!(matches!(
        events[3],
        CrawlEvent::ItemFinished {
            done: 2,
            total: 2,
            error: None,
            ..
        }
    ));
    assert_eq!(
        events[4],
        CrawlEvent::PageCompleted {
            page: 1,
            new_items: 2
        }
    );
    assert_eq!(events[5], CrawlEvent::PageStarted { page: 2 });
    assert_eq!(events[6], CrawlEvent::Completed);
}
