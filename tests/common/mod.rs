//! Shared scripted render engine for integration tests
//!
//! Drives the crawler against an in-memory listing instead of a network:
//! a `ScriptedSite` describes listing pages and how each article behaves,
//! and `ScriptedFactory` hands out render sessions that answer from the
//! script while recording every navigation and how many sessions are open
//! at once.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use washi_press::config::{Config, RunOptions};
use washi_press::render::{RenderClient, RenderClientFactory, RenderError};

/// Base URL the scripted listing lives under
pub const BASE_URL: &str = "https://listing.example/category/content/";

/// How one scripted article behaves
#[derive(Debug, Clone)]
pub enum ArticleScript {
    /// Becomes ready and exports under this title; `None` forces the
    /// URL-slug fallback
    Ok { title: Option<String> },

    /// The content root never appears within the readiness wait
    NeverReady,

    /// The readiness wait hangs until the session is force-terminated
    Hang,

    /// Becomes ready, but the export step fails
    ExportError,
}

/// An in-memory paginated listing with per-article behavior
#[derive(Debug, Default, Clone)]
pub struct ScriptedSite {
    pages: Vec<Vec<String>>,
    articles: HashMap<String, ArticleScript>,
}

impl ScriptedSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the next listing page. Every URL is registered as a
    /// well-behaved article; override individual ones with [`Self::script`].
    pub fn add_page(&mut self, urls: &[&str]) {
        for url in urls {
            self.articles
                .entry(url.to_string())
                .or_insert(ArticleScript::Ok { title: None });
        }
        self.pages.push(urls.iter().map(|u| u.to_string()).collect());
    }

    /// Overrides one article's behavior.
    pub fn script(&mut self, url: &str, script: ArticleScript) {
        self.articles.insert(url.to_string(), script);
    }

    /// The URL of listing page `page`, mirroring the crawler's own scheme.
    pub fn listing_url(page: u32) -> String {
        if page <= 1 {
            BASE_URL.to_string()
        } else {
            format!("{BASE_URL}page/{page}/")
        }
    }

    fn listing_index(url: &str) -> Option<u32> {
        if url == BASE_URL {
            return Some(1);
        }
        url.strip_prefix(BASE_URL)?
            .strip_prefix("page/")?
            .strip_suffix('/')?
            .parse()
            .ok()
    }
}

/// Concurrent-session accounting shared by every scripted session
#[derive(Debug, Default)]
pub struct SessionStats {
    open: AtomicUsize,
    peak: AtomicUsize,
}

impl SessionStats {
    fn opened(&self) {
        let now = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }

    /// Sessions created and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Most sessions ever open at the same time
    pub fn peak_sessions(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Hands out scripted render sessions and records what they did
pub struct ScriptedFactory {
    site: Arc<ScriptedSite>,
    stats: Arc<SessionStats>,
    navigations: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFactory {
    pub fn new(site: ScriptedSite) -> Self {
        Self {
            site: Arc::new(site),
            stats: Arc::new(SessionStats::default()),
            navigations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Every URL any session navigated to, in request order.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn navigated_to(&self, url: &str) -> bool {
        self.navigations.lock().unwrap().iter().any(|n| n == url)
    }
}

#[async_trait]
impl RenderClientFactory for ScriptedFactory {
    async fn create(&self) -> Result<Box<dyn RenderClient>, RenderError> {
        self.stats.opened();
        Ok(Box::new(ScriptedClient {
            site: Arc::clone(&self.site),
            stats: Arc::clone(&self.stats),
            navigations: Arc::clone(&self.navigations),
            current: None,
            closed: false,
        }))
    }
}

enum Page {
    Listing(u32),
    Article(ArticleScript),
    Missing,
}

/// One scripted render session
pub struct ScriptedClient {
    site: Arc<ScriptedSite>,
    stats: Arc<SessionStats>,
    navigations: Arc<Mutex<Vec<String>>>,
    current: Option<String>,
    closed: bool,
}

impl ScriptedClient {
    fn page(&self) -> Page {
        let Some(url) = self.current.as_deref() else {
            return Page::Missing;
        };
        if let Some(index) = ScriptedSite::listing_index(url) {
            return Page::Listing(index);
        }
        match self.site.articles.get(url) {
            Some(script) => Page::Article(script.clone()),
            None => Page::Missing,
        }
    }
}

#[async_trait]
impl RenderClient for ScriptedClient {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.navigations.lock().unwrap().push(url.to_string());
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_for_presence(
        &mut self,
        _locator: &str,
        _timeout: Duration,
    ) -> Result<bool, RenderError> {
        match self.page() {
            // A listing page past the last scripted one models the
            // container wait timing out.
            Page::Listing(index) => Ok((index as usize) <= self.site.pages.len()),
            Page::Article(ArticleScript::NeverReady) => Ok(false),
            Page::Article(ArticleScript::Hang) => {
                std::future::pending::<Result<bool, RenderError>>().await
            }
            Page::Article(_) => Ok(true),
            Page::Missing => Ok(false),
        }
    }

    async fn extract_text(&mut self, _locator: &str) -> Result<Option<String>, RenderError> {
        match self.page() {
            Page::Article(ArticleScript::Ok { title }) => Ok(title),
            _ => Ok(None),
        }
    }

    async fn extract_all_hrefs(&mut self, _locator: &str) -> Result<Vec<String>, RenderError> {
        match self.page() {
            Page::Listing(index) => Ok(self
                .site
                .pages
                .get(index as usize - 1)
                .cloned()
                .unwrap_or_default()),
            _ => Ok(Vec::new()),
        }
    }

    async fn export_to_bytes(&mut self) -> Result<Vec<u8>, RenderError> {
        match self.page() {
            Page::Article(ArticleScript::ExportError) => {
                Err(RenderError::Export("scripted export failure".to_string()))
            }
            Page::Article(_) => Ok(b"%PDF-1.4 scripted".to_vec()),
            _ => Err(RenderError::NoDocument),
        }
    }

    fn current_url(&self) -> Option<&str> {
        self.current.as_deref()
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stats.closed();
        }
        self.current = None;
    }
}

/// Listing profile pointing at the scripted site, with short waits.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.listing.base_url = BASE_URL.to_string();
    config.listing.wait_seconds = 1;
    config.article.wait_seconds = 1;
    config
}

/// Run options shaped for tests: two workers, no settle delay.
pub fn test_options(output_dir: impl Into<std::path::PathBuf>) -> RunOptions {
    let mut options = RunOptions::new(output_dir);
    options.concurrency = 2;
    options.request_delay = Duration::from_millis(0);
    options
}

/// Reads back the ledger a run left behind.
pub fn load_ledger(output_dir: &std::path::Path) -> washi_press::ProgressState {
    washi_press::ProgressStore::new(output_dir.join("progress.json")).load(true)
}

/// Number of exported artifacts in the output directory.
pub fn count_artifacts(output_dir: &std::path::Path) -> usize {
    std::fs::read_dir(output_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().map_or(false, |ext| ext == "pdf"))
        .count()
}
