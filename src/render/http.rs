//! HTTP render engine
//!
//! Drives sessions over plain HTTP with `reqwest` and answers locator
//! queries against the fetched markup with CSS selectors. There is no
//! script execution, so `wait_for_presence` re-fetches the document
//! between polls to give late server-side rendering a chance to land
//! before the deadline.

use super::{RenderClient, RenderClientFactory, RenderError, RenderOptions};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

/// How long `wait_for_presence` pauses between document checks
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Builds `HttpRenderClient` sessions sharing one connection pool
pub struct HttpRenderFactory {
    client: Client,
    poll_interval: Duration,
}

impl HttpRenderFactory {
    pub fn new(options: &RenderOptions) -> Result<Self, RenderError> {
        if !options.headless {
            tracing::debug!("HTTP render engine has no window; ignoring headed mode");
        }

        let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(options.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| RenderError::Session(e.to_string()))?;

        Ok(Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Overrides the readiness polling cadence.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl RenderClientFactory for HttpRenderFactory {
    async fn create(&self) -> Result<Box<dyn RenderClient>, RenderError> {
        Ok(Box::new(HttpRenderClient {
            client: self.client.clone(),
            poll_interval: self.poll_interval,
            document: None,
        }))
    }
}

/// The page a session currently holds: final URL after redirects plus markup
struct LoadedDocument {
    url: String,
    body: String,
}

/// Render session backed by plain HTTP fetches
pub struct HttpRenderClient {
    client: Client,
    poll_interval: Duration,
    document: Option<LoadedDocument>,
}

impl HttpRenderClient {
    async fn fetch(&self, url: &str) -> Result<LoadedDocument, RenderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(LoadedDocument {
            url: final_url,
            body,
        })
    }

    fn document(&self) -> Result<&LoadedDocument, RenderError> {
        self.document.as_ref().ok_or(RenderError::NoDocument)
    }
}

// Selector queries are scoped to these helpers so the non-Send parsed
// document never lives across an await point.

fn parse_locator(locator: &str) -> Result<Selector, RenderError> {
    Selector::parse(locator).map_err(|_| RenderError::Locator(locator.to_string()))
}

fn locator_matches(body: &str, selector: &Selector) -> bool {
    Html::parse_document(body).select(selector).next().is_some()
}

fn first_text(body: &str, selector: &Selector) -> Option<String> {
    let document = Html::parse_document(body);
    let element = document.select(selector).next()?;
    let text = element.text().collect::<String>();
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn collect_hrefs(body: &str, document_url: &str, selector: &Selector) -> Vec<String> {
    let base = Url::parse(document_url).ok();

    Html::parse_document(body)
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| match &base {
            Some(base) => base
                .join(href)
                .map(|resolved| resolved.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        })
        .collect()
}

#[async_trait]
impl RenderClient for HttpRenderClient {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.document = Some(self.fetch(url).await?);
        Ok(())
    }

    async fn wait_for_presence(
        &mut self,
        locator: &str,
        timeout: Duration,
    ) -> Result<bool, RenderError> {
        let selector = parse_locator(locator)?;
        let deadline = Instant::now() + timeout;

        loop {
            if locator_matches(&self.document()?.body, &selector) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }

            tokio::time::sleep(self.poll_interval).await;

            // A static document never mutates on its own; re-fetch so a page
            // that finished rendering server-side shows up in the next check.
            let url = self.document()?.url.clone();
            match self.fetch(&url).await {
                Ok(refreshed) => self.document = Some(refreshed),
                Err(error) => {
                    tracing::debug!(%url, %error, "refresh failed during readiness wait");
                }
            }
        }
    }

    async fn extract_text(&mut self, locator: &str) -> Result<Option<String>, RenderError> {
        let selector = parse_locator(locator)?;
        Ok(first_text(&self.document()?.body, &selector))
    }

    async fn extract_all_hrefs(&mut self, locator: &str) -> Result<Vec<String>, RenderError> {
        let selector = parse_locator(locator)?;
        let document = self.document()?;
        Ok(collect_hrefs(&document.body, &document.url, &selector))
    }

    async fn export_to_bytes(&mut self) -> Result<Vec<u8>, RenderError> {
        Ok(self.document()?.body.clone().into_bytes())
    }

    fn current_url(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.url.as_str())
    }

    async fn close(&mut self) {
        self.document = None;
    }
}
