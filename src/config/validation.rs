use crate::config::types::{ArticleConfig, Config, ListingConfig, RunOptions};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire listing profile
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_listing_config(&config.listing)?;
    validate_article_config(&config.article)?;
    Ok(())
}

/// Validates the per-run options
pub fn validate_options(options: &RunOptions) -> Result<(), ConfigError> {
    if options.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if options.concurrency < 1 || options.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            options.concurrency
        )));
    }

    if let Some(max_pages) = options.max_pages {
        if max_pages < 1 {
            return Err(ConfigError::Validation(
                "max_pages must be >= 1 when set".to_string(),
            ));
        }
    }

    if options.request_delay.as_secs() > 60 {
        return Err(ConfigError::Validation(format!(
            "request_delay must be <= 60s, got {:?}",
            options.request_delay
        )));
    }

    Ok(())
}

/// Validates listing-source configuration
fn validate_listing_config(config: &ListingConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    // Page URLs are built by appending a path segment, which only composes
    // correctly onto a trailing slash.
    if !config.base_url.ends_with('/') {
        return Err(ConfigError::Validation(format!(
            "base-url must end with '/', got '{}'",
            config.base_url
        )));
    }

    validate_locator("listing.container", &config.container)?;
    validate_locator("listing.item-links", &config.item_links)?;
    validate_wait("listing.wait-seconds", config.wait_seconds)?;

    Ok(())
}

/// Validates article-page configuration
fn validate_article_config(config: &ArticleConfig) -> Result<(), ConfigError> {
    validate_locator("article.content-root", &config.content_root)?;
    validate_locator("article.title", &config.title)?;
    validate_wait("article.wait-seconds", config.wait_seconds)?;
    Ok(())
}

/// Validates a CSS locator string
///
/// Locators are opaque to the crawl loop, but the bundled render engine
/// interprets them as CSS selectors, so reject ones it could never match.
fn validate_locator(field: &str, locator: &str) -> Result<(), ConfigError> {
    if locator.trim().is_empty() {
        return Err(ConfigError::InvalidLocator(format!(
            "{} cannot be empty",
            field
        )));
    }

    Selector::parse(locator).map_err(|_| {
        ConfigError::InvalidLocator(format!("{} is not a valid CSS selector: '{}'", field, locator))
    })?;

    Ok(())
}

/// Validates a readiness-wait bound
fn validate_wait(field: &str, seconds: u64) -> Result<(), ConfigError> {
    if seconds < 1 || seconds > 300 {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and 300, got {}",
            field, seconds
        )));
    }
    Ok(())
}
