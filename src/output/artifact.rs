//! Artifact naming and writing

use crate::{CrawlError, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// Longest allowed file stem, in characters
const MAX_STEM_CHARS: usize = 200;

/// Characters rejected by at least one supported filesystem
const UNSAFE_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Turns an article title into a safe file stem.
///
/// Unsafe characters become underscores and the result is capped at 200
/// characters. Truncation counts characters, not bytes, so multibyte
/// titles never get cut mid-character.
pub fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '_' } else { c })
        .take(MAX_STEM_CHARS)
        .collect()
}

/// Derives a file stem from an article URL when the page has no title.
///
/// Uses the URL path with slashes collapsed to underscores, so
/// `https://site.example/cars/2024/wide-body/` becomes
/// `cars_2024_wide-body`. A bare root path falls back to `article`.
pub fn slug_from_url(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().trim_matches('/').to_string(),
        Err(_) => url.trim_matches('/').to_string(),
    };

    if path.is_empty() {
        "article".to_string()
    } else {
        sanitize_filename(&path.replace('/', "_"))
    }
}

/// Writes exported bytes to `<output_dir>/<stem>.pdf`.
///
/// Two articles sanitizing to the same stem overwrite each other; the
/// last write wins.
pub fn write_artifact(output_dir: &Path, stem: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = output_dir.join(format!("{stem}.pdf"));

    std::fs::write(&path, bytes).map_err(|source| CrawlError::Artifact {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}
