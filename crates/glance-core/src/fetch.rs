//! Photo retrieval.
//!
//! Fetching has exactly two outcomes for the pipeline: bytes, or nothing.
//! Every failure is logged here and collapsed to `None`.

use std::path::PathBuf;
use std::time::Duration;

/// Thumbnail size markers in photo URLs and their full-size replacements.
const THUMBNAIL_UPGRADES: [(&str, &str); 2] = [("/84x84_", "/640x640_"), ("/84x106_", "/640x800_")];

pub trait PhotoFetcher {
    fn fetch(&self, url: &str) -> Option<Vec<u8>>;
}

/// Blocking HTTP fetcher. Only `200 OK` responses yield bytes.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl PhotoFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        if is_missing(url) {
            tracing::warn!("no URL provided for photo, skipping");
            return None;
        }
        tracing::debug!(url, "fetching photo");

        let response = match self.client.get(url).send() {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url, error = %e, "photo request failed");
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            tracing::warn!(url, status = %response.status(), "could not fetch photo, skipping");
            return None;
        }
        match response.bytes() {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                tracing::warn!(url, error = %e, "photo body could not be read");
                None
            }
        }
    }
}

/// Reads photos from the local filesystem, optionally relative to a base directory.
#[derive(Default)]
pub struct FileFetcher {
    base: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: Some(base.into()) }
    }
}

impl PhotoFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        if is_missing(url) {
            tracing::warn!("no path provided for photo, skipping");
            return None;
        }
        let path = match &self.base {
            Some(base) => base.join(url),
            None => PathBuf::from(url),
        };
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read photo, skipping");
                None
            }
        }
    }
}

fn is_missing(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url == "none"
}

/// Rewrite a known thumbnail URL to its full-size variant.
pub fn upgrade_thumbnail_url(url: &str) -> String {
    THUMBNAIL_UPGRADES
        .iter()
        .find(|(thumb, _)| url.contains(thumb))
        .map(|(thumb, full)| url.replacen(thumb, full, 1))
        .unwrap_or_else(|| url.to_string())
}

/// File name for a photo's diagnostic copy.
///
/// Photo URLs end in `<size>_<name>`; the part after the first `_` of the last
/// path segment is used, or the whole segment if it has no `_`.
pub fn photo_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let name = segment
        .split_once('_')
        .map(|(_, rest)| rest)
        .filter(|rest| !rest.is_empty())
        .unwrap_or(segment);
    if name.is_empty() || name == "." || name == ".." {
        "photo.jpg".to_string()
    } else {
        name.to_string()
    }
}
