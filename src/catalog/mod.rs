//! Table of contents.
//!
//! The reader exposes a hierarchical catalog per document. It is fetched once
//! with the session cookies and persisted verbatim as `catalog.json`; an
//! existing file is never re-fetched. Failures here are reported but never
//! block assembly.

mod tree;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};

pub use tree::{CatalogEntry, CatalogTree, parse_catalog};

use crate::auth::SessionCredentials;
use crate::layout::write_atomically;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;

/// Errors from fetching, parsing or persisting the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The HTTP client could not be built.
    #[error("failed to build catalog client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request failed before a response arrived.
    #[error("catalog request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint answered with a non-success status.
    #[error("catalog request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    /// The body is not a catalog.
    #[error("catalog payload is not valid: {0}")]
    Parse(#[from] serde_json::Error),
    /// The endpoint answered with `data: null`.
    #[error("catalog payload has no data")]
    EmptyPayload,
    #[error("catalog file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of [`CatalogFetcher::fetch_catalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    /// A catalog file already existed; no request was made.
    AlreadyPresent,
    /// The catalog was fetched and written.
    Fetched { entries: usize },
}

/// HTTP client carrying the session cookies.
#[derive(Debug, Clone)]
pub struct CatalogFetcher {
    client: Client,
}

impl CatalogFetcher {
    /// Builds a client whose cookie jar holds `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Client`] if the TLS backend fails to initialize.
    pub fn new(credentials: &SessionCredentials, user_agent: &str) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent)
            .cookie_provider(credentials.to_jar())
            .build()
            .map_err(CatalogError::Client)?;
        Ok(Self { client })
    }

    /// Fetches the catalog at `url` into `path` unless `path` exists.
    ///
    /// The response body is written byte-for-byte after it parses. A single
    /// request is made; there is no retry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] on transport, status, parse or write failure.
    /// Nothing is written on failure.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn fetch_catalog(&self, url: &str, path: &Path) -> Result<CatalogStatus, CatalogError> {
        if path.exists() {
            debug!("catalog already present");
            return Ok(CatalogStatus::AlreadyPresent);
        }

        let http_error = |source| CatalogError::Http {
            url: url.to_string(),
            source,
        };
        let response = self.client.get(url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(http_error)?;

        let tree = parse_catalog(&body)?;
        write_atomically(path, &body).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let entries = tree.node_count();
        info!(entries, "catalog saved");
        Ok(CatalogStatus::Fetched { entries })
    }
}

/// Loads a persisted catalog. Returns `Ok(None)` when the file does not exist.
///
/// # Errors
///
/// Returns [`CatalogError::Io`] on read failure and parse errors for
/// malformed content.
pub fn load_catalog(path: &Path) -> Result<Option<CatalogTree>, CatalogError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CatalogError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse_catalog(&raw).map(Some)
}
