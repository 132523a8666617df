//! Reader URL patterns.
//!
//! Patterns use `{domain}`, `{id}` and (catalog only) `{volume}` placeholders.
//! `{volume}` expands to `&volume_no=N` for multi-volume works and to nothing
//! otherwise.

use crate::target::DocumentTarget;

/// Default viewer page pattern.
pub const DEFAULT_VIEWER_PATTERN: &str = "https://{domain}/deep/m/read/pdf?bid={id}";
/// Default table-of-contents endpoint pattern.
pub const DEFAULT_CATALOG_PATTERN: &str =
    "https://{domain}/deep/book/v1/catatree?bid={id}{volume}";

/// URL patterns for the reader deployment being archived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    viewer_pattern: String,
    catalog_pattern: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            viewer_pattern: DEFAULT_VIEWER_PATTERN.to_string(),
            catalog_pattern: DEFAULT_CATALOG_PATTERN.to_string(),
        }
    }
}

impl Endpoints {
    /// Creates endpoints from custom patterns.
    #[must_use]
    pub fn new(viewer_pattern: impl Into<String>, catalog_pattern: impl Into<String>) -> Self {
        Self {
            viewer_pattern: viewer_pattern.into(),
            catalog_pattern: catalog_pattern.into(),
        }
    }

    /// Viewer page for `target`. Login is complete once the browser lands
    /// back on this page (same host, path and query values).
    #[must_use]
    pub fn viewer_url(&self, target: &DocumentTarget) -> String {
        expand(&self.viewer_pattern, target)
    }

    /// Table-of-contents endpoint for `target`.
    #[must_use]
    pub fn catalog_url(&self, target: &DocumentTarget) -> String {
        expand(&self.catalog_pattern, target)
    }
}

fn expand(pattern: &str, target: &DocumentTarget) -> String {
    let volume = target
        .volume
        .map(|n| format!("&volume_no={n}"))
        .unwrap_or_default();
    pattern
        .replace("{domain}", &target.domain)
        .replace("{id}", &target.document_id)
        .replace("{volume}", &volume)
}
