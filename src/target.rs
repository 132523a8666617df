//! Document references and identities.
//!
//! Operators name a document either by its bare numeric id or by pasting a
//! reader URL. Both forms resolve to a [`DocumentTarget`]; the title is only
//! known once the reader has loaded, at which point a [`DocumentIdentity`]
//! is built.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::filename::sanitize_filename_component;

/// Reader host used when the operator does not name an institutional domain.
pub const DEFAULT_DOMAIN: &str = "wqbook.wqxuetang.com";

const UNTITLED: &str = "untitled";

/// `bid=NNN` query parameter in viewer URLs.
#[allow(clippy::expect_used)]
static BID_QUERY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&]bid=(\d+)").expect("bid regex is valid") // Static pattern, safe to panic
});

/// `/book/NNN` path segment in catalogue URLs.
#[allow(clippy::expect_used)]
static BOOK_PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/book/(\d+)").expect("book path regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HOST_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://([^/?#]+)").expect("host regex is valid") // Static pattern, safe to panic
});

/// Errors produced while interpreting a document reference.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    /// Nothing was entered.
    #[error("document reference is empty")]
    Empty,
    /// Input is neither a bare id nor a reader URL containing one.
    #[error("could not find a document id in '{input}' (expected digits, `bid=NNN` or `/book/NNN`)")]
    Unrecognized {
        /// The rejected input.
        input: String,
    },
    /// Domain override contains characters that cannot be a host.
    #[error("invalid domain '{domain}'")]
    InvalidDomain {
        /// The rejected domain.
        domain: String,
    },
}

/// What the operator asked to archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    /// Numeric document id as it appears in reader URLs.
    pub document_id: String,
    /// Reader host (institutional deployments use their own).
    pub domain: String,
    /// Volume number for multi-volume works.
    pub volume: Option<u32>,
}

impl DocumentTarget {
    /// Creates a target on the default domain.
    #[must_use]
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            domain: DEFAULT_DOMAIN.to_string(),
            volume: None,
        }
    }

    /// Replaces the domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Sets the volume number.
    #[must_use]
    pub fn with_volume(mut self, volume: Option<u32>) -> Self {
        self.volume = volume;
        self
    }
}

impl fmt::Display for DocumentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.document_id, self.domain)?;
        if let Some(volume) = self.volume {
            write!(f, " (volume {volume})")?;
        }
        Ok(())
    }
}

/// Parses a bare id or reader URL into a [`DocumentTarget`].
///
/// A domain embedded in a URL wins over `fallback_domain`; a bare id uses
/// `fallback_domain`, or [`DEFAULT_DOMAIN`] when that is `None` or blank.
///
/// # Errors
///
/// Returns [`TargetError::Empty`] for blank input and
/// [`TargetError::Unrecognized`] when no id can be found.
pub fn parse_document_reference(
    input: &str,
    fallback_domain: Option<&str>,
) -> Result<DocumentTarget, TargetError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(TargetError::Empty);
    }

    let fallback = match fallback_domain.map(str::trim) {
        Some(domain) if !domain.is_empty() => normalize_domain(domain)?,
        _ => DEFAULT_DOMAIN.to_string(),
    };

    if input.chars().all(|c| c.is_ascii_digit()) {
        return Ok(DocumentTarget::new(input).with_domain(fallback));
    }

    let document_id = [&*BID_QUERY_PATTERN, &*BOOK_PATH_PATTERN]
        .into_iter()
        .find_map(|pattern| pattern.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| TargetError::Unrecognized {
            input: input.to_string(),
        })?;

    let domain = HOST_PATTERN
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map_or(fallback, |m| m.as_str().to_string());

    debug!(document_id = %document_id, domain = %domain, "parsed document reference");
    Ok(DocumentTarget::new(document_id).with_domain(domain))
}

/// Normalizes an operator-supplied domain override.
///
/// Accepts `host`, `host:port`, or a URL whose host is taken.
///
/// # Errors
///
/// Returns [`TargetError::InvalidDomain`] when the value cannot be a host.
pub fn normalize_domain(raw: &str) -> Result<String, TargetError> {
    let trimmed = raw.trim();
    let host = HOST_PATTERN
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str())
        .trim_end_matches('/');

    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
    if !valid {
        return Err(TargetError::InvalidDomain {
            domain: raw.to_string(),
        });
    }
    Ok(host.to_ascii_lowercase())
}

/// A document whose title has been discovered from the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    /// Numeric document id.
    pub document_id: String,
    /// Title sanitized for use in file names.
    pub title: String,
    /// Reader host.
    pub domain: String,
}

impl DocumentIdentity {
    /// Builds an identity from a target and the raw title shown by the reader.
    #[must_use]
    pub fn new(target: &DocumentTarget, raw_title: &str) -> Self {
        let title = sanitize_filename_component(raw_title.trim());
        let title = if title.is_empty() {
            UNTITLED.to_string()
        } else {
            title
        };
        Self {
            document_id: target.document_id.clone(),
            title,
            domain: target.domain.clone(),
        }
    }

    /// Common stem shared by every artifact of this document.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.document_id, self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_id_uses_default_domain() {
        let target = parse_document_reference("3208725", None).unwrap();
        assert_eq!(target.document_id, "3208725");
        assert_eq!(target.domain, DEFAULT_DOMAIN);
        assert_eq!(target.volume, None);
    }

    #[test]
    fn test_parse_bare_id_uses_fallback_domain() {
        let target = parse_document_reference(" 42 ", Some("lib.example.edu")).unwrap();
        assert_eq!(target.document_id, "42");
        assert_eq!(target.domain, "lib.example.edu");
    }

    #[test]
    fn test_parse_blank_fallback_domain_uses_default() {
        let target = parse_document_reference("42", Some("   ")).unwrap();
        assert_eq!(target.domain, DEFAULT_DOMAIN);
    }

    #[test]
    fn test_parse_viewer_url_extracts_id_and_domain() {
        let target = parse_document_reference(
            "https://lib.example.edu/deep/m/read/pdf?bid=3208725",
            None,
        )
        .unwrap();
        assert_eq!(target.document_id, "3208725");
        assert_eq!(target.domain, "lib.example.edu");
    }

    #[test]
    fn test_parse_book_path_url() {
        let target =
            parse_document_reference("https://wqbook.wqxuetang.com/book/998877", Some("x.org"))
                .unwrap();
        assert_eq!(target.document_id, "998877");
        assert_eq!(target.domain, "wqbook.wqxuetang.com");
    }

    #[test]
    fn test_parse_bid_not_confused_with_other_params() {
        let target =
            parse_document_reference("https://h.example/read?foo=1&bid=77&page=3", None).unwrap();
        assert_eq!(target.document_id, "77");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(parse_document_reference("  ", None), Err(TargetError::Empty));
    }

    #[test]
    fn test_parse_rejects_unrecognized() {
        let err = parse_document_reference("not-a-book", None).unwrap_err();
        assert!(matches!(err, TargetError::Unrecognized { .. }));
    }

    #[test]
    fn test_normalize_domain_strips_scheme_and_slash() {
        assert_eq!(
            normalize_domain("https://Lib.Example.edu/").unwrap(),
            "lib.example.edu"
        );
        assert_eq!(normalize_domain("127.0.0.1:8080").unwrap(), "127.0.0.1:8080");
    }

    #[test]
    fn test_normalize_domain_rejects_spaces() {
        assert!(normalize_domain("bad domain").is_err());
    }

    #[test]
    fn test_identity_sanitizes_title() {
        let target = DocumentTarget::new("12");
        let identity = DocumentIdentity::new(&target, " 数据结构: 第2版 ");
        assert_eq!(identity.title, "数据结构_第2版");
        assert_eq!(identity.file_stem(), "12_数据结构_第2版");
    }

    #[test]
    fn test_identity_falls_back_when_title_has_no_usable_chars() {
        let identity = DocumentIdentity::new(&DocumentTarget::new("12"), "???");
        assert_eq!(identity.title, "untitled");
    }

    #[test]
    fn test_target_display_includes_volume() {
        let target = DocumentTarget::new("5").with_volume(Some(2));
        assert_eq!(target.to_string(), "5@wqbook.wqxuetang.com (volume 2)");
    }
}
