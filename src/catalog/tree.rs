//! Catalog payload model.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::CatalogError;

/// One node of the table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub label: String,
    /// 1-based page the entry points to.
    #[serde(rename = "pnum", default, deserialize_with = "lenient_u32")]
    pub page_number: Option<u32>,
    /// Nesting level as reported by the reader (1 = top).
    #[serde(default, deserialize_with = "lenient_u32")]
    pub level: Option<u32>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<CatalogEntry>,
}

/// The whole table of contents, in reader order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogTree {
    entries: Vec<CatalogEntry>,
}

impl CatalogTree {
    #[must_use]
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Top-level entries.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries at every depth.
    #[must_use]
    pub fn node_count(&self) -> usize {
        fn count(entries: &[CatalogEntry]) -> usize {
            entries.iter().map(|e| 1 + count(&e.children)).sum()
        }
        count(&self.entries)
    }
}

/// Parses a catalog response body.
///
/// Accepts `{"data": [...]}` or a bare array.
///
/// # Errors
///
/// Returns [`CatalogError::EmptyPayload`] for `data: null` or a missing
/// `data` key and [`CatalogError::Parse`] for anything else malformed.
pub fn parse_catalog(body: &[u8]) -> Result<CatalogTree, CatalogError> {
    let value: Value = serde_json::from_slice(body)?;
    let entries = match value {
        Value::Object(mut map) => match map.remove("data") {
            None | Some(Value::Null) => return Err(CatalogError::EmptyPayload),
            Some(data) => data,
        },
        other => other,
    };
    let entries: Vec<CatalogEntry> = serde_json::from_value(entries)?;
    Ok(CatalogTree::new(entries))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<CatalogEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<CatalogEntry>>::deserialize(deserializer)?.unwrap_or_default())
}
