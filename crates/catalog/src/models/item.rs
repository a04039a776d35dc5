//! Catalog item model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an item, unique within one list identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catalog record (album, playlist, track) as returned by the remote API
///
/// The payload is kept as raw JSON so the cache does not depend on the
/// shape of any particular endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identifier
    pub id: ItemId,
    /// Full record as received from the remote source
    pub payload: serde_json::Value,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Build an item from a JSON record, taking the identifier from its `id` field
    ///
    /// Returns `None` when the record has no usable `id` (string or integer).
    pub fn from_record(record: serde_json::Value) -> Option<Self> {
        let id = match record.get("id")? {
            serde_json::Value::String(s) if !s.is_empty() => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self {
            id: ItemId(id),
            payload: record,
        })
    }

    /// Convenience accessor for a string field in the payload
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.payload.get(name).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_record_numeric_id() {
        let item = Item::from_record(json!({"id": 42, "album_title": "Night"})).unwrap();
        assert_eq!(item.id.as_str(), "42");
        assert_eq!(item.field_str("album_title"), Some("Night"));
    }

    #[test]
    fn test_from_record_string_id() {
        let item = Item::from_record(json!({"id": "abc"})).unwrap();
        assert_eq!(item.id, ItemId::new("abc"));
    }

    #[test]
    fn test_from_record_missing_id() {
        assert!(Item::from_record(json!({"title": "no id"})).is_none());
        assert!(Item::from_record(json!({"id": ""})).is_none());
        assert!(Item::from_record(json!({"id": null})).is_none());
    }
}
