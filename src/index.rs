// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Running index of every artifact identity ever collected

use crate::types::ArtifactKey;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

/// Name of the field holding the key list inside the index document
pub const LIST_FIELD: &str = "list";

/// Set of `group_id:artifact_id` keys.
///
/// Entries are kept verbatim, including ones written by older tools in a
/// different format, so loading and saving never drops anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactIndex {
    keys: BTreeSet<String>,
}

impl ArtifactIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity, returning `true` if it was not present
    pub fn insert(&mut self, key: &ArtifactKey) -> bool {
        self.keys.insert(key.to_string())
    }

    /// Whether an identity is present
    #[must_use]
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.keys.contains(&key.to_string())
    }

    /// Add every entry of `other`
    pub fn merge(&mut self, other: &ArtifactIndex) {
        self.keys.extend(other.keys.iter().cloned());
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the index is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Entries in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Whether every entry of `self` is in `other`
    #[must_use]
    pub fn is_subset(&self, other: &ArtifactIndex) -> bool {
        self.keys.is_subset(&other.keys)
    }

    /// Read the `list` field of an index document.
    ///
    /// Anything other than an array of strings is treated as empty.
    #[must_use]
    pub fn from_document(doc: &Map<String, Value>) -> Self {
        let mut index = Self::new();
        match doc.get(LIST_FIELD) {
            None => {}
            Some(Value::Array(items)) => {
                for item in items {
                    match item {
                        Value::String(s) if !s.is_empty() => {
                            index.keys.insert(s.clone());
                        }
                        other => warn!(entry = %other, "Ignoring non-string index entry"),
                    }
                }
            }
            Some(other) => warn!(kind = json_kind(other), "Index list is not an array, starting empty"),
        }
        index
    }

    /// Replace the `list` field of an index document, keeping other fields
    pub fn write_into(&self, doc: &mut Map<String, Value>) {
        let list = self.keys.iter().cloned().map(Value::String).collect();
        doc.insert(LIST_FIELD.to_string(), Value::Array(list));
    }
}

impl<'a> FromIterator<&'a ArtifactKey> for ArtifactIndex {
    fn from_iter<I: IntoIterator<Item = &'a ArtifactKey>>(iter: I) -> Self {
        let mut index = Self::new();
        for key in iter {
            index.insert(key);
        }
        index
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(s: &str) -> ArtifactKey {
        ArtifactKey::parse(s).unwrap()
    }

    #[test]
    fn test_insert_dedups() {
        let mut index = ArtifactIndex::new();
        assert!(index.insert(&key("org.a:b")));
        assert!(!index.insert(&key("org.a:b")));
        assert!(index.insert(&key("org.a:c")));
        assert_eq!(index.len(), 2);
        assert!(index.contains(&key("org.a:c")));
    }

    #[test]
    fn test_document_round_trip_preserves_other_fields() {
        let mut doc = json!({"list": ["org.a:b", "legacy|entry"], "owner": "ci"})
            .as_object()
            .cloned()
            .unwrap();
        let mut index = ArtifactIndex::from_document(&doc);
        assert_eq!(index.len(), 2);

        index.insert(&key("org.c:d"));
        index.write_into(&mut doc);

        assert_eq!(doc["owner"], "ci");
        assert_eq!(doc["list"], json!(["legacy|entry", "org.a:b", "org.c:d"]));
    }

    #[test]
    fn test_legacy_object_list_reads_as_empty() {
        let doc = json!({"list": {}}).as_object().cloned().unwrap();
        assert!(ArtifactIndex::from_document(&doc).is_empty());
    }

    #[test]
    fn test_merge_is_union() {
        let mut a: ArtifactIndex = [key("org.a:b")].iter().collect();
        let b: ArtifactIndex = [key("org.a:b"), key("org.x:y")].iter().collect();
        let before = a.clone();
        a.merge(&b);
        assert!(before.is_subset(&a));
        assert!(b.is_subset(&a));
        assert_eq!(a.len(), 2);
    }
}
