//! Append-only cross-reference table
//!
//! A cross-reference asserts that entries in different addressing
//! namespaces denote the same logical payload. Rows are immutable once
//! written; the table only ever appends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// An immutable link across addressing namespaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossReference {
    /// Row id
    pub id: Uuid,
    /// Normalized atlas path, if the link names one
    pub atlas_path: Option<String>,
    /// Content hash, if the link names one
    pub content_hash: Option<String>,
    /// Canonical coordinate key, if the link names one
    pub coordinate_key: Option<String>,
    /// Caller-defined relation label, e.g. "alias"
    pub reference_type: String,
    /// When the row was appended
    pub created_at: DateTime<Utc>,
}

impl CrossReference {
    fn keys(&self) -> impl Iterator<Item = LinkedKey> + '_ {
        self.atlas_path
            .iter()
            .map(|p| LinkedKey::Atlas(p.clone()))
            .chain(self.content_hash.iter().map(|h| LinkedKey::Content(h.clone())))
            .chain(
                self.coordinate_key
                    .iter()
                    .map(|k| LinkedKey::Coordinate(k.clone())),
            )
    }
}

/// A key qualified by its addressing namespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkedKey {
    Atlas(String),
    Content(String),
    Coordinate(String),
}

impl LinkedKey {
    /// The bare key string, without its namespace
    pub fn key(&self) -> &str {
        match self {
            LinkedKey::Atlas(k) | LinkedKey::Content(k) | LinkedKey::Coordinate(k) => k,
        }
    }
}

impl fmt::Display for LinkedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkedKey::Atlas(k) => write!(f, "atlas:{}", k),
            LinkedKey::Content(k) => write!(f, "content:{}", k),
            LinkedKey::Coordinate(k) => write!(f, "coordinate:{}", k),
        }
    }
}

/// Append-only table of cross-reference rows
#[derive(Debug, Default)]
pub struct CrossReferenceTable {
    rows: Vec<CrossReference>,
}

impl CrossReferenceTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row; rows are never updated or removed
    pub fn append(&mut self, row: CrossReference) {
        self.rows.push(row);
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over all rows
    pub fn iter(&self) -> impl Iterator<Item = &CrossReference> {
        self.rows.iter()
    }

    /// All keys transitively linked to any of the seed key strings
    ///
    /// Rows sharing a key merge into one related set, so the closure spans
    /// chains of links. The seeds themselves are excluded from the result.
    pub fn resolve_linked(&self, seeds: &[&str]) -> BTreeSet<LinkedKey> {
        let mut related: BTreeSet<LinkedKey> = BTreeSet::new();
        let mut matched: BTreeSet<String> = seeds.iter().map(|s| s.to_string()).collect();

        loop {
            let before = related.len();
            for row in &self.rows {
                if row.keys().any(|k| matched.contains(k.key())) {
                    for key in row.keys() {
                        matched.insert(key.key().to_string());
                        related.insert(key);
                    }
                }
            }
            if related.len() == before {
                break;
            }
        }

        related.retain(|k| !seeds.contains(&k.key()));
        related
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        atlas: Option<&str>,
        content: Option<&str>,
        coordinate: Option<&str>,
    ) -> CrossReference {
        CrossReference {
            id: Uuid::new_v4(),
            atlas_path: atlas.map(String::from),
            content_hash: content.map(String::from),
            coordinate_key: coordinate.map(String::from),
            reference_type: "alias".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_linked_is_symmetric() {
        let mut table = CrossReferenceTable::new();
        table.append(row(Some("maps/hq"), Some("hashB"), None));

        let from_path = table.resolve_linked(&["maps/hq"]);
        assert!(from_path.contains(&LinkedKey::Content("hashB".to_string())));
        assert!(!from_path.contains(&LinkedKey::Atlas("maps/hq".to_string())));

        let from_hash = table.resolve_linked(&["hashB"]);
        assert!(from_hash.contains(&LinkedKey::Atlas("maps/hq".to_string())));
    }

    #[test]
    fn test_resolve_linked_closure_spans_rows() {
        let mut table = CrossReferenceTable::new();
        table.append(row(Some("maps/hq"), Some("hashB"), None));
        table.append(row(None, Some("hashB"), Some("37.422000_-122.084100")));

        let related = table.resolve_linked(&["maps/hq"]);
        assert!(related.contains(&LinkedKey::Content("hashB".to_string())));
        assert!(related.contains(&LinkedKey::Coordinate(
            "37.422000_-122.084100".to_string()
        )));
    }

    #[test]
    fn test_resolve_linked_unknown_key_is_empty() {
        let mut table = CrossReferenceTable::new();
        table.append(row(Some("maps/hq"), Some("hashB"), None));
        assert!(table.resolve_linked(&["unrelated"]).is_empty());
    }
}
