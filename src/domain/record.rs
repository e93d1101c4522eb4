//! Record and page models
//!
//! A [`Record`] is one row of the relational table: its monotonically
//! increasing key plus the remaining columns as a JSON object. A [`Page`] is
//! an ordered run of records produced by the pager.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key type of the relational source
///
/// Keyset pagination requires a totally ordered, monotonically increasing key.
pub type RecordKey = i64;

/// One row of tabular data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key value
    pub key: RecordKey,

    /// Non-key columns, by column name
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record with no columns besides its key
    pub fn new(key: RecordKey) -> Self {
        Self {
            key,
            fields: Map::new(),
        }
    }

    /// Add a column value
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a column value
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A page of records from the relational source
///
/// Consumed once by the export engine, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records in source key order
    pub rows: Vec<Record>,

    /// Key the page was requested after (keyset policy only)
    pub start_key: Option<RecordKey>,

    /// Number of records in the page
    pub size: usize,
}

impl Page {
    /// Create a page from fetched rows
    pub fn new(rows: Vec<Record>, start_key: Option<RecordKey>) -> Self {
        let size = rows.len();
        Self {
            rows,
            start_key,
            size,
        }
    }

    /// An empty page terminates pagination
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Largest key in the page, used as the next keyset cursor
    pub fn last_key(&self) -> Option<RecordKey> {
        self.rows.iter().map(|r| r.key).max()
    }

    /// Whether the page came back shorter than requested
    pub fn is_short(&self, limit: usize) -> bool {
        self.size < limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_builder() {
        let record = Record::new(7)
            .with_field("name", "ada")
            .with_field("age", 36);

        assert_eq!(record.key, 7);
        assert_eq!(record.field("name"), Some(&json!("ada")));
        assert_eq!(record.field("age"), Some(&json!(36)));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_record_serde_shape() {
        let record = Record::new(1).with_field("name", "ada");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"key": 1, "fields": {"name": "ada"}}));

        let back: Record = serde_json::from_value(json!({"key": 2})).unwrap();
        assert_eq!(back, Record::new(2));
    }

    #[test]
    fn test_page_last_key_and_size() {
        let page = Page::new(vec![Record::new(3), Record::new(9), Record::new(5)], Some(2));

        assert_eq!(page.size, 3);
        assert_eq!(page.start_key, Some(2));
        assert_eq!(page.last_key(), Some(9));
        assert!(!page.is_empty());
        assert!(page.is_short(4));
        assert!(!page.is_short(3));
    }

    #[test]
    fn test_empty_page() {
        let page = Page::new(Vec::new(), None);
        assert!(page.is_empty());
        assert_eq!(page.last_key(), None);
    }
}
