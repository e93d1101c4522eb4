//! Row mapping between PostgreSQL and [`Record`]
//!
//! Reads select `key` and `fields` (the row as JSONB minus the key column).
//! Writes send the whole batch as one JSON array expanded server-side by
//! `jsonb_populate_recordset`.

use crate::domain::{Record, Result, SqlIdentifier, TransferError};
use serde_json::{Map, Value};
use tokio_postgres::Row;

/// Convert a result row with `key` and `fields` columns into a record
pub fn record_from_row(row: &Row) -> Result<Record> {
    let key: i64 = row
        .try_get("key")
        .map_err(|e| TransferError::SourceRead(format!("Invalid key column: {e}")))?;
    let fields: Value = row
        .try_get("fields")
        .map_err(|e| TransferError::SourceRead(format!("Invalid row payload: {e}")))?;

    match fields {
        Value::Object(fields) => Ok(Record { key, fields }),
        Value::Null => Ok(Record::new(key)),
        other => Err(TransferError::SourceRead(format!(
            "Row {key} payload is not an object: {other}"
        ))),
    }
}

/// Build the JSON array consumed by `jsonb_populate_recordset`
///
/// The key is written under `key_column`, overriding any field of that name.
pub fn rows_to_payload(rows: &[Record], key_column: &SqlIdentifier) -> Value {
    let objects = rows
        .iter()
        .map(|record| {
            let mut object: Map<String, Value> = record.fields.clone();
            object.insert(key_column.as_str().to_string(), Value::from(record.key));
            Value::Object(object)
        })
        .collect();
    Value::Array(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_to_payload_includes_key() {
        let rows = vec![
            Record::new(1).with_field("name", "ada"),
            Record::new(2).with_field("id", 99).with_field("name", "bob"),
        ];
        let key = SqlIdentifier::new("id").unwrap();

        let payload = rows_to_payload(&rows, &key);
        assert_eq!(
            payload,
            json!([
                {"id": 1, "name": "ada"},
                {"id": 2, "name": "bob"}
            ])
        );
    }

    #[test]
    fn test_empty_payload() {
        let key = SqlIdentifier::new("id").unwrap();
        assert_eq!(rows_to_payload(&[], &key), json!([]));
    }
}
