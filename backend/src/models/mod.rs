//! Domain models shared by the reader, the normalizer and the transformer.
//!
//! - [`CellValue`] - One raw spreadsheet cell
//! - [`RawGrid`] - Rows of cells as read from one sheet
//! - [`RowRecord`] - One data row keyed by header name
//! - [`CanonicalTable`] - Normalized named-column table
//! - [`TablePreview`] - First rows of a table for display

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Number of rows shown in a table preview.
pub const PREVIEW_ROWS: usize = 5;

// =============================================================================
// Raw cells
// =============================================================================

/// A raw cell value as produced by the workbook reader.
///
/// Serializes as plain JSON: `Empty` is `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    /// Blank or absent cell.
    #[default]
    Empty,
    /// Boolean cell.
    Bool(bool),
    /// Numeric cell (integers included).
    Number(f64),
    /// Text cell.
    String(String),
}

impl CellValue {
    /// True for blank cells.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// String form of the cell, `None` for blank cells.
    ///
    /// Numbers print without a trailing `.0` when integral, and negative zero
    /// prints as `0`.
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Number(n) => Some(format_number(*n)),
            CellValue::String(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}

/// Rows of cells from one sheet, top row first. Rows may be ragged.
pub type RawGrid = Vec<Vec<CellValue>>;

// =============================================================================
// Canonical table
// =============================================================================

/// One data row, keyed by trimmed header name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowRecord {
    values: HashMap<String, CellValue>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value, overwriting any earlier value under the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        self.values.insert(column.into(), value);
    }

    /// Look up a column. Missing keys and blank cells both read as `None`.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Render the row as a JSON object over the given headers.
    pub fn to_json(&self, headers: &[String]) -> Value {
        let mut obj = Map::new();
        for header in headers {
            let value = self
                .get(header)
                .and_then(|v| serde_json::to_value(v).ok())
                .unwrap_or(Value::Null);
            obj.insert(header.clone(), value);
        }
        Value::Object(obj)
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = RowRecord::new();
        for (k, v) in iter {
            record.insert(k, v.into());
        }
        record
    }
}

/// A named-column table built from a raw grid and a header row.
///
/// `headers` holds no empty names and no duplicates; rows are immutable once
/// built. A rebuild produces a whole new table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTable {
    pub source_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
}

impl CanonicalTable {
    /// A table with no headers and no rows.
    pub fn empty(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// First `limit` rows for display, plus the total row count.
    pub fn preview(&self, limit: usize) -> TablePreview {
        TablePreview {
            source_name: self.source_name.clone(),
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .take(limit)
                .map(|r| r.to_json(&self.headers))
                .collect(),
            total_rows: self.rows.len(),
        }
    }

    /// All rows rendered as JSON objects over the headers.
    pub fn rows_as_json(&self) -> Vec<Value> {
        self.rows.iter().map(|r| r.to_json(&self.headers)).collect()
    }
}

/// First rows of a table, for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePreview {
    pub source_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Value>,
    pub total_rows: usize,
}

impl TablePreview {
    /// True when the preview shows fewer rows than the table holds.
    pub fn is_truncated(&self) -> bool {
        self.rows.len() < self.total_rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_text_forms() {
        assert_eq!(CellValue::Empty.to_text(), None);
        assert_eq!(CellValue::Number(42.0).to_text().as_deref(), Some("42"));
        assert_eq!(CellValue::Number(1.5).to_text().as_deref(), Some("1.5"));
        assert_eq!(CellValue::Number(-0.0).to_text().as_deref(), Some("0"));
        assert_eq!(CellValue::Bool(true).to_text().as_deref(), Some("true"));
        assert_eq!(CellValue::from(" x ").to_text().as_deref(), Some(" x "));
    }

    #[test]
    fn test_cell_serializes_as_plain_json() {
        let cells = vec![
            CellValue::Empty,
            CellValue::Bool(false),
            CellValue::Number(3.0),
            CellValue::from("a"),
        ];
        assert_eq!(serde_json::to_value(&cells).unwrap(), json!([null, false, 3.0, "a"]));
    }

    #[test]
    fn test_row_lookup_treats_blank_as_absent() {
        let row: RowRecord = vec![("a", CellValue::Empty), ("b", CellValue::from("x"))]
            .into_iter()
            .collect();
        assert_eq!(row.get("a"), None);
        assert_eq!(row.get("missing"), None);
        assert_eq!(row.get("b"), Some(&CellValue::from("x")));
    }

    #[test]
    fn test_preview_limits_rows() {
        let rows = (0..8)
            .map(|i| vec![("n", CellValue::from(i as i64))].into_iter().collect())
            .collect();
        let table = CanonicalTable {
            source_name: "data.xlsx".into(),
            headers: vec!["n".into()],
            rows,
        };

        let preview = table.preview(PREVIEW_ROWS);
        assert_eq!(preview.rows.len(), 5);
        assert_eq!(preview.total_rows, 8);
        assert!(preview.is_truncated());
        assert_eq!(preview.rows[0], json!({ "n": 0.0 }));
    }

    #[test]
    fn test_preview_rows_keep_header_order() {
        let row: RowRecord = vec![("alpha", "a"), ("zeta", "z"), ("mid", "m")]
            .into_iter()
            .collect();
        let table = CanonicalTable {
            source_name: "data.csv".into(),
            headers: vec!["zeta".into(), "alpha".into(), "mid".into()],
            rows: vec![row],
        };

        let preview = table.preview(PREVIEW_ROWS);
        let keys: Vec<_> = preview.rows[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }
}
