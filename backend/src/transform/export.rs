//! JSON export of transformed documents.

use serde::Serialize;
use serde_json::Value;

/// MIME type of exported files.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Prefix of exported file names.
pub const EXPORT_FILE_PREFIX: &str = "converted_data_";

/// Pretty-print documents as a JSON array with 2-space indentation.
pub fn to_pretty_json(documents: &[Value]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(documents)
}

/// `converted_data_<epoch-millis>.json`
pub fn export_file_name(epoch_millis: i64) -> String {
    format!("{}{}.json", EXPORT_FILE_PREFIX, epoch_millis)
}

/// Export file name stamped with the current time.
pub fn export_file_name_now() -> String {
    export_file_name(chrono::Utc::now().timestamp_millis())
}

/// Counts shown alongside an export.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub object_count: usize,
    pub file_name: String,
}

impl ExportSummary {
    pub fn new(documents: &[Value], file_name: impl Into<String>) -> Self {
        Self {
            object_count: documents.len(),
            file_name: file_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pretty_json_two_space_indent() {
        let docs = vec![json!({ "a": { "b": "hi" } })];
        let out = to_pretty_json(&docs).unwrap();
        assert_eq!(out, "[\n  {\n    \"a\": {\n      \"b\": \"hi\"\n    }\n  }\n]");
    }

    #[test]
    fn test_empty_export() {
        assert_eq!(to_pretty_json(&[]).unwrap(), "[]");
    }

    #[test]
    fn test_file_name_pattern() {
        assert_eq!(export_file_name(1700000000123), "converted_data_1700000000123.json");

        let now = export_file_name_now();
        assert!(now.starts_with(EXPORT_FILE_PREFIX));
        assert!(now.ends_with(".json"));
    }

    #[test]
    fn test_summary_counts_documents() {
        let docs = vec![json!({}), json!({})];
        let summary = ExportSummary::new(&docs, "out.json");
        assert_eq!(summary.object_count, 2);
    }
}
