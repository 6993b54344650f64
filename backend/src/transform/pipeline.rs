//! High-level conversion API: workbook → table → JSON documents.
//!
//! # Example
//!
//! ```rust,ignore
//! use sheetjson::{convert_file, ConvertOptions, MappingConfig};
//! use std::path::Path;
//!
//! let mapping = MappingConfig::from_json(&std::fs::read_to_string("mapping.json")?)?;
//! let result = convert_file(Path::new("orders.xlsx"), &mapping, &ConvertOptions::default())?;
//! println!("Converted {} rows", result.documents.len());
//! ```

use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use super::executor::transform;
use super::mapping::MappingConfig;
use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{PipelineError, PipelineResult};
use crate::models::CanonicalTable;
use crate::parser::{normalize, read_workbook_file, Workbook};
use crate::validation::{validate_documents, ValidationReport};

/// Options for a conversion run
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Sheet to read (first sheet when unset)
    pub sheet: Option<String>,

    /// Zero-based header row index
    pub header_row: usize,

    /// JSON Schema the output documents are checked against
    pub schema: Option<Value>,
}

/// Where the table came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub source_name: String,
    pub sheet: String,
    pub header_row: usize,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
}

/// Result of a conversion run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResult {
    pub documents: Vec<Value>,
    pub table_info: TableInfo,
    /// Target paths of rules whose source column is not in the table
    pub dangling_rules: Vec<String>,
    pub validation: Option<ValidationReport>,
}

/// Normalize one sheet of a loaded workbook.
pub fn load_table(
    workbook: &Workbook,
    sheet: Option<&str>,
    header_row: usize,
) -> PipelineResult<(String, CanonicalTable)> {
    let sheet = sheet.unwrap_or_else(|| workbook.first_sheet_name()).to_string();
    let grid = workbook
        .grid(&sheet)
        .ok_or_else(|| PipelineError::SheetNotFound(sheet.clone()))?;

    let table = normalize(grid, header_row, workbook.file_name());
    Ok((sheet, table))
}

/// Read a workbook file and convert one of its sheets.
pub fn convert_file(
    path: &Path,
    mapping: &MappingConfig,
    options: &ConvertOptions,
) -> PipelineResult<ConvertResult> {
    log_info(format!("📖 Reading workbook: {}", path.display()));
    let workbook = read_workbook_file(path)?;
    convert_workbook(&workbook, mapping, options)
}

/// Convert one sheet of an already loaded workbook.
pub fn convert_workbook(
    workbook: &Workbook,
    mapping: &MappingConfig,
    options: &ConvertOptions,
) -> PipelineResult<ConvertResult> {
    log_success(format!("Sheets: {}", workbook.sheet_names().join(", ")));
    if let (Some(encoding), Some(delimiter)) = (&workbook.encoding, workbook.delimiter) {
        log_success(format!(
            "Detected encoding: {}, separator: '{}'",
            encoding,
            format_delimiter(delimiter)
        ));
    }

    let (sheet, table) = load_table(workbook, options.sheet.as_deref(), options.header_row)?;
    log_success(format!(
        "Sheet \"{}\": {} columns, {} rows (header row {})",
        sheet,
        table.headers.len(),
        table.row_count(),
        options.header_row
    ));

    let mut dangling_rules = Vec::new();
    for rule in mapping.dangling_rules(&table.headers) {
        log_warning(format!(
            "Column \"{}\" not found, \"{}\" will be null",
            rule.source_column, rule.target_path
        ));
        dangling_rules.push(rule.target_path.clone());
    }

    log_info("⚙️  Applying mapping...");
    let documents = transform(&table, mapping.rules());
    log_success(format!("Generated {} objects", documents.len()));

    let validation = match &options.schema {
        Some(schema) => {
            log_info("✔️  Validating output...");
            let report =
                validate_documents(schema, &documents).map_err(PipelineError::InvalidSchema)?;
            if report.is_ok() {
                log_success(format!("All {} objects valid", report.valid));
            } else {
                log_warning(format!("{} valid, {} invalid", report.valid, report.invalid));
            }
            Some(report)
        }
        None => None,
    };

    Ok(ConvertResult {
        documents,
        table_info: TableInfo {
            source_name: table.source_name.clone(),
            sheet,
            header_row: options.header_row,
            headers: table.headers.clone(),
            row_count: table.row_count(),
            encoding: workbook.encoding.clone(),
            delimiter: workbook.delimiter,
        },
        dangling_rules,
        validation,
    })
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::read_workbook_bytes;
    use crate::transform::mapping::{FieldType, MappingRule};
    use serde_json::json;

    fn workbook() -> Workbook {
        read_workbook_bytes(
            "Inventory report;;;\nsku;name;qty;tags\nA-1; Lamp ;3;home, light\nB-2;Desk;x;\n".as_bytes(),
            "stock.csv",
        )
        .unwrap()
    }

    fn mapping() -> MappingConfig {
        MappingConfig::from_rules(vec![
            MappingRule::new("id", "sku", FieldType::String),
            MappingRule::new("item.name", "name", FieldType::String),
            MappingRule::new("item.qty", "qty", FieldType::Number),
            MappingRule::new("tags", "tags", FieldType::Array),
            MappingRule::new("price", "price", FieldType::Number),
        ])
    }

    #[test]
    fn test_convert_with_header_offset() {
        let options = ConvertOptions {
            header_row: 1,
            ..Default::default()
        };
        let result = convert_workbook(&workbook(), &mapping(), &options).unwrap();

        assert_eq!(result.table_info.sheet, "stock");
        assert_eq!(result.table_info.headers, vec!["sku", "name", "qty", "tags"]);
        assert_eq!(result.table_info.delimiter, Some(';'));
        assert_eq!(result.dangling_rules, vec!["price"]);
        assert_eq!(
            result.documents,
            vec![
                json!({ "id": "A-1", "item": { "name": "Lamp", "qty": 3 }, "tags": ["home", "light"], "price": null }),
                json!({ "id": "B-2", "item": { "name": "Desk", "qty": "x" }, "tags": null, "price": null }),
            ]
        );
        assert!(result.validation.is_none());
    }

    #[test]
    fn test_unknown_sheet() {
        let options = ConvertOptions {
            sheet: Some("Nope".into()),
            ..Default::default()
        };
        let err = convert_workbook(&workbook(), &mapping(), &options).unwrap_err();
        assert!(matches!(err, PipelineError::SheetNotFound(name) if name == "Nope"));
    }

    #[test]
    fn test_header_row_past_end_gives_no_documents() {
        let options = ConvertOptions {
            header_row: 10,
            ..Default::default()
        };
        let result = convert_workbook(&workbook(), &mapping(), &options).unwrap();
        assert!(result.documents.is_empty());
        assert!(result.table_info.headers.is_empty());
    }

    #[test]
    fn test_convert_with_schema() {
        let options = ConvertOptions {
            header_row: 1,
            schema: Some(json!({
                "type": "object",
                "properties": { "item": { "properties": { "qty": { "type": "integer" } } } }
            })),
            ..Default::default()
        };
        let result = convert_workbook(&workbook(), &mapping(), &options).unwrap();
        let report = result.validation.unwrap();
        assert_eq!(report.valid, 1);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.errors[0].record_index, 1);
    }

    #[test]
    fn test_convert_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "Name,Active\nAnn,yes\n").unwrap();

        let mapping = MappingConfig::from_rules(vec![MappingRule::new("active", "Active", FieldType::Boolean)]);
        let result = convert_file(&path, &mapping, &ConvertOptions::default()).unwrap();
        assert_eq!(result.documents, vec![json!({ "active": true })]);
        assert_eq!(result.table_info.source_name, "people.csv");
    }
}
