//! JSON Schema validation of output documents.
//!
//! Optional step: a user-supplied schema (Draft 7) is checked against every
//! transformed document. Documents are never modified.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use sheetjson::validation::validate_documents;
//!
//! let schema = json!({ "type": "object", "required": ["id"] });
//! let docs = vec![json!({ "id": 1 }), json!({ "name": "x" })];
//!
//! let report = validate_documents(&schema, &docs)?;
//! assert_eq!(report.valid, 1);
//! assert_eq!(report.errors[0].record_index, 1);
//! ```

use serde::Serialize;
use serde_json::Value;

/// Keep at most this many invalid documents in a report.
const MAX_REPORTED: usize = 20;

/// Validate one value against a schema.
///
/// # Returns
/// * `Ok(())` when valid
/// * `Err(Vec<String>)` with one message per violation (or a single message
///   when the schema itself is invalid)
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator =
        jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick true/false check.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validation errors of one document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentErrors {
    pub record_index: usize,
    pub errors: Vec<String>,
}

/// Result of validating a batch of documents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub valid: usize,
    pub invalid: usize,
    /// First invalid documents, in order
    pub errors: Vec<DocumentErrors>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.invalid == 0
    }
}

/// Validate every document. The schema is compiled once.
///
/// Returns `Err` with the compile message when the schema is invalid.
pub fn validate_documents(schema: &Value, documents: &[Value]) -> Result<ValidationReport, String> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| format!("Invalid schema: {}", e))?;

    let mut report = ValidationReport::default();
    for (i, doc) in documents.iter().enumerate() {
        let errors: Vec<String> = validator.iter_errors(doc).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            report.valid += 1;
        } else {
            report.invalid += 1;
            if report.errors.len() < MAX_REPORTED {
                report.errors.push(DocumentErrors {
                    record_index: i,
                    errors,
                });
            }
        }
    }

    Ok(report)
}
