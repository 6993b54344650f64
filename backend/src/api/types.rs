//! REST API request and response types.
//!
//! All bodies are camelCase JSON.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cache::StoredMapping;
use crate::models::TablePreview;
use crate::session::{SuggestOutcome, WorkspaceStatus};
use crate::transform::mapping::MappingConfig;

/// Response after a workbook upload or a sheet selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookResponse {
    pub status: WorkspaceStatus,
    pub preview: TablePreview,
    /// False when a newer selection replaced this one before it finished
    pub committed: bool,
}

/// Body of `POST /api/workbook/select`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub sheet: String,
    #[serde(default)]
    pub header_row: usize,
}

/// Body of `POST /api/mapping/suggest`
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub instruction: String,
}

/// Response of `POST /api/mapping/suggest`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestResponse {
    /// "applied", "noValidMapping" or "emptyInstruction"
    pub status: String,
    pub applied_count: usize,
    pub message: Option<String>,
    pub mapping: MappingConfig,
}

impl SuggestResponse {
    pub fn new(outcome: SuggestOutcome, mapping: MappingConfig) -> Self {
        let (status, applied_count, message) = match outcome {
            SuggestOutcome::Applied(n) => ("applied", n, None),
            SuggestOutcome::NoValidMapping => (
                "noValidMapping",
                0,
                Some("No valid mapping was produced. Try a more detailed instruction."),
            ),
            SuggestOutcome::EmptyInstruction => {
                ("emptyInstruction", 0, Some("Describe the JSON structure you want first."))
            }
        };
        Self {
            status: status.to_string(),
            applied_count,
            message: message.map(str::to_string),
            mapping,
        }
    }
}

/// Response of `GET /api/convert`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub count: usize,
    pub documents: Vec<Value>,
    pub dangling_rule_ids: Vec<String>,
}

/// Body of `POST /api/templates`
#[derive(Debug, Clone, Deserialize)]
pub struct SaveTemplateRequest {
    pub name: String,
}

/// One entry of `GET /api/templates`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub field_count: usize,
    pub use_count: u32,
    pub created_at: String,
    pub last_used: Option<String>,
    /// Share of the template's columns found in the current headers
    pub compatibility: Option<f64>,
}

impl TemplateSummary {
    pub fn new(stored: &StoredMapping, compatibility: Option<f64>) -> Self {
        Self {
            id: stored.id.clone(),
            name: stored.name.clone(),
            field_count: stored.mapping.len(),
            use_count: stored.use_count,
            created_at: stored.created_at.clone(),
            last_used: stored.last_used.clone(),
            compatibility,
        }
    }
}

/// Create an error response body
pub fn error_response(error: &str) -> Value {
    json!({
        "status": "error",
        "error": error,
    })
}
