//! Error types for the sheetjson conversion pipeline.
//!
//! One enum per concern:
//!
//! - [`WorkbookError`] - Workbook reading (spreadsheet and CSV) errors
//! - [`AiError`] - Mapping suggestion client errors
//! - [`RegistryError`] - Mapping template registry errors
//! - [`SessionError`] - Workspace session errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! The sheet normalizer and the mapping transformer are total and have no
//! error type. Conversion between the others is automatic via `From`
//! implementations, so `?` works across boundaries.

use thiserror::Error;

// =============================================================================
// Workbook Errors
// =============================================================================

/// Errors while reading a workbook. Always fatal to the load operation.
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// File extension is not a known spreadsheet or delimited format.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to decode text content.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Malformed delimited text.
    #[error("Invalid CSV content: {0}")]
    Csv(#[from] csv::Error),

    /// The spreadsheet reader rejected the file.
    #[error("Unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    /// The workbook has no sheets.
    #[error("Workbook contains no sheets")]
    NoSheets,

    /// The file is empty.
    #[error("File is empty")]
    EmptyFile,
}

impl From<calamine::Error> for WorkbookError {
    fn from(err: calamine::Error) -> Self {
        WorkbookError::Spreadsheet(err.to_string())
    }
}

// =============================================================================
// AI Client Errors
// =============================================================================

/// Errors from the mapping suggestion client.
#[derive(Debug, Error)]
pub enum AiError {
    /// Missing API key.
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// The API answered with an error payload.
    #[error("API error: {0}")]
    ApiError(String),

    /// Response body was not the expected JSON.
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the mapping template registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Template not found.
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Invalid template data.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// IO error.
    #[error("Registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Session Errors
// =============================================================================

/// Errors from workspace session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation needs a workbook and none is loaded.
    #[error("No workbook loaded")]
    NoWorkbook,

    /// Requested sheet does not exist in the loaded workbook.
    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),

    /// No mapping rule carries this id.
    #[error("Unknown mapping rule: {0}")]
    UnknownRule(String),

    /// The background normalization task died.
    #[error("Normalization task failed: {0}")]
    TaskFailed(String),

    /// Workbook could not be read.
    #[error("Workbook error: {0}")]
    Workbook(#[from] WorkbookError),

    /// Suggestion call failed; the rules were left as they were.
    #[error("AI suggestion failed: {0}")]
    Ai(#[from] AiError),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::convert_file`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Workbook reading error.
    #[error("Workbook error: {0}")]
    Workbook(#[from] WorkbookError),

    /// Suggestion client error.
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Mapping or schema file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error outside workbook reading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested sheet is not in the workbook.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// The output schema does not compile.
    #[error("{0}")]
    InvalidSchema(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Session error.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Suggestion client error.
    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    /// Registry error.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// A feature is not configured (e.g. no API key).
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for workbook operations.
pub type WorkbookResult<T> = Result<T, WorkbookError>;

/// Result type for AI operations.
pub type AiResult<T> = Result<T, AiError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // WorkbookError -> SessionError -> PipelineError
        let wb_err = WorkbookError::NoSheets;
        let session_err: SessionError = wb_err.into();
        let pipeline_err: PipelineError = session_err.into();
        assert!(pipeline_err.to_string().contains("no sheets"));

        // AiError -> PipelineError
        let ai_err = AiError::MissingApiKey("ANTHROPIC_API_KEY not set".into());
        let pipeline_err: PipelineError = ai_err.into();
        assert!(pipeline_err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_session_error_passes_through_server_error() {
        let err: ServerError = SessionError::UnknownSheet("Sheet9".into()).into();
        assert_eq!(err.to_string(), "Unknown sheet: Sheet9");
    }
}
