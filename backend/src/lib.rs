//! # Sheetjson - Spreadsheet to JSON conversion through field mappings
//!
//! Sheetjson reads a workbook (xlsx, xls, ods, csv...), turns one sheet into
//! a named-column table, and applies an ordered list of mapping rules to
//! produce one JSON document per row. Rules can be written by hand, loaded
//! from stored templates, or suggested by an AI model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│  Normalize  │────▶│  Transform  │────▶│  JSON docs  │
//! │ (xlsx/csv)  │     │ (header row)│     │ (rules)     │     │  (export)   │
//! └─────────────┘     └─────────────┘     └──────▲──────┘     └─────────────┘
//!                                                │
//!                                   editor / templates / AI
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sheetjson::{convert_file, ConvertOptions, FieldType, MappingConfig, MappingRule};
//! use std::path::Path;
//!
//! let mapping = MappingConfig::from_rules(vec![
//!     MappingRule::new("customer.name", "Name", FieldType::String),
//!     MappingRule::new("tags", "Tags", FieldType::Array),
//! ]);
//! let result = convert_file(Path::new("customers.xlsx"), &mapping, &ConvertOptions::default())?;
//! println!("{}", sheetjson::to_pretty_json(&result.documents)?);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per concern
//! - [`config`] - AI client and server settings
//! - [`models`] - Cell values, rows and canonical tables
//! - [`parser`] - Workbook reading and sheet normalization
//! - [`transform`] - Mapping rules, coercion, path assignment, export, pipeline
//! - [`validation`] - Optional JSON Schema checks of the output
//! - [`session`] - Shared editing workspace
//! - [`cache`] - Stored mapping templates
//! - [`ai`] - AI mapping suggestions
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Session
pub mod session;

// Templates
pub mod cache;

// AI
pub mod ai;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    AiError, PipelineError, PipelineResult, RegistryError, ServerError, SessionError,
    WorkbookError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CanonicalTable, CellValue, RawGrid, RowRecord, TablePreview, PREVIEW_ROWS};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, normalize, read_workbook_bytes,
    read_workbook_file, Workbook, WorkbookFormat,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    coerce, export_file_name, export_file_name_now, to_pretty_json, transform, CollisionPolicy,
    FieldType, MappingConfig, MappingRule, RuleUpdate,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid, validate, validate_documents, ValidationReport};

// =============================================================================
// Re-exports - Session, AI, Registry
// =============================================================================

pub use ai::{accept_suggestions, AiClient, CandidateField, MappingSuggester, SuggestionRequest};
pub use cache::{MappingRegistry, StoredMapping};
pub use config::{AiConfig, ServerConfig};
pub use session::{SelectOutcome, SuggestOutcome, Workspace};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    convert_file, convert_workbook, load_table, ConvertOptions, ConvertResult, TableInfo,
};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
