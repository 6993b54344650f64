//! Transformation module.
//!
//! This module handles table to JSON transformation:
//! - Mapping: Rule list and field types
//! - Coerce: Per-type value conversion
//! - Path: Dotted-path assignment into output objects
//! - Executor: Applies the rules to every row
//! - Export: Pretty JSON output and file naming
//! - Pipeline: Main conversion pipeline

pub mod coerce;
pub mod executor;
pub mod export;
pub mod mapping;
pub mod path;
pub mod pipeline;

pub use coerce::coerce;
pub use executor::{transform, transform_row, transform_with_policy};
pub use export::{export_file_name, export_file_name_now, to_pretty_json, ExportSummary};
pub use mapping::{FieldType, MappingConfig, MappingRule, RuleUpdate};
pub use path::{assign_path, CollisionPolicy};
pub use pipeline::*;
