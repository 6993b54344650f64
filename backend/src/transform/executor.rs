//! Mapping executor.
//!
//! Applies an ordered rule list to every row of a [`CanonicalTable`],
//! producing one JSON object per row.

use serde_json::{Map, Value};

use super::coerce::coerce;
use super::mapping::MappingRule;
use super::path::{assign_path, CollisionPolicy, DEFAULT_COLLISION_POLICY};
use crate::models::{CanonicalTable, RowRecord};

/// Transform every row of `table` with `rules`.
///
/// No rules means no output: the result is empty, not one `{}` per row.
/// Incomplete rules are skipped. When two rules write the same path the later
/// one wins.
pub fn transform(table: &CanonicalTable, rules: &[MappingRule]) -> Vec<Value> {
    transform_with_policy(table, rules, DEFAULT_COLLISION_POLICY)
}

/// [`transform`] with an explicit path collision policy.
pub fn transform_with_policy(
    table: &CanonicalTable,
    rules: &[MappingRule],
    policy: CollisionPolicy,
) -> Vec<Value> {
    if rules.is_empty() {
        return Vec::new();
    }

    table
        .rows
        .iter()
        .map(|row| transform_row(row, rules, policy))
        .collect()
}

/// Build the output document for a single row.
pub fn transform_row(row: &RowRecord, rules: &[MappingRule], policy: CollisionPolicy) -> Value {
    let mut doc = Map::new();

    for rule in rules.iter().filter(|r| r.is_complete()) {
        let value = coerce(row.get(&rule.source_column), rule.field_type);
        assign_path(&mut doc, &rule.target_path, value, policy);
    }

    Value::Object(doc)
}
