//! Mapping configuration.
//!
//! A [`MappingConfig`] is an ordered list of [`MappingRule`]s. Each rule
//! reads one source column, coerces it to a [`FieldType`] and writes it at a
//! dotted target path in the output document.
//!
//! JSON shape (compatible with mapping files produced by the editor):
//!
//! ```json
//! {
//!   "fields": [
//!     { "id": "…", "targetKey": "user.name", "sourceColumn": "Name", "type": "String" },
//!     { "id": "…", "targetKey": "tags", "sourceColumn": "Tags", "type": "Array (Split by comma)" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Field types
// =============================================================================

/// Declared output type of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FieldType {
    #[default]
    String,
    Number,
    Boolean,
    /// Split on `,` or `，` into an array of strings
    Array,
    /// Passed through as text
    Date,
}

impl FieldType {
    pub const ALL: [FieldType; 5] = [
        FieldType::String,
        FieldType::Number,
        FieldType::Boolean,
        FieldType::Array,
        FieldType::Date,
    ];

    /// Display name, as written in mapping files.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Number => "Number",
            FieldType::Boolean => "Boolean",
            FieldType::Array => "Array (Split by comma)",
            FieldType::Date => "Date",
        }
    }

    /// Parse a type label. Accepts display names and bare variant names in
    /// any case; anything unrecognized is `String`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "number" => FieldType::Number,
            "boolean" | "bool" => FieldType::Boolean,
            "array" | "array (split by comma)" => FieldType::Array,
            "date" => FieldType::Date,
            _ => FieldType::String,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(FieldType::from_label(&label))
    }
}

// =============================================================================
// Rules
// =============================================================================

fn new_rule_id() -> String {
    Uuid::new_v4().to_string()
}

/// One source column → target path conversion.
///
/// An empty `target_path` or `source_column` makes the rule inert: it writes
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    #[serde(default = "new_rule_id")]
    pub id: String,

    /// Dotted output path (e.g. `address.city`)
    #[serde(rename = "targetKey", alias = "targetPath", default)]
    pub target_path: String,

    /// Header name in the source table
    #[serde(default)]
    pub source_column: String,

    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl MappingRule {
    /// A new rule with a fresh id.
    pub fn new(target_path: &str, source_column: &str, field_type: FieldType) -> Self {
        Self {
            id: new_rule_id(),
            target_path: target_path.to_string(),
            source_column: source_column.to_string(),
            field_type,
        }
    }

    /// An empty String rule, as added by the editor.
    pub fn blank() -> Self {
        Self::new("", "", FieldType::String)
    }

    /// True when both target path and source column are set.
    pub fn is_complete(&self) -> bool {
        !self.target_path.is_empty() && !self.source_column.is_empty()
    }

    pub fn apply_update(&mut self, update: RuleUpdate) {
        if let Some(target) = update.target_path {
            self.target_path = target;
        }
        if let Some(source) = update.source_column {
            self.source_column = source;
        }
        if let Some(field_type) = update.field_type {
            self.field_type = field_type;
        }
    }
}

/// Partial update of a rule. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    #[serde(rename = "targetKey", alias = "targetPath", default)]
    pub target_path: Option<String>,
    #[serde(default)]
    pub source_column: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: Option<FieldType>,
}

// =============================================================================
// Configuration
// =============================================================================

/// The active, ordered rule list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub fields: Vec<MappingRule>,
}

impl MappingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(fields: Vec<MappingRule>) -> Self {
        Self { fields }
    }

    /// Parse a mapping from JSON. Accepts `{"fields": [...]}` or a bare array.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<MappingConfig>(json)
            .or_else(|_| serde_json::from_str::<Vec<MappingRule>>(json).map(Self::from_rules))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&MappingRule> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Append an empty rule and return its id.
    pub fn add_blank(&mut self) -> String {
        let rule = MappingRule::blank();
        let id = rule.id.clone();
        self.fields.push(rule);
        id
    }

    /// Remove a rule. Returns false when no rule has this id.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| f.id != id);
        self.fields.len() != before
    }

    /// Apply a partial update. Returns false when no rule has this id.
    pub fn update(&mut self, id: &str, update: RuleUpdate) -> bool {
        match self.fields.iter_mut().find(|f| f.id == id) {
            Some(rule) => {
                rule.apply_update(update);
                true
            }
            None => false,
        }
    }

    /// Distinct non-empty source columns, in rule order.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for rule in &self.fields {
            if !rule.source_column.is_empty() && !columns.contains(&rule.source_column) {
                columns.push(rule.source_column.clone());
            }
        }
        columns
    }

    /// Rules whose source column is set but missing from `headers`.
    ///
    /// These are inert during transformation; callers may flag them.
    pub fn dangling_rules(&self, headers: &[String]) -> Vec<&MappingRule> {
        self.fields
            .iter()
            .filter(|r| !r.source_column.is_empty() && !headers.contains(&r.source_column))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_labels() {
        assert_eq!(FieldType::from_label("Array (Split by comma)"), FieldType::Array);
        assert_eq!(FieldType::from_label("array"), FieldType::Array);
        assert_eq!(FieldType::from_label("NUMBER"), FieldType::Number);
        assert_eq!(FieldType::from_label(" Boolean "), FieldType::Boolean);
        assert_eq!(FieldType::from_label("Date"), FieldType::Date);
        assert_eq!(FieldType::from_label("Integer"), FieldType::String);
        assert_eq!(FieldType::from_label(""), FieldType::String);

        for t in FieldType::ALL {
            assert_eq!(FieldType::from_label(t.as_str()), t);
        }
    }

    #[test]
    fn test_rule_json_shape() {
        let rule = MappingRule::new("user.name", "Name", FieldType::Array);
        let value = serde_json::to_value(&rule).unwrap();

        assert_eq!(value["targetKey"], "user.name");
        assert_eq!(value["sourceColumn"], "Name");
        assert_eq!(value["type"], "Array (Split by comma)");
        assert!(value["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[test]
    fn test_rule_defaults_on_missing_fields() {
        let rule: MappingRule = serde_json::from_str(r#"{"targetPath": "a", "type": "weird"}"#).unwrap();

        assert_eq!(rule.target_path, "a");
        assert_eq!(rule.source_column, "");
        assert_eq!(rule.field_type, FieldType::String);
        assert!(!rule.id.is_empty());
        assert!(!rule.is_complete());
    }

    #[test]
    fn test_config_accepts_bare_array() {
        let json = r#"[{"targetKey": "a", "sourceColumn": "A", "type": "Number"}]"#;
        let config = MappingConfig::from_json(json).unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config.fields[0].field_type, FieldType::Number);

        let wrapped = MappingConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(wrapped, config);
    }

    #[test]
    fn test_editor_operations() {
        let mut config = MappingConfig::new();
        let id = config.add_blank();
        assert_eq!(config.len(), 1);
        assert!(!config.fields[0].is_complete());

        let updated = config.update(
            &id,
            RuleUpdate {
                target_path: Some("price".into()),
                source_column: Some("Price".into()),
                ..Default::default()
            },
        );
        assert!(updated);
        let rule = config.get(&id).unwrap();
        assert_eq!(rule.target_path, "price");
        assert_eq!(rule.field_type, FieldType::String);
        assert!(rule.is_complete());

        assert!(!config.update("nope", RuleUpdate::default()));
        assert!(config.remove(&id));
        assert!(!config.remove(&id));
        assert!(config.is_empty());
    }

    #[test]
    fn test_rule_ids_unique() {
        let mut config = MappingConfig::new();
        let a = config.add_blank();
        let b = config.add_blank();
        assert_ne!(a, b);
    }

    #[test]
    fn test_source_columns_and_dangling() {
        let config = MappingConfig::from_rules(vec![
            MappingRule::new("a", "A", FieldType::String),
            MappingRule::new("b", "B", FieldType::String),
            MappingRule::new("a2", "A", FieldType::Number),
            MappingRule::new("c", "", FieldType::String),
        ]);

        assert_eq!(config.source_columns(), vec!["A", "B"]);

        let headers = vec!["A".to_string()];
        let dangling = config.dangling_rules(&headers);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].target_path, "b");
    }
}
