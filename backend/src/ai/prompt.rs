//! Prompt generation for mapping suggestions
//!
//! The model sees the column headers and the user's instruction, and must
//! answer with a JSON array of `{targetKey, sourceColumn, type}` objects.

use serde_json::{json, Value};

use crate::transform::mapping::FieldType;

/// Generate the system prompt
pub fn system_prompt() -> String {
    let types = FieldType::ALL
        .iter()
        .map(|t| format!("\"{}\"", t.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a data mapping assistant. Your task is to map spreadsheet columns onto the fields of a JSON document described by the user.

## Output Format

Return ONLY a JSON array. Each element describes one output field:

```json
[
  {{ "targetKey": "user.name", "sourceColumn": "Full Name", "type": "String" }}
]
```

- `targetKey`: dotted path of the field in the output document (`address.city` nests `city` inside `address`)
- `sourceColumn`: one of the provided column headers, copied exactly (case-sensitive)
- `type`: one of {types}

## Rules

1. Use ONLY the column headers you are given
2. Use "Array (Split by comma)" for columns holding comma-separated lists
3. Use "Number" for quantities, prices and identifiers that are purely numeric
4. Use "Boolean" for yes/no, true/false or 1/0 flags
5. Omit fields you cannot map to a column
6. If the instruction is vague, make a best-effort mapping of every column using camelCase keys
7. Return ONLY the JSON array, no explanations"#,
        types = types
    )
}

/// Generate the user prompt from the headers and the instruction
pub fn user_prompt(headers: &[String], instruction: &str) -> String {
    let headers_json = serde_json::to_string_pretty(headers).unwrap_or_default();

    format!(
        r#"## Column Headers ({count})

```json
{headers_json}
```

## Instruction

{instruction}

Return the JSON array now."#,
        count = headers.len(),
        headers_json = headers_json,
        instruction = instruction.trim()
    )
}

/// Build the messages array for the API call
pub fn build_messages(headers: &[String], instruction: &str) -> Vec<Value> {
    vec![json!({
        "role": "user",
        "content": user_prompt(headers, instruction)
    })]
}
