//! Per-type value coercion.
//!
//! Every coercion is total. The raw cell is stringified and trimmed first;
//! an absent or blank cell is `null` whatever the declared type.
//!
//! | Type    | Result                                                      |
//! |---------|-------------------------------------------------------------|
//! | String  | trimmed text                                                |
//! | Number  | parsed number, or the trimmed text when it does not parse   |
//! | Boolean | `true` for `true` / `1` / `yes` (case-insensitive)          |
//! | Array   | pieces split on `,` or `，`, trimmed, empties dropped       |
//! | Date    | trimmed text, unparsed                                      |

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use super::mapping::FieldType;
use crate::models::CellValue;

static ARRAY_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(",|，").expect("array separator pattern is valid"));

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Coerce a raw cell to the declared type.
pub fn coerce(raw: Option<&CellValue>, field_type: FieldType) -> Value {
    let Some(text) = raw.and_then(CellValue::to_text) else {
        return Value::Null;
    };
    let text = text.trim();

    match field_type {
        FieldType::String | FieldType::Date => Value::String(text.to_string()),
        FieldType::Number => {
            parse_number(text).unwrap_or_else(|| Value::String(text.to_string()))
        }
        FieldType::Boolean => Value::Bool(is_truthy(text)),
        FieldType::Array => Value::Array(
            ARRAY_SEPARATOR
                .split(text)
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .map(|piece| Value::String(piece.to_string()))
                .collect(),
        ),
    }
}

fn is_truthy(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower == "true" || text == "1" || lower == "yes"
}

/// Parse numeric text. Blank text is `0`; non-finite results do not count
/// as numbers.
fn parse_number(text: &str) -> Option<Value> {
    if text.is_empty() {
        return Some(Value::from(0));
    }

    let n: f64 = text.parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    Some(number_value(n))
}

/// Integral values within the exact range become JSON integers.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(v: &str, t: FieldType) -> Value {
        coerce(Some(&CellValue::from(v)), t)
    }

    #[test]
    fn test_string_trimmed() {
        assert_eq!(text("  hi ", FieldType::String), json!("hi"));
        assert_eq!(text("   ", FieldType::String), json!(""));
        assert_eq!(coerce(Some(&CellValue::Number(42.0)), FieldType::String), json!("42"));
        assert_eq!(coerce(Some(&CellValue::Bool(false)), FieldType::String), json!("false"));
    }

    #[test]
    fn test_absent_is_null_for_every_type() {
        for t in FieldType::ALL {
            assert_eq!(coerce(None, t), Value::Null);
            assert_eq!(coerce(Some(&CellValue::Empty), t), Value::Null);
        }
    }

    #[test]
    fn test_number() {
        assert_eq!(text("42", FieldType::Number), json!(42));
        assert_eq!(text(" 3.25 ", FieldType::Number), json!(3.25));
        assert_eq!(text("-7", FieldType::Number), json!(-7));
        assert_eq!(text("1e3", FieldType::Number), json!(1000));
        assert_eq!(coerce(Some(&CellValue::Number(2.5)), FieldType::Number), json!(2.5));
    }

    #[test]
    fn test_number_fallback_to_text() {
        assert_eq!(text("abc", FieldType::Number), json!("abc"));
        assert_eq!(text(" 12 apples ", FieldType::Number), json!("12 apples"));
        assert_eq!(text("inf", FieldType::Number), json!("inf"));
        assert_eq!(text("NaN", FieldType::Number), json!("NaN"));
    }

    #[test]
    fn test_number_blank_text_is_zero() {
        assert_eq!(text("  ", FieldType::Number), json!(0));
    }

    #[test]
    fn test_boolean() {
        for v in ["Yes", "1", "true", "TRUE", " yes "] {
            assert_eq!(text(v, FieldType::Boolean), json!(true), "{v}");
        }
        for v in ["no", "0", "", "false", "y", "oui"] {
            assert_eq!(text(v, FieldType::Boolean), json!(false), "{v}");
        }
        assert_eq!(coerce(Some(&CellValue::Bool(true)), FieldType::Boolean), json!(true));
        assert_eq!(coerce(Some(&CellValue::Number(1.0)), FieldType::Boolean), json!(true));
    }

    #[test]
    fn test_array() {
        assert_eq!(text("a, b,，c", FieldType::Array), json!(["a", "b", "c"]));
        assert_eq!(text("", FieldType::Array), json!([]));
        assert_eq!(text(" , ，", FieldType::Array), json!([]));
        assert_eq!(text("solo", FieldType::Array), json!(["solo"]));
        assert_eq!(text("红，绿, 蓝", FieldType::Array), json!(["红", "绿", "蓝"]));
    }

    #[test]
    fn test_date_passthrough() {
        assert_eq!(text(" 2024/01/31 ", FieldType::Date), json!("2024/01/31"));
        assert_eq!(text("next tuesday", FieldType::Date), json!("next tuesday"));
    }
}
