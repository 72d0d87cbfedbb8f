//! Normalization of remote field values.
//!
//! The remote system returns values in heterogeneous shapes: plain strings,
//! numbers, booleans, reference objects (`{"link": .., "value": ..}`) and
//! display objects (`{"display_value": .., "value": ..}`). Desired state is
//! always text, so every remote value is normalized to a string before it
//! is compared.

use serde_json::Value;
use std::collections::BTreeMap;

/// A live record as returned by the Table API.
pub type RemoteRecord = BTreeMap<String, Value>;

/// Normalizes a remote value to its comparable string form.
///
/// - strings are returned as-is
/// - numbers and booleans use their JSON text
/// - `null` becomes the empty string
/// - objects with a `value` (or else `display_value`) key normalize to it
/// - any other structure becomes compact JSON
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => match map.get("value").or_else(|| map.get("display_value")) {
            Some(inner) => normalize_value(inner),
            None => value.to_string(),
        },
        Value::Array(_) => value.to_string(),
    }
}

/// Returns the normalized value of `field` in `record`, if present.
pub fn field_text(record: &RemoteRecord, field: &str) -> Option<String> {
    record.get(field).map(normalize_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn scalars() {
        assert_eq!(normalize_value(&json!("10.0.0.1")), "10.0.0.1");
        assert_eq!(normalize_value(&json!(4)), "4");
        assert_eq!(normalize_value(&json!(2.5)), "2.5");
        assert_eq!(normalize_value(&json!(true)), "true");
        assert_eq!(normalize_value(&Value::Null), "");
    }

    #[test]
    fn reference_object_uses_value() {
        let reference = json!({"link": "https://x/api/now/table/core_company/42", "value": "42"});
        assert_eq!(normalize_value(&reference), "42");
    }

    #[test]
    fn display_object_falls_back_to_display_value() {
        let display = json!({"display_value": "Linux Server"});
        assert_eq!(normalize_value(&display), "Linux Server");
    }

    #[test]
    fn nested_reference_value_is_normalized() {
        let nested = json!({"value": 7});
        assert_eq!(normalize_value(&nested), "7");
    }

    #[test]
    fn other_structures_are_compact_json() {
        assert_eq!(normalize_value(&json!([1, 2])), "[1,2]");
        assert_eq!(normalize_value(&json!({"a": 1})), "{\"a\":1}");
    }

    #[test]
    fn field_text_lookup() {
        let mut record = RemoteRecord::new();
        record.insert("cpu_count".into(), json!(8));
        assert_eq!(field_text(&record, "cpu_count").as_deref(), Some("8"));
        assert_eq!(field_text(&record, "missing"), None);
    }

    proptest! {
        #[test]
        fn strings_normalize_to_themselves(s in ".*") {
            prop_assert_eq!(normalize_value(&Value::String(s.clone())), s);
        }

        #[test]
        fn integers_normalize_to_decimal_text(n in any::<i64>()) {
            prop_assert_eq!(normalize_value(&json!(n)), n.to_string());
        }
    }
}
