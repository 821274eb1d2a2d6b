//! Canonical JSON encoding used to make [`super::fingerprint`] a pure
//! function of its logical inputs: object keys sorted, no insignificant
//! whitespace, numbers rendered as their shortest round-trip decimal.

use serde_json::Value;

/// Renders `value` as canonical JSON text.
///
/// `serde_json::Number`'s `Display` already produces the shortest
/// round-trip decimal for both integers and floats, so the only work left
/// is sorting object keys and suppressing whitespace — `serde_json`'s
/// compact writer does the latter for free.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sort_keys(value)).expect("Value serializes infallibly")
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let value = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json(&value), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn sorts_nested_object_keys() {
        let value = json!({"outer": {"z": 1, "a": 2}});
        assert_eq!(canonical_json(&value), r#"{"outer":{"a":2,"z":1}}"#);
    }

    #[test]
    fn has_no_insignificant_whitespace() {
        let value = json!({"a": [1, 2, 3], "b": "text"});
        let rendered = canonical_json(&value);
        assert!(!rendered.contains(' '));
    }

    #[test]
    fn is_deterministic_across_key_insertion_order() {
        let mut first = serde_json::Map::new();
        first.insert("b".to_string(), json!(1));
        first.insert("a".to_string(), json!(2));

        let mut second = serde_json::Map::new();
        second.insert("a".to_string(), json!(2));
        second.insert("b".to_string(), json!(1));

        assert_eq!(
            canonical_json(&Value::Object(first)),
            canonical_json(&Value::Object(second))
        );
    }

    #[test]
    fn renders_floats_as_shortest_round_trip() {
        let value = json!({"temperature": 0.7});
        assert_eq!(canonical_json(&value), r#"{"temperature":0.7}"#);
    }
}
