//! Structural comparison for dirty-state tracking
//!
//! Snapshots only ever hold declared-property values, so runtime flags
//! (`loading`, `saving`) can never make an entity look dirty.

use serde_json::{Map, Value};

/// Deep equality over json values.
///
/// Numbers compare by value (`1` equals `1.0`), objects ignore key order.
pub fn deep_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            if a == b {
                return true;
            }
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => maps_equal(a, b),
        _ => left == right,
    }
}

pub fn maps_equal(left: &Map<String, Value>, right: &Map<String, Value>) -> bool {
    left.len() == right.len()
        && left.iter().all(|(key, value)| {
            right
                .get(key)
                .map(|other| deep_equal(value, other))
                .unwrap_or(false)
        })
}

/// Copy of `values` restricted to `keys`; keys without a value stay absent
pub fn capture<'a>(
    values: &Map<String, Value>,
    keys: impl IntoIterator<Item = &'a String>,
) -> Map<String, Value> {
    keys.into_iter()
        .filter_map(|key| {
            values.get(key).map(|value| (key.clone(), value.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(!deep_equal(&json!(1), &json!(2)));
        assert!(!deep_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn test_nested_structures() {
        let a = json!({"tags": ["a", "b"], "meta": {"x": 1, "y": null}});
        let b = json!({"meta": {"y": null, "x": 1.0}, "tags": ["a", "b"]});
        assert!(deep_equal(&a, &b));

        let c = json!({"tags": ["b", "a"], "meta": {"x": 1, "y": null}});
        assert!(!deep_equal(&a, &c));
    }

    #[test]
    fn test_null_differs_from_absent() {
        let with_null = json!({"a": null}).as_object().cloned().unwrap_or_default();
        let empty = Map::new();
        assert!(!maps_equal(&with_null, &empty));
    }

    #[test]
    fn test_capture_skips_missing_and_undeclared() {
        let values = json!({"a": 1, "b": 2, "_internal": true});
        let keys = vec!["a".to_string(), "c".to_string()];
        let captured = capture(values.as_object().unwrap(), &keys);
        assert_eq!(Value::Object(captured), json!({"a": 1}));
    }
}
