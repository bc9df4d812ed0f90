//! Response wrapping for frontend compatibility.
//!
//! The dashboard expects every result as `{success: true, ...data}`. Struct
//! results are flattened into that object; anything else is nested under a
//! method-specific key.

use serde_json::{json, Map, Value};

/// Wrap an API result in the frontend's response envelope.
pub fn wrap_response(method: &str, result: Value) -> Value {
    match (method, result) {
        ("health_check", result) => result,

        ("ledger_health", result) => json!({
            "success": true,
            "ledger": result,
        }),

        (_, Value::Object(fields)) => {
            let mut wrapped = Map::with_capacity(fields.len() + 1);
            wrapped.insert("success".to_string(), Value::Bool(true));
            wrapped.extend(fields);
            Value::Object(wrapped)
        }

        (_, Value::Null) => json!({ "success": true }),

        (_, other) => json!({
            "success": true,
            "result": other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_are_flattened() {
        let wrapped = wrap_response("list_items", json!({"items": [], "category": "movies"}));
        assert_eq!(wrapped["success"], true);
        assert_eq!(wrapped["category"], "movies");
        assert!(wrapped["items"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_ledger_health_is_nested() {
        let wrapped = wrap_response("ledger_health", json!({"status": "healthy"}));
        assert_eq!(wrapped["ledger"]["status"], "healthy");
        assert_eq!(wrapped["success"], true);
    }

    #[test]
    fn test_scalars_are_nested() {
        assert_eq!(wrap_response("x", json!(3))["result"], 3);
        assert_eq!(wrap_response("x", Value::Null), json!({"success": true}));
    }
}
