//! # Internal helpers
//!
//! Small pieces shared across modules: id generation and JSON-Schema
//! object construction.

use serde_json::{Map, Value};

/// Generate a id of the form `{prefix}-{uuid}`.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

/// Build a JSON-Schema object body from a property map and required list.
/// `properties` always serializes as an object, even when `properties` is
/// empty, matching the wire contract every `Tool` must honor.
pub fn schema_object(properties: Map<String, Value>, required: Vec<String>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_has_prefix_and_is_unique() {
        let a = generate_id("run");
        let b = generate_id("run");
        assert!(a.starts_with("run-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_schema_object_serializes_empty_properties_as_object() {
        let schema = schema_object(Map::new(), Vec::new());
        assert!(schema["properties"].is_object());
        assert_eq!(schema["required"], serde_json::json!([]));
    }
}
