//! Registry of JSON-Schema documents keyed by webhook event name.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

/// Thread-safe store of schema documents.
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Value>>,
}

impl SchemaRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a schema for an event name, replacing any previous one.
    pub fn register(&self, event_name: impl Into<String>, schema: Value) {
        let mut schemas = self.schemas.write().unwrap();
        schemas.insert(event_name.into(), schema);
    }

    /// Registers multiple schemas.
    pub fn register_all(&self, entries: impl IntoIterator<Item = (String, Value)>) {
        let mut schemas = self.schemas.write().unwrap();
        for (event_name, schema) in entries {
            schemas.insert(event_name, schema);
        }
    }

    /// Registers every webhook schema found in a provider API document.
    ///
    /// The document is expected to carry a `webhooks` object mapping event
    /// names to operations; the request-body JSON schema of each `post`
    /// (or `put`) operation is extracted. Shared `components` from the
    /// document are attached to each schema so `$ref`s keep resolving.
    /// Returns the number of schemas registered.
    pub fn register_document(&self, document: &Value) -> usize {
        let Some(webhooks) = document.get("webhooks").and_then(Value::as_object) else {
            return 0;
        };
        let components = document.get("components").and_then(Value::as_object);

        let mut registered = 0;
        for (event_name, definition) in webhooks {
            let Some(mut schema) = extract_request_schema(definition) else {
                continue;
            };
            if let Some(object) = schema.as_object_mut() {
                if !object.contains_key("$schema") {
                    object.insert(
                        "$schema".to_string(),
                        Value::String("https://json-schema.org/draft/2020-12/schema".to_string()),
                    );
                }
                if let Some(components) = components {
                    if !object.contains_key("components") {
                        object.insert("components".to_string(), Value::Object(components.clone()));
                    }
                }
            }
            self.register(event_name.clone(), schema);
            registered += 1;
        }

        registered
    }

    /// Gets the schema registered for an event name.
    pub fn get(&self, event_name: &str) -> Option<Value> {
        let schemas = self.schemas.read().unwrap();
        schemas.get(event_name).cloned()
    }

    /// Checks whether a schema is registered for an event name.
    pub fn contains(&self, event_name: &str) -> bool {
        let schemas = self.schemas.read().unwrap();
        schemas.contains_key(event_name)
    }

    /// Returns the number of registered schemas.
    pub fn len(&self) -> usize {
        let schemas = self.schemas.read().unwrap();
        schemas.len()
    }

    /// Checks if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all registered schemas.
    pub fn clear(&self) {
        let mut schemas = self.schemas.write().unwrap();
        schemas.clear();
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn extract_request_schema(definition: &Value) -> Option<Value> {
    let operation = definition.get("post").or_else(|| definition.get("put"))?;
    operation
        .get("requestBody")?
        .get("content")?
        .get("application/json")?
        .get("schema")
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_get() {
        let registry = SchemaRegistry::new();

        registry.register("payment.confirmed", json!({"type": "object"}));

        assert!(registry.contains("payment.confirmed"));
        assert!(!registry.contains("payment.failed"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_document() {
        let registry = SchemaRegistry::new();

        let document = json!({
            "components": {"schemas": {}},
            "webhooks": {
                "payment.confirmed": {
                    "post": {
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"type": "object", "required": ["event"]}
                                }
                            }
                        }
                    }
                },
                "no.schema.here": {"get": {}}
            }
        });

        assert_eq!(registry.register_document(&document), 1);

        let schema = registry.get("payment.confirmed").unwrap();
        assert_eq!(schema["required"], json!(["event"]));
        assert!(schema.get("$schema").is_some());
        assert!(schema.get("components").is_some());
    }

    #[test]
    fn test_register_document_without_webhooks() {
        let registry = SchemaRegistry::new();
        assert_eq!(registry.register_document(&json!({"openapi": "3.1.0"})), 0);
        assert!(registry.is_empty());
    }
}
