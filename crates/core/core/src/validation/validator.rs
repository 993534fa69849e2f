//! Payload validation against registered schemas.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::validation::error::{SchemaValidationError, SchemaViolation};
use crate::validation::registry::SchemaRegistry;

/// Validates webhook payloads against the schema registered for an event.
///
/// Implementations are synchronous; the parser calls them on the request
/// thread between payload decoding and event hydration. On success the
/// (possibly normalized) payload is returned.
pub trait SchemaValidator: Send + Sync {
    /// Validates `payload` for `event_name`.
    fn validate(
        &self,
        event_name: &str,
        payload: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SchemaValidationError>;
}

/// Validator that accepts every payload unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSchemaValidator;

impl SchemaValidator for NoopSchemaValidator {
    fn validate(
        &self,
        _event_name: &str,
        payload: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SchemaValidationError> {
        Ok(payload.clone())
    }
}

/// Registry-backed validator implementing a JSON-Schema subset.
///
/// Events with no registered schema validate as pass-through.
pub struct RegistrySchemaValidator {
    registry: Arc<SchemaRegistry>,
}

impl RegistrySchemaValidator {
    /// Creates a validator over the given registry.
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    /// The backing schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }
}

impl SchemaValidator for RegistrySchemaValidator {
    fn validate(
        &self,
        event_name: &str,
        payload: &Map<String, Value>,
    ) -> Result<Map<String, Value>, SchemaValidationError> {
        let Some(schema) = self.registry.get(event_name) else {
            return Ok(payload.clone());
        };

        let mut violations = Vec::new();

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            violations.extend(validate_required(payload, required));
        }

        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            violations.extend(validate_properties(payload, properties));
        }

        if violations.is_empty() {
            Ok(payload.clone())
        } else {
            Err(
                SchemaValidationError::new(format!("Invalid webhook payload for {event_name}"))
                    .with_violations(violations),
            )
        }
    }
}

fn validate_required(obj: &Map<String, Value>, required: &[Value]) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    for field in required {
        if let Some(field_name) = field.as_str() {
            if !obj.contains_key(field_name) {
                violations.push(SchemaViolation::new(
                    field_name,
                    "required",
                    format!("Required field '{field_name}' is missing"),
                ));
            }
        }
    }

    violations
}

fn validate_properties(
    obj: &Map<String, Value>,
    properties: &Map<String, Value>,
) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();

    for (field_name, field_schema) in properties {
        let Some(field_value) = obj.get(field_name) else {
            continue;
        };

        if let Some(expected_type) = field_schema.get("type").and_then(Value::as_str) {
            if let Some(violation) = validate_type(field_value, expected_type, field_name) {
                violations.push(violation);
            }
        }

        if let Some(format) = field_schema.get("format").and_then(Value::as_str) {
            if let Some(string_value) = field_value.as_str() {
                if !validate_format(string_value, format) {
                    violations.push(SchemaViolation::new(
                        field_name,
                        "format",
                        format!("Invalid format: expected {format}"),
                    ));
                }
            }
        }

        if field_value.is_number() {
            if let Some(minimum) = field_schema.get("minimum").and_then(Value::as_f64) {
                if let Some(num) = field_value.as_f64() {
                    if num < minimum {
                        violations.push(SchemaViolation::new(
                            field_name,
                            "minimum",
                            format!("Value {num} is less than minimum {minimum}"),
                        ));
                    }
                }
            }

            if let Some(maximum) = field_schema.get("maximum").and_then(Value::as_f64) {
                if let Some(num) = field_value.as_f64() {
                    if num > maximum {
                        violations.push(SchemaViolation::new(
                            field_name,
                            "maximum",
                            format!("Value {num} is greater than maximum {maximum}"),
                        ));
                    }
                }
            }
        }

        if let Some(items_schema) = field_schema.get("items") {
            if let Some(array) = field_value.as_array() {
                if let Some(item_type) = items_schema.get("type").and_then(Value::as_str) {
                    for (i, item) in array.iter().enumerate() {
                        let item_path = format!("{field_name}[{i}]");
                        if let Some(violation) = validate_type(item, item_type, &item_path) {
                            violations.push(violation);
                        }
                    }
                }
            }
        }
    }

    violations
}

fn validate_type(value: &Value, expected_type: &str, path: &str) -> Option<SchemaViolation> {
    let matches = match expected_type {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true, // Unknown type
    };

    if matches {
        None
    } else {
        Some(SchemaViolation::new(
            path,
            "type",
            format!("Expected {expected_type}, got {}", json_type_of(value)),
        ))
    }
}

fn json_type_of(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Null => "null",
    }
}

fn validate_format(value: &str, format: &str) -> bool {
    match format {
        "email" => value.contains('@'),
        "uri" | "url" => value.starts_with("http://") || value.starts_with("https://"),
        "date-time" => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        _ => true, // Unknown format, skip validation
    }
}
