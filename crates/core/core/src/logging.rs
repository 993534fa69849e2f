//! Redaction of sensitive values in structured log context.

use serde_json::{Map, Value};

const REDACTED_PLACEHOLDER: &str = "***REDACTED***";

/// Keys whose values are never written to the log sink.
const SENSITIVE_KEYS: &[&str] = &[
    "authorization",
    "x-api-key",
    "x-client-id",
    "x-request-network-signature",
    "x-request-network-secret",
    "signature",
    "secret",
    "matchedsecret",
    "password",
];

/// Replaces sensitive values in log context maps before emission.
///
/// Key matching is case-insensitive and recurses into nested objects.
#[derive(Debug, Clone)]
pub struct Redactor {
    sensitive_keys: Vec<String>,
}

impl Redactor {
    /// Creates a redactor with the default sensitive-key set.
    pub fn new() -> Self {
        Self {
            sensitive_keys: SENSITIVE_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Adds a key to the sensitive set.
    pub fn with_sensitive_key(mut self, key: impl Into<String>) -> Self {
        self.sensitive_keys.push(key.into().to_lowercase());
        self
    }

    /// Returns a copy of `context` with sensitive values replaced.
    pub fn redact_context(&self, context: &Map<String, Value>) -> Map<String, Value> {
        let mut redacted = Map::new();
        for (key, value) in context {
            redacted.insert(key.clone(), self.redact_value(key, value));
        }
        redacted
    }

    /// Redacts a single keyed value, recursing into objects.
    pub fn redact_value(&self, key: &str, value: &Value) -> Value {
        if self.is_sensitive(key) {
            return Value::String(REDACTED_PLACEHOLDER.to_string());
        }

        match value {
            Value::Object(map) => Value::Object(self.redact_context(map)),
            other => other.clone(),
        }
    }

    /// Whether values under `key` must be redacted.
    pub fn is_sensitive(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        self.sensitive_keys.iter().any(|k| *k == lower)
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}
