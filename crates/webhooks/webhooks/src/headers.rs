//! Case-insensitive header access over heterogeneous header sources.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Case-insensitive lookup over a header source.
///
/// Sources may carry a header more than once; `get` returns the first
/// occurrence whose coerced value is non-empty. Values are trimmed and
/// scalars (strings, booleans, numbers) are coerced to strings.
#[derive(Debug, Clone, Default)]
pub struct HeaderAccessor {
    // Lower-cased name to occurrences in insertion order.
    headers: HashMap<String, Vec<String>>,
}

impl HeaderAccessor {
    /// Creates an empty accessor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an accessor from (name, value) pairs.
    ///
    /// Repeated names accumulate as separate occurrences.
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        let mut accessor = Self::new();
        for (name, value) in pairs {
            accessor.insert(name, value);
        }
        accessor
    }

    /// Builds an accessor from a JSON object of header values.
    ///
    /// Values may be scalars or arrays of scalars; arrays become
    /// multiple occurrences of the same header.
    pub fn from_json(headers: &Map<String, Value>) -> Self {
        let mut accessor = Self::new();
        for (name, value) in headers {
            match value {
                Value::Array(entries) => {
                    for entry in entries {
                        if let Some(coerced) = coerce_scalar(entry) {
                            accessor.push_raw(name, coerced);
                        }
                    }
                }
                other => {
                    if let Some(coerced) = coerce_scalar(other) {
                        accessor.push_raw(name, coerced);
                    }
                }
            }
        }
        accessor
    }

    /// Appends a header occurrence.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.push_raw(&name.into(), value.into());
    }

    fn push_raw(&mut self, name: &str, value: String) {
        self.headers
            .entry(name.to_lowercase())
            .or_default()
            .push(value);
    }

    /// Returns the first non-empty value for a header, case-insensitively.
    pub fn get(&self, name: &str) -> Option<String> {
        let occurrences = self.headers.get(&name.to_lowercase())?;
        occurrences.iter().find_map(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    /// Produces the fully lower-cased normalized map for bulk consumers.
    ///
    /// Headers with no non-empty occurrence are omitted.
    pub fn normalized(&self) -> HashMap<String, String> {
        let mut normalized = HashMap::new();
        for name in self.headers.keys() {
            if let Some(value) = self.get(name) {
                normalized.insert(name.clone(), value);
            }
        }
        normalized
    }

    /// Whether the accessor holds no headers at all.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

fn coerce_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
