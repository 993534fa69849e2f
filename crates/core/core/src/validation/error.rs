//! Schema validation error types.

use serde::Serialize;
use thiserror::Error;

/// A single schema violation with its location in the payload.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaViolation {
    /// Path of the offending value (e.g. `fees[2]`).
    pub path: String,
    /// Schema keyword that failed (e.g. `type`, `required`).
    pub keyword: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl SchemaViolation {
    /// Creates a new violation.
    pub fn new(
        path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }
}

/// Error raised when a payload does not match its registered schema.
///
/// Terminal for the current request; carries a structured breakdown of
/// every violation found.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SchemaValidationError {
    message: String,
    violations: Vec<SchemaViolation>,
}

impl SchemaValidationError {
    /// Creates an error with a message and no violation details.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            violations: Vec::new(),
        }
    }

    /// Attaches the violation breakdown.
    pub fn with_violations(mut self, violations: Vec<SchemaViolation>) -> Self {
        self.violations = violations;
        self
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Per-violation path/keyword/message breakdown.
    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}
