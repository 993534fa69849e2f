//! # Request Client Core
//!
//! Cross-cutting services for the Request Network client SDK:
//! - JSON-Schema validation of webhook payloads, keyed by event name
//! - Redaction of sensitive fields in structured log context

pub mod logging;
pub mod validation;

// Re-export commonly used items at the crate root
pub use logging::Redactor;
pub use validation::{
    NoopSchemaValidator, RegistrySchemaValidator, SchemaRegistry, SchemaValidationError,
    SchemaValidator, SchemaViolation,
};
