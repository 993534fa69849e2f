//! Schema validation for webhook payloads.
//!
//! The webhook parser consumes validation as a synchronous,
//! result-returning service keyed by event name. The registry holds
//! JSON-Schema documents; the registry-backed validator checks a schema
//! subset (type, required, properties, format, minimum, maximum, items).

mod error;
mod registry;
mod validator;

pub use error::{SchemaValidationError, SchemaViolation};
pub use registry::SchemaRegistry;
pub use validator::{NoopSchemaValidator, RegistrySchemaValidator, SchemaValidator};
