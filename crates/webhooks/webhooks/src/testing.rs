//! Helpers for exercising webhook handling in tests.

use crate::headers::HeaderAccessor;
use crate::middleware::InboundRequest;
use crate::signature::{sign, DEFAULT_SIGNATURE_HEADER, SIGNATURE_ALGORITHM};

/// Default secret used by the test helpers.
pub const DEFAULT_TEST_SECRET: &str = "whsec_test_secret";

/// Computes the hex signature of a payload under a secret.
pub fn generate_signature(payload: &str, secret: &str) -> String {
    sign(payload, secret)
}

/// Builds the prefixed signature header value for a payload.
pub fn signature_header_value(payload: &str, secret: &str) -> String {
    format!("{}={}", SIGNATURE_ALGORITHM, generate_signature(payload, secret))
}

/// Builds a header set carrying a valid signature for the payload.
pub fn signed_headers(payload: &str, secret: &str) -> HeaderAccessor {
    HeaderAccessor::from_pairs([
        (DEFAULT_SIGNATURE_HEADER, signature_header_value(payload, secret)),
        ("content-type", "application/json".to_string()),
    ])
}

/// An in-memory request for middleware tests.
#[derive(Debug, Clone)]
pub struct MockRequest {
    body: String,
    headers: HeaderAccessor,
}

impl MockRequest {
    /// Creates a request with the given body and no headers.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: HeaderAccessor::new(),
        }
    }

    /// Creates a request signed with [`DEFAULT_TEST_SECRET`].
    pub fn signed(body: impl Into<String>) -> Self {
        Self::signed_with(body, DEFAULT_TEST_SECRET)
    }

    /// Creates a request signed with a specific secret.
    pub fn signed_with(body: impl Into<String>, secret: &str) -> Self {
        let body = body.into();
        let headers = signed_headers(&body, secret);
        Self { body, headers }
    }

    /// Adds a header occurrence.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }
}

impl InboundRequest for MockRequest {
    fn raw_body(&self) -> Option<String> {
        if self.body.is_empty() {
            None
        } else {
            Some(self.body.clone())
        }
    }

    fn headers(&self) -> HeaderAccessor {
        self.headers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SignatureVerifier;

    #[test]
    fn test_signed_request_verifies() {
        let body = r#"{"event":"payment.confirmed"}"#;
        let request = MockRequest::signed(body);

        let result = SignatureVerifier::new()
            .verify(body, &[DEFAULT_TEST_SECRET.to_string()], &request.headers())
            .unwrap();

        assert_eq!(result.matched_secret, DEFAULT_TEST_SECRET);
    }

    #[test]
    fn test_signature_header_value_is_prefixed() {
        let value = signature_header_value("body", "secret");
        assert!(value.starts_with("sha256="));
    }
}
