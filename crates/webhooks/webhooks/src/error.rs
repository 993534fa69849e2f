//! Error types for the webhook subsystem.

use request_client_core::SchemaValidationError;
use thiserror::Error;

/// Result type for webhook operations.
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Reason codes for signature verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFailureReason {
    /// The signature header is absent from the request.
    MissingSignature,
    /// The signature, its algorithm prefix, or a timestamp is malformed.
    InvalidFormat,
    /// The signature does not match any configured secret.
    InvalidSignature,
    /// The signed timestamp is outside the replay tolerance window.
    ToleranceExceeded,
}

impl SignatureFailureReason {
    /// The machine-readable reason code carried in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            SignatureFailureReason::MissingSignature => "missing_signature",
            SignatureFailureReason::InvalidFormat => "invalid_format",
            SignatureFailureReason::InvalidSignature => "invalid_signature",
            SignatureFailureReason::ToleranceExceeded => "tolerance_exceeded",
        }
    }
}

impl std::fmt::Display for SignatureFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Signature verification failure.
///
/// Always terminal for the current request; carries the header name,
/// reason code, raw signature (when recoverable), and resolved timestamp
/// for diagnostics.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SignatureError {
    message: String,
    reason: SignatureFailureReason,
    header_name: String,
    signature: Option<String>,
    timestamp_ms: Option<i64>,
}

impl SignatureError {
    /// Stable error code for signature verification failures.
    pub const CODE: &'static str = "ERR_REQUEST_WEBHOOK_SIGNATURE_VERIFICATION_FAILED";

    /// HTTP status signature failures map to at the boundary.
    pub const STATUS: u16 = 401;

    /// Creates a new signature error.
    pub fn new(
        message: impl Into<String>,
        reason: SignatureFailureReason,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            reason,
            header_name: header_name.into(),
            signature: None,
            timestamp_ms: None,
        }
    }

    /// Attaches the offending signature value.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Attaches the resolved timestamp in epoch milliseconds.
    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// The reason code for this failure.
    pub fn reason(&self) -> SignatureFailureReason {
        self.reason
    }

    /// The header the verifier was reading when it failed.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// The raw signature value, when it could be recovered.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// The resolved timestamp, when one was available.
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.timestamp_ms
    }
}

/// Payload decoding and classification failures.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The request carried no body.
    #[error("Webhook request body is empty")]
    MissingBody,
    /// Verification is enabled but no secret was supplied.
    #[error("Webhook secret is required when signature verification is enabled")]
    MissingSecret,
    /// The body is not valid JSON.
    #[error("Invalid webhook payload: {0}")]
    InvalidJson(String),
    /// The body decoded to something other than a JSON object.
    #[error("Webhook payload must be a JSON object")]
    NotAnObject,
    /// The payload has no non-empty `event` string field.
    #[error("Webhook payload is missing the event field")]
    MissingEventName,
    /// The `event` field names an event this client does not support.
    #[error("Unsupported webhook event: {0}")]
    UnsupportedEvent(String),
}

/// Top-level webhook error, covering every failure `parse` can return.
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    /// Signature verification failed.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Payload decoding or event resolution failed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The payload did not match its registered schema.
    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),
    /// The factory was asked for an event name it does not know.
    #[error("Unknown webhook event: {0}")]
    UnknownEvent(String),
    /// A registered listener failed during dispatch.
    #[error("Webhook handler failed: {0}")]
    Handler(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_codes() {
        assert_eq!(SignatureFailureReason::MissingSignature.code(), "missing_signature");
        assert_eq!(SignatureFailureReason::InvalidFormat.code(), "invalid_format");
        assert_eq!(SignatureFailureReason::InvalidSignature.code(), "invalid_signature");
        assert_eq!(SignatureFailureReason::ToleranceExceeded.code(), "tolerance_exceeded");
    }

    #[test]
    fn test_signature_error_diagnostics() {
        let error = SignatureError::new(
            "Invalid webhook signature",
            SignatureFailureReason::InvalidSignature,
            "x-request-network-signature",
        )
        .with_signature("deadbeef")
        .with_timestamp_ms(1_700_000_000_000);

        assert_eq!(error.reason(), SignatureFailureReason::InvalidSignature);
        assert_eq!(error.header_name(), "x-request-network-signature");
        assert_eq!(error.signature(), Some("deadbeef"));
        assert_eq!(error.timestamp_ms(), Some(1_700_000_000_000));
        assert_eq!(error.to_string(), "Invalid webhook signature");
    }

    #[test]
    fn test_webhook_error_from_signature() {
        let error: WebhookError = SignatureError::new(
            "Missing webhook signature header: x-request-network-signature",
            SignatureFailureReason::MissingSignature,
            "x-request-network-signature",
        )
        .into();

        assert!(matches!(error, WebhookError::Signature(_)));
    }
}
