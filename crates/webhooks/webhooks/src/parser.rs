//! Orchestration of verification, decoding, validation, and hydration.

use std::collections::HashMap;
use std::sync::Arc;

use request_client_core::{NoopSchemaValidator, SchemaValidator};
use serde_json::{Map, Value};

use crate::error::{ParseError, WebhookResult};
use crate::event::WebhookEvent;
use crate::factory::WebhookEventFactory;
use crate::headers::HeaderAccessor;
use crate::signature::{Clock, SignatureVerifier, DEFAULT_SIGNATURE_HEADER};

/// One fully parsed inbound webhook.
///
/// Constructed once per delivery and read-only thereafter.
#[derive(Debug, Clone)]
pub struct ParsedWebhookEvent {
    event: WebhookEvent,
    raw_body: String,
    headers: HashMap<String, String>,
    signature: Option<String>,
    matched_secret: Option<String>,
    timestamp_ms: Option<i64>,
}

impl ParsedWebhookEvent {
    /// The classified event.
    pub fn event(&self) -> &WebhookEvent {
        &self.event
    }

    /// The wire name of the classified event.
    pub fn event_name(&self) -> &'static str {
        self.event.name()
    }

    /// The decoded payload map.
    pub fn payload(&self) -> &Map<String, Value> {
        self.event.payload()
    }

    /// The raw request body the signature was verified over.
    pub fn raw_body(&self) -> &str {
        &self.raw_body
    }

    /// The lower-cased normalized request headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// The signature that was verified, or the raw header value when
    /// verification was skipped.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Which configured secret matched; absent when verification was
    /// skipped.
    pub fn matched_secret(&self) -> Option<&str> {
        self.matched_secret.as_deref()
    }

    /// The signed timestamp in epoch milliseconds, when one was resolved.
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.timestamp_ms
    }
}

/// Inputs for a single `parse` call.
pub struct ParseOptions {
    raw_body: String,
    headers: HeaderAccessor,
    secrets: Vec<String>,
    header_name: Option<String>,
    timestamp_header: Option<String>,
    tolerance_ms: Option<i64>,
    timestamp_ms: Option<i64>,
    clock: Option<Clock>,
    skip_verification: bool,
}

impl ParseOptions {
    /// Creates options for a raw body and its request headers.
    pub fn new(raw_body: impl Into<String>, headers: HeaderAccessor) -> Self {
        Self {
            raw_body: raw_body.into(),
            headers,
            secrets: Vec::new(),
            header_name: None,
            timestamp_header: None,
            tolerance_ms: None,
            timestamp_ms: None,
            clock: None,
            skip_verification: false,
        }
    }

    /// Adds a candidate secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secrets.push(secret.into());
        self
    }

    /// Replaces the candidate secret list.
    pub fn with_secrets(mut self, secrets: Vec<String>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Overrides the signature header name.
    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = Some(header_name.into());
        self
    }

    /// Sets the header carrying the signed timestamp.
    pub fn with_timestamp_header(mut self, timestamp_header: impl Into<String>) -> Self {
        self.timestamp_header = Some(timestamp_header.into());
        self
    }

    /// Sets the replay tolerance window in milliseconds.
    pub fn with_tolerance_ms(mut self, tolerance_ms: i64) -> Self {
        self.tolerance_ms = Some(tolerance_ms);
        self
    }

    /// Supplies the signed timestamp directly.
    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Replaces the verifier's wall clock, for deterministic tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Disables signature verification for this call.
    ///
    /// Always an explicit caller decision, never inferred from the
    /// payload.
    pub fn with_skip_verification(mut self, skip: bool) -> Self {
        self.skip_verification = skip;
        self
    }
}

/// Parses inbound webhook requests into [`ParsedWebhookEvent`] values.
pub struct WebhookParser {
    factory: WebhookEventFactory,
    validator: Arc<dyn SchemaValidator>,
}

impl WebhookParser {
    /// Creates a parser with pass-through schema validation.
    pub fn new() -> Self {
        Self {
            factory: WebhookEventFactory::new(),
            validator: Arc::new(NoopSchemaValidator),
        }
    }

    /// Replaces the schema validation collaborator.
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// The event factory backing this parser.
    pub fn factory(&self) -> &WebhookEventFactory {
        &self.factory
    }

    /// Parses one inbound webhook delivery.
    ///
    /// Verifies the signature (unless skipped), decodes the body,
    /// resolves and validates the event, and hydrates the typed result.
    pub fn parse(&self, options: ParseOptions) -> WebhookResult<ParsedWebhookEvent> {
        if options.raw_body.is_empty() {
            return Err(ParseError::MissingBody.into());
        }

        let header_name = options
            .header_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());

        let (headers, signature, matched_secret, timestamp_ms) = if options.skip_verification {
            let signature = options.headers.get(&header_name);
            (options.headers.normalized(), signature, None, None)
        } else {
            if options.secrets.iter().all(|s| s.is_empty()) {
                return Err(ParseError::MissingSecret.into());
            }

            let verification = self
                .build_verifier(&options, &header_name)
                .verify(&options.raw_body, &options.secrets, &options.headers)?;

            (
                verification.normalized_headers,
                Some(verification.signature_hex),
                Some(verification.matched_secret),
                verification.timestamp_ms,
            )
        };

        let payload = decode_payload(&options.raw_body)?;
        let event_name = self.resolve_event_name(&payload)?;
        let validated = self.validator.validate(&event_name, &payload)?;
        let event = self.factory.create(&event_name, validated)?;

        Ok(ParsedWebhookEvent {
            event,
            raw_body: options.raw_body,
            headers,
            signature,
            matched_secret,
            timestamp_ms,
        })
    }

    fn build_verifier(&self, options: &ParseOptions, header_name: &str) -> SignatureVerifier {
        let mut verifier = SignatureVerifier::new().with_header_name(header_name);

        if let Some(timestamp_header) = &options.timestamp_header {
            verifier = verifier.with_timestamp_header(timestamp_header);
        }
        if let Some(tolerance_ms) = options.tolerance_ms {
            verifier = verifier.with_tolerance_ms(tolerance_ms);
        }
        if let Some(timestamp_ms) = options.timestamp_ms {
            verifier = verifier.with_timestamp_ms(timestamp_ms);
        }
        if let Some(clock) = &options.clock {
            verifier = verifier.with_clock(clock.clone());
        }

        verifier
    }

    fn resolve_event_name(&self, payload: &Map<String, Value>) -> Result<String, ParseError> {
        let event_name = payload
            .get("event")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or(ParseError::MissingEventName)?;

        if !self.factory.supports(event_name) {
            return Err(ParseError::UnsupportedEvent(event_name.to_string()));
        }

        Ok(event_name.to_string())
    }
}

impl Default for WebhookParser {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_payload(raw_body: &str) -> Result<Map<String, Value>, ParseError> {
    let decoded: Value =
        serde_json::from_str(raw_body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    match decoded {
        Value::Object(payload) => Ok(payload),
        _ => Err(ParseError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SignatureFailureReason, WebhookError};
    use crate::signature::sign;

    const SECRET: &str = "whsec_test";
    const BODY: &str = r#"{"event":"payment.confirmed","requestId":"req_1","amount":"100"}"#;

    fn signed_headers(body: &str, secret: &str) -> HeaderAccessor {
        HeaderAccessor::from_pairs([(
            DEFAULT_SIGNATURE_HEADER,
            format!("sha256={}", sign(body, secret)),
        )])
    }

    #[test]
    fn test_parse_valid_webhook() {
        let parser = WebhookParser::new();
        let parsed = parser
            .parse(
                ParseOptions::new(BODY, signed_headers(BODY, SECRET)).with_secret(SECRET),
            )
            .unwrap();

        assert_eq!(parsed.event_name(), "payment.confirmed");
        assert_eq!(parsed.event().request_id().as_deref(), Some("req_1"));
        assert_eq!(parsed.raw_body(), BODY);
        assert_eq!(parsed.signature().unwrap(), sign(BODY, SECRET));
        assert_eq!(parsed.matched_secret(), Some(SECRET));
        assert_eq!(parsed.timestamp_ms(), None);
    }

    #[test]
    fn test_parse_wrong_secret() {
        let parser = WebhookParser::new();
        let error = parser
            .parse(
                ParseOptions::new(BODY, signed_headers(BODY, "other")).with_secret(SECRET),
            )
            .unwrap_err();

        match error {
            WebhookError::Signature(error) => {
                assert_eq!(error.reason(), SignatureFailureReason::InvalidSignature);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_requires_secret() {
        let parser = WebhookParser::new();
        let error = parser
            .parse(ParseOptions::new(BODY, signed_headers(BODY, SECRET)))
            .unwrap_err();

        assert!(matches!(
            error,
            WebhookError::Parse(ParseError::MissingSecret)
        ));
    }

    #[test]
    fn test_skip_verification_echoes_signature_header() {
        let parser = WebhookParser::new();
        let headers = signed_headers(BODY, SECRET);
        let expected_signature = headers.get(DEFAULT_SIGNATURE_HEADER);

        let parsed = parser
            .parse(ParseOptions::new(BODY, headers).with_skip_verification(true))
            .unwrap();

        assert_eq!(parsed.signature(), expected_signature.as_deref());
        assert_eq!(parsed.matched_secret(), None);
        assert_eq!(parsed.timestamp_ms(), None);
    }

    #[test]
    fn test_parse_empty_body() {
        let parser = WebhookParser::new();
        let error = parser
            .parse(ParseOptions::new("", HeaderAccessor::new()).with_skip_verification(true))
            .unwrap_err();

        assert!(matches!(error, WebhookError::Parse(ParseError::MissingBody)));
    }

    #[test]
    fn test_parse_invalid_json() {
        let parser = WebhookParser::new();
        let error = parser
            .parse(
                ParseOptions::new("not json", HeaderAccessor::new())
                    .with_skip_verification(true),
            )
            .unwrap_err();

        assert!(matches!(
            error,
            WebhookError::Parse(ParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_non_object_payload() {
        let parser = WebhookParser::new();
        let error = parser
            .parse(
                ParseOptions::new("[1,2,3]", HeaderAccessor::new())
                    .with_skip_verification(true),
            )
            .unwrap_err();

        assert!(matches!(error, WebhookError::Parse(ParseError::NotAnObject)));
    }

    #[test]
    fn test_parse_missing_event_field() {
        let parser = WebhookParser::new();
        let error = parser
            .parse(
                ParseOptions::new(r#"{"requestId":"req_1"}"#, HeaderAccessor::new())
                    .with_skip_verification(true),
            )
            .unwrap_err();

        assert!(matches!(
            error,
            WebhookError::Parse(ParseError::MissingEventName)
        ));
    }

    #[test]
    fn test_parse_unsupported_event() {
        let parser = WebhookParser::new();
        let error = parser
            .parse(
                ParseOptions::new(r#"{"event":"made.up.event"}"#, HeaderAccessor::new())
                    .with_skip_verification(true),
            )
            .unwrap_err();

        assert!(matches!(
            error,
            WebhookError::Parse(ParseError::UnsupportedEvent(name)) if name == "made.up.event"
        ));
    }

    #[test]
    fn test_schema_validation_failure_propagates() {
        use request_client_core::{RegistrySchemaValidator, SchemaRegistry};
        use serde_json::json;

        let registry = Arc::new(SchemaRegistry::new());
        registry.register(
            "payment.confirmed",
            json!({"type": "object", "required": ["paymentReference"]}),
        );

        let parser = WebhookParser::new()
            .with_validator(Arc::new(RegistrySchemaValidator::new(registry)));

        let error = parser
            .parse(ParseOptions::new(BODY, HeaderAccessor::new()).with_skip_verification(true))
            .unwrap_err();

        assert!(matches!(error, WebhookError::SchemaValidation(_)));
    }
}
