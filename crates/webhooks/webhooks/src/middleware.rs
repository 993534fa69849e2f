//! Boundary adapter between an HTTP framework and the webhook parser.

use std::sync::Arc;

use request_client_core::Redactor;
use serde_json::{json, Map, Value};

use crate::dispatcher::{DispatchContext, WebhookDispatcher};
use crate::error::{ParseError, WebhookError};
use crate::headers::HeaderAccessor;
use crate::parser::{ParseOptions, ParsedWebhookEvent, WebhookParser};

/// Environment variable that bypasses signature verification when set
/// to `true`. Local development only.
pub const DISABLE_VERIFICATION_ENV: &str = "REQUEST_WEBHOOK_DISABLE_VERIFICATION";

const DEFAULT_ATTRIBUTE: &str = "event";

/// An inbound HTTP request, reduced to what the middleware needs.
pub trait InboundRequest {
    /// The raw request body, read once.
    fn raw_body(&self) -> Option<String>;

    /// The request headers.
    fn headers(&self) -> HeaderAccessor;
}

/// A synthesized HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    status: u16,
    content_type: String,
    body: String,
}

impl WebhookResponse {
    /// Creates a JSON response.
    pub fn json(status: u16, payload: &Value) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: payload.to_string(),
        }
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The `content-type` header value.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The response body.
    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Hook invoked after a webhook parses and dispatches; a returned
/// response short-circuits the handler chain.
pub type EventHook = Arc<dyn Fn(&ParsedWebhookEvent) -> Option<WebhookResponse> + Send + Sync>;

/// Hook invoked on any failure; a returned response replaces the
/// synthesized error response.
pub type ErrorHook = Arc<dyn Fn(&WebhookError) -> Option<WebhookResponse> + Send + Sync>;

/// Builds the context map handed to dispatched listeners.
pub type DispatchContextBuilder =
    Arc<dyn Fn(&ParsedWebhookEvent) -> DispatchContext + Send + Sync>;

/// Per-request predicate deciding whether to skip verification.
pub type SkipVerificationResolver = Arc<dyn Fn(&dyn InboundRequest) -> bool + Send + Sync>;

/// Extracts the raw body from a request, replacing the default read.
pub type RawBodyResolver = Arc<dyn Fn(&dyn InboundRequest) -> Option<String> + Send + Sync>;

/// Verifies, parses, and dispatches inbound webhooks at the HTTP
/// boundary, converting failures into JSON error responses.
///
/// Framework adapters call [`handle`](Self::handle) with the inbound
/// request and a `next` continuation.
pub struct WebhookMiddleware {
    secrets: Vec<String>,
    header_name: Option<String>,
    timestamp_header: Option<String>,
    tolerance_ms: Option<i64>,
    dispatcher: Option<WebhookDispatcher>,
    on_event: Option<EventHook>,
    on_error: Option<ErrorHook>,
    context_builder: Option<DispatchContextBuilder>,
    raw_body_resolver: Option<RawBodyResolver>,
    skip_resolver: Option<SkipVerificationResolver>,
    skip_verification: bool,
    attribute: String,
    parser: WebhookParser,
    redactor: Redactor,
}

impl WebhookMiddleware {
    /// Creates a middleware with a single webhook secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_secrets(vec![secret.into()])
    }

    /// Creates a middleware with a list of candidate secrets, for
    /// rotation.
    pub fn with_secrets(secrets: Vec<String>) -> Self {
        Self {
            secrets: secrets.into_iter().filter(|s| !s.is_empty()).collect(),
            header_name: None,
            timestamp_header: None,
            tolerance_ms: None,
            dispatcher: None,
            on_event: None,
            on_error: None,
            context_builder: None,
            raw_body_resolver: None,
            skip_resolver: None,
            skip_verification: false,
            attribute: DEFAULT_ATTRIBUTE.to_string(),
            parser: WebhookParser::new(),
            redactor: Redactor::new(),
        }
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

    /// Attaches a dispatcher to fan parsed events out to.
    pub fn with_dispatcher(mut self, dispatcher: WebhookDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Sets the post-parse hook.
    pub fn with_on_event(mut self, on_event: EventHook) -> Self {
        self.on_event = Some(on_event);
        self
    }

    /// Sets the error hook.
    pub fn with_on_error(mut self, on_error: ErrorHook) -> Self {
        self.on_error = Some(on_error);
        self
    }

    /// Replaces the default dispatch context builder.
    pub fn with_dispatch_context(mut self, builder: DispatchContextBuilder) -> Self {
        self.context_builder = Some(builder);
        self
    }

    /// Replaces the default raw body read.
    pub fn with_raw_body_resolver(mut self, resolver: RawBodyResolver) -> Self {
        self.raw_body_resolver = Some(resolver);
        self
    }

    /// Sets a per-request skip-verification predicate.
    pub fn with_skip_verification_resolver(mut self, resolver: SkipVerificationResolver) -> Self {
        self.skip_resolver = Some(resolver);
        self
    }

    /// Unconditionally disables verification for this middleware.
    ///
    /// An explicit configuration choice, logged on every request it
    /// applies to. Local development only.
    pub fn with_skip_verification(mut self, skip: bool) -> Self {
        self.skip_verification = skip;
        self
    }

    /// Sets the context key the event name is attached under.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Replaces the parser, e.g. to attach a schema validator.
    pub fn with_parser(mut self, parser: WebhookParser) -> Self {
        self.parser = parser;
        self
    }

    /// Processes one inbound request.
    ///
    /// On success the parsed event is handed to `next`, whose response
    /// is returned. Failures become JSON error responses: 401 with a
    /// reason code for signature failures, 500 for everything else.
    pub fn handle<F>(&self, request: &dyn InboundRequest, next: F) -> WebhookResponse
    where
        F: FnOnce(&ParsedWebhookEvent) -> WebhookResponse,
    {
        match self.process(request) {
            Ok(Outcome::ShortCircuit(response)) => response,
            Ok(Outcome::Parsed(parsed)) => next(&parsed),
            Err(error) => self.handle_error(&error),
        }
    }

    fn process(&self, request: &dyn InboundRequest) -> Result<Outcome, WebhookError> {
        let raw_body = match &self.raw_body_resolver {
            Some(resolver) => resolver(request),
            None => request.raw_body(),
        }
        .ok_or(ParseError::MissingBody)?;

        let skip_verification = self.should_skip_verification(request);
        if skip_verification {
            tracing::warn!(
                event = "webhook:verification_bypassed",
                "webhook signature verification is disabled"
            );
        }

        let mut options = ParseOptions::new(raw_body, request.headers())
            .with_secrets(self.secrets.clone())
            .with_skip_verification(skip_verification);

        if let Some(header_name) = &self.header_name {
            options = options.with_header_name(header_name);
        }
        if let Some(timestamp_header) = &self.timestamp_header {
            options = options.with_timestamp_header(timestamp_header);
        }
        if let Some(tolerance_ms) = self.tolerance_ms {
            options = options.with_tolerance_ms(tolerance_ms);
        }

        let parsed = self.parser.parse(options)?;

        self.log_event(
            "webhook:verified",
            Level::Debug,
            json_context(&[
                ("event", json!(parsed.event_name())),
                ("signature", json!(parsed.signature())),
                ("matchedSecret", json!(parsed.matched_secret())),
            ]),
        );

        if let Some(dispatcher) = &self.dispatcher {
            let context = self.build_dispatch_context(&parsed);
            dispatcher.dispatch(&parsed, &context)?;
            self.log_event(
                "webhook:dispatched",
                Level::Info,
                json_context(&[
                    ("event", json!(parsed.event_name())),
                    ("context", Value::Object(context)),
                ]),
            );
        }

        if let Some(on_event) = &self.on_event {
            if let Some(response) = on_event(&parsed) {
                return Ok(Outcome::ShortCircuit(response));
            }
        }

        Ok(Outcome::Parsed(parsed))
    }

    fn should_skip_verification(&self, request: &dyn InboundRequest) -> bool {
        if self.skip_verification || env_bypass_enabled() {
            return true;
        }

        match &self.skip_resolver {
            Some(resolver) => resolver(request),
            None => false,
        }
    }

    fn build_dispatch_context(&self, parsed: &ParsedWebhookEvent) -> DispatchContext {
        if let Some(builder) = &self.context_builder {
            return builder(parsed);
        }

        let mut context = Map::new();
        context.insert(self.attribute.clone(), json!(parsed.event_name()));
        context.insert("headers".to_string(), json!(parsed.headers()));
        context
    }

    fn handle_error(&self, error: &WebhookError) -> WebhookResponse {
        match error {
            WebhookError::Signature(signature_error) => self.log_event(
                "webhook:error",
                Level::Warn,
                json_context(&[
                    ("header", json!(signature_error.header_name())),
                    ("reason", json!(signature_error.reason().code())),
                    ("signature", json!(signature_error.signature())),
                ]),
            ),
            other => self.log_event(
                "webhook:error",
                Level::Error,
                json_context(&[("error", json!(other.to_string()))]),
            ),
        }

        if let Some(on_error) = &self.on_error {
            if let Some(response) = on_error(error) {
                return response;
            }
        }

        match error {
            WebhookError::Signature(signature_error) => WebhookResponse::json(
                crate::error::SignatureError::STATUS,
                &json!({
                    "error": "invalid_webhook_signature",
                    "reason": signature_error.reason().code(),
                }),
            ),
            _ => WebhookResponse::json(500, &json!({"error": "webhook_handler_failed"})),
        }
    }

    fn log_event(&self, event: &str, level: Level, context: Map<String, Value>) {
        let context = Value::Object(self.redactor.redact_context(&context));
        match level {
            Level::Debug => tracing::debug!(event, %context, "webhook event"),
            Level::Info => tracing::info!(event, %context, "webhook event"),
            Level::Warn => tracing::warn!(event, %context, "webhook event"),
            Level::Error => tracing::error!(event, %context, "webhook event"),
        }
    }
}

enum Outcome {
    Parsed(ParsedWebhookEvent),
    ShortCircuit(WebhookResponse),
}

enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

fn env_bypass_enabled() -> bool {
    std::env::var(DISABLE_VERIFICATION_ENV).as_deref() == Ok("true")
}

fn json_context(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
