//! # Request Client Webhooks
//!
//! Inbound webhook handling for the Request Network client:
//! - HMAC-SHA256 signature verification with secret rotation and a
//!   replay tolerance window
//! - A typed event taxonomy with payload-driven sub-classification
//! - A parser that verifies, decodes, validates, and hydrates one
//!   immutable [`ParsedWebhookEvent`] per delivery
//! - A synchronous dispatcher with deterministic, in-order fan-out
//! - A framework-agnostic middleware contract mapping failures to JSON
//!   error responses
//!
//! ## Example
//!
//! ```rust,ignore
//! use request_client_webhooks::{
//!     HeaderAccessor, ParseOptions, WebhookDispatcher, WebhookParser,
//! };
//!
//! let dispatcher = WebhookDispatcher::new();
//! dispatcher.register_listener(
//!     "payment.confirmed",
//!     std::sync::Arc::new(|parsed, _context| {
//!         println!("paid: {:?}", parsed.event().request_id());
//!         Ok(())
//!     }),
//! );
//!
//! let parser = WebhookParser::new();
//! let parsed = parser.parse(
//!     ParseOptions::new(raw_body, HeaderAccessor::from_pairs(headers))
//!         .with_secret("whsec_live_secret")
//!         .with_tolerance_ms(300_000),
//! )?;
//! dispatcher.dispatch(&parsed, &Default::default())?;
//! ```

mod dispatcher;
mod error;
mod event;
mod factory;
mod headers;
mod middleware;
mod parser;
mod signature;

pub mod testing;

pub use dispatcher::{DispatchContext, ListenerDisposer, WebhookDispatcher, WebhookHandler};
pub use error::{
    ParseError, SignatureError, SignatureFailureReason, WebhookError, WebhookResult,
};
pub use event::{
    event_names, ComplianceStatus, EventData, PaymentDetailStatus, WebhookEvent,
};
pub use factory::WebhookEventFactory;
pub use headers::HeaderAccessor;
pub use middleware::{
    DispatchContextBuilder, ErrorHook, EventHook, InboundRequest, RawBodyResolver,
    SkipVerificationResolver, WebhookMiddleware, WebhookResponse, DISABLE_VERIFICATION_ENV,
};
pub use parser::{ParseOptions, ParsedWebhookEvent, WebhookParser};
pub use signature::{
    sign, Clock, SignatureVerifier, VerificationResult, DEFAULT_SIGNATURE_HEADER,
    SIGNATURE_ALGORITHM,
};
