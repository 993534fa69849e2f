//! Classification of decoded payloads into typed webhook events.

use serde_json::{Map, Value};

use crate::error::WebhookError;
use crate::event::{event_names, ComplianceStatus, EventData, PaymentDetailStatus, WebhookEvent};

const SUPPORTED_EVENTS: &[&str] = &[
    event_names::PAYMENT_CONFIRMED,
    event_names::PAYMENT_FAILED,
    event_names::PAYMENT_PROCESSING,
    event_names::PAYMENT_DETAIL_UPDATED,
    event_names::COMPLIANCE_UPDATED,
    event_names::PAYMENT_PARTIAL,
    event_names::PAYMENT_REFUNDED,
    event_names::REQUEST_RECURRING,
];

const COMPLIANCE_APPROVED_STATUSES: &[&str] = &["approved", "completed", "signed"];
const COMPLIANCE_REJECTED_STATUSES: &[&str] = &["rejected", "failed"];
const COMPLIANCE_PENDING_STATUSES: &[&str] = &["pending", "initiated", "not_started"];

/// Builds typed [`WebhookEvent`] values from wire event names and payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookEventFactory;

impl WebhookEventFactory {
    /// Creates a factory.
    pub fn new() -> Self {
        Self
    }

    /// The closed set of wire event names this client recognizes.
    pub fn supported_events(&self) -> &'static [&'static str] {
        SUPPORTED_EVENTS
    }

    /// Whether `event_name` is a recognized wire event name.
    pub fn supports(&self, event_name: &str) -> bool {
        SUPPORTED_EVENTS.contains(&event_name)
    }

    /// Hydrates a typed event from a wire name and decoded payload.
    ///
    /// The two `Updated` kinds are sub-classified from payload content,
    /// never from the wire name.
    pub fn create(
        &self,
        event_name: &str,
        payload: Map<String, Value>,
    ) -> Result<WebhookEvent, WebhookError> {
        let data = EventData::new(payload);

        let event = match event_name {
            event_names::PAYMENT_CONFIRMED => WebhookEvent::PaymentConfirmed(data),
            event_names::PAYMENT_FAILED => WebhookEvent::PaymentFailed(data),
            event_names::PAYMENT_PROCESSING => WebhookEvent::PaymentProcessing(data),
            event_names::PAYMENT_PARTIAL => WebhookEvent::PaymentPartial(data),
            event_names::PAYMENT_REFUNDED => WebhookEvent::PaymentRefunded(data),
            event_names::REQUEST_RECURRING => WebhookEvent::RequestRecurring(data),
            event_names::PAYMENT_DETAIL_UPDATED => WebhookEvent::PaymentDetailUpdated {
                status: classify_payment_detail(&data),
                data,
            },
            event_names::COMPLIANCE_UPDATED => WebhookEvent::ComplianceUpdated {
                status: classify_compliance(&data),
                data,
            },
            unknown => return Err(WebhookError::UnknownEvent(unknown.to_string())),
        };

        Ok(event)
    }
}

fn classify_payment_detail(data: &EventData) -> PaymentDetailStatus {
    match normalize_status(data.get_string("status")).as_deref() {
        Some("approved") => PaymentDetailStatus::Approved,
        Some("failed") => PaymentDetailStatus::Failed,
        Some("pending") => PaymentDetailStatus::Pending,
        Some("verified") => PaymentDetailStatus::Verified,
        _ => PaymentDetailStatus::Generic,
    }
}

// Precedence: an explicit compliance boolean always wins over textual
// status fields, and rejection is checked before approval so a rejected
// KYC with a stale approved agreement status is never misclassified.
fn classify_compliance(data: &EventData) -> ComplianceStatus {
    let kyc_status = normalize_status(data.get_string("kycStatus"));
    let agreement_status = normalize_status(data.get_string("agreementStatus"));

    if let Some(is_compliant) = data.get_lenient_bool("isCompliant") {
        return if is_compliant {
            ComplianceStatus::Approved
        } else {
            ComplianceStatus::Rejected
        };
    }

    let matches = |candidates: &[&str]| {
        matches_status(kyc_status.as_deref(), candidates)
            || matches_status(agreement_status.as_deref(), candidates)
    };

    if matches(COMPLIANCE_REJECTED_STATUSES) {
        ComplianceStatus::Rejected
    } else if matches(COMPLIANCE_APPROVED_STATUSES) {
        ComplianceStatus::Approved
    } else if matches(COMPLIANCE_PENDING_STATUSES) {
        ComplianceStatus::Pending
    } else {
        ComplianceStatus::Generic
    }
}

fn matches_status(status: Option<&str>, candidates: &[&str]) -> bool {
    status.is_some_and(|status| candidates.contains(&status))
}

fn normalize_status(value: Option<String>) -> Option<String> {
    value.map(|status| status.to_lowercase())
}
