//! Typed webhook events over generic JSON payloads.

use serde_json::{Map, Value};

/// Wire names of the supported webhook events.
pub mod event_names {
    pub const PAYMENT_CONFIRMED: &str = "payment.confirmed";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_PROCESSING: &str = "payment.processing";
    pub const PAYMENT_PARTIAL: &str = "payment.partial";
    pub const PAYMENT_REFUNDED: &str = "payment.refunded";
    pub const REQUEST_RECURRING: &str = "request.recurring";
    pub const PAYMENT_DETAIL_UPDATED: &str = "payment_detail.updated";
    pub const COMPLIANCE_UPDATED: &str = "compliance.updated";
}

/// Typed lookups over a decoded webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    payload: Map<String, Value>,
}

impl EventData {
    /// Wraps a decoded payload.
    pub fn new(payload: Map<String, Value>) -> Self {
        Self { payload }
    }

    /// The raw payload map.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Reads a field as a trimmed, non-empty string.
    ///
    /// Strings, booleans, and numbers coerce; empty and non-scalar
    /// values read as absent.
    pub fn get_string(&self, key: &str) -> Option<String> {
        coerce_string(self.payload.get(key)?)
    }

    /// Like `get_string`, but falls back to a second key when the first
    /// is absent.
    pub fn get_string_or(&self, key: &str, fallback_key: &str) -> Option<String> {
        match self.payload.get(key) {
            Some(value) => coerce_string(value),
            None => self.get_string(fallback_key),
        }
    }

    /// Reads a field as a boolean; only JSON booleans qualify.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key)?.as_bool()
    }

    /// Reads a field as a boolean, accepting common textual and numeric
    /// spellings (`true`/`false`, `yes`/`no`, `on`/`off`, `1`/`0`).
    ///
    /// Anything else reads as absent rather than as `false`.
    pub fn get_lenient_bool(&self, key: &str) -> Option<bool> {
        match self.payload.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            },
            Value::Number(n) => match n.as_f64() {
                Some(f) if f == 1.0 => Some(true),
                Some(f) if f == 0.0 => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Reads a field as a JSON object.
    pub fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.payload.get(key)?.as_object()
    }

    /// Reads a field as a list, keeping only the object entries.
    pub fn get_object_list(&self, key: &str) -> Vec<Map<String, Value>> {
        let Some(Value::Array(entries)) = self.payload.get(key) else {
            return Vec::new();
        };

        entries
            .iter()
            .filter_map(|entry| entry.as_object().cloned())
            .collect()
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    let coerced = match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let trimmed = coerced.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Refined status of a `payment_detail.updated` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDetailStatus {
    Approved,
    Failed,
    Pending,
    Verified,
    /// The payload carried no recognized `status` value.
    Generic,
}

/// Refined status of a `compliance.updated` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceStatus {
    Approved,
    Pending,
    Rejected,
    /// No compliance signal could be classified.
    Generic,
}

/// A classified inbound webhook event.
///
/// Constructed exclusively by [`WebhookEventFactory`](crate::WebhookEventFactory);
/// the wire `event` field selects the base kind, and the two `Updated`
/// kinds carry a sub-status derived from payload content.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    PaymentConfirmed(EventData),
    PaymentFailed(EventData),
    PaymentProcessing(EventData),
    PaymentPartial(EventData),
    PaymentRefunded(EventData),
    RequestRecurring(EventData),
    PaymentDetailUpdated {
        status: PaymentDetailStatus,
        data: EventData,
    },
    ComplianceUpdated {
        status: ComplianceStatus,
        data: EventData,
    },
}

impl WebhookEvent {
    /// The wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            WebhookEvent::PaymentConfirmed(_) => event_names::PAYMENT_CONFIRMED,
            WebhookEvent::PaymentFailed(_) => event_names::PAYMENT_FAILED,
            WebhookEvent::PaymentProcessing(_) => event_names::PAYMENT_PROCESSING,
            WebhookEvent::PaymentPartial(_) => event_names::PAYMENT_PARTIAL,
            WebhookEvent::PaymentRefunded(_) => event_names::PAYMENT_REFUNDED,
            WebhookEvent::RequestRecurring(_) => event_names::REQUEST_RECURRING,
            WebhookEvent::PaymentDetailUpdated { .. } => event_names::PAYMENT_DETAIL_UPDATED,
            WebhookEvent::ComplianceUpdated { .. } => event_names::COMPLIANCE_UPDATED,
        }
    }

    /// The typed payload lookups for this event.
    pub fn data(&self) -> &EventData {
        match self {
            WebhookEvent::PaymentConfirmed(data)
            | WebhookEvent::PaymentFailed(data)
            | WebhookEvent::PaymentProcessing(data)
            | WebhookEvent::PaymentPartial(data)
            | WebhookEvent::PaymentRefunded(data)
            | WebhookEvent::RequestRecurring(data)
            | WebhookEvent::PaymentDetailUpdated { data, .. }
            | WebhookEvent::ComplianceUpdated { data, .. } => data,
        }
    }

    /// The decoded payload map.
    pub fn payload(&self) -> &Map<String, Value> {
        self.data().payload()
    }

    // Fields present across event kinds.

    pub fn request_id(&self) -> Option<String> {
        self.data().get_string_or("requestId", "requestID")
    }

    pub fn payment_reference(&self) -> Option<String> {
        self.data().get_string("paymentReference")
    }

    pub fn explorer(&self) -> Option<String> {
        self.data().get_string("explorer")
    }

    pub fn amount(&self) -> Option<String> {
        self.data().get_string("amount")
    }

    pub fn total_amount_paid(&self) -> Option<String> {
        self.data().get_string("totalAmountPaid")
    }

    pub fn expected_amount(&self) -> Option<String> {
        self.data().get_string("expectedAmount")
    }

    pub fn timestamp(&self) -> Option<String> {
        self.data().get_string("timestamp")
    }

    pub fn tx_hash(&self) -> Option<String> {
        self.data().get_string("txHash")
    }

    pub fn network(&self) -> Option<String> {
        self.data().get_string("network")
    }

    pub fn currency(&self) -> Option<String> {
        self.data().get_string("currency")
    }

    pub fn payment_currency(&self) -> Option<String> {
        self.data().get_string("paymentCurrency")
    }

    pub fn is_crypto_to_fiat(&self) -> Option<bool> {
        self.data().get_bool("isCryptoToFiat")
    }

    pub fn sub_status(&self) -> Option<String> {
        self.data().get_string("subStatus")
    }

    pub fn payment_processor(&self) -> Option<String> {
        self.data().get_string("paymentProcessor")
    }

    pub fn fees(&self) -> Vec<Map<String, Value>> {
        self.data().get_object_list("fees")
    }

    pub fn client_user_id(&self) -> Option<String> {
        self.data().get_string("clientUserId")
    }

    pub fn raw_payload(&self) -> Option<&Map<String, Value>> {
        self.data().get_object("rawPayload")
    }

    // Fields set on `payment.failed` deliveries.

    pub fn failure_reason(&self) -> Option<String> {
        self.data().get_string("failureReason")
    }

    pub fn retry_after(&self) -> Option<String> {
        self.data().get_string("retryAfter")
    }

    // Fields set on `payment.refunded` deliveries.

    pub fn refunded_to(&self) -> Option<String> {
        self.data().get_string("refundedTo")
    }

    pub fn refund_amount(&self) -> Option<String> {
        self.data().get_string("refundAmount")
    }

    // Fields set on `request.recurring` deliveries.

    pub fn original_request_id(&self) -> Option<String> {
        self.data().get_string("originalRequestId")
    }

    pub fn original_request_payment_reference(&self) -> Option<String> {
        self.data().get_string("originalRequestPaymentReference")
    }

    // Fields set on `payment_detail.updated` deliveries.

    pub fn status(&self) -> Option<String> {
        self.data().get_string("status")
    }

    pub fn payment_details_id(&self) -> Option<String> {
        self.data().get_string("paymentDetailsId")
    }

    pub fn payment_account_id(&self) -> Option<String> {
        self.data().get_string("paymentAccountId")
    }

    pub fn rejection_message(&self) -> Option<String> {
        self.data().get_string("rejectionMessage")
    }

    // Fields set on `compliance.updated` deliveries.

    pub fn kyc_status(&self) -> Option<String> {
        self.data().get_string("kycStatus")
    }

    pub fn agreement_status(&self) -> Option<String> {
        self.data().get_string("agreementStatus")
    }

    pub fn is_compliant(&self) -> Option<bool> {
        self.data().get_bool("isCompliant")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> EventData {
        EventData::new(value.as_object().unwrap().clone())
    }

    #[test]
    fn test_string_coercion() {
        let data = data(json!({
            "amount": "100",
            "padded": "  trimmed  ",
            "numeric": 42,
            "flag": true,
            "empty": "   ",
            "nested": {"x": 1},
        }));

        assert_eq!(data.get_string("amount").as_deref(), Some("100"));
        assert_eq!(data.get_string("padded").as_deref(), Some("trimmed"));
        assert_eq!(data.get_string("numeric").as_deref(), Some("42"));
        assert_eq!(data.get_string("flag").as_deref(), Some("true"));
        assert_eq!(data.get_string("empty"), None);
        assert_eq!(data.get_string("nested"), None);
        assert_eq!(data.get_string("missing"), None);
    }

    #[test]
    fn test_fallback_key() {
        let data = data(json!({"requestID": "req_legacy"}));
        assert_eq!(
            data.get_string_or("requestId", "requestID").as_deref(),
            Some("req_legacy")
        );
    }

    #[test]
    fn test_strict_bool() {
        let data = data(json!({"real": true, "textual": "true"}));
        assert_eq!(data.get_bool("real"), Some(true));
        assert_eq!(data.get_bool("textual"), None);
    }

    #[test]
    fn test_lenient_bool() {
        let data = data(json!({
            "b": false,
            "yes": "Yes",
            "off": "off",
            "one": 1,
            "zero": "0",
            "junk": "maybe",
        }));

        assert_eq!(data.get_lenient_bool("b"), Some(false));
        assert_eq!(data.get_lenient_bool("yes"), Some(true));
        assert_eq!(data.get_lenient_bool("off"), Some(false));
        assert_eq!(data.get_lenient_bool("one"), Some(true));
        assert_eq!(data.get_lenient_bool("zero"), Some(false));
        assert_eq!(data.get_lenient_bool("junk"), None);
        assert_eq!(data.get_lenient_bool("missing"), None);
    }

    #[test]
    fn test_object_list_filters_non_objects() {
        let data = data(json!({"fees": [{"amount": "1"}, "skip", 2, {"amount": "3"}]}));
        let fees = data.get_object_list("fees");
        assert_eq!(fees.len(), 2);
        assert_eq!(fees[1]["amount"], json!("3"));
    }

    #[test]
    fn test_event_accessors() {
        let event = WebhookEvent::PaymentConfirmed(data(json!({
            "requestId": "req_1",
            "amount": "100",
            "txHash": "0xabc",
        })));

        assert_eq!(event.name(), "payment.confirmed");
        assert_eq!(event.request_id().as_deref(), Some("req_1"));
        assert_eq!(event.amount().as_deref(), Some("100"));
        assert_eq!(event.tx_hash().as_deref(), Some("0xabc"));
        assert_eq!(event.failure_reason(), None);
    }
}
