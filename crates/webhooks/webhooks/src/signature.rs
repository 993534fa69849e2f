//! HMAC-SHA256 webhook signature verification.
//!
//! Verifies the signature header against one or more candidate secrets
//! (rotation-friendly), with algorithm-prefix parsing, timestamp
//! resolution, and a replay tolerance window. Comparison is constant
//! time over the decoded digest bytes.

use std::collections::HashMap;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{SignatureError, SignatureFailureReason};
use crate::headers::HeaderAccessor;

type HmacSha256 = Hmac<Sha256>;

/// Default header carrying the webhook signature.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-request-network-signature";

/// The only accepted algorithm prefix (`sha256=<hex>`).
pub const SIGNATURE_ALGORITHM: &str = "sha256";

/// Injectable millisecond clock for deterministic tolerance checks.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Result of a successful signature verification.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// The matched signature, lower-cased hex.
    pub signature_hex: String,
    /// Which of the candidate secrets produced the match.
    pub matched_secret: String,
    /// Resolved timestamp in epoch milliseconds, when one was present.
    pub timestamp_ms: Option<i64>,
    /// Fully lower-cased header map from the verified request.
    pub normalized_headers: HashMap<String, String>,
}

/// Verifies HMAC-SHA256 signatures over raw webhook bodies.
#[derive(Clone)]
pub struct SignatureVerifier {
    header_name: String,
    timestamp_header: Option<String>,
    timestamp_override: Option<i64>,
    tolerance_ms: Option<i64>,
    clock: Clock,
}

impl SignatureVerifier {
    /// Creates a verifier with the default header name and wall clock.
    pub fn new() -> Self {
        Self {
            header_name: DEFAULT_SIGNATURE_HEADER.to_string(),
            timestamp_header: None,
            timestamp_override: None,
            tolerance_ms: None,
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
        }
    }

    /// Overrides the signature header name.
    pub fn with_header_name(mut self, header_name: impl Into<String>) -> Self {
        self.header_name = header_name.into();
        self
    }

    /// Sets the header to read the signed timestamp from.
    pub fn with_timestamp_header(mut self, timestamp_header: impl Into<String>) -> Self {
        self.timestamp_header = Some(timestamp_header.into());
        self
    }

    /// Supplies the timestamp directly, taking precedence over any header.
    pub fn with_timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_override = Some(timestamp_ms);
        self
    }

    /// Sets the replay tolerance window in milliseconds.
    ///
    /// Negative values disable the check, as does the absence of a
    /// resolved timestamp.
    pub fn with_tolerance_ms(mut self, tolerance_ms: i64) -> Self {
        self.tolerance_ms = Some(tolerance_ms);
        self
    }

    /// Replaces the wall clock, for deterministic tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// The configured signature header name.
    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    /// Verifies `raw_body` against the signature carried in `headers`.
    ///
    /// Every non-empty secret in `secrets` is tried in order; the result
    /// identifies which one matched so callers can rotate secrets without
    /// downtime.
    pub fn verify(
        &self,
        raw_body: &str,
        secrets: &[String],
        headers: &HeaderAccessor,
    ) -> Result<VerificationResult, SignatureError> {
        let normalized_headers = headers.normalized();

        let raw_signature = headers.get(&self.header_name).ok_or_else(|| {
            SignatureError::new(
                format!("Missing webhook signature header: {}", self.header_name),
                SignatureFailureReason::MissingSignature,
                &self.header_name,
            )
        })?;

        let (signature_hex, signature_bytes) =
            self.parse_signature_value(&raw_signature)?;

        let timestamp_ms = self.resolve_timestamp(headers, &raw_signature)?;
        self.assert_tolerance(timestamp_ms, &signature_hex)?;

        let secrets: Vec<&String> = secrets.iter().filter(|s| !s.is_empty()).collect();
        if secrets.is_empty() {
            return Err(self.failure(
                "No webhook secrets configured",
                SignatureFailureReason::InvalidSignature,
                &signature_hex,
                timestamp_ms,
            ));
        }

        let digests: Vec<Vec<u8>> = secrets
            .iter()
            .map(|secret| compute_digest(raw_body, secret))
            .collect();

        // Length is checked once, against the first candidate, before any
        // comparison so a mismatch cannot leak digest length timing.
        if signature_bytes.len() != digests[0].len() {
            return Err(self.failure(
                "Webhook signature length mismatch",
                SignatureFailureReason::InvalidFormat,
                &signature_hex,
                timestamp_ms,
            ));
        }

        for (secret, digest) in secrets.iter().zip(&digests) {
            if constant_time_compare(&signature_bytes, digest) {
                return Ok(VerificationResult {
                    signature_hex,
                    matched_secret: (*secret).clone(),
                    timestamp_ms,
                    normalized_headers,
                });
            }
        }

        Err(self.failure(
            "Invalid webhook signature",
            SignatureFailureReason::InvalidSignature,
            &signature_hex,
            timestamp_ms,
        ))
    }

    fn failure(
        &self,
        message: &str,
        reason: SignatureFailureReason,
        signature_hex: &str,
        timestamp_ms: Option<i64>,
    ) -> SignatureError {
        let mut error =
            SignatureError::new(message, reason, &self.header_name).with_signature(signature_hex);
        if let Some(timestamp_ms) = timestamp_ms {
            error = error.with_timestamp_ms(timestamp_ms);
        }
        error
    }

    fn parse_signature_value(
        &self,
        raw_signature: &str,
    ) -> Result<(String, Vec<u8>), SignatureError> {
        let stripped = self.strip_algorithm_prefix(raw_signature)?;
        let trimmed = stripped.trim();

        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SignatureError::new(
                "Invalid webhook signature format",
                SignatureFailureReason::InvalidFormat,
                &self.header_name,
            )
            .with_signature(raw_signature));
        }

        if trimmed.len() % 2 != 0 {
            return Err(SignatureError::new(
                "Invalid webhook signature length",
                SignatureFailureReason::InvalidFormat,
                &self.header_name,
            )
            .with_signature(raw_signature));
        }

        let lower = trimmed.to_lowercase();
        let bytes = hex::decode(&lower).map_err(|_| {
            SignatureError::new(
                "Invalid webhook signature format",
                SignatureFailureReason::InvalidFormat,
                &self.header_name,
            )
            .with_signature(raw_signature)
        })?;

        Ok((lower, bytes))
    }

    fn strip_algorithm_prefix<'a>(
        &self,
        raw_signature: &'a str,
    ) -> Result<&'a str, SignatureError> {
        let trimmed = raw_signature.trim();
        let Some((prefix, rest)) = trimmed.split_once('=') else {
            return Ok(trimmed);
        };

        if !prefix.eq_ignore_ascii_case(SIGNATURE_ALGORITHM) {
            return Err(SignatureError::new(
                "Unsupported signature algorithm",
                SignatureFailureReason::InvalidFormat,
                &self.header_name,
            )
            .with_signature(raw_signature));
        }

        Ok(rest)
    }

    fn resolve_timestamp(
        &self,
        headers: &HeaderAccessor,
        raw_signature: &str,
    ) -> Result<Option<i64>, SignatureError> {
        if let Some(timestamp) = self.timestamp_override {
            return Ok(Some(normalize_epoch(timestamp as f64)));
        }

        let Some(timestamp_header) = &self.timestamp_header else {
            return Ok(None);
        };

        let Some(value) = headers.get(timestamp_header) else {
            return Ok(None);
        };

        parse_timestamp(&value).map(Some).ok_or_else(|| {
            SignatureError::new(
                "Invalid webhook timestamp header",
                SignatureFailureReason::InvalidFormat,
                timestamp_header,
            )
            .with_signature(raw_signature)
        })
    }

    fn assert_tolerance(
        &self,
        timestamp_ms: Option<i64>,
        signature_hex: &str,
    ) -> Result<(), SignatureError> {
        let (Some(timestamp_ms), Some(tolerance_ms)) = (timestamp_ms, self.tolerance_ms) else {
            return Ok(());
        };
        if tolerance_ms < 0 {
            return Ok(());
        }

        let now = (self.clock)();
        if (now - timestamp_ms).abs() > tolerance_ms {
            return Err(SignatureError::new(
                "Webhook signature timestamp outside tolerance",
                SignatureFailureReason::ToleranceExceeded,
                &self.header_name,
            )
            .with_signature(signature_hex)
            .with_timestamp_ms(timestamp_ms));
        }

        Ok(())
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the hex-encoded HMAC-SHA256 signature of a body.
pub fn sign(raw_body: &str, secret: &str) -> String {
    hex::encode(compute_digest(raw_body, secret))
}

fn compute_digest(raw_body: &str, secret: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(raw_body.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b) {
        result |= x ^ y;
    }
    result == 0
}

fn parse_timestamp(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_numeric(trimmed) {
        let numeric: f64 = trimmed.parse().ok()?;
        if !numeric.is_finite() {
            return None;
        }
        return Some(normalize_epoch(numeric));
    }

    let parsed = chrono::DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| chrono::DateTime::parse_from_rfc2822(trimmed))
        .ok()?;
    Some(parsed.timestamp() * 1000)
}

// Matches an optionally-negative decimal number with at most one dot.
fn is_numeric(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || digits.starts_with('.') || digits.ends_with('.') {
        return false;
    }

    let mut seen_dot = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    true
}

// Values at or below 1e9 are epoch seconds and get scaled to milliseconds.
fn normalize_epoch(timestamp: f64) -> i64 {
    if timestamp > 1_000_000_000.0 {
        timestamp.floor() as i64
    } else {
        (timestamp * 1000.0).floor() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &str = r#"{"event":"payment.confirmed","requestId":"req_1"}"#;

    fn signed_headers(body: &str, secret: &str) -> HeaderAccessor {
        HeaderAccessor::from_pairs([(
            DEFAULT_SIGNATURE_HEADER,
            format!("sha256={}", sign(body, secret)),
        )])
    }

    fn fixed_clock(now: i64) -> Clock {
        Arc::new(move || now)
    }

    #[test]
    fn test_round_trip() {
        let verifier = SignatureVerifier::new();
        let result = verifier
            .verify(BODY, &[SECRET.to_string()], &signed_headers(BODY, SECRET))
            .unwrap();

        assert_eq!(result.signature_hex, sign(BODY, SECRET));
        assert_eq!(result.matched_secret, SECRET);
        assert_eq!(result.timestamp_ms, None);
    }

    #[test]
    fn test_unprefixed_signature_accepted() {
        let headers =
            HeaderAccessor::from_pairs([(DEFAULT_SIGNATURE_HEADER, sign(BODY, SECRET))]);

        let verifier = SignatureVerifier::new();
        assert!(verifier.verify(BODY, &[SECRET.to_string()], &headers).is_ok());
    }

    #[test]
    fn test_missing_header() {
        let verifier = SignatureVerifier::new();
        let error = verifier
            .verify(BODY, &[SECRET.to_string()], &HeaderAccessor::new())
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::MissingSignature);
        assert_eq!(error.header_name(), DEFAULT_SIGNATURE_HEADER);
    }

    #[test]
    fn test_unsupported_algorithm_prefix() {
        let headers = HeaderAccessor::from_pairs([(
            DEFAULT_SIGNATURE_HEADER,
            format!("sha512={}", sign(BODY, SECRET)),
        )]);

        let verifier = SignatureVerifier::new();
        let error = verifier
            .verify(BODY, &[SECRET.to_string()], &headers)
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::InvalidFormat);
    }

    #[test]
    fn test_non_hex_signature() {
        let headers =
            HeaderAccessor::from_pairs([(DEFAULT_SIGNATURE_HEADER, "sha256=not-hex!")]);

        let verifier = SignatureVerifier::new();
        let error = verifier
            .verify(BODY, &[SECRET.to_string()], &headers)
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::InvalidFormat);
    }

    #[test]
    fn test_odd_length_hex() {
        let headers = HeaderAccessor::from_pairs([(DEFAULT_SIGNATURE_HEADER, "sha256=abc")]);

        let verifier = SignatureVerifier::new();
        let error = verifier
            .verify(BODY, &[SECRET.to_string()], &headers)
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::InvalidFormat);
        assert_eq!(error.to_string(), "Invalid webhook signature length");
    }

    #[test]
    fn test_length_mismatch() {
        let headers = HeaderAccessor::from_pairs([(DEFAULT_SIGNATURE_HEADER, "sha256=abcd")]);

        let verifier = SignatureVerifier::new();
        let error = verifier
            .verify(BODY, &[SECRET.to_string()], &headers)
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::InvalidFormat);
        assert_eq!(error.to_string(), "Webhook signature length mismatch");
    }

    #[test]
    fn test_tamper_sensitivity() {
        let mut tampered = BODY.to_string();
        tampered.replace_range(0..1, "[");

        let verifier = SignatureVerifier::new();
        let error = verifier
            .verify(&tampered, &[SECRET.to_string()], &signed_headers(BODY, SECRET))
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::InvalidSignature);
    }

    #[test]
    fn test_secret_rotation_identifies_match() {
        let secrets = vec!["old_secret".to_string(), SECRET.to_string()];

        let verifier = SignatureVerifier::new();
        let result = verifier
            .verify(BODY, &secrets, &signed_headers(BODY, SECRET))
            .unwrap();
        assert_eq!(result.matched_secret, SECRET);

        let result = verifier
            .verify(BODY, &secrets, &signed_headers(BODY, "old_secret"))
            .unwrap();
        assert_eq!(result.matched_secret, "old_secret");
    }

    #[test]
    fn test_no_secrets_configured() {
        let verifier = SignatureVerifier::new();
        let error = verifier
            .verify(BODY, &[], &signed_headers(BODY, SECRET))
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::InvalidSignature);
        assert_eq!(error.to_string(), "No webhook secrets configured");
    }

    #[test]
    fn test_tolerance_boundary_inclusive() {
        let now = 1_700_000_000_000;
        let tolerance = 300_000;

        let mut headers = signed_headers(BODY, SECRET);
        headers.insert("x-request-network-timestamp", (now - tolerance).to_string());

        let verifier = SignatureVerifier::new()
            .with_timestamp_header("x-request-network-timestamp")
            .with_tolerance_ms(tolerance)
            .with_clock(fixed_clock(now));

        let result = verifier.verify(BODY, &[SECRET.to_string()], &headers).unwrap();
        assert_eq!(result.timestamp_ms, Some(now - tolerance));
    }

    #[test]
    fn test_tolerance_exceeded() {
        let now = 1_700_000_000_000;
        let tolerance = 300_000;

        let mut headers = signed_headers(BODY, SECRET);
        headers.insert(
            "x-request-network-timestamp",
            (now - tolerance - 1).to_string(),
        );

        let verifier = SignatureVerifier::new()
            .with_timestamp_header("x-request-network-timestamp")
            .with_tolerance_ms(tolerance)
            .with_clock(fixed_clock(now));

        let error = verifier
            .verify(BODY, &[SECRET.to_string()], &headers)
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::ToleranceExceeded);
        assert_eq!(error.timestamp_ms(), Some(now - tolerance - 1));
    }

    #[test]
    fn test_epoch_seconds_scaled_to_millis() {
        let mut headers = signed_headers(BODY, SECRET);
        headers.insert("x-request-network-timestamp", "1700000");

        let verifier =
            SignatureVerifier::new().with_timestamp_header("x-request-network-timestamp");

        let result = verifier.verify(BODY, &[SECRET.to_string()], &headers).unwrap();
        assert_eq!(result.timestamp_ms, Some(1_700_000_000));
    }

    #[test]
    fn test_rfc_date_timestamp() {
        let mut headers = signed_headers(BODY, SECRET);
        headers.insert("x-request-network-timestamp", "2023-11-14T22:13:20Z");

        let verifier =
            SignatureVerifier::new().with_timestamp_header("x-request-network-timestamp");

        let result = verifier.verify(BODY, &[SECRET.to_string()], &headers).unwrap();
        assert_eq!(result.timestamp_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn test_unparseable_timestamp_header() {
        let mut headers = signed_headers(BODY, SECRET);
        headers.insert("x-request-network-timestamp", "not a date");

        let verifier =
            SignatureVerifier::new().with_timestamp_header("x-request-network-timestamp");

        let error = verifier
            .verify(BODY, &[SECRET.to_string()], &headers)
            .unwrap_err();

        assert_eq!(error.reason(), SignatureFailureReason::InvalidFormat);
        assert_eq!(error.header_name(), "x-request-network-timestamp");
    }

    #[test]
    fn test_timestamp_override_takes_precedence() {
        let mut headers = signed_headers(BODY, SECRET);
        headers.insert("x-request-network-timestamp", "not a date");

        let verifier = SignatureVerifier::new()
            .with_timestamp_header("x-request-network-timestamp")
            .with_timestamp_ms(1_700_000_000_000);

        let result = verifier.verify(BODY, &[SECRET.to_string()], &headers).unwrap();
        assert_eq!(result.timestamp_ms, Some(1_700_000_000_000));
    }
}
