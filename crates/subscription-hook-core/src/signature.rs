//! # Webhook Signature Verification
//!
//! Verifies the provider's `Stripe-Signature` style header over the exact raw
//! request bytes.
//!
//! The header carries a timestamp and one or more HMAC-SHA256 digests:
//!
//! ```text
//! t=1700000000,v1=5257a869e7...,v1=7c3e2f...,v0=6ffbb59b2300...
//! ```
//!
//! The signed content is the ASCII timestamp, a literal `.`, then the request
//! body bytes. Verification succeeds when any `v1` digest matches the
//! expected value (compared in constant time) and the timestamp lies within
//! the tolerance window. Only then are the bytes decoded as JSON.

use crate::events::InboundEvent;
use crate::webhook::WebhookError;
use crate::SecretString;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tracing::{debug, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Default maximum age difference between the signed timestamp and now
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Signature scheme accepted for verification
pub const EXPECTED_SCHEME: &str = "v1";

// ============================================================================
// Errors
// ============================================================================

/// Reasons a signature check can fail
///
/// Every variant is a permanent rejection of the delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("No signature header found on request")]
    MissingHeader,

    #[error("Signature header is malformed: {message}")]
    MalformedHeader { message: String },

    #[error("No signatures found with expected scheme '{scheme}'")]
    NoSignatures { scheme: &'static str },

    #[error("No signature matches the expected signature for the payload")]
    Mismatch,

    #[error("Timestamp outside the tolerance zone: {age_seconds}s exceeds {tolerance_seconds}s")]
    OutsideTolerance {
        age_seconds: i64,
        tolerance_seconds: u64,
    },

    #[error("Webhook secret cannot be used as an HMAC key")]
    InvalidSecret,
}

// ============================================================================
// Header parsing
// ============================================================================

/// Parsed signature header
#[derive(Debug)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };

            match key {
                "t" => {
                    let parsed = value.parse::<i64>().map_err(|_| {
                        SignatureError::MalformedHeader {
                            message: "timestamp is not an integer".to_string(),
                        }
                    })?;
                    timestamp = Some(parsed);
                }
                EXPECTED_SCHEME => {
                    // Non-hex entries never match; other v1 entries still count
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    } else {
                        debug!("Ignoring non-hex v1 signature entry");
                    }
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader {
            message: "missing timestamp".to_string(),
        })?;

        if signatures.is_empty() {
            return Err(SignatureError::NoSignatures {
                scheme: EXPECTED_SCHEME,
            });
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

// ============================================================================
// SignatureVerifier
// ============================================================================

/// Verifies webhook signatures with a shared secret
///
/// Built once at startup from configuration and shared between requests.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance: Duration,
}

impl SignatureVerifier {
    /// Create a verifier with the default 300 second tolerance
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Override the timestamp tolerance; `Duration::ZERO` disables the check
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Configured tolerance window
    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Verify `payload` against `header` using the current time
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify `payload` against `header` as if the current time were `now`
    /// (Unix seconds)
    #[instrument(skip(self, payload, header), fields(payload_len = payload.len()))]
    pub fn verify_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), SignatureError> {
        let header = header.ok_or(SignatureError::MissingHeader)?;
        let parsed = SignatureHeader::parse(header)?;

        let expected = self.compute_signature(parsed.timestamp, payload)?;
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));

        if !matched {
            warn!(
                candidates = parsed.signatures.len(),
                "Webhook signature does not match payload"
            );
            return Err(SignatureError::Mismatch);
        }

        let tolerance_seconds = self.tolerance.as_secs();
        if tolerance_seconds > 0 {
            let age_seconds = now.saturating_sub(parsed.timestamp);
            if age_seconds.unsigned_abs() > tolerance_seconds {
                warn!(
                    timestamp = parsed.timestamp,
                    now = now,
                    "Webhook timestamp outside tolerance"
                );
                return Err(SignatureError::OutsideTolerance {
                    age_seconds,
                    tolerance_seconds,
                });
            }
        }

        Ok(())
    }

    /// Verify the signature, then decode the raw bytes into a typed event
    ///
    /// Decoding never happens before the signature check succeeds. A body
    /// that verifies but is not a well-formed event yields
    /// [`WebhookError::MalformedPayload`].
    pub fn construct_event(
        &self,
        payload: &[u8],
        header: Option<&str>,
    ) -> Result<InboundEvent, WebhookError> {
        self.construct_event_at(payload, header, Utc::now().timestamp())
    }

    /// [`construct_event`](Self::construct_event) with an explicit clock
    pub fn construct_event_at(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<InboundEvent, WebhookError> {
        self.verify_at(payload, header, now)?;
        let event =
            InboundEvent::decode(payload).map_err(|e| WebhookError::MalformedPayload {
                message: e.to_string(),
            })?;

        debug!(event_id = %event.id, event_type = %event.event_type, "Decoded verified event");
        Ok(event)
    }

    /// Produce a valid signature header for `payload` at `timestamp`
    ///
    /// Used to exercise the endpoint locally and in tests.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, SignatureError> {
        let digest = self.compute_signature(timestamp, payload)?;
        Ok(format!(
            "t={},{}={}",
            timestamp,
            EXPECTED_SCHEME,
            hex::encode(digest)
        ))
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, SignatureError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SignatureError::InvalidSecret)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
