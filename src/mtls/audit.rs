//! Audit logging for trust decisions.
//!
//! One line per decision, at both layers, emitted through `tracing` with the
//! event serialized as JSON in the `audit` field:
//!
//! ```text
//! WARN mtls_gate::mtls::audit audit={"timestamp":"...","layer":"handshake","fingerprint":"none","outcome":"rejected","reason":"no_certificate"}
//! ```
//!
//! Rejection detail goes here and nowhere else; peers only ever see a
//! generic handshake failure or a bare 401.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::mtls::certificate::Fingerprint;
use crate::mtls::decision::{RejectReason, ValidationOutcome};

/// Which layer made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// TLS client-certificate verification.
    Handshake,
    /// Per-request re-validation.
    Request,
}

/// Decision result as logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Caller admitted.
    Accepted,
    /// Caller refused.
    Rejected,
}

/// Structured audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// When the decision was made (RFC 3339, UTC).
    pub timestamp: DateTime<Utc>,
    /// Deciding layer.
    pub layer: Layer,
    /// Leaf fingerprint, or `"none"` when no certificate was presented.
    pub fingerprint: String,
    /// Accepted or rejected.
    pub outcome: Outcome,
    /// Rejection reason code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    /// Subject of the accepted identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Request path (request layer only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// End of the accepted certificate's validity window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl AuditEvent {
    fn new(layer: Layer, fingerprint: Option<&Fingerprint>, outcome: Outcome) -> Self {
        Self {
            timestamp: Utc::now(),
            layer,
            fingerprint: fingerprint
                .filter(|fp| !fp.as_str().is_empty())
                .map_or_else(|| "none".to_owned(), ToString::to_string),
            outcome,
            reason: None,
            subject: None,
            path: None,
            valid_until: None,
        }
    }

    /// A connection or request was admitted.
    #[must_use]
    pub fn accepted(layer: Layer, fingerprint: Option<&Fingerprint>) -> Self {
        Self::new(layer, fingerprint, Outcome::Accepted)
    }

    /// A connection or request was refused.
    #[must_use]
    pub fn rejected(layer: Layer, fingerprint: Option<&Fingerprint>, reason: RejectReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(layer, fingerprint, Outcome::Rejected)
        }
    }

    /// Request-layer event for a final outcome.
    #[must_use]
    pub fn for_request(outcome: &ValidationOutcome, fingerprint: Option<&Fingerprint>, path: &str) -> Self {
        let event = match outcome {
            ValidationOutcome::Accepted(identity) => Self {
                subject: Some(identity.subject().to_owned()),
                ..Self::accepted(Layer::Request, Some(identity.fingerprint()))
            },
            ValidationOutcome::Rejected(reason) => {
                Self::rejected(Layer::Request, fingerprint, *reason)
            }
        };
        event.with_path(path)
    }

    /// Attach the subject of the presented certificate.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Attach the certificate's `notAfter` (Unix seconds).
    #[must_use]
    pub fn with_valid_until(mut self, not_after: i64) -> Self {
        self.valid_until = DateTime::from_timestamp(not_after, 0);
        self
    }

    /// Attach the request path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Emit an audit event: `info` for acceptances, `warn` for rejections.
pub fn emit(event: &AuditEvent) {
    match serde_json::to_string(event) {
        Ok(ref json) => match event.outcome {
            Outcome::Accepted => tracing::info!(audit = %json, "mtls audit"),
            Outcome::Rejected => tracing::warn!(audit = %json, "mtls audit"),
        },
        Err(ref e) => tracing::warn!(error = %e, "Failed to serialize audit event"),
    }
}
