//! The shared two-step trust decision.
//!
//! Both the handshake verifier and the request middleware call
//! [`TrustEvaluator::evaluate`]; they differ only in what they do with the
//! result. Every evaluation resolves to exactly one of accept or reject.

use std::fmt;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, UnixTime};
use serde::Serialize;
use tracing::debug;

use crate::mtls::certificate::{Fingerprint, PeerCertificate};
use crate::mtls::chain::ChainValidator;
use crate::mtls::gate;
use crate::mtls::identity::VerifiedIdentity;
use crate::mtls::trust_store::TrustStore;

// ─────────────────────────────────────────────────────────────────────────────
// Outcome types
// ─────────────────────────────────────────────────────────────────────────────

/// Why a certificate (or its absence) was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No certificate presented and no bypass applies.
    NoCertificate,
    /// No path to the anchor, or the path ended elsewhere.
    ChainInvalid,
    /// Allow-list is non-empty and the fingerprint is not on it.
    FingerprintNotAllowed,
    /// The certificate could not be decoded or the chain could not be built.
    InternalError,
}

impl RejectReason {
    /// Stable reason code used in audit lines.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NoCertificate => "no_certificate",
            Self::ChainInvalid => "chain_invalid",
            Self::FingerprintNotAllowed => "fingerprint_not_allowed",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Final result of authenticating a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The caller is who the identity says.
    Accepted(VerifiedIdentity),
    /// The caller is refused.
    Rejected(RejectReason),
}

impl ValidationOutcome {
    /// The identity, if accepted.
    #[must_use]
    pub fn identity(&self) -> Option<&VerifiedIdentity> {
        match self {
            Self::Accepted(identity) => Some(identity),
            Self::Rejected(_) => None,
        }
    }
}

/// Intermediate result of one evaluation, before any identity exists.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Fingerprint of the leaf, if one was presented (even unparseable).
    pub fingerprint: Option<Fingerprint>,
    /// The accepted leaf, or the reason it was refused.
    pub outcome: Result<PeerCertificate, RejectReason>,
}

impl Evaluation {
    fn rejected(fingerprint: Option<Fingerprint>, reason: RejectReason) -> Self {
        Self {
            fingerprint,
            outcome: Err(reason),
        }
    }

    /// `true` if the certificate passed both checks.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Turn the evaluation into a caller identity.
    #[must_use]
    pub fn into_outcome(self) -> ValidationOutcome {
        match self.outcome {
            Ok(cert) => ValidationOutcome::Accepted(VerifiedIdentity::from_certificate(&cert)),
            Err(reason) => ValidationOutcome::Rejected(reason),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluator
// ─────────────────────────────────────────────────────────────────────────────

/// Chain validation followed by the fingerprint gate, over one trust store.
#[derive(Debug, Clone)]
pub struct TrustEvaluator {
    store: Arc<TrustStore>,
    validator: ChainValidator,
}

impl TrustEvaluator {
    /// Evaluator using the default (aws-lc-rs) signature algorithms.
    #[must_use]
    pub fn new(store: Arc<TrustStore>) -> Self {
        Self::with_validator(store, ChainValidator::default())
    }

    /// Evaluator with an explicit validator.
    #[must_use]
    pub fn with_validator(store: Arc<TrustStore>, validator: ChainValidator) -> Self {
        Self { store, validator }
    }

    /// Evaluate a peer chain, leaf first. An empty chain means no
    /// certificate was presented.
    #[must_use]
    pub fn evaluate(&self, chain: &[CertificateDer<'_>], now: UnixTime) -> Evaluation {
        let Some((leaf, intermediates)) = chain.split_first() else {
            return Evaluation::rejected(None, RejectReason::NoCertificate);
        };
        let fingerprint = Fingerprint::of_der(leaf.as_ref());

        let cert = match PeerCertificate::from_der(leaf.clone().into_owned()) {
            Ok(cert) => cert,
            Err(e) => {
                debug!(fingerprint = %fingerprint, error = %e, "Unparseable client certificate");
                return Evaluation::rejected(Some(fingerprint), RejectReason::InternalError);
            }
        };

        let anchor = self.store.anchor();
        let chain = match self.validator.validate(&cert, intermediates, anchor, now) {
            Ok(chain) => chain,
            Err(e) => {
                debug!(fingerprint = %fingerprint, error = %e, "Chain building failed");
                return Evaluation::rejected(Some(fingerprint), RejectReason::InternalError);
            }
        };
        if !chain.terminates_at(anchor) {
            return Evaluation::rejected(Some(fingerprint), RejectReason::ChainInvalid);
        }

        if !gate::allows(&cert, self.store.allowed()) {
            return Evaluation::rejected(Some(fingerprint), RejectReason::FingerprintNotAllowed);
        }

        Evaluation {
            fingerprint: Some(fingerprint),
            outcome: Ok(cert),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
