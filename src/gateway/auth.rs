//! Request-layer client certificate authentication.
//!
//! Runs on every request of an already-accepted connection and re-checks
//! the peer chain with the same evaluator the handshake used; the handshake
//! result is never trusted on its own. On success the caller's
//! [`VerifiedIdentity`] is inserted into request extensions.
//!
//! Supports:
//! - Public paths that bypass authentication
//! - The development bypass for certificate-less callers

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rustls::pki_types::{CertificateDer, UnixTime};
use serde_json::json;
use tracing::{debug, warn};

use super::acceptor::PeerCertificates;
use crate::config::Config;
use crate::mtls::audit::{self, AuditEvent};
use crate::mtls::certificate::Fingerprint;
use crate::mtls::decision::{RejectReason, TrustEvaluator, ValidationOutcome};
use crate::mtls::identity::{ProductionIdentity, VerifiedIdentity};
use crate::mtls::trust_store::TrustStore;

// ─────────────────────────────────────────────────────────────────────────────
// Development bypass
// ─────────────────────────────────────────────────────────────────────────────

/// Non-production escape hatch for callers without any certificate.
///
/// Only covers the *absence* of a certificate. A presented certificate is
/// always validated, development mode or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DevelopmentBypass {
    active: bool,
}

impl DevelopmentBypass {
    /// Bypass on (non-production).
    #[must_use]
    pub fn enabled() -> Self {
        Self { active: true }
    }

    /// Bypass off.
    #[must_use]
    pub fn disabled() -> Self {
        Self { active: false }
    }

    /// Whether the bypass applies.
    #[must_use]
    pub fn is_active(self) -> bool {
        self.active
    }

    /// The development identity, if active.
    #[must_use]
    pub fn identity(self) -> Option<VerifiedIdentity> {
        self.active.then(VerifiedIdentity::development)
    }
}

impl From<bool> for DevelopmentBypass {
    fn from(active: bool) -> Self {
        Self { active }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authenticator
// ─────────────────────────────────────────────────────────────────────────────

/// Per-request authenticator.
#[derive(Debug)]
pub struct RequestAuthenticator {
    evaluator: TrustEvaluator,
    bypass: DevelopmentBypass,
    public_paths: Vec<String>,
}

impl RequestAuthenticator {
    /// Create an authenticator over `store`.
    #[must_use]
    pub fn new(store: Arc<TrustStore>, bypass: DevelopmentBypass) -> Self {
        Self {
            evaluator: TrustEvaluator::new(store),
            bypass,
            public_paths: Vec::new(),
        }
    }

    /// Create from configuration, warning loudly if the bypass is on.
    #[must_use]
    pub fn from_config(config: &Config, store: Arc<TrustStore>) -> Self {
        let bypass = DevelopmentBypass::from(config.server.development);
        if bypass.is_active() {
            warn!("DEVELOPMENT MODE: requests without a client certificate are served as 'dev-client'. Never enable in production");
        }
        Self::new(store, bypass).with_public_paths(config.server.public_paths.clone())
    }

    /// Set the paths that skip authentication.
    ///
    /// Entries that are blank or not absolute (`/`-prefixed) are dropped with
    /// a warning; an empty prefix would otherwise match every route.
    #[must_use]
    pub fn with_public_paths(mut self, paths: Vec<String>) -> Self {
        self.public_paths = paths
            .into_iter()
            .filter_map(|p| {
                let trimmed = p.trim();
                if trimmed.starts_with('/') {
                    Some(trimmed.to_owned())
                } else {
                    warn!(entry = %p, "Ignoring public path that does not start with '/'");
                    None
                }
            })
            .collect();
        self
    }

    /// Check if a path is public (bypasses auth). Matches whole segments.
    #[must_use]
    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| {
            path.strip_prefix(p.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Authenticate a peer chain (leaf first; empty when none was presented).
    #[must_use]
    pub fn authenticate(&self, chain: &[CertificateDer<'_>]) -> ValidationOutcome {
        self.decide(chain, UnixTime::now()).0
    }

    /// Outcome plus the presented leaf's fingerprint, for the audit line.
    fn decide(
        &self,
        chain: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> (ValidationOutcome, Option<Fingerprint>) {
        if chain.is_empty() {
            let outcome = self.bypass.identity().map_or(
                ValidationOutcome::Rejected(RejectReason::NoCertificate),
                ValidationOutcome::Accepted,
            );
            return (outcome, None);
        }

        let evaluation = self.evaluator.evaluate(chain, now);
        let fingerprint = evaluation.fingerprint.clone();
        (evaluation.into_outcome(), fingerprint)
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(auth): State<Arc<RequestAuthenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();

    if auth.is_public_path(&path) {
        debug!(path = %path, "Public path, skipping auth");
        return next.run(request).await;
    }

    let chain = request
        .extensions()
        .get::<PeerCertificates>()
        .map(PeerCertificates::chain)
        .unwrap_or_default();
    let (outcome, fingerprint) = auth.decide(chain, UnixTime::now());
    audit::emit(&AuditEvent::for_request(&outcome, fingerprint.as_ref(), &path));

    match outcome {
        ValidationOutcome::Accepted(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        ValidationOutcome::Rejected(_) => unauthorized_response(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extractors
// ─────────────────────────────────────────────────────────────────────────────

impl<S: Send + Sync> FromRequestParts<S> for VerifiedIdentity {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            warn!(path = %parts.uri.path(), "Handler reached without a verified identity");
            unauthorized_response()
        })
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ProductionIdentity {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = VerifiedIdentity::from_request_parts(parts, state).await?;
        Self::new(identity).ok_or_else(|| {
            warn!(path = %parts.uri.path(), "Development identity refused on production-only route");
            forbidden_response()
        })
    }
}

/// Create a 401 Unauthorized response. Carries no certificate detail.
fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {
                "code": 401,
                "message": "Authentication required"
            }
        })),
    )
        .into_response()
}

/// Create a 403 Forbidden response
fn forbidden_response() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": {
                "code": 403,
                "message": "Production identity required"
            }
        })),
    )
        .into_response()
}
