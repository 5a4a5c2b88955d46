//! Verified caller identity handed to route handlers.
//!
//! A [`VerifiedIdentity`] can only be built inside this crate, from a
//! certificate that passed the chain and fingerprint checks, or by the
//! development bypass. Handlers receive it through the axum extractors
//! implemented in [`crate::gateway::auth`].

use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::mtls::certificate::{Fingerprint, PeerCertificate};

/// Subject used for the development bypass identity.
pub const DEV_CLIENT_SUBJECT: &str = "dev-client";

/// How an identity came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOrigin {
    /// Derived from a client certificate that passed validation.
    Certificate,
    /// Synthesized because development mode is on and no certificate was
    /// presented. Never valid in production.
    DevelopmentBypass,
}

/// The authenticated caller: subject DN and certificate fingerprint.
///
/// Downstream code must treat the subject as opaque and must not derive
/// authorization from it alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    subject: String,
    fingerprint: Fingerprint,
    origin: IdentityOrigin,
}

impl VerifiedIdentity {
    pub(crate) fn from_certificate(cert: &PeerCertificate) -> Self {
        Self {
            subject: cert.subject().to_owned(),
            fingerprint: cert.fingerprint().clone(),
            origin: IdentityOrigin::Certificate,
        }
    }

    pub(crate) fn development() -> Self {
        Self {
            subject: DEV_CLIENT_SUBJECT.to_owned(),
            fingerprint: Fingerprint::empty(),
            origin: IdentityOrigin::DevelopmentBypass,
        }
    }

    /// Subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Normalized fingerprint (empty for the development identity).
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Where this identity came from.
    #[must_use]
    pub fn origin(&self) -> IdentityOrigin {
        self.origin
    }

    /// `false` for the development bypass identity.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.origin == IdentityOrigin::Certificate
    }
}

impl Serialize for VerifiedIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("VerifiedIdentity", 3)?;
        s.serialize_field("subject", &self.subject)?;
        s.serialize_field("fingerprint", self.fingerprint.as_str())?;
        s.serialize_field("production", &self.is_production())?;
        s.end()
    }
}

/// A [`VerifiedIdentity`] that is guaranteed not to be the development one.
///
/// Extracting this in a handler refuses the bypass identity with `403`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionIdentity(pub VerifiedIdentity);

impl ProductionIdentity {
    /// Wrap `identity` if it came from a real certificate.
    #[must_use]
    pub fn new(identity: VerifiedIdentity) -> Option<Self> {
        identity.is_production().then_some(Self(identity))
    }
}
