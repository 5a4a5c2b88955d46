//! Peer certificate model.
//!
//! Parses an X.509 DER-encoded certificate presented by a peer and extracts
//! what the trust pipeline and the audit log need: subject DN, validity
//! window and the SHA-256 fingerprint.

use std::fmt;

use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::{Error, Result};

/// Length of a normalized SHA-256 fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Fingerprint
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized certificate fingerprint: uppercase hex, no separators.
///
/// Computed as SHA-256 over the DER encoding. Externally supplied values go
/// through [`Fingerprint::normalize`] so `"AA:BB:CC"`, `"aabbcc"` and
/// `"AA BB CC"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of raw DER bytes. Works on bytes that fail to parse.
    #[must_use]
    pub fn of_der(der: &[u8]) -> Self {
        Self(hex::encode_upper(Sha256::digest(der)))
    }

    /// Normalize an operator-supplied fingerprint string.
    ///
    /// Strips `:`, `-` and whitespace, then uppercases. No other validation
    /// happens here; see [`Fingerprint::is_well_formed`].
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        Self(
            raw.chars()
                .filter(|c| !matches!(c, ':' | '-') && !c.is_whitespace())
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        )
    }

    /// `true` for exactly 64 hex digits.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == FINGERPRINT_HEX_LEN && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Hex string view.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty fingerprint, used only by the development identity.
    pub(crate) fn empty() -> Self {
        Self(String::new())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Peer certificate
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed leaf certificate presented by a peer.
///
/// Holds the raw DER so the chain validator can re-decode it; nothing here
/// is mutated after construction.
#[derive(Debug, Clone)]
pub struct PeerCertificate {
    der: CertificateDer<'static>,
    subject: String,
    fingerprint: Fingerprint,
    not_before: i64,
    not_after: i64,
}

impl PeerCertificate {
    /// Parse a DER-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `Error::Certificate` if the bytes are not a single well-formed
    /// X.509 certificate.
    pub fn from_der(der: CertificateDer<'static>) -> Result<Self> {
        let (rest, cert) = X509Certificate::from_der(der.as_ref())
            .map_err(|e| Error::Certificate(format!("Failed to parse certificate: {e}")))?;
        if !rest.is_empty() {
            return Err(Error::Certificate(format!(
                "{} trailing bytes after certificate",
                rest.len()
            )));
        }

        let subject = cert.subject().to_string();
        let not_before = cert.validity().not_before.timestamp();
        let not_after = cert.validity().not_after.timestamp();
        let fingerprint = Fingerprint::of_der(der.as_ref());

        Ok(Self {
            der,
            subject,
            fingerprint,
            not_before,
            not_after,
        })
    }

    /// Raw DER encoding.
    #[must_use]
    pub fn der(&self) -> &CertificateDer<'static> {
        &self.der
    }

    /// Subject distinguished name, RFC 4514 style (`CN=..., O=...`).
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Normalized SHA-256 fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Validity window as Unix timestamps `(not_before, not_after)`.
    #[must_use]
    pub fn validity(&self) -> (i64, i64) {
        (self.not_before, self.not_after)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
