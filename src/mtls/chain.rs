//! Chain-of-trust validation against the single configured anchor.
//!
//! Paths are built with `rustls-webpki` using the anchor as the only root.
//! The ambient system store is never consulted and revocation is not
//! checked: these are private certificates with no CRL/OCSP infrastructure.

use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, UnixTime};
use tracing::debug;
use webpki::{EndEntityCert, KeyUsage};

use crate::mtls::certificate::{Fingerprint, PeerCertificate};
use crate::mtls::trust_store::TrustAnchor;
use crate::{Error, Result};

/// Result of a chain build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainResult {
    /// Whether a valid path to the anchor exists (always `true` without one).
    pub built: bool,
    /// Fingerprint of the anchor the path terminated at.
    pub terminal_fingerprint: Option<Fingerprint>,
}

impl ChainResult {
    fn skipped() -> Self {
        Self {
            built: true,
            terminal_fingerprint: None,
        }
    }

    fn broken() -> Self {
        Self {
            built: false,
            terminal_fingerprint: None,
        }
    }

    /// `true` when the chain satisfies `anchor`: no anchor configured, or a
    /// path was built that terminates at exactly that anchor.
    #[must_use]
    pub fn terminates_at(&self, anchor: Option<&TrustAnchor>) -> bool {
        match anchor {
            None => self.built,
            Some(anchor) => {
                self.built && self.terminal_fingerprint.as_ref() == Some(anchor.fingerprint())
            }
        }
    }
}

/// Stateless chain validator.
///
/// Holds only the signature algorithms it accepts; every input, including
/// the current time, is passed to [`ChainValidator::validate`].
#[derive(Debug, Clone, Copy)]
pub struct ChainValidator {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ChainValidator {
    /// Validator using the given provider's signature algorithms.
    #[must_use]
    pub fn new(algorithms: WebPkiSupportedAlgorithms) -> Self {
        Self { algorithms }
    }

    /// Build and verify the chain from `cert` (plus any peer-supplied
    /// `intermediates`) to `anchor`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Certificate` if the leaf cannot be decoded for path
    /// building. A decodable leaf without a valid path is `Ok` with
    /// `built == false`.
    pub fn validate(
        &self,
        cert: &PeerCertificate,
        intermediates: &[CertificateDer<'_>],
        anchor: Option<&TrustAnchor>,
        now: UnixTime,
    ) -> Result<ChainResult> {
        let Some(anchor) = anchor else {
            return Ok(ChainResult::skipped());
        };

        let end_entity = EndEntityCert::try_from(cert.der())
            .map_err(|e| Error::Certificate(format!("Cannot decode end-entity certificate: {e}")))?;

        let roots = [anchor.webpki_anchor().clone()];
        let path = match end_entity.verify_for_usage(
            self.algorithms.all,
            &roots,
            intermediates,
            now,
            KeyUsage::client_auth(),
            None,
            None,
        ) {
            Ok(path) => path,
            Err(e) => {
                debug!(fingerprint = %cert.fingerprint(), error = %e, "No valid path to trust anchor");
                return Ok(ChainResult::broken());
            }
        };

        if !anchor.is_same_anchor(path.anchor()) {
            debug!(fingerprint = %cert.fingerprint(), "Path terminated at a different anchor");
            return Ok(ChainResult::broken());
        }

        Ok(ChainResult {
            built: true,
            terminal_fingerprint: Some(anchor.fingerprint().clone()),
        })
    }
}

impl Default for ChainValidator {
    fn default() -> Self {
        Self::new(
            rustls::crypto::aws_lc_rs::default_provider().signature_verification_algorithms,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
