//! Handshake-layer client certificate verification and TLS config building.
//!
//! Provides:
//! - [`HandshakeGatekeeper`]: the rustls `ClientCertVerifier` that admits or
//!   refuses each connection
//! - [`build_tls_config`]: TLS 1.3 `rustls::ServerConfig` with the
//!   gatekeeper installed and client certificates mandatory
//! - [`load_certs`] / [`load_private_key`]: certificate and key file loading
//!
//! # File format
//!
//! Certificate files are PEM; a file with no PEM blocks is read as a single
//! DER certificate. Private keys must be PEM (PKCS#8, PKCS#1 or SEC1).

use std::fs;
use std::sync::Arc;

use rustls::client::danger::HandshakeSignatureValid;
use rustls::crypto::{
    CryptoProvider, WebPkiSupportedAlgorithms, aws_lc_rs, verify_tls12_signature,
    verify_tls13_signature,
};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{
    CertificateError, DigitallySignedStruct, DistinguishedName, ServerConfig, SignatureScheme,
};
use tracing::debug;

use crate::config::TlsConfig;
use crate::mtls::audit::{self, AuditEvent, Layer};
use crate::mtls::chain::ChainValidator;
use crate::mtls::decision::{Evaluation, TrustEvaluator};
use crate::mtls::trust_store::TrustStore;
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Gatekeeper
// ─────────────────────────────────────────────────────────────────────────────

/// Admits or refuses TLS connections based on the client certificate.
///
/// Every refusal is reported to rustls as the same
/// `ApplicationVerificationFailure`, so the peer learns nothing about which
/// check failed. The reason goes to the audit log only.
#[derive(Debug)]
pub struct HandshakeGatekeeper {
    evaluator: TrustEvaluator,
    algorithms: WebPkiSupportedAlgorithms,
    root_hints: Vec<DistinguishedName>,
}

impl HandshakeGatekeeper {
    /// Gatekeeper over `store`, verifying signatures with `provider`.
    #[must_use]
    pub fn new(store: Arc<TrustStore>, provider: &CryptoProvider) -> Self {
        let algorithms = provider.signature_verification_algorithms;
        let root_hints = store
            .anchor()
            .map(|anchor| vec![anchor.root_hint().clone()])
            .unwrap_or_default();

        Self {
            evaluator: TrustEvaluator::with_validator(store, ChainValidator::new(algorithms)),
            algorithms,
            root_hints,
        }
    }

    /// Evaluate a presented chain (leaf first) and write the audit line.
    #[must_use]
    pub fn decide(&self, chain: &[CertificateDer<'_>], now: UnixTime) -> Evaluation {
        let evaluation = self.evaluator.evaluate(chain, now);
        let event = match &evaluation.outcome {
            Ok(cert) => AuditEvent::accepted(Layer::Handshake, evaluation.fingerprint.as_ref())
                .with_subject(cert.subject())
                .with_valid_until(cert.validity().1),
            Err(reason) => {
                AuditEvent::rejected(Layer::Handshake, evaluation.fingerprint.as_ref(), *reason)
            }
        };
        audit::emit(&event);
        evaluation
    }
}

impl ClientCertVerifier for HandshakeGatekeeper {
    fn offer_client_auth(&self) -> bool {
        true
    }

    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        &self.root_hints
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        let mut chain = Vec::with_capacity(intermediates.len() + 1);
        chain.push(end_entity.clone());
        chain.extend(intermediates.iter().cloned());

        if self.decide(&chain, now).is_accepted() {
            Ok(ClientCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public: build TLS server config
// ─────────────────────────────────────────────────────────────────────────────

/// Build a TLS 1.3 `rustls::ServerConfig` that requires a client
/// certificate and routes it through [`HandshakeGatekeeper`].
///
/// # Errors
///
/// Returns `Error::Config` if the server certificate or key is not
/// configured, cannot be read, or do not match.
pub fn build_tls_config(config: &TlsConfig, store: Arc<TrustStore>) -> Result<ServerConfig> {
    let (cert_path, key_path) = config.server_identity_paths().ok_or_else(|| {
        Error::Config("tls.server_cert and tls.server_key are required".to_string())
    })?;
    let server_certs = load_certs(cert_path)?;
    let server_key = load_private_key(key_path)?;

    let provider = Arc::new(aws_lc_rs::default_provider());
    let gatekeeper = Arc::new(HandshakeGatekeeper::new(store, &provider));

    let mut tls_cfg = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])?
        .with_client_cert_verifier(gatekeeper)
        .with_single_cert(server_certs, server_key)
        .map_err(|e| Error::Config(format!("TLS config error (cert/key mismatch?): {e}")))?;

    // Prefer HTTP/2, fall back to HTTP/1.1
    tls_cfg.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    debug!(server_cert = %cert_path, "mTLS config built");

    Ok(tls_cfg)
}

// ─────────────────────────────────────────────────────────────────────────────
// Public: file loading
// ─────────────────────────────────────────────────────────────────────────────

/// Load all certificates from a PEM file, or a single certificate from a
/// DER file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is empty, or its PEM blocks
/// are malformed.
pub fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let data = read_file(path)?;
    let certs = CertificateDer::pem_slice_iter(&data)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Config(format!("Failed to parse certs from '{path}': {e}")))?;

    if !certs.is_empty() {
        return Ok(certs);
    }
    if data.is_empty() || data.starts_with(b"-----") {
        return Err(Error::Config(format!("No certificates found in '{path}'")));
    }
    Ok(vec![CertificateDer::from(data)])
}

/// Load the first private key from a PEM file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or contains no private key.
pub fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let data = read_file(path)?;
    PrivateKeyDer::from_pem_slice(&data)
        .map_err(|e| Error::Config(format!("Failed to parse private key from '{path}': {e}")))
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::Config(format!("Cannot read '{path}': {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
