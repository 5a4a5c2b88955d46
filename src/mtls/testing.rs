//! Certificate fixtures for unit tests.

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::CertificateDer;

use crate::mtls::trust_store::TrustAnchor;

fn params(cn: &str, ca: bool) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    dn.push(DnType::OrganizationName, "Lovecraft");
    params.distinguished_name = dn;
    if ca {
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature];
    }
    params
}

/// A throwaway certificate authority.
pub(crate) struct TestCa {
    der: CertificateDer<'static>,
    pem: String,
    issuer: Issuer<'static, KeyPair>,
}

impl TestCa {
    pub(crate) fn new(cn: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let cert = params(cn, true).self_signed(&key).unwrap();
        Self {
            der: cert.der().clone(),
            pem: cert.pem(),
            issuer: Issuer::new(params(cn, true), key),
        }
    }

    pub(crate) fn der(&self) -> CertificateDer<'static> {
        self.der.clone()
    }

    pub(crate) fn pem(&self) -> String {
        self.pem.clone()
    }

    pub(crate) fn anchor(&self) -> TrustAnchor {
        TrustAnchor::from_der(self.der()).unwrap()
    }

    /// Issue a client leaf certificate.
    pub(crate) fn issue(&self, cn: &str) -> CertificateDer<'static> {
        let key = KeyPair::generate().unwrap();
        params(cn, false)
            .signed_by(&key, &self.issuer)
            .unwrap()
            .der()
            .clone()
    }

    /// Issue a subordinate CA.
    pub(crate) fn intermediate(&self, cn: &str) -> TestCa {
        let key = KeyPair::generate().unwrap();
        let cert = params(cn, true).signed_by(&key, &self.issuer).unwrap();
        TestCa {
            der: cert.der().clone(),
            pem: cert.pem(),
            issuer: Issuer::new(params(cn, true), key),
        }
    }
}

pub(crate) fn self_signed_leaf(cn: &str) -> CertificateDer<'static> {
    let key = KeyPair::generate().unwrap();
    params(cn, false).self_signed(&key).unwrap().der().clone()
}

/// Collect the audit events emitted while `f` runs on this thread.
pub(crate) fn capture_audit<R>(f: impl FnOnce() -> R) -> (R, Vec<serde_json::Value>) {
    let (subscriber, buf) = audit_subscriber();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, audit_events(&buf))
}

/// A JSON `fmt` subscriber writing into a shared buffer.
pub(crate) fn audit_subscriber() -> (impl tracing::Subscriber + Send + Sync, AuditBuffer) {
    let buf = AuditBuffer::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_writer(move || writer.clone())
        .finish();
    (subscriber, buf)
}

/// Parse every `audit` field written to `buf`.
pub(crate) fn audit_events(buf: &AuditBuffer) -> Vec<serde_json::Value> {
    let bytes = buf.0.lock().unwrap().clone();
    String::from_utf8(bytes)
        .unwrap()
        .lines()
        .filter_map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).ok()?;
            let audit = record["fields"]["audit"].as_str()?;
            serde_json::from_str(audit).ok()
        })
        .collect()
}

#[derive(Clone, Default)]
pub(crate) struct AuditBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for AuditBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
