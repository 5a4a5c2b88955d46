//! Shared fixtures for integration tests: throwaway CAs, client and server
//! certificates generated with rcgen.

#![allow(dead_code)]

use std::path::Path;

use mtls_gate::config::TlsConfig;
use mtls_gate::mtls::{Fingerprint, TrustAnchor};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

fn params(cn: &str, ca: bool) -> CertificateParams {
    let mut params = CertificateParams::new(vec![cn.to_string()]).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    dn.push(DnType::OrganizationName, "Lovecraft");
    params.distinguished_name = dn;
    if ca {
        params.subject_alt_names.clear();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::DigitalSignature];
    }
    params
}

/// A certificate together with its private key.
pub struct Issued {
    pub der: CertificateDer<'static>,
    pub pem: String,
    pub key_pem: String,
    key_der: Vec<u8>,
}

impl Issued {
    pub fn key(&self) -> PrivateKeyDer<'static> {
        PrivatePkcs8KeyDer::from(self.key_der.clone()).into()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_der(self.der.as_ref())
    }
}

/// A throwaway certificate authority.
pub struct TestCa {
    pub der: CertificateDer<'static>,
    pub pem: String,
    issuer: Issuer<'static, KeyPair>,
}

impl TestCa {
    pub fn new(cn: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let cert = params(cn, true).self_signed(&key).unwrap();
        Self {
            der: cert.der().clone(),
            pem: cert.pem(),
            issuer: Issuer::new(params(cn, true), key),
        }
    }

    pub fn anchor(&self) -> TrustAnchor {
        TrustAnchor::from_der(self.der.clone()).unwrap()
    }

    /// Issue an end-entity certificate. `cn` doubles as the DNS SAN.
    pub fn issue(&self, cn: &str) -> Issued {
        let key = KeyPair::generate().unwrap();
        let cert = params(cn, false).signed_by(&key, &self.issuer).unwrap();
        Issued {
            der: cert.der().clone(),
            pem: cert.pem(),
            key_pem: key.serialize_pem(),
            key_der: key.serialize_der(),
        }
    }
}

/// A self-signed end-entity certificate with its key.
pub fn self_signed(cn: &str) -> Issued {
    let key = KeyPair::generate().unwrap();
    let cert = params(cn, false).self_signed(&key).unwrap();
    Issued {
        der: cert.der().clone(),
        pem: cert.pem(),
        key_pem: key.serialize_pem(),
        key_der: key.serialize_der(),
    }
}

/// Write server identity (and optionally a CA file) into `dir` and return
/// the matching TLS config.
pub fn tls_config(dir: &Path, server: &Issued, client_ca: Option<&TestCa>) -> TlsConfig {
    let write = |name: &str, contents: &str| {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    };

    TlsConfig {
        server_cert: Some(write("server.crt", &server.pem)),
        server_key: Some(write("server.key", &server.key_pem)),
        ca_cert: client_ca.map(|ca| write("client-ca.crt", &ca.pem)),
        allowed_fingerprints: Vec::new(),
    }
}
