//! Trust configuration: the optional CA anchor and the fingerprint allow-list.
//!
//! Built once at startup by [`TrustStore::from_config`] and shared read-only
//! (behind an `Arc`) by the handshake verifier and the request middleware.
//! There is no reload path; a new configuration means a new `TrustStore`.
//!
//! # File format
//!
//! The CA file may be PEM (one `CERTIFICATE` block) or raw DER. Bundles with
//! more than one certificate are refused: exactly one anchor is trusted.

use std::collections::BTreeSet;

use rustls::DistinguishedName;
use rustls::pki_types::{self, CertificateDer};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::config::TlsConfig;
use crate::mtls::certificate::{FINGERPRINT_HEX_LEN, Fingerprint, PeerCertificate};
use crate::mtls::handshake::load_certs;
use crate::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Trust anchor
// ─────────────────────────────────────────────────────────────────────────────

/// The configured root/CA certificate every accepted chain must end at.
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    certificate: PeerCertificate,
    anchor: pki_types::TrustAnchor<'static>,
    hint: DistinguishedName,
}

impl TrustAnchor {
    /// Build an anchor from a DER certificate.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the certificate cannot be parsed or used as
    /// a trust anchor.
    pub fn from_der(der: CertificateDer<'static>) -> Result<Self> {
        let certificate = PeerCertificate::from_der(der.clone())
            .map_err(|e| Error::Config(format!("CA certificate is unusable: {e}")))?;
        let anchor = webpki::anchor_from_trusted_cert(&der)
            .map_err(|e| Error::Config(format!("CA certificate is not a valid trust anchor: {e}")))?
            .to_owned();
        let hint = DistinguishedName::in_sequence(anchor.subject.as_ref());

        Ok(Self {
            certificate,
            anchor,
            hint,
        })
    }

    /// Load the anchor from a PEM or DER file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file is unreadable, holds no
    /// certificate, holds more than one, or the certificate is unusable.
    pub fn load(path: &str) -> Result<Self> {
        let mut certs = load_certs(path)?;
        if certs.len() > 1 {
            return Err(Error::Config(format!(
                "'{path}' holds {} certificates; exactly one CA certificate is supported",
                certs.len()
            )));
        }
        let anchor = Self::from_der(certs.remove(0))?;
        debug!(path, "CA certificate loaded");
        Ok(anchor)
    }

    /// Fingerprint of the anchor certificate.
    #[must_use]
    pub fn fingerprint(&self) -> &Fingerprint {
        self.certificate.fingerprint()
    }

    /// Subject DN of the anchor certificate.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.certificate.subject()
    }

    /// The anchor in the form the path builder consumes.
    #[must_use]
    pub fn webpki_anchor(&self) -> &pki_types::TrustAnchor<'static> {
        &self.anchor
    }

    /// DER subject sent to clients as the acceptable-CA hint.
    #[must_use]
    pub fn root_hint(&self) -> &DistinguishedName {
        &self.hint
    }

    /// Whether a path-builder anchor is this exact anchor (name *and* key).
    #[must_use]
    pub fn is_same_anchor(&self, other: &pki_types::TrustAnchor<'_>) -> bool {
        self.anchor.subject.as_ref() == other.subject.as_ref()
            && self.anchor.subject_public_key_info.as_ref()
                == other.subject_public_key_info.as_ref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Allowed fingerprints
// ─────────────────────────────────────────────────────────────────────────────

/// Set of normalized fingerprints a leaf certificate must belong to.
///
/// Malformed entries are kept: they can never match, so a list made only of
/// typos still rejects everything rather than collapsing to "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedFingerprintSet {
    entries: BTreeSet<Fingerprint>,
}

impl AllowedFingerprintSet {
    /// Build from raw entries. Blank entries are dropped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|e| Fingerprint::normalize(e.as_ref()))
                .filter(|fp| !fp.as_str().is_empty())
                .collect(),
        }
    }

    /// Parse a comma-separated list.
    #[must_use]
    pub fn parse(csv: &str) -> Self {
        Self::from_entries(csv.split(','))
    }

    /// `true` when no entries are configured ("no additional restriction").
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Membership test. Compares against every entry in constant time per
    /// entry, without early exit.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        let needle = fingerprint.as_str().as_bytes();
        let found = self
            .entries
            .iter()
            .fold(subtle::Choice::from(0), |acc, entry| {
                acc | entry.as_str().as_bytes().ct_eq(needle)
            });
        bool::from(found)
    }

    /// Entries that are not 64 hex digits.
    pub fn malformed(&self) -> impl Iterator<Item = &Fingerprint> {
        self.entries.iter().filter(|fp| !fp.is_well_formed())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trust store
// ─────────────────────────────────────────────────────────────────────────────

/// Which combination of gates is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPosture {
    /// Chain to the anchor *and* fingerprint membership.
    AnchorAndAllowList,
    /// Chain to the anchor only.
    AnchorOnly,
    /// Fingerprint membership is the only gate.
    AllowListOnly,
    /// Any syntactically valid certificate is accepted.
    AcceptAny,
}

/// Read-only trust configuration.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    anchor: Option<TrustAnchor>,
    allowed: AllowedFingerprintSet,
}

impl TrustStore {
    /// Assemble a store from already-loaded parts.
    #[must_use]
    pub fn new(anchor: Option<TrustAnchor>, allowed: AllowedFingerprintSet) -> Self {
        Self { anchor, allowed }
    }

    /// Load from configuration and log the resulting posture.
    ///
    /// # Errors
    ///
    /// A configured CA path that is blank or cannot be loaded is fatal: chain
    /// checks are never silently disabled. Only an absent key means "no CA".
    pub fn from_config(config: &TlsConfig) -> Result<Self> {
        let anchor = match config.ca_cert_path() {
            None => None,
            Some("") => {
                return Err(Error::Config(
                    "tls.ca_cert is set but empty; remove the key to run without a CA".into(),
                ));
            }
            Some(path) => Some(TrustAnchor::load(path)?),
        };
        let allowed = AllowedFingerprintSet::from_entries(&config.allowed_fingerprints);
        let store = Self::new(anchor, allowed);
        store.log_posture();
        Ok(store)
    }

    /// The configured anchor, if any.
    #[must_use]
    pub fn anchor(&self) -> Option<&TrustAnchor> {
        self.anchor.as_ref()
    }

    /// The fingerprint allow-list (possibly empty).
    #[must_use]
    pub fn allowed(&self) -> &AllowedFingerprintSet {
        &self.allowed
    }

    /// Active gate combination.
    #[must_use]
    pub fn posture(&self) -> TrustPosture {
        match (self.anchor.is_some(), self.allowed.is_empty()) {
            (true, false) => TrustPosture::AnchorAndAllowList,
            (true, true) => TrustPosture::AnchorOnly,
            (false, false) => TrustPosture::AllowListOnly,
            (false, true) => TrustPosture::AcceptAny,
        }
    }

    fn log_posture(&self) {
        if let Some(anchor) = &self.anchor {
            info!(
                ca_subject = %anchor.subject(),
                ca_fingerprint = %anchor.fingerprint(),
                "Client chains pinned to CA"
            );
        }

        for entry in self.allowed.malformed() {
            if entry.as_str().len() == 40 {
                warn!(entry = %entry, "Allowed fingerprint looks like a SHA-1 thumbprint; fingerprints are SHA-256 and this entry will never match");
            } else {
                warn!(entry = %entry, expected_len = FINGERPRINT_HEX_LEN, "Allowed fingerprint is not 64 hex digits and will never match");
            }
        }

        match self.posture() {
            TrustPosture::AnchorAndAllowList | TrustPosture::AnchorOnly => {
                info!(allowed_fingerprints = self.allowed.len(), "Trust store loaded");
            }
            TrustPosture::AllowListOnly => {
                warn!(
                    allowed_fingerprints = self.allowed.len(),
                    "No CA configured: fingerprint allow-list is the only client certificate check"
                );
            }
            TrustPosture::AcceptAny => {
                warn!("No CA and no fingerprint allow-list configured: ANY client certificate will be accepted");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, DistinguishedName as RcDn, DnType, IsCa, KeyPair};

    fn ca_cert(cn: &str) -> rcgen::Certificate {
        let mut params = CertificateParams::default();
        let mut dn = RcDn::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.self_signed(&KeyPair::generate().unwrap()).unwrap()
    }

    fn fp(n: u8) -> String {
        format!("{n:02X}").repeat(32)
    }

    // ── allow-list ───────────────────────────────────────────────────────────

    #[test]
    fn parse_normalizes_and_drops_blank_entries() {
        let set = AllowedFingerprintSet::parse(&format!(" {} , ,{}", fp(1).to_lowercase(), fp(2)));
        assert_eq!(set.len(), 2);
        assert!(set.contains(&Fingerprint::normalize(&fp(1))));
        assert!(set.contains(&Fingerprint::normalize(&fp(2))));
    }

    #[test]
    fn whitespace_only_list_is_empty() {
        assert!(AllowedFingerprintSet::parse(" , ,").is_empty());
    }

    #[test]
    fn contains_rejects_non_members_and_prefixes() {
        let set = AllowedFingerprintSet::from_entries([fp(1)]);
        assert!(!set.contains(&Fingerprint::normalize(&fp(2))));
        assert!(!set.contains(&Fingerprint::normalize(&fp(1)[..62])));
    }

    #[test]
    fn malformed_entries_are_kept_and_reported() {
        let set = AllowedFingerprintSet::from_entries(["AABB", fp(3).as_str()]);
        assert_eq!(set.len(), 2);
        let malformed: Vec<_> = set.malformed().map(Fingerprint::as_str).collect();
        assert_eq!(malformed, vec!["AABB"]);
    }

    #[test]
    fn separators_collapse_to_one_entry() {
        let set = AllowedFingerprintSet::from_entries(["AA:BB:CC", "aabbcc", "AA BB CC"]);
        assert_eq!(set.len(), 1);
    }

    // ── anchor loading ────────────────────────────────────────────────────────

    #[test]
    fn load_anchor_from_pem_file() {
        let dir = tempfile::tempdir().unwrap();
        let ca = ca_cert("Lovecraft Root CA");
        let path = dir.path().join("ca.pem");
        fs::write(&path, ca.pem()).unwrap();

        let anchor = TrustAnchor::load(path.to_str().unwrap()).unwrap();
        assert!(anchor.subject().contains("Lovecraft Root CA"));
        assert_eq!(anchor.fingerprint(), &Fingerprint::of_der(ca.der()));
    }

    #[test]
    fn load_anchor_from_der_file() {
        let dir = tempfile::tempdir().unwrap();
        let ca = ca_cert("DER CA");
        let path = dir.path().join("ca.der");
        fs::write(&path, ca.der().as_ref()).unwrap();

        let anchor = TrustAnchor::load(path.to_str().unwrap()).unwrap();
        assert_eq!(anchor.fingerprint(), &Fingerprint::of_der(ca.der()));
    }

    #[test]
    fn load_anchor_missing_file_is_config_error() {
        let err = TrustAnchor::load("/nonexistent/ca.pem").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("Cannot read"));
    }

    #[test]
    fn load_anchor_empty_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pem");
        fs::write(&path, b"").unwrap();
        assert!(TrustAnchor::load(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn load_anchor_garbage_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.pem");
        fs::write(&path, b"definitely not a certificate").unwrap();
        assert!(matches!(
            TrustAnchor::load(path.to_str().unwrap()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn load_anchor_bundle_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.pem");
        fs::write(&path, format!("{}{}", ca_cert("A").pem(), ca_cert("B").pem())).unwrap();
        let err = TrustAnchor::load(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn same_anchor_requires_matching_key() {
        // GIVEN: two CAs with the same name but different keys
        let a = TrustAnchor::from_der(ca_cert("Same Name").der().clone()).unwrap();
        let b = TrustAnchor::from_der(ca_cert("Same Name").der().clone()).unwrap();
        // THEN: only the identical anchor matches
        assert!(a.is_same_anchor(a.webpki_anchor()));
        assert!(!a.is_same_anchor(b.webpki_anchor()));
    }

    // ── store ─────────────────────────────────────────────────────────────────

    #[test]
    fn from_config_without_ca_or_list_accepts_any() {
        let store = TrustStore::from_config(&TlsConfig::default()).unwrap();
        assert_eq!(store.posture(), TrustPosture::AcceptAny);
        assert!(store.anchor().is_none());
    }

    #[test]
    fn from_config_with_unreadable_ca_aborts() {
        let cfg = TlsConfig {
            ca_cert: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        };
        let err = TrustStore::from_config(&cfg).unwrap_err();
        assert!(err.is_misconfiguration());
    }

    #[test]
    fn from_config_with_blank_ca_aborts() {
        // GIVEN: a CA key that is present but expanded to nothing
        let cfg = TlsConfig {
            ca_cert: Some(" ".into()),
            allowed_fingerprints: vec![fp(4)],
            ..Default::default()
        };
        // THEN: refused, never downgraded to allow-list-only or accept-any
        let err = TrustStore::from_config(&cfg).unwrap_err();
        assert!(err.is_misconfiguration());
        assert!(err.to_string().contains("ca_cert"));
    }

    #[test]
    fn posture_reflects_configured_gates() {
        let anchor = TrustAnchor::from_der(ca_cert("CA").der().clone()).unwrap();
        let list = AllowedFingerprintSet::from_entries([fp(9)]);

        assert_eq!(
            TrustStore::new(Some(anchor.clone()), list.clone()).posture(),
            TrustPosture::AnchorAndAllowList
        );
        assert_eq!(
            TrustStore::new(Some(anchor), AllowedFingerprintSet::default()).posture(),
            TrustPosture::AnchorOnly
        );
        assert_eq!(
            TrustStore::new(None, list).posture(),
            TrustPosture::AllowListOnly
        );
    }
}
