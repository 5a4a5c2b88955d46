//! Fingerprint allow-list gate.

use crate::mtls::certificate::PeerCertificate;
use crate::mtls::trust_store::AllowedFingerprintSet;

/// Whether `cert` passes the allow-list.
///
/// An empty list places no additional restriction. Certificate fingerprints
/// are already in normalized form, so membership is a direct lookup.
#[must_use]
pub fn allows(cert: &PeerCertificate, allow_list: &AllowedFingerprintSet) -> bool {
    allow_list.is_empty() || allow_list.contains(cert.fingerprint())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mtls::testing::self_signed_leaf;

    fn cert() -> PeerCertificate {
        PeerCertificate::from_der(self_signed_leaf("client")).unwrap()
    }

    #[test]
    fn empty_list_allows_everything() {
        assert!(allows(&cert(), &AllowedFingerprintSet::default()));
    }

    #[test]
    fn listed_fingerprint_is_allowed_in_any_notation() {
        // GIVEN: the operator pasted the fingerprint lowercase with colons
        let cert = cert();
        let pasted = cert
            .fingerprint()
            .as_str()
            .as_bytes()
            .chunks(2)
            .map(|pair| String::from_utf8_lossy(pair).to_lowercase())
            .collect::<Vec<_>>()
            .join(":");
        let list = AllowedFingerprintSet::parse(&pasted);
        // THEN: still a member
        assert!(allows(&cert, &list));
    }

    #[test]
    fn unlisted_fingerprint_is_refused() {
        let list = AllowedFingerprintSet::parse(&"AB".repeat(32));
        assert!(!allows(&cert(), &list));
    }

    #[test]
    fn list_of_only_malformed_entries_refuses_everything() {
        let list = AllowedFingerprintSet::parse("not-a-fingerprint, 1234");
        assert!(!list.is_empty());
        assert!(!allows(&cert(), &list));
    }
}
