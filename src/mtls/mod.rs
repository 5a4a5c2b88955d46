//! Mutual TLS client certificate trust validation.
//!
//! # Architecture
//!
//! ```text
//! TCP connection
//!   → TLS handshake      (HandshakeGatekeeper: chain + fingerprint, admit/deny)
//!   → peer chain captured from the live session
//!   → HTTP request
//!   → request middleware (RequestAuthenticator: same checks again)
//!   → VerifiedIdentity in request extensions
//!   → route handler
//! ```
//!
//! Both layers call the same [`TrustEvaluator`]; only the glue differs.
//!
//! # Modules
//!
//! - [`certificate`]: parsed peer certificates and SHA-256 fingerprints
//! - [`trust_store`]: the configured anchor and fingerprint allow-list
//! - [`chain`]: anchor-pinned chain building
//! - [`gate`]: allow-list membership
//! - [`decision`]: the shared evaluation and its outcome types
//! - [`identity`]: the identity handed to handlers
//! - [`handshake`]: rustls verifier and server config
//! - [`audit`]: one structured log line per decision
//!
//! # Quick start
//!
//! ```yaml
//! tls:
//!   server_cert: "/etc/mtls-gate/server.crt"
//!   server_key:  "/etc/mtls-gate/server.key"
//!   ca_cert:     "/etc/mtls-gate/ca.crt"
//!   allowed_fingerprints:
//!     - "3F:A2:...:9C"
//! ```

pub mod audit;
pub mod certificate;
pub mod chain;
pub mod decision;
pub mod gate;
pub mod handshake;
pub mod identity;
pub mod trust_store;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditEvent, Layer};
pub use certificate::{Fingerprint, PeerCertificate};
pub use chain::{ChainResult, ChainValidator};
pub use decision::{Evaluation, RejectReason, TrustEvaluator, ValidationOutcome};
pub use handshake::{HandshakeGatekeeper, build_tls_config, load_certs, load_private_key};
pub use identity::{IdentityOrigin, ProductionIdentity, VerifiedIdentity};
pub use trust_store::{AllowedFingerprintSet, TrustAnchor, TrustPosture, TrustStore};
