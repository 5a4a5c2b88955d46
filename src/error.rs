//! Error types for mtls-gate

use std::io;

use thiserror::Error;

/// Result type alias for mtls-gate
pub type Result<T> = std::result::Result<T, Error>;

/// mtls-gate errors
///
/// These cover startup and tooling failures. Per-handshake and per-request
/// trust failures never escape as `Error`; they are folded into a
/// [`RejectReason`](crate::mtls::RejectReason) at the decision boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A certificate could not be decoded
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// TLS stack error
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error must abort startup rather than be logged and skipped.
    #[must_use]
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Tls(_))
    }
}
