//! mTLS Gate Library
//!
//! Mutual-TLS client authentication for machine-to-machine APIs.
//!
//! # Features
//!
//! - **Anchor pinning**: client chains must terminate at one configured CA
//! - **Fingerprint allow-list**: SHA-256 pinning of leaf certificates
//! - **Two layers**: checked at the TLS handshake and again on every request
//! - **Verified identity**: subject + fingerprint handed to axum handlers
//! - **Audit trail**: one structured log line per decision
//! - **Development bypass**: explicit, loudly logged, non-production only

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mtls;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
    }
}
