//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

/// Mutual-TLS gate: anchor-pinned, fingerprint-pinned client authentication
#[derive(Parser, Debug)]
#[command(name = "mtls-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "MTLS_GATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "MTLS_GATE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "MTLS_GATE_HOST")]
    pub host: Option<String>,

    /// CA certificate (PEM or DER) client chains must terminate at
    #[arg(long, env = "MTLS_GATE_CA_CERT", global = true)]
    pub ca_cert: Option<String>,

    /// Comma-separated SHA-256 fingerprints of allowed client certificates
    #[arg(long, env = "ALLOWED_CLIENT_FINGERPRINTS", global = true)]
    pub allowed_fingerprints: Option<String>,

    /// Non-production mode: certificate-less requests become `dev-client`
    #[arg(long, global = true)]
    pub development: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "MTLS_GATE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "MTLS_GATE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the protected listener (default)
    Serve,

    /// Print the SHA-256 fingerprint of each certificate in a file
    Fingerprint {
        /// PEM or DER certificate file
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Check a client chain (PEM, leaf first) against the configured trust
    Verify {
        /// PEM or DER certificate file
        #[arg(required = true)]
        file: PathBuf,
    },
}

impl Cli {
    /// Apply command-line overrides on top of file and environment config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref host) = self.host {
            config.server.host.clone_from(host);
        }
        if let Some(ref ca_cert) = self.ca_cert {
            config.tls.ca_cert = Some(ca_cert.clone());
        }
        if let Some(ref csv) = self.allowed_fingerprints {
            config.tls.allowed_fingerprints.clear();
            config.tls.extend_allowed_fingerprints(csv);
        }
        if self.development {
            config.server.development = true;
        }
    }
}
