//! Configuration management
//!
//! Layering (later wins): YAML file → `MTLS_GATE_*` environment variables
//! (`__` separates nesting levels) → CLI overrides applied by `main`.
//!
//! # Example YAML
//!
//! ```yaml
//! server:
//!   host: "0.0.0.0"
//!   port: 5001
//!   development: false
//! tls:
//!   server_cert: "/etc/mtls-gate/server.crt"
//!   server_key:  "/etc/mtls-gate/server.key"
//!   ca_cert:     "/etc/mtls-gate/ca.crt"
//!   allowed_fingerprints: "AA:BB:CC..., DD EE FF..."
//! ```

use std::{env, path::Path};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// Certificate and trust configuration
    pub tls: TlsConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Non-production mode.
    ///
    /// Enables the development bypass (requests without any client
    /// certificate get the `dev-client` identity) and allows the listener to
    /// run as plain HTTP when no server certificate is configured.
    pub development: bool,
    /// Paths that skip request authentication (default: `["/health"]`)
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            development: false,
            public_paths: default_public_paths(),
        }
    }
}

/// Certificate and trust configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to the PEM-encoded server certificate chain.
    pub server_cert: Option<String>,

    /// Path to the PEM-encoded server private key.
    pub server_key: Option<String>,

    /// Path to the CA certificate (PEM or DER) that client chains must
    /// terminate at.
    ///
    /// When unset, chain building is skipped and the fingerprint allow-list
    /// is the only gate. A path that is set but unusable aborts startup.
    pub ca_cert: Option<String>,

    /// Allowed client certificate fingerprints (SHA-256 of the DER).
    ///
    /// Accepts a comma-separated string or a list; separators (`:`, `-`,
    /// whitespace) and case are ignored. Empty means "no additional
    /// restriction".
    #[serde(deserialize_with = "string_or_list")]
    pub allowed_fingerprints: Vec<String>,
}

impl TlsConfig {
    /// The configured CA path, trimmed.
    ///
    /// `None` only when the key is absent. A present but blank value is
    /// returned as `Some("")` so the trust store can refuse it.
    #[must_use]
    pub fn ca_cert_path(&self) -> Option<&str> {
        self.ca_cert.as_deref().map(str::trim)
    }

    /// Server certificate and key paths, if both are configured.
    #[must_use]
    pub fn server_identity_paths(&self) -> Option<(&str, &str)> {
        non_blank(self.server_cert.as_deref()).zip(non_blank(self.server_key.as_deref()))
    }

    /// Append entries from a comma-separated list (CLI / env override).
    pub fn extend_allowed_fingerprints(&mut self, csv: &str) {
        self.allowed_fingerprints.extend(split_csv(csv));
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn split_csv(csv: &str) -> impl Iterator<Item = String> + '_ {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Deserialize either `"a, b"` or `["a", "b, c"]` into a flat list.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => split_csv(&s).collect(),
        StringOrList::Many(items) => items.iter().flat_map(|s| split_csv(s)).collect(),
    })
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed,
    /// or if a path references an unset `${VAR}` without a default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("MTLS_GATE_").split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.expand_env_vars()?;

        Ok(config)
    }

    /// Expand `${VAR}` and `${VAR:-default}` patterns in path values
    fn expand_env_vars(&mut self) -> Result<()> {
        let re = env_var_pattern()?;

        for path in [
            &mut self.tls.server_cert,
            &mut self.tls.server_key,
            &mut self.tls.ca_cert,
        ]
        .into_iter()
        .flatten()
        {
            *path = Self::expand_string(&re, path)?;
        }
        Ok(())
    }

    /// Expand environment variables in a string.
    ///
    /// An unset variable without `:-default` is an error rather than an empty
    /// string, so a templated CA path can never collapse into "no CA".
    fn expand_string(re: &Regex, value: &str) -> Result<String> {
        let mut missing = None;
        let expanded = re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            match (env::var(var_name), caps.get(2)) {
                (Ok(v), _) => v,
                (Err(_), Some(default)) => default.as_str().to_string(),
                (Err(_), None) => {
                    missing.get_or_insert_with(|| var_name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(var) => Err(Error::Config(format!(
                "Environment variable '{var}' referenced in '{value}' is not set"
            ))),
            None => Ok(expanded.into_owned()),
        }
    }
}

fn env_var_pattern() -> Result<Regex> {
    Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| Error::Internal(format!("env pattern: {e}")))
}
