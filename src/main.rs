//! mTLS Gate - mutual-TLS client authentication for machine-to-machine APIs

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rustls::pki_types::UnixTime;
use tracing::{error, info};

use mtls_gate::{
    cli::{Cli, Command},
    config::Config,
    gateway::Server,
    mtls::{Fingerprint, TrustEvaluator, TrustStore, ValidationOutcome, load_certs},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    // .env must be loaded before clap reads env-backed flags
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    // Handle subcommands
    match &cli.command {
        Some(Command::Fingerprint { file }) => run_fingerprint(file),
        Some(Command::Verify { file }) => run_verify(&cli, file),
        Some(Command::Serve) | None => run_server(&cli).await,
    }
}

fn load_config(cli: &Cli) -> mtls_gate::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    Ok(config)
}

/// Print fingerprints for building allow-lists
fn run_fingerprint(file: &Path) -> ExitCode {
    match load_certs(&file.to_string_lossy()) {
        Ok(certs) => {
            for cert in &certs {
                println!("{}", Fingerprint::of_der(cert.as_ref()));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Evaluate a chain exactly as the listener would
fn run_verify(cli: &Cli, file: &Path) -> ExitCode {
    let result = load_config(cli).and_then(|config| {
        let store = TrustStore::from_config(&config.tls)?;
        let chain = load_certs(&file.to_string_lossy())?;
        Ok(TrustEvaluator::new(Arc::new(store))
            .evaluate(&chain, UnixTime::now())
            .into_outcome())
    });

    match result {
        Ok(ValidationOutcome::Accepted(identity)) => {
            println!("accepted: {} ({})", identity.subject(), identity.fingerprint());
            ExitCode::SUCCESS
        }
        Ok(ValidationOutcome::Rejected(reason)) => {
            println!("rejected: {reason}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run the listener
async fn run_server(cli: &Cli) -> ExitCode {
    let config = match load_config(cli) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Refusing to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}
