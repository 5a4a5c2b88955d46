//! mTLS listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::acceptor::PeerCertAcceptor;
use super::auth::RequestAuthenticator;
use super::router::{AppState, create_router};
use crate::config::Config;
use crate::mtls::handshake::build_tls_config;
use crate::mtls::trust_store::TrustStore;
use crate::{Error, Result};

/// How long in-flight connections get to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Protected API server
pub struct Server {
    /// Configuration
    config: Config,
    /// Trust configuration shared by both layers
    store: Arc<TrustStore>,
}

impl Server {
    /// Create a server, loading the trust configuration.
    ///
    /// # Errors
    ///
    /// Fails on any misconfiguration: unreadable CA file, or missing server
    /// certificate material outside development mode.
    pub fn new(config: Config) -> Result<Self> {
        if !config.server.development && config.tls.server_identity_paths().is_none() {
            return Err(Error::Config(
                "tls.server_cert and tls.server_key are required outside development mode"
                    .to_string(),
            ));
        }

        let store = Arc::new(TrustStore::from_config(&config.tls)?);
        Ok(Self { config, store })
    }

    /// The loaded trust configuration.
    #[must_use]
    pub fn trust_store(&self) -> &TrustStore {
        &self.store
    }

    /// Run until Ctrl-C / SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let authenticator = Arc::new(RequestAuthenticator::from_config(
            &self.config,
            Arc::clone(&self.store),
        ));
        let app = create_router(Arc::new(AppState::new(authenticator)));

        info!("============================================================");
        info!("MTLS GATE v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!(posture = ?self.store.posture(), "Client certificate checks");

        match self.config.tls.server_identity_paths() {
            Some(_) => {
                let tls = build_tls_config(&self.config.tls, Arc::clone(&self.store))?;
                let acceptor = PeerCertAcceptor::new(RustlsAcceptor::new(
                    RustlsConfig::from_config(Arc::new(tls)),
                ));
                info!("  Transport: TLS 1.3, client certificate REQUIRED");
                info!("============================================================");

                let handle = Handle::<SocketAddr>::new();
                tokio::spawn(shutdown_on(handle.clone(), shutdown_signal()));

                axum_server::bind(addr)
                    .acceptor(acceptor)
                    .handle(handle)
                    .serve(app.into_make_service())
                    .await?;
            }
            None => {
                warn!("  Transport: PLAIN HTTP (development mode, no server certificate)");
                info!("============================================================");

                let listener = TcpListener::bind(addr).await?;
                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await
                    .map_err(|e| Error::Internal(e.to_string()))?;
            }
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Start a graceful shutdown of the TLS listener once `signal` resolves.
async fn shutdown_on(handle: Handle<SocketAddr>, signal: impl Future<Output = ()>) {
    signal.await;
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
