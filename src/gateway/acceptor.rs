//! TLS acceptor that carries the client certificate chain into requests.
//!
//! Wraps `axum-server`'s rustls acceptor. After the handshake the peer's
//! chain is read from the live session and attached to every request on the
//! connection as a [`PeerCertificates`] extension, where the request
//! middleware re-validates it.

use std::io;
use std::sync::Arc;

use axum::Extension;
use axum::middleware::AddExtension;
use axum_server::accept::Accept;
use axum_server::tls_rustls::RustlsAcceptor;
use futures::future::BoxFuture;
use rustls::pki_types::CertificateDer;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::server::TlsStream;
use tower::Layer;
use tracing::debug;

use crate::mtls::audit::{self, AuditEvent, Layer as AuditLayer};
use crate::mtls::decision::RejectReason;

/// Client certificate chain (leaf first) of the connection a request
/// arrived on.
#[derive(Debug, Clone, Default)]
pub struct PeerCertificates(Arc<[CertificateDer<'static>]>);

impl PeerCertificates {
    /// Wrap a chain.
    #[must_use]
    pub fn new(chain: Vec<CertificateDer<'static>>) -> Self {
        Self(chain.into())
    }

    /// The chain, leaf first.
    #[must_use]
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.0
    }

    /// `true` if the peer presented nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Acceptor that performs the TLS handshake and exposes the peer chain.
#[derive(Debug, Clone)]
pub struct PeerCertAcceptor {
    inner: RustlsAcceptor,
}

impl PeerCertAcceptor {
    /// Wrap a rustls acceptor.
    #[must_use]
    pub fn new(inner: RustlsAcceptor) -> Self {
        Self { inner }
    }
}

impl<I, S> Accept<I, S> for PeerCertAcceptor
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Send + 'static,
{
    type Stream = TlsStream<I>;
    type Service = AddExtension<S, PeerCertificates>;
    type Future = BoxFuture<'static, io::Result<(Self::Stream, Self::Service)>>;

    fn accept(&self, stream: I, service: S) -> Self::Future {
        let acceptor = self.inner.clone();

        Box::pin(async move {
            let (stream, service) = acceptor
                .accept(stream, service)
                .await
                .inspect_err(audit_handshake_error)?;

            let chain = stream
                .get_ref()
                .1
                .peer_certificates()
                .map(<[CertificateDer<'static>]>::to_vec)
                .unwrap_or_default();
            let service = Extension(PeerCertificates::new(chain)).layer(service);

            Ok((stream, service))
        })
    }
}

/// rustls refuses a certificate-less peer before the verifier runs, so that
/// decision is audited here. Verifier rejections were already audited.
fn audit_handshake_error(err: &io::Error) {
    match err.get_ref().and_then(|e| e.downcast_ref::<rustls::Error>()) {
        Some(rustls::Error::NoCertificatesPresented) => {
            audit::emit(&AuditEvent::rejected(
                AuditLayer::Handshake,
                None,
                RejectReason::NoCertificate,
            ));
        }
        _ => debug!(error = %err, "TLS handshake failed"),
    }
}
