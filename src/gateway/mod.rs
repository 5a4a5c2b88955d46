//! HTTP surface: listener, certificate-carrying acceptor and request auth

pub mod acceptor;
pub mod auth;
mod router;
mod server;

pub use acceptor::{PeerCertAcceptor, PeerCertificates};
pub use auth::{DevelopmentBypass, RequestAuthenticator, auth_middleware};
pub use router::{AppState, create_router};
pub use server::Server;
