use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors raised while setting up or running the server.
///
/// Per-connection failures never surface here; they are logged and the
/// connection is dropped.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the listening socket
    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// A PEM file could not be read
    #[error("Unable to read {path}: {source}")]
    ReadPem {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The key file holds no private key
    #[error("No private key found in {0}")]
    MissingKey(PathBuf),

    /// The certificate file holds no certificate
    #[error("No certificates found in {0}")]
    MissingCertificates(PathBuf),

    /// rustls rejected the configuration
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The client certificate store could not build a verifier
    #[error("Client verifier error: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
