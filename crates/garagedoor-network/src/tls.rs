//! Mutual TLS.
//!
//! The server presents its own certificate and requires every client to
//! present one signed by, or byte-for-byte equal to, a certificate in the
//! configured client certificate file. A client without one fails the
//! handshake, which the accept loop treats as an authentication failure.
//!
//! Exact matches are accepted before path validation runs, so a
//! self-signed client certificate that carries CA basic constraints still
//! authenticates when it is the one configured.

use crate::error::{Result, ServerError};
use crate::server::Acceptor;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, UnixTime};
use rustls::server::WebPkiClientVerifier;
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use rustls::{DigitallySignedStruct, DistinguishedName, RootCertStore, ServerConfig, SignatureScheme};
use std::fs::File;
use std::future::Future;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tracing::debug;

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| ServerError::ReadPem {
            path: path.to_path_buf(),
            source,
        })
}

/// Read every certificate in a PEM file.
///
/// # Errors
/// Fails if the file is unreadable or holds no certificate.
pub fn load_certs(path: impl AsRef<Path>) -> Result<Vec<CertificateDer<'static>>> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<io::Result<Vec<_>>>()
        .map_err(|source| ServerError::ReadPem {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(ServerError::MissingCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

/// Read the first private key in a PEM file.
///
/// # Errors
/// Fails if the file is unreadable or holds no key.
pub fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKeyDer<'static>> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| ServerError::ReadPem {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| ServerError::MissingKey(path.to_path_buf()))
}

/// Build a server config that requires client certificates.
pub fn server_config(
    key_file: impl AsRef<Path>,
    cert_file: impl AsRef<Path>,
    client_cert_file: impl AsRef<Path>,
) -> Result<Arc<ServerConfig>> {
    let key = load_private_key(key_file)?;
    let certs = load_certs(cert_file)?;

    let client_certs = load_certs(client_cert_file)?;
    let mut roots = RootCertStore::empty();
    for cert in &client_certs {
        roots.add(cert.clone())?;
    }
    debug!(trusted = roots.len(), "Loaded client certificates");

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let webpki =
        WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
            .build()?;
    let verifier = Arc::new(PinnedClientVerifier::new(webpki, client_certs));

    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

/// Client verifier that accepts the configured certificates verbatim and
/// hands everything else to webpki path validation.
///
/// Handshake signatures are always checked against the presented
/// certificate's key, so a pinned match still proves key possession.
#[derive(Debug)]
pub struct PinnedClientVerifier {
    inner: Arc<dyn ClientCertVerifier>,
    pinned: Vec<CertificateDer<'static>>,
}

impl PinnedClientVerifier {
    pub fn new(inner: Arc<dyn ClientCertVerifier>, pinned: Vec<CertificateDer<'static>>) -> Self {
        Self { inner, pinned }
    }

    fn is_pinned(&self, cert: &CertificateDer<'_>) -> bool {
        self.pinned.iter().any(|pinned| pinned.as_ref() == cert.as_ref())
    }
}

impl ClientCertVerifier for PinnedClientVerifier {
    fn client_auth_mandatory(&self) -> bool {
        true
    }

    fn root_hint_subjects(&self) -> &[DistinguishedName] {
        self.inner.root_hint_subjects()
    }

    fn verify_client_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        now: UnixTime,
    ) -> std::result::Result<ClientCertVerified, rustls::Error> {
        if self.is_pinned(end_entity) {
            debug!("Client certificate matches a configured certificate");
            return Ok(ClientCertVerified::assertion());
        }
        self.inner.verify_client_cert(end_entity, intermediates, now)
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// TLS handshake with client authentication.
#[derive(Clone)]
pub struct TlsAcceptor {
    inner: tokio_rustls::TlsAcceptor,
}

impl TlsAcceptor {
    pub fn from_config(config: Arc<ServerConfig>) -> Self {
        Self {
            inner: tokio_rustls::TlsAcceptor::from(config),
        }
    }

    /// Load the server key, server certificate and trusted client
    /// certificate.
    ///
    /// # Errors
    /// Returns the first unreadable or unusable file.
    pub fn from_files(
        key_file: impl AsRef<Path>,
        cert_file: impl AsRef<Path>,
        client_cert_file: impl AsRef<Path>,
    ) -> Result<Self> {
        server_config(key_file, cert_file, client_cert_file).map(Self::from_config)
    }
}

impl std::fmt::Debug for TlsAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsAcceptor").finish_non_exhaustive()
    }
}

impl Acceptor for TlsAcceptor {
    type Stream = TlsStream<TcpStream>;

    fn accept(&self, stream: TcpStream) -> impl Future<Output = io::Result<Self::Stream>> + Send {
        self.inner.accept(stream)
    }
}
