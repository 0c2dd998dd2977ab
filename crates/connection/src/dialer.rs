//! Stream dialers for the receiver channel.
//!
//! Receivers listen for TLS on port 8009 and present self-signed device
//! certificates, so [`TlsDialer::insecure`] is the usual choice. The plain
//! [`TcpDialer`] serves emulators and tests.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use rustls::ClientConfig;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::ConnectionError;

/// A bidirectional byte stream to a receiver.
pub trait CastStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> CastStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedStream = Box<dyn CastStream>;

/// Boxed future returned by [`Dialer::dial`].
pub type DialFuture<'a> = Pin<Box<dyn Future<Output = Result<BoxedStream, ConnectionError>> + Send + 'a>>;

/// Opens the byte stream to a receiver.
pub trait Dialer: Send + Sync + 'static {
    fn dial<'a>(&'a self, host: &'a str, port: u16) -> DialFuture<'a>;
}

fn map_connect_error(addr: &str, e: io::Error) -> ConnectionError {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ConnectionError::Refused(addr.to_string()),
        io::ErrorKind::TimedOut => ConnectionError::Timeout(format!("TCP connect to {addr}")),
        _ => ConnectionError::Io(e),
    }
}

async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, ConnectionError> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| map_connect_error(&addr, e))?;
    stream.set_nodelay(true)?;
    debug!(%addr, "TCP connected");
    Ok(stream)
}

/// Plain TCP dialer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    fn dial<'a>(&'a self, host: &'a str, port: u16) -> DialFuture<'a> {
        Box::pin(async move {
            let stream = connect_tcp(host, port).await?;
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

/// TLS dialer backed by rustls.
#[derive(Clone)]
pub struct TlsDialer {
    connector: TlsConnector,
}

impl TlsDialer {
    /// Accepts any server certificate. Receivers use self-signed certificates.
    pub fn insecure() -> Result<Self, ConnectionError> {
        let config = Self::builder()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth();
        Ok(Self::from_config(config))
    }

    /// Verifies server certificates against the Mozilla root set.
    pub fn verified() -> Result<Self, ConnectionError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = Self::builder()?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self::from_config(config))
    }

    /// Picks [`insecure`](Self::insecure) or [`verified`](Self::verified).
    pub fn new(insecure: bool) -> Result<Self, ConnectionError> {
        if insecure {
            Self::insecure()
        } else {
            Self::verified()
        }
    }

    fn builder() -> Result<rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier>, ConnectionError> {
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| ConnectionError::Tls(format!("failed to build TLS config: {e}")))
    }

    fn from_config(config: ClientConfig) -> Self {
        Self {
            connector: TlsConnector::from(Arc::new(config)),
        }
    }
}

impl Dialer for TlsDialer {
    fn dial<'a>(&'a self, host: &'a str, port: u16) -> DialFuture<'a> {
        Box::pin(async move {
            let tcp = connect_tcp(host, port).await?;
            let server_name = ServerName::try_from(host.to_string())
                .map_err(|e| ConnectionError::Tls(format!("invalid server name {host}: {e}")))?;
            let tls = self
                .connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| ConnectionError::Tls(format!("handshake with {host}:{port} failed: {e}")))?;
            debug!(host, port, "TLS established");
            Ok(Box::new(tls) as BoxedStream)
        })
    }
}

/// Certificate verifier that accepts everything.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
