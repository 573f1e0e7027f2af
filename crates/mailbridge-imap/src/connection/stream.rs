//! Plain and TLS transports.

#![allow(clippy::missing_errors_doc)]

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;

use crate::{Error, Result};

/// A TCP stream, optionally wrapped in TLS.
pub enum ImapStream {
    /// Plaintext TCP.
    Plain(TcpStream),
    /// TLS over TCP, boxed to keep the enum small.
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Upgrades a plaintext stream in place of STARTTLS.
    pub async fn upgrade(self, host: &str, connector: &TlsConnector) -> Result<Self> {
        match self {
            Self::Plain(tcp) => {
                let server_name = ServerName::try_from(host.to_string())?;
                let tls = connector.connect(server_name, tcp).await?;
                Ok(Self::Tls(Box::new(tls)))
            }
            Self::Tls(_) => Err(Error::InvalidState("stream is already TLS".to_string())),
        }
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Builds a TLS connector trusting the web PKI roots plus, optionally, the
/// certificates of a PEM bundle.
pub fn tls_connector(ca_file: Option<&Path>) -> Result<TlsConnector> {
    let mut roots = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    if let Some(path) = ca_file {
        let file = File::open(path)
            .map_err(|e| Error::Certificate(format!("{}: {e}", path.display())))?;
        let certs = rustls_pemfile::certs(&mut BufReader::new(file))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Certificate(format!("{}: {e}", path.display())))?;
        if certs.is_empty() {
            return Err(Error::Certificate(format!(
                "{}: no PEM certificates found",
                path.display()
            )));
        }
        let (added, ignored) = roots.add_parsable_certificates(certs);
        debug!(added, ignored, path = %path.display(), "loaded custom CA certificates");
    }

    // Pin the provider: other crates in the build may enable a second one,
    // which makes the process-default lookup ambiguous.
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Opens a TCP connection.
pub async fn connect_plain(host: &str, port: u16) -> Result<ImapStream> {
    let tcp = TcpStream::connect((host, port)).await?;
    tcp.set_nodelay(true)?;
    Ok(ImapStream::Plain(tcp))
}

/// Opens a TCP connection and performs the TLS handshake.
pub async fn connect_tls(host: &str, port: u16, connector: &TlsConnector) -> Result<ImapStream> {
    connect_plain(host, port).await?.upgrade(host, connector).await
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn connector_with_default_roots() {
        assert!(tls_connector(None).is_ok());
    }

    #[test]
    fn missing_ca_file_is_certificate_error() {
        let err = tls_connector(Some(Path::new("/nonexistent/ca.pem"))).err().unwrap();
        assert!(matches!(err, Error::Certificate(_)));
    }

    #[test]
    fn empty_ca_file_is_rejected() {
        let path = std::env::temp_dir().join(format!("mailbridge-empty-{}.pem", std::process::id()));
        std::fs::write(&path, b"not a certificate\n").unwrap();
        let err = tls_connector(Some(&path)).err().unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, Error::Certificate(msg) if msg.contains("no PEM certificates")));
    }
}
