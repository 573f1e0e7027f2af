//! Error type for the IMAP client.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the IMAP client.
#[derive(Debug, Error)]
pub enum Error {
    /// Network I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup or handshake failure.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name not usable as a TLS server name.
    #[error("invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Custom CA bundle could not be loaded.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Malformed server response.
    #[error("parse error at byte {position}: {message}")]
    Parse {
        /// Byte offset in the response.
        position: usize,
        /// What went wrong.
        message: String,
    },

    /// LOGIN was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Tagged `NO`.
    #[error("server returned NO: {0}")]
    No(String),

    /// Tagged `BAD`.
    #[error("server returned BAD: {0}")]
    Bad(String),

    /// Server closed the session with `BYE`.
    #[error("server sent BYE: {0}")]
    Bye(String),

    /// Operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Operation not valid in the current connection state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result alias for IMAP operations.
pub type Result<T> = std::result::Result<T, Error>;
