//! Error types for message parsing.

/// Result type alias for parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header block is malformed.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Content-Type value could not be parsed.
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    /// Transfer or header encoding is malformed.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Base64 payload is malformed.
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// A multipart entity has no boundary parameter.
    #[error("missing boundary in multipart message")]
    MissingBoundary,

    /// The input holds no message at all.
    #[error("empty message")]
    Empty,
}
