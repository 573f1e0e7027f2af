//! Bot API errors.

/// Result type alias for Bot API calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Bot API failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport or HTTP error. The request URL, which embeds the token,
    /// is stripped before the error is stored.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The API answered `ok: false`.
    #[error("Bot API error {code}: {description}")]
    Api {
        /// `error_code` field.
        code: i64,
        /// `description` field.
        description: String,
    },
}

impl From<Error> for mailbridge_core::SinkError {
    fn from(err: Error) -> Self {
        Self(err.to_string())
    }
}
