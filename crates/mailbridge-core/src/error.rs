//! Error types for bridge operations.

use std::time::Duration;

use mailbridge_imap::{SeqNum, Uid};
use thiserror::Error;

/// Failure of a check or delete request.
///
/// `Display` is meant for logs; [`user_message`](Self::user_message) is the
/// text shown in the chat.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The server could not be reached or the session broke down.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected the credentials.
    #[error("authentication rejected: {0}")]
    Authentication(String),

    /// SELECT/EXAMINE failed.
    #[error("cannot open folder {folder}: {message}")]
    Folder {
        /// Folder name.
        folder: String,
        /// Server or transport message.
        message: String,
    },

    /// SEARCH failed.
    #[error("search failed: {0}")]
    Search(String),

    /// FETCH failed part way.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// One message could not be parsed. Never fatal to a batch.
    #[error("message {seq} could not be parsed: {message}")]
    Parse {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Parser message.
        message: String,
    },

    /// Flagging, moving or expunging a message failed.
    #[error("deleting UID {uid} failed: {message}")]
    Delete {
        /// UID of the message being deleted.
        uid: Uid,
        /// Server or transport message.
        message: String,
    },

    /// The reference no longer maps to a message.
    #[error("stale reference {reference}")]
    StaleReference {
        /// Reference as the user presented it.
        reference: String,
    },

    /// Another request for the same chat is still running.
    #[error("request already in flight")]
    Busy,

    /// The operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl BridgeError {
    /// Text suitable for the chat.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Connection(message) => {
                format!("Could not connect to the mail server: {message}")
            }
            Self::Authentication(_) => {
                "The mail server rejected the login. Check the username and password.".to_string()
            }
            Self::Folder { folder, message } => {
                format!("Could not open folder {folder}: {message}")
            }
            Self::Search(message) => format!("Searching for new mail failed: {message}"),
            Self::Fetch(message) => format!("Fetching messages failed: {message}"),
            Self::Parse { seq, .. } => format!("Message {seq} could not be read."),
            Self::Delete { message, .. } => format!("Could not delete the message: {message}"),
            Self::StaleReference { .. } => {
                "Message not found, please check mail again.".to_string()
            }
            Self::Busy => "Please wait, the previous request is still running.".to_string(),
            Self::Timeout(_) => "The mail server did not answer in time.".to_string(),
        }
    }

    /// Maps a connect or LOGIN failure.
    pub(crate) fn connecting(err: mailbridge_imap::Error) -> Self {
        match err {
            mailbridge_imap::Error::Auth(message) => Self::Authentication(message),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

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
    fn auth_failure_hides_server_text() {
        let err = BridgeError::connecting(mailbridge_imap::Error::Auth(
            "[AUTHENTICATIONFAILED] user bob".to_string(),
        ));
        assert!(matches!(err, BridgeError::Authentication(_)));
        assert!(!err.user_message().contains("bob"));
        assert!(err.to_string().contains("bob"));
    }

    #[test]
    fn transport_failure_is_connection() {
        let err = BridgeError::connecting(mailbridge_imap::Error::Timeout(Duration::from_secs(3)));
        assert!(matches!(err, BridgeError::Connection(_)));
    }

    #[test]
    fn delete_log_names_uid() {
        let err = BridgeError::Delete {
            uid: Uid::new(205).unwrap(),
            message: "NO [CANNOT]".to_string(),
        };
        assert!(err.to_string().contains("205"));
    }

    #[test]
    fn stale_reference_message() {
        let err = BridgeError::StaleReference {
            reference: "2".to_string(),
        };
        assert_eq!(err.user_message(), "Message not found, please check mail again.");
    }
}
