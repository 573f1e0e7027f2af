//! Outbound chat interface.

use std::fmt;
use std::future::Future;

/// Chat the bot talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message previously sent to a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(pub i64);

/// Inline button carrying an action token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Label shown to the user.
    pub label: String,
    /// Token delivered back when pressed.
    pub action: String,
}

impl Button {
    /// Creates a button.
    #[must_use]
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Delivery failure reported by a sink.
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct SinkError(pub String);

/// Where rendered notifications go.
///
/// Implementations must be cheap to share; the bridge calls them from
/// concurrent request tasks.
pub trait NotificationSink: Send + Sync {
    /// Sends plain text.
    fn send_text(
        &self,
        chat: ChatId,
        text: &str,
    ) -> impl Future<Output = Result<MessageId, SinkError>> + Send;

    /// Sends text with inline buttons, one row per button.
    fn send_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> impl Future<Output = Result<MessageId, SinkError>> + Send;

    /// Replaces the text of a sent message.
    fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}
