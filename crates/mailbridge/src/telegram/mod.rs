//! Telegram Bot API client.
//!
//! Every call is a JSON POST to `https://api.telegram.org/bot<token>/<method>`.
//! Errors never carry the request URL, since it contains the token.

mod error;
pub mod types;

use std::time::Duration;

use mailbridge_core::{Button, ChatId, MessageId, NotificationSink, SinkError};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

pub use self::error::{Error, Result};
use self::types::{
    AnswerCallbackQuery, ApiResponse, EditMessageText, GetUpdates, InlineKeyboardButton,
    InlineKeyboardMarkup, SendMessage, Update, User,
};

const API_BASE: &str = "https://api.telegram.org";

/// Seconds the server may hold a `getUpdates` call open.
pub const POLL_TIMEOUT_SECS: u64 = 30;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bot API client; cheap to clone.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Creates a client for the bot identified by `token`.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base(API_BASE, token)
    }

    /// Client against another API host.
    pub fn with_base(api_base: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(reqwest::Error::without_url)?;
        Ok(Self {
            http,
            base: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        })
    }

    /// `getMe`
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }

    /// `getUpdates` with long polling, starting at `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let body = GetUpdates {
            offset,
            timeout: POLL_TIMEOUT_SECS,
            allowed_updates: &["message", "callback_query"],
        };
        let limit = Duration::from_secs(POLL_TIMEOUT_SECS) + REQUEST_TIMEOUT;
        self.call("getUpdates", &body, limit).await
    }

    /// `sendMessage`, with one keyboard row per button.
    pub async fn send_message(&self, chat: ChatId, text: &str, buttons: &[Button]) -> Result<MessageId> {
        let body = SendMessage {
            chat_id: chat.0,
            text,
            reply_markup: keyboard(buttons),
        };
        let sent: types::Message = self.call("sendMessage", &body, REQUEST_TIMEOUT).await?;
        Ok(MessageId(sent.message_id))
    }

    /// `editMessageText`
    pub async fn edit_message_text(&self, chat: ChatId, message: MessageId, text: &str) -> Result<()> {
        let body = EditMessageText {
            chat_id: chat.0,
            message_id: message.0,
            text,
        };
        // The result is the edited message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", &body, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    /// `answerCallbackQuery`, which stops the button's loading spinner.
    pub async fn answer_callback_query(&self, id: &str) -> Result<()> {
        let body = AnswerCallbackQuery {
            callback_query_id: id,
        };
        let _: bool = self.call("answerCallbackQuery", &body, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(method, "Bot API call");
        let response = self
            .http
            .post(format!("{}/{method}", self.base))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;

        // Error statuses still carry the JSON envelope with a description.
        let bytes = response.bytes().await.map_err(reqwest::Error::without_url)?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;
        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => Err(Error::Api {
                code: error_code.unwrap_or_default(),
                description: description.unwrap_or_else(|| format!("{method} returned no result")),
            }),
        }
    }
}

fn keyboard(buttons: &[Button]) -> Option<InlineKeyboardMarkup> {
    (!buttons.is_empty()).then(|| InlineKeyboardMarkup {
        inline_keyboard: buttons
            .iter()
            .map(|button| {
                vec![InlineKeyboardButton {
                    text: button.label.clone(),
                    callback_data: button.action.clone(),
                }]
            })
            .collect(),
    })
}

impl NotificationSink for TelegramClient {
    async fn send_text(&self, chat: ChatId, text: &str) -> std::result::Result<MessageId, SinkError> {
        Ok(self.send_message(chat, text, &[]).await?)
    }

    async fn send_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> std::result::Result<MessageId, SinkError> {
        Ok(self.send_message(chat, text, buttons).await?)
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> std::result::Result<(), SinkError> {
        Ok(self.edit_message_text(chat, message, text).await?)
    }
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
    fn one_row_per_button() {
        let markup = keyboard(&[Button::new("Delete #1", "del:1:1"), Button::new("Check again", "check")])
            .unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].callback_data, "check");
        assert!(keyboard(&[]).is_none());
    }

    #[test]
    fn debug_hides_token() {
        let client = TelegramClient::with_base("https://example.invalid/", "42:secret").unwrap();
        assert_eq!(client.base, "https://example.invalid/bot42:secret");
        assert!(!format!("{client:?}").contains("secret"));
    }
}
