//! The subset of Bot API objects the bot reads and writes.

use serde::{Deserialize, Serialize};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `getMe` result.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl User {
    /// Name for logs.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
pub struct EditMessageText<'a> {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GetUpdates<'a> {
    pub offset: i64,
    pub timeout: u64,
    pub allowed_updates: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub struct AnswerCallbackQuery<'a> {
    pub callback_query_id: &'a str,
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
    fn update_with_callback() {
        let json = r#"{
            "ok": true,
            "result": [{
                "update_id": 10,
                "callback_query": {
                    "id": "77",
                    "from": {"id": 5, "first_name": "A"},
                    "message": {"message_id": 3, "chat": {"id": -100, "type": "group"}, "date": 0},
                    "data": "del:2:1"
                }
            }]
        }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        let update = &response.result.unwrap()[0];
        let query = update.callback_query.as_ref().unwrap();
        assert_eq!(query.data.as_deref(), Some("del:2:1"));
        assert_eq!(query.message.as_ref().unwrap().chat.id, -100);
        assert!(update.message.is_none());
    }

    #[test]
    fn error_envelope() {
        let json = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let response: ApiResponse<User> = serde_json::from_str(json).unwrap();
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(401));
    }

    #[test]
    fn keyboard_serialization() {
        let body = SendMessage {
            chat_id: 1,
            text: "hi",
            reply_markup: Some(InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: "Check mail".to_string(),
                    callback_data: "check".to_string(),
                }]],
            }),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "check"
        );
        let plain = serde_json::to_value(SendMessage {
            chat_id: 1,
            text: "hi",
            reply_markup: None,
        })
        .unwrap();
        assert!(plain.get("reply_markup").is_none());
    }
}
