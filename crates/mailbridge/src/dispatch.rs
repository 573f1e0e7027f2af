//! Long polling and routing of updates to bridge events.

use std::sync::Arc;
use std::time::Duration;

use mailbridge_core::{Bridge, ChatId, Connector, Event, render::CHECK_ACTION};
use tracing::{debug, info, warn};

use crate::telegram::TelegramClient;
use crate::telegram::types::Update;

/// Pause after a failed `getUpdates` before polling again.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// A routed update.
#[derive(Debug, PartialEq, Eq)]
pub struct Routed {
    /// What to do.
    pub event: Event,
    /// Callback query to acknowledge, for button presses.
    pub callback: Option<String>,
}

/// Maps an update to an event. Unknown commands and plain chatter are
/// ignored.
pub fn route(update: &Update) -> Option<Routed> {
    if let Some(query) = &update.callback_query {
        let chat = ChatId(query.message.as_ref()?.chat.id);
        let data = query.data.as_deref()?;
        let event = if data == CHECK_ACTION {
            Event::Check { chat }
        } else {
            Event::Delete {
                chat,
                token: data.to_string(),
            }
        };
        return Some(Routed {
            event,
            callback: Some(query.id.clone()),
        });
    }

    let message = update.message.as_ref()?;
    let chat = ChatId(message.chat.id);
    let text = message.text.as_deref()?.trim();
    let (command, argument) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    // `/check@SomeBot` in group chats.
    let command = command.split_once('@').map_or(command, |(name, _)| name);

    let event = match command {
        "/start" | "/help" => Event::Start { chat },
        "/check" => Event::Check { chat },
        "/delete" => Event::Delete {
            chat,
            token: argument.trim().to_string(),
        },
        _ => return None,
    };
    Some(Routed {
        event,
        callback: None,
    })
}

/// Polls for updates until the process stops. Each event runs in its own
/// task; polling errors are logged and polling goes on.
pub async fn run<C>(bridge: Arc<Bridge<C, TelegramClient>>)
where
    C: Connector + 'static,
{
    let mut offset = 0;
    info!("polling for updates");
    loop {
        let updates = match bridge.sink().get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "polling failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(Routed { event, callback }) = route(&update) else {
                debug!(update = update.update_id, "ignoring update");
                continue;
            };

            let bridge = Arc::clone(&bridge);
            tokio::spawn(async move {
                if let Some(id) = callback
                    && let Err(e) = bridge.sink().answer_callback_query(&id).await
                {
                    debug!(error = %e, "answering callback query failed");
                }
                bridge.handle(event).await;
            });
        }
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

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    fn text(body: &str) -> Update {
        update(&format!(
            r#"{{"update_id": 1, "message": {{"message_id": 9, "chat": {{"id": 5}}, "text": {}}}}}"#,
            serde_json::to_string(body).unwrap()
        ))
    }

    fn event(body: &str) -> Option<Event> {
        route(&text(body)).map(|r| r.event)
    }

    #[test]
    fn commands() {
        let chat = ChatId(5);
        assert_eq!(event("/start"), Some(Event::Start { chat }));
        assert_eq!(event("/check"), Some(Event::Check { chat }));
        assert_eq!(event("/check@mail_bot"), Some(Event::Check { chat }));
        assert_eq!(
            event("/delete 3"),
            Some(Event::Delete {
                chat,
                token: "3".to_string()
            })
        );
        assert_eq!(
            event("/delete"),
            Some(Event::Delete {
                chat,
                token: String::new()
            })
        );
        assert_eq!(event("hello"), None);
        assert_eq!(event("/unknown"), None);
    }

    #[test]
    fn buttons() {
        let routed = route(&update(
            r#"{"update_id": 2, "callback_query": {"id": "q1", "message": {"message_id": 4, "chat": {"id": 8}}, "data": "del:3:2"}}"#,
        ))
        .unwrap();
        assert_eq!(routed.callback.as_deref(), Some("q1"));
        assert_eq!(
            routed.event,
            Event::Delete {
                chat: ChatId(8),
                token: "del:3:2".to_string()
            }
        );

        let routed = route(&update(
            r#"{"update_id": 3, "callback_query": {"id": "q2", "message": {"message_id": 4, "chat": {"id": 8}}, "data": "check"}}"#,
        ))
        .unwrap();
        assert_eq!(routed.event, Event::Check { chat: ChatId(8) });
    }

    #[test]
    fn updates_without_chat_are_ignored() {
        assert!(route(&update(r#"{"update_id": 4}"#)).is_none());
        assert!(
            route(&update(
                r#"{"update_id": 5, "callback_query": {"id": "q3", "data": "check"}}"#
            ))
            .is_none()
        );
    }
}
