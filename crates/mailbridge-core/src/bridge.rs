//! Request handling: check and delete, one session each.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::cache::{Reference, ReferenceCache};
use crate::config::{BridgeConfig, CheckOptions, MailConfig};
use crate::delete::{DeleteOutcome, delete_by_uid};
use crate::error::{BridgeError, Result};
use crate::pipeline::{FetchOptions, MessageSummary, fetch_summaries};
use crate::render::{
    CHECK_ACTION, Entry, NO_NEW_MESSAGES, failure_note, headline, render_batch,
};
use crate::search::{SearchPredicate, search};
use crate::session::{Connector, MailSession};
use crate::sink::{Button, ChatId, MessageId, NotificationSink, SinkError};

/// Greeting for `/start`.
pub const GREETING: &str = "Hello! Send /check to look for new mail.";
/// Interim reply while a check runs.
pub const CHECKING: &str = "Checking for new mail...";

/// Longest wait for the LOGOUT reply.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/start`
    Start {
        /// Requesting chat.
        chat: ChatId,
    },
    /// `/check` or the "Check mail" button.
    Check {
        /// Requesting chat.
        chat: ChatId,
    },
    /// `/delete N` or a delete button.
    Delete {
        /// Requesting chat.
        chat: ChatId,
        /// `N`, `#N` or a `del:<generation>:<N>` action token.
        token: String,
    },
}

/// Outcome of one check.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Parsed messages in mailbox order.
    pub summaries: Vec<MessageSummary>,
    /// Messages that could not be fetched or parsed.
    pub failures: usize,
    /// Unread messages beyond the per-check limit.
    pub remaining: usize,
}

impl CheckReport {
    /// Returns true when there was nothing unread.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.failures == 0 && self.remaining == 0
    }
}

/// Releases a chat's in-flight slot on drop.
struct InFlight<'a> {
    table: &'a Mutex<HashSet<ChatId>>,
    chat: ChatId,
}

impl<'a> InFlight<'a> {
    fn acquire(table: &'a Mutex<HashSet<ChatId>>, chat: ChatId) -> Option<Self> {
        let inserted = table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat);
        inserted.then_some(Self { table, chat })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.chat);
    }
}

/// Ties a connector, a sink and the reference cache together.
pub struct Bridge<C, K> {
    connector: C,
    sink: K,
    config: BridgeConfig,
    cache: ReferenceCache,
    in_flight: Mutex<HashSet<ChatId>>,
}

impl<C, K> std::fmt::Debug for Bridge<C, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C, K> Bridge<C, K>
where
    C: Connector,
    K: NotificationSink,
{
    /// Creates a bridge with an empty reference cache.
    pub fn new(connector: C, sink: K, config: BridgeConfig) -> Self {
        Self {
            connector,
            sink,
            config,
            cache: ReferenceCache::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// The reference cache.
    pub const fn cache(&self) -> &ReferenceCache {
        &self.cache
    }

    /// The notification sink.
    pub const fn sink(&self) -> &K {
        &self.sink
    }

    /// Handles one event, reporting the outcome to the chat.
    ///
    /// Never fails: errors are logged and turned into chat text.
    pub async fn handle(&self, event: Event) {
        match event {
            Event::Start { chat } => {
                info!(%chat, "start");
                let buttons = [Button::new("Check mail", CHECK_ACTION)];
                self.deliver(self.sink.send_with_buttons(chat, GREETING, &buttons), chat)
                    .await;
            }
            Event::Check { chat } => self.handle_check(chat).await,
            Event::Delete { chat, token } => self.handle_delete(chat, &token).await,
        }
    }

    async fn handle_check(&self, chat: ChatId) {
        info!(%chat, "check requested");
        let Some(_guard) = InFlight::acquire(&self.in_flight, chat) else {
            self.report_busy(chat).await;
            return;
        };

        let notice = self.deliver(self.sink.send_text(chat, CHECKING), chat).await;
        let report = match self.check().await {
            Ok(report) => report,
            Err(e) => {
                error!(%chat, error = %e, "check failed");
                self.status(chat, notice, &e.user_message()).await;
                return;
            }
        };

        if report.is_empty() {
            info!(%chat, "no new messages");
            self.status(chat, notice, NO_NEW_MESSAGES).await;
            return;
        }
        info!(
            %chat,
            shown = report.summaries.len(),
            failures = report.failures,
            remaining = report.remaining,
            "check complete"
        );

        let status = if report.summaries.is_empty() {
            failure_note(report.failures)
        } else {
            headline(report.summaries.len(), report.remaining)
        };
        self.status(chat, notice, &status).await;
        if report.summaries.is_empty() {
            return;
        }

        let mut batch = self.cache.begin(chat);
        let references: Vec<Reference> = report
            .summaries
            .iter()
            .map(|summary| batch.push(summary.uid))
            .collect();
        let entries: Vec<Entry<'_>> = references
            .iter()
            .zip(&report.summaries)
            .map(|(reference, summary)| Entry { reference, summary })
            .collect();

        let mut delivered = true;
        for chunk in render_batch(&entries, report.failures, self.config.check.display_offset) {
            let sent = self
                .deliver(
                    self.sink.send_with_buttons(chat, &chunk.text, &chunk.buttons),
                    chat,
                )
                .await;
            delivered &= sent.is_some();
        }

        if delivered {
            self.cache.commit(batch);
        } else {
            warn!(%chat, "summaries not fully delivered, references not published");
        }
    }

    async fn handle_delete(&self, chat: ChatId, token: &str) {
        info!(%chat, token, "delete requested");
        let Some(_guard) = InFlight::acquire(&self.in_flight, chat) else {
            self.report_busy(chat).await;
            return;
        };

        let text = match self.delete(chat, token).await {
            Ok((reference, DeleteOutcome::Expunged)) => format!("Message #{reference} deleted."),
            Ok((reference, DeleteOutcome::Moved(folder))) => {
                format!("Message #{reference} moved to {folder}.")
            }
            Err(e) => {
                match &e {
                    BridgeError::StaleReference { .. } => warn!(%chat, token, "stale reference"),
                    _ => error!(%chat, token, error = %e, "delete failed"),
                }
                e.user_message()
            }
        };
        self.deliver(self.sink.send_text(chat, &text), chat).await;
    }

    /// Searches the configured folder and fetches unread messages in a
    /// session of its own. The session is logged out before returning,
    /// also when the operation timed out.
    ///
    /// # Errors
    ///
    /// Connection, folder, search and fetch failures, and
    /// [`BridgeError::Timeout`] past the operation deadline.
    pub async fn check(&self) -> Result<CheckReport> {
        let deadline = Instant::now() + self.config.operation_timeout;
        let mail = &self.config.mail;
        let mut session = self
            .until(deadline, MailSession::open(&self.connector, mail))
            .await?;
        let result = self
            .until(deadline, run_check(&mut session, mail, &self.config.check))
            .await;
        self.close(session).await;
        result
    }

    /// Resolves `token` for `chat` and deletes the message in a session of
    /// its own. On success, or when the message turns out to be gone, the
    /// reference is dropped from the cache.
    ///
    /// # Errors
    ///
    /// [`BridgeError::StaleReference`] for unknown or outdated references,
    /// [`BridgeError::Timeout`] past the operation deadline, otherwise
    /// connection, folder and delete failures.
    pub async fn delete(&self, chat: ChatId, token: &str) -> Result<(Reference, DeleteOutcome)> {
        let stale = || BridgeError::StaleReference {
            reference: token.to_string(),
        };
        let reference = parse_token(token).ok_or_else(stale)?;
        let uid = self.cache.get(chat, &reference).ok_or_else(stale)?;

        let deadline = Instant::now() + self.config.operation_timeout;
        let mail = &self.config.mail;
        let mut session = self
            .until(deadline, MailSession::open(&self.connector, mail))
            .await?;
        let result = self
            .until(
                deadline,
                delete_by_uid(
                    &mut session,
                    &mail.folder,
                    uid,
                    &self.config.delete,
                    &reference.key,
                ),
            )
            .await;
        self.close(session).await;

        match result {
            Ok(outcome) => {
                self.cache.remove(chat, &reference);
                Ok((reference, outcome))
            }
            Err(e @ BridgeError::StaleReference { .. }) => {
                self.cache.remove(chat, &reference);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn until<T>(
        &self,
        deadline: Instant,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout_at(deadline, operation)
            .await
            .map_err(|_| BridgeError::Timeout(self.config.operation_timeout))?
    }

    /// Logs out, giving the server a short while to answer.
    async fn close(&self, session: MailSession<C::Stream>) {
        let limit = self.config.operation_timeout.min(CLOSE_TIMEOUT);
        if tokio::time::timeout(limit, session.close()).await.is_err() {
            warn!(?limit, "LOGOUT not answered, dropping the connection");
        }
    }

    async fn report_busy(&self, chat: ChatId) {
        warn!(%chat, "request rejected, another one is in flight");
        let text = BridgeError::Busy.user_message();
        self.deliver(self.sink.send_text(chat, &text), chat).await;
    }

    /// Edits the interim notice, or sends a new message if there is none.
    async fn status(&self, chat: ChatId, notice: Option<MessageId>, text: &str) {
        if let Some(message) = notice {
            match self.sink.edit_text(chat, message, text).await {
                Ok(()) => return,
                Err(e) => warn!(%chat, error = %e, "editing notice failed, sending instead"),
            }
        }
        self.deliver(self.sink.send_text(chat, text), chat).await;
    }

    async fn deliver<T>(
        &self,
        send: impl Future<Output = std::result::Result<T, SinkError>>,
        chat: ChatId,
    ) -> Option<T> {
        send.await
            .map_err(|e| error!(%chat, error = %e, "delivery failed"))
            .ok()
    }
}

async fn run_check<S>(
    session: &mut MailSession<S>,
    mail: &MailConfig,
    options: &CheckOptions,
) -> Result<CheckReport>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    session.select_folder(&mail.folder, !options.mark_seen).await?;
    let ids = search(session, SearchPredicate::unread(options.exclude_deleted)).await?;
    if ids.is_empty() {
        return Ok(CheckReport::default());
    }

    let take = ids.len().min(options.max_messages);
    let fetch = FetchOptions {
        mark_seen: options.mark_seen,
        excerpt_chars: options.excerpt_chars,
    };
    let outcome = fetch_summaries(session, &ids[..take], fetch).await?;
    Ok(CheckReport {
        summaries: outcome.summaries,
        failures: outcome.failures,
        remaining: ids.len() - take,
    })
}

/// `N`, `#N` or `del:<generation>:<N>`.
fn parse_token(token: &str) -> Option<Reference> {
    let token = token.trim();
    if let Some(reference) = Reference::from_action(token) {
        return Some(reference);
    }
    let key = token.trim_start_matches('#');
    (!key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())).then(|| Reference::current(key))
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
    fn token_forms() {
        assert_eq!(parse_token("2"), Some(Reference::current("2")));
        assert_eq!(parse_token(" #12 "), Some(Reference::current("12")));
        assert_eq!(
            parse_token("del:4:1"),
            Some(Reference {
                generation: Some(4),
                key: "1".to_string()
            })
        );
        assert_eq!(parse_token(""), None);
        assert_eq!(parse_token("two"), None);
        assert_eq!(parse_token("#"), None);
    }

    #[test]
    fn in_flight_slot_is_released() {
        let table = Mutex::new(HashSet::new());
        let chat = ChatId(7);
        {
            let _held = InFlight::acquire(&table, chat).unwrap();
            assert!(InFlight::acquire(&table, chat).is_none());
            assert!(InFlight::acquire(&table, ChatId(8)).is_some());
        }
        assert!(InFlight::acquire(&table, chat).is_some());
    }

    #[test]
    fn empty_report() {
        assert!(CheckReport::default().is_empty());
        let skipped = CheckReport {
            failures: 1,
            ..CheckReport::default()
        };
        assert!(!skipped.is_empty());
    }
}
