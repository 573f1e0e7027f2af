//! # mailbridge-core
//!
//! Mail side of the `mailbridge` notification bot.
//!
//! This crate provides:
//! - Per-request IMAP sessions ([`MailSession`])
//! - Unread search and a concurrent fetch-and-parse pipeline
//! - Short per-chat references for delete actions ([`ReferenceCache`])
//! - Delete by UID, expunging or moving to trash
//! - Chat rendering, split at the message size limit
//! - The [`Bridge`] that ties a mail connector to a [`NotificationSink`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod bridge;
pub mod cache;
mod config;
pub mod delete;
mod error;
pub mod pipeline;
pub mod render;
pub mod search;
pub mod session;
mod sink;

pub use bridge::{Bridge, CHECKING, CheckReport, Event, GREETING};
pub use cache::{Batch, Reference, ReferenceCache};
pub use config::{
    BridgeConfig, CheckOptions, DEFAULT_FOLDER, DEFAULT_HOST, DeleteStrategy, MailConfig,
    MailConfigBuilder, ValidationError,
};
pub use delete::{DeleteOutcome, delete_by_uid};
pub use error::{BridgeError, Result};
pub use pipeline::{FetchOptions, FetchOutcome, MessageSummary, fetch_summaries};
pub use render::{Chunk, MESSAGE_LIMIT, NO_NEW_MESSAGES};
pub use search::{SearchPredicate, search};
pub use session::{ConnectionState, Connector, FolderInfo, ImapConnector, MailSession};
pub use sink::{Button, ChatId, MessageId, NotificationSink, SinkError};
