//! # mailbridge-imap
//!
//! Asynchronous IMAP4rev1 client covering what a mailbox notifier needs:
//! login, folder selection, unread search, streaming FETCH, flag updates,
//! expunge and move.
//!
//! ## Design
//!
//! - **Type-state client**: [`Client<S, NotAuthenticated>`] becomes
//!   [`Client<S, Authenticated>`] on login and [`Client<S, Selected>`] on
//!   SELECT/EXAMINE, so commands can only be issued in valid states.
//! - **Sans-I/O parser**: [`parser`] works on complete framed responses and
//!   never touches the network; [`FramedStream`] does the framing.
//! - **TLS via rustls**: implicit TLS, STARTTLS, and an optional extra CA
//!   bundle.
//!
//! ```ignore
//! use mailbridge_imap::{Config, SearchKey, Security};
//!
//! let config = Config::builder("imap.example.com").security(Security::Implicit).build();
//! let client = mailbridge_imap::connect(&config).await?;
//! let mut inbox = client.login("user", "secret").await?.examine("INBOX").await?;
//! let unread = inbox.search(&[SearchKey::Unseen]).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, SearchKey, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Authorized, Client, Completion, Config, ConfigBuilder, FramedStream, ImapStream,
    NotAuthenticated, Security, Selected, connect,
};
pub use error::{Error, Result};
pub use parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    SeqNum, SequenceSet, Status, Tag, Uid, UidSet, UidValidity,
};
