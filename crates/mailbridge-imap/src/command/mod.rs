//! Client commands and their wire serialization.

mod tag_generator;

use std::fmt::Write as _;

use crate::types::{Flag, Mailbox, SequenceSet, UidSet};

pub use tag_generator::TagGenerator;

/// A message data item to request in FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`
    Uid,
    /// The full message: `BODY.PEEK[]` when `peek`, else `BODY[]` (which
    /// sets `\Seen` as a side effect).
    Body {
        /// Leave the `\Seen` flag untouched.
        peek: bool,
    },
}

impl FetchAttribute {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Uid => "UID",
            Self::Body { peek: true } => "BODY.PEEK[]",
            Self::Body { peek: false } => "BODY[]",
        }
    }
}

/// A SEARCH key. Multiple keys are ANDed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// `ALL`
    All,
    /// `UNSEEN`
    Unseen,
    /// `UNDELETED`
    Undeleted,
    /// `UID <set>`
    Uid(UidSet),
}

impl std::fmt::Display for SearchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::Unseen => f.write_str("UNSEEN"),
            Self::Undeleted => f.write_str("UNDELETED"),
            Self::Uid(set) => write!(f, "UID {set}"),
        }
    }
}

/// How STORE changes flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS`
    Add(Vec<Flag>),
    /// `-FLAGS`
    Remove(Vec<Flag>),
    /// `FLAGS`
    Replace(Vec<Flag>),
}

/// A client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CAPABILITY`
    Capability,
    /// `LOGOUT`
    Logout,
    /// `STARTTLS`
    StartTls,
    /// `LOGIN user pass`
    Login {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// `SELECT mailbox`
    Select {
        /// Mailbox to open read-write.
        mailbox: Mailbox,
    },
    /// `EXAMINE mailbox`
    Examine {
        /// Mailbox to open read-only.
        mailbox: Mailbox,
    },
    /// `LIST reference pattern`
    List {
        /// Reference name.
        reference: String,
        /// Pattern with `*`/`%` wildcards.
        pattern: String,
    },
    /// `CLOSE`
    Close,
    /// `EXPUNGE`
    Expunge,
    /// `UID EXPUNGE set` (UIDPLUS)
    UidExpunge {
        /// UIDs to expunge.
        uids: UidSet,
    },
    /// `SEARCH keys` or `UID SEARCH keys`
    Search {
        /// ANDed search keys.
        keys: Vec<SearchKey>,
        /// Return UIDs instead of sequence numbers.
        uid: bool,
    },
    /// `FETCH set items`
    Fetch {
        /// Messages by sequence number.
        sequence: SequenceSet,
        /// Requested items.
        items: Vec<FetchAttribute>,
    },
    /// `UID STORE set action flags`
    UidStore {
        /// Messages by UID.
        uids: UidSet,
        /// Flag change.
        action: StoreAction,
        /// Suppress the untagged FETCH echo.
        silent: bool,
    },
    /// `UID COPY set mailbox`
    UidCopy {
        /// Messages by UID.
        uids: UidSet,
        /// Destination.
        mailbox: Mailbox,
    },
    /// `UID MOVE set mailbox` (RFC 6851)
    UidMove {
        /// Messages by UID.
        uids: UidSet,
        /// Destination.
        mailbox: Mailbox,
    },
}

impl Command {
    /// Serializes the command, including the tag and trailing CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut line = String::with_capacity(64);
        line.push_str(tag);
        line.push(' ');

        // Writing to a String is infallible.
        let _ = match self {
            Self::Capability => write!(line, "CAPABILITY"),
            Self::Logout => write!(line, "LOGOUT"),
            Self::StartTls => write!(line, "STARTTLS"),
            Self::Login { username, password } => {
                write!(line, "LOGIN {} {}", astring(username), astring(password))
            }
            Self::Select { mailbox } => write!(line, "SELECT {}", astring(mailbox.as_str())),
            Self::Examine { mailbox } => write!(line, "EXAMINE {}", astring(mailbox.as_str())),
            Self::List { reference, pattern } => {
                write!(line, "LIST {} {}", quoted(reference), list_pattern(pattern))
            }
            Self::Close => write!(line, "CLOSE"),
            Self::Expunge => write!(line, "EXPUNGE"),
            Self::UidExpunge { uids } => write!(line, "UID EXPUNGE {uids}"),
            Self::Search { keys, uid } => {
                let keys = if keys.is_empty() {
                    SearchKey::All.to_string()
                } else {
                    join(keys.iter().map(ToString::to_string))
                };
                write!(line, "{}SEARCH {keys}", if *uid { "UID " } else { "" })
            }
            Self::Fetch { sequence, items } => {
                write!(line, "FETCH {sequence} {}", fetch_items(items))
            }
            Self::UidStore {
                uids,
                action,
                silent,
            } => {
                let (op, flags) = match action {
                    StoreAction::Add(flags) => ("+FLAGS", flags),
                    StoreAction::Remove(flags) => ("-FLAGS", flags),
                    StoreAction::Replace(flags) => ("FLAGS", flags),
                };
                let silent = if *silent { ".SILENT" } else { "" };
                let flags = join(flags.iter().map(ToString::to_string));
                write!(line, "UID STORE {uids} {op}{silent} ({flags})")
            }
            Self::UidCopy { uids, mailbox } => {
                write!(line, "UID COPY {uids} {}", astring(mailbox.as_str()))
            }
            Self::UidMove { uids, mailbox } => {
                write!(line, "UID MOVE {uids} {}", astring(mailbox.as_str()))
            }
        };

        line.push_str("\r\n");
        line.into_bytes()
    }

    /// Command name for logs. Never includes arguments, so credentials
    /// cannot leak through it.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Logout => "LOGOUT",
            Self::StartTls => "STARTTLS",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::List { .. } => "LIST",
            Self::Close => "CLOSE",
            Self::Expunge => "EXPUNGE",
            Self::UidExpunge { .. } => "UID EXPUNGE",
            Self::Search { uid: false, .. } => "SEARCH",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Fetch { .. } => "FETCH",
            Self::UidStore { .. } => "UID STORE",
            Self::UidCopy { .. } => "UID COPY",
            Self::UidMove { .. } => "UID MOVE",
        }
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

fn fetch_items(items: &[FetchAttribute]) -> String {
    match items {
        [single] => single.as_str().to_string(),
        _ => format!("({})", join(items.iter().map(|i| i.as_str().to_string()))),
    }
}

/// Atom if every byte is an atom character, quoted string otherwise.
fn astring(s: &str) -> String {
    if !s.is_empty() && s.bytes().all(is_plain_astring_byte) {
        s.to_string()
    } else {
        quoted(s)
    }
}

fn list_pattern(s: &str) -> String {
    if !s.is_empty() && s.bytes().all(|b| is_plain_astring_byte(b) || b == b'*' || b == b'%') {
        s.to_string()
    } else {
        quoted(s)
    }
}

fn quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

const fn is_plain_astring_byte(b: u8) -> bool {
    b > 0x20
        && b < 0x7F
        && !matches!(b, b'(' | b')' | b'{' | b'"' | b'\\' | b'%' | b'*')
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
    use crate::types::Uid;

    fn wire(cmd: &Command) -> String {
        String::from_utf8(cmd.serialize("A0001")).unwrap()
    }

    #[test]
    fn login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "bot@example.com".to_string(),
            password: "p\"w d".to_string(),
        };
        assert_eq!(wire(&cmd), "A0001 LOGIN bot@example.com \"p\\\"w d\"\r\n");
        assert_eq!(cmd.name(), "LOGIN");
    }

    #[test]
    fn select_non_ascii_mailbox_is_quoted() {
        let cmd = Command::Select {
            mailbox: Mailbox::new("Deleted Items"),
        };
        assert_eq!(wire(&cmd), "A0001 SELECT \"Deleted Items\"\r\n");
    }

    #[test]
    fn search_unseen_undeleted() {
        let cmd = Command::Search {
            keys: vec![SearchKey::Unseen, SearchKey::Undeleted],
            uid: false,
        };
        assert_eq!(wire(&cmd), "A0001 SEARCH UNSEEN UNDELETED\r\n");
    }

    #[test]
    fn uid_search_by_uid() {
        let cmd = Command::Search {
            keys: vec![SearchKey::Uid(UidSet::single(Uid::new(205).unwrap()))],
            uid: true,
        };
        assert_eq!(wire(&cmd), "A0001 UID SEARCH UID 205\r\n");
    }

    #[test]
    fn fetch_uid_and_peek() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::from_numbers([1, 2, 3, 7]),
            items: vec![FetchAttribute::Uid, FetchAttribute::Body { peek: true }],
        };
        assert_eq!(wire(&cmd), "A0001 FETCH 1:3,7 (UID BODY.PEEK[])\r\n");
    }

    #[test]
    fn fetch_single_item_has_no_parens() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::from_numbers([9]),
            items: vec![FetchAttribute::Uid],
        };
        assert_eq!(wire(&cmd), "A0001 FETCH 9 UID\r\n");
    }

    #[test]
    fn store_deleted_silent() {
        let cmd = Command::UidStore {
            uids: UidSet::single(Uid::new(205).unwrap()),
            action: StoreAction::Add(vec![Flag::Deleted]),
            silent: true,
        };
        assert_eq!(wire(&cmd), "A0001 UID STORE 205 +FLAGS.SILENT (\\Deleted)\r\n");
    }

    #[test]
    fn move_and_expunge() {
        let uids = UidSet::single(Uid::new(42).unwrap());
        assert_eq!(
            wire(&Command::UidMove {
                uids: uids.clone(),
                mailbox: Mailbox::new("Trash"),
            }),
            "A0001 UID MOVE 42 Trash\r\n"
        );
        assert_eq!(
            wire(&Command::UidExpunge { uids }),
            "A0001 UID EXPUNGE 42\r\n"
        );
    }

    #[test]
    fn list_all() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(wire(&cmd), "A0001 LIST \"\" *\r\n");
    }
}
