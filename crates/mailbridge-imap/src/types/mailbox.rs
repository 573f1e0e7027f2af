//! Mailbox names, attributes and selection state.

use super::{Flags, SeqNum, Uid, UidValidity};

/// Mailbox name as sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a mailbox name. `INBOX` is normalised to upper case since
    /// servers treat it case-insensitively.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.eq_ignore_ascii_case("INBOX") {
            Self::inbox()
        } else {
            Self(name)
        }
    }

    /// The `INBOX` mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// State reported by SELECT or EXAMINE.
#[derive(Debug, Clone, Default)]
pub struct MailboxStatus {
    /// Number of messages (`EXISTS`).
    pub exists: u32,
    /// Number of recent messages (`RECENT`).
    pub recent: u32,
    /// First unseen message, if the server reported it.
    pub unseen: Option<SeqNum>,
    /// Predicted next UID.
    pub uid_next: Option<Uid>,
    /// `UIDVALIDITY` of the mailbox.
    pub uid_validity: Option<UidValidity>,
    /// Flags defined in the mailbox.
    pub flags: Flags,
    /// True when selected through EXAMINE or the server forced `READ-ONLY`.
    pub read_only: bool,
}

/// One line of a LIST response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Name attributes, including RFC 6154 special-use markers.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter, if any.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns true if the mailbox can be selected.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self
            .attributes
            .iter()
            .any(|a| matches!(a, MailboxAttribute::NoSelect | MailboxAttribute::NonExistent))
    }

    /// Returns true if the server marks this mailbox as the trash folder.
    #[must_use]
    pub fn is_trash(&self) -> bool {
        self.attributes.contains(&MailboxAttribute::Trash)
    }
}

/// Mailbox name attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// `\Noselect`
    NoSelect,
    /// `\NonExistent`
    NonExistent,
    /// `\Noinferiors`
    NoInferiors,
    /// `\HasChildren`
    HasChildren,
    /// `\HasNoChildren`
    HasNoChildren,
    /// `\Marked`
    Marked,
    /// `\Unmarked`
    Unmarked,
    /// `\All` (special-use)
    All,
    /// `\Archive` (special-use)
    Archive,
    /// `\Drafts` (special-use)
    Drafts,
    /// `\Flagged` (special-use)
    Flagged,
    /// `\Junk` (special-use)
    Junk,
    /// `\Sent` (special-use)
    Sent,
    /// `\Trash` (special-use)
    Trash,
    /// Unrecognised attribute, kept verbatim.
    Extension(String),
}

impl MailboxAttribute {
    /// Parses an attribute, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "\\noselect" => Self::NoSelect,
            "\\nonexistent" => Self::NonExistent,
            "\\noinferiors" => Self::NoInferiors,
            "\\haschildren" => Self::HasChildren,
            "\\hasnochildren" => Self::HasNoChildren,
            "\\marked" => Self::Marked,
            "\\unmarked" => Self::Unmarked,
            "\\all" => Self::All,
            "\\archive" => Self::Archive,
            "\\drafts" => Self::Drafts,
            "\\flagged" => Self::Flagged,
            "\\junk" => Self::Junk,
            "\\sent" => Self::Sent,
            "\\trash" => Self::Trash,
            _ => Self::Extension(s.to_string()),
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

    #[test]
    fn inbox_is_normalised() {
        assert_eq!(Mailbox::new("inbox"), Mailbox::inbox());
        assert_eq!(Mailbox::new("Archive").as_str(), "Archive");
    }

    #[test]
    fn special_use_trash() {
        let list = ListResponse {
            attributes: vec![
                MailboxAttribute::parse("\\HasNoChildren"),
                MailboxAttribute::parse("\\Trash"),
            ],
            delimiter: Some('|'),
            mailbox: Mailbox::new("Удаленные"),
        };
        assert!(list.is_trash());
        assert!(list.is_selectable());
    }

    #[test]
    fn noselect_is_not_selectable() {
        let list = ListResponse {
            attributes: vec![MailboxAttribute::parse("\\NoSelect")],
            delimiter: Some('/'),
            mailbox: Mailbox::new("[Gmail]"),
        };
        assert!(!list.is_selectable());
        assert!(!list.is_trash());
    }

    #[test]
    fn unknown_attribute_kept() {
        assert_eq!(
            MailboxAttribute::parse("\\Important"),
            MailboxAttribute::Extension("\\Important".to_string())
        );
    }
}
