//! Connection state markers.

use crate::types::{Mailbox, MailboxStatus};

/// Connected, greeting read, not logged in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Logged in, no mailbox selected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// A mailbox is selected.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(super) mailbox: Mailbox,
    pub(super) status: MailboxStatus,
}

impl Selected {
    /// The selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Status reported when the mailbox was opened.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }

    /// True when opened with EXAMINE or forced read-only by the server.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.status.read_only
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// States in which the user is logged in (LIST, SELECT, EXAMINE allowed).
pub trait Authorized: sealed::Sealed {}

impl Authorized for Authenticated {}
impl Authorized for Selected {}

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

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn states_are_send_sync() {
        assert_send_sync::<NotAuthenticated>();
        assert_send_sync::<Authenticated>();
        assert_send_sync::<Selected>();
    }

    #[test]
    fn selected_read_only_follows_status() {
        let selected = Selected {
            mailbox: Mailbox::inbox(),
            status: MailboxStatus {
                read_only: true,
                exists: 3,
                ..MailboxStatus::default()
            },
        };
        assert!(selected.is_read_only());
        assert_eq!(selected.status().exists, 3);
        assert_eq!(selected.mailbox().as_str(), "INBOX");
    }
}
