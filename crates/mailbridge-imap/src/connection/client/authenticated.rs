//! Mailbox listing and selection.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::states::{Authorized, Selected};
use super::{Client, Completion};
use crate::command::Command;
use crate::parser::UntaggedResponse;
use crate::types::{ListResponse, Mailbox, MailboxStatus, ResponseCode};
use crate::Result;

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: Authorized,
{
    /// Lists mailboxes matching `pattern` under `reference`.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<ListResponse>> {
        let command = Command::List {
            reference: reference.to_string(),
            pattern: pattern.to_string(),
        };
        let (untagged, _) = self.run(&command).await?;
        Ok(untagged
            .into_iter()
            .filter_map(|response| match response {
                UntaggedResponse::List(list) => Some(list),
                _ => None,
            })
            .collect())
    }

    /// Opens `mailbox` read-write.
    pub async fn select(self, mailbox: &str) -> Result<Client<S, Selected>> {
        let mailbox = Mailbox::new(mailbox);
        self.open(Command::Select { mailbox: mailbox.clone() }, mailbox, false)
            .await
    }

    /// Opens `mailbox` read-only.
    pub async fn examine(self, mailbox: &str) -> Result<Client<S, Selected>> {
        let mailbox = Mailbox::new(mailbox);
        self.open(Command::Examine { mailbox: mailbox.clone() }, mailbox, true)
            .await
    }

    async fn open(
        mut self,
        command: Command,
        mailbox: Mailbox,
        read_only: bool,
    ) -> Result<Client<S, Selected>> {
        let (untagged, completion) = self.run(&command).await?;
        let status = mailbox_status(untagged, &completion, read_only);
        debug!(
            folder = %mailbox,
            exists = status.exists,
            read_only = status.read_only,
            "mailbox opened"
        );
        Ok(self.into_state(Selected { mailbox, status }))
    }
}

/// Folds SELECT/EXAMINE data into a [`MailboxStatus`].
fn mailbox_status(
    untagged: Vec<UntaggedResponse>,
    completion: &Completion,
    read_only: bool,
) -> MailboxStatus {
    let mut status = MailboxStatus {
        read_only,
        ..MailboxStatus::default()
    };

    for response in untagged {
        match response {
            UntaggedResponse::Exists(n) => status.exists = n,
            UntaggedResponse::Recent(n) => status.recent = n,
            UntaggedResponse::Flags(flags) => status.flags = flags,
            UntaggedResponse::Condition {
                code: Some(code), ..
            } => match code {
                ResponseCode::UidValidity(v) => status.uid_validity = Some(v),
                ResponseCode::UidNext(uid) => status.uid_next = Some(uid),
                ResponseCode::Unseen(seq) => status.unseen = Some(seq),
                _ => {}
            },
            _ => {}
        }
    }

    match completion.code {
        Some(ResponseCode::ReadOnly) => status.read_only = true,
        Some(ResponseCode::ReadWrite) => status.read_only = false,
        _ => {}
    }
    status
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
    use tokio_test::io::Builder;

    use super::*;
    use crate::Error;
    use crate::types::{Flag, Uid, UidValidity};

    async fn logged_in(
        mock: tokio_test::io::Mock,
    ) -> Client<tokio_test::io::Mock, super::super::Authenticated> {
        Client::from_stream(mock, None)
            .await
            .unwrap()
            .login("u", "p")
            .await
            .unwrap()
    }

    fn script() -> Builder {
        let mut builder = Builder::new();
        builder
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK done\r\n");
        builder
    }

    #[tokio::test]
    async fn select_collects_status() {
        let mock = script()
            .write(b"A0002 SELECT INBOX\r\n")
            .read(b"* 3 EXISTS\r\n* 0 RECENT\r\n* FLAGS (\\Seen \\Deleted)\r\n")
            .read(b"* OK [UIDVALIDITY 1700000000] ok\r\n* OK [UIDNEXT 206] ok\r\n")
            .read(b"A0002 OK [READ-WRITE] SELECT completed\r\n")
            .build();
        let selected = logged_in(mock).await.select("inbox").await.unwrap();
        let status = selected.selected().status();
        assert_eq!(status.exists, 3);
        assert_eq!(status.uid_validity, UidValidity::new(1700000000));
        assert_eq!(status.uid_next, Uid::new(206));
        assert!(status.flags.contains(&Flag::Deleted));
        assert!(!selected.selected().is_read_only());
    }

    #[tokio::test]
    async fn examine_is_read_only() {
        let mock = script()
            .write(b"A0002 EXAMINE INBOX\r\n")
            .read(b"* 0 EXISTS\r\nA0002 OK [READ-ONLY] EXAMINE completed\r\n")
            .build();
        let selected = logged_in(mock).await.examine("INBOX").await.unwrap();
        assert!(selected.selected().is_read_only());
    }

    #[tokio::test]
    async fn select_missing_folder_is_no() {
        let mock = script()
            .write(b"A0002 SELECT Nope\r\n")
            .read(b"A0002 NO [NONEXISTENT] no such mailbox\r\n")
            .build();
        let err = logged_in(mock).await.select("Nope").await.unwrap_err();
        assert!(matches!(err, Error::No(_)));
    }

    #[tokio::test]
    async fn list_finds_trash() {
        let mock = script()
            .write(b"A0002 LIST \"\" *\r\n")
            .read(b"* LIST (\\HasNoChildren) \"|\" INBOX\r\n")
            .read(b"* LIST (\\HasNoChildren \\Trash) \"|\" Trash\r\n")
            .read(b"A0002 OK LIST completed\r\n")
            .build();
        let mut client = logged_in(mock).await;
        let folders = client.list("", "*").await.unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(
            folders.iter().find(|f| f.is_trash()).unwrap().mailbox.as_str(),
            "Trash"
        );
    }
}
