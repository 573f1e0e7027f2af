//! Commands valid with a mailbox selected.

use tokio::io::{AsyncRead, AsyncWrite};

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::{Command, FetchAttribute, SearchKey, StoreAction};
use crate::parser::{FetchItem, UntaggedResponse};
use crate::types::{Mailbox, SeqNum, SequenceSet, Uid, UidSet};
use crate::{Error, Result};

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selection state.
    #[must_use]
    pub const fn selected(&self) -> &Selected {
        &self.state
    }

    /// `SEARCH`: matching sequence numbers, in server order.
    pub async fn search(&mut self, keys: &[SearchKey]) -> Result<Vec<SeqNum>> {
        let ids = self.search_ids(keys, false).await?;
        Ok(ids.into_iter().filter_map(SeqNum::new).collect())
    }

    /// `UID SEARCH`: matching UIDs, in server order.
    pub async fn uid_search(&mut self, keys: &[SearchKey]) -> Result<Vec<Uid>> {
        let ids = self.search_ids(keys, true).await?;
        Ok(ids.into_iter().filter_map(Uid::new).collect())
    }

    async fn search_ids(&mut self, keys: &[SearchKey], uid: bool) -> Result<Vec<u32>> {
        let command = Command::Search {
            keys: keys.to_vec(),
            uid,
        };
        let mut ids = Vec::new();
        self.run_with(&command, |response| {
            if let UntaggedResponse::Search(found) = response {
                ids.extend(found);
            }
        })
        .await?;
        Ok(ids)
    }

    /// `FETCH`, delivering each message's data to `on_fetch` as soon as its
    /// response has been read. Returns once the command has completed.
    pub async fn fetch_each(
        &mut self,
        sequence: &SequenceSet,
        items: &[FetchAttribute],
        mut on_fetch: impl FnMut(SeqNum, Vec<FetchItem>),
    ) -> Result<()> {
        if sequence.is_empty() {
            return Ok(());
        }
        let command = Command::Fetch {
            sequence: sequence.clone(),
            items: items.to_vec(),
        };
        self.run_with(&command, |response| {
            if let UntaggedResponse::Fetch { seq, items } = response {
                on_fetch(seq, items);
            }
        })
        .await
        .map(drop)
    }

    /// `UID STORE ... .SILENT`.
    pub async fn uid_store(&mut self, uids: &UidSet, action: StoreAction) -> Result<()> {
        self.require_writable("UID STORE")?;
        let command = Command::UidStore {
            uids: uids.clone(),
            action,
            silent: true,
        };
        self.run(&command).await.map(drop)
    }

    /// `UID COPY`.
    pub async fn uid_copy(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        let command = Command::UidCopy {
            uids: uids.clone(),
            mailbox: Mailbox::new(mailbox),
        };
        self.run(&command).await.map(drop)
    }

    /// `UID MOVE`. Requires the MOVE capability.
    pub async fn uid_move(&mut self, uids: &UidSet, mailbox: &str) -> Result<()> {
        self.require_writable("UID MOVE")?;
        if !self.supports_move() {
            return Err(Error::InvalidState(
                "server does not advertise MOVE".to_string(),
            ));
        }
        let command = Command::UidMove {
            uids: uids.clone(),
            mailbox: Mailbox::new(mailbox),
        };
        self.run(&command).await.map(drop)
    }

    /// `EXPUNGE`: removes every `\Deleted` message in the mailbox.
    pub async fn expunge(&mut self) -> Result<Vec<SeqNum>> {
        self.require_writable("EXPUNGE")?;
        let (untagged, _) = self.run(&Command::Expunge).await?;
        Ok(expunged(untagged))
    }

    /// `UID EXPUNGE`: removes only the given `\Deleted` messages. Requires
    /// UIDPLUS.
    pub async fn uid_expunge(&mut self, uids: &UidSet) -> Result<Vec<SeqNum>> {
        self.require_writable("UID EXPUNGE")?;
        if !self.supports_uidplus() {
            return Err(Error::InvalidState(
                "server does not advertise UIDPLUS".to_string(),
            ));
        }
        let (untagged, _) = self
            .run(&Command::UidExpunge { uids: uids.clone() })
            .await?;
        Ok(expunged(untagged))
    }

    /// `CLOSE`: leaves the mailbox, silently expunging `\Deleted` messages
    /// when it was opened read-write.
    pub async fn close(mut self) -> Result<Client<S, Authenticated>> {
        self.run(&Command::Close).await?;
        Ok(self.into_state(Authenticated))
    }

    fn require_writable(&self, command: &str) -> Result<()> {
        if self.state.is_read_only() {
            Err(Error::InvalidState(format!(
                "{command} needs a read-write mailbox, {} is read-only",
                self.state.mailbox()
            )))
        } else {
            Ok(())
        }
    }
}

fn expunged(untagged: Vec<UntaggedResponse>) -> Vec<SeqNum> {
    untagged
        .into_iter()
        .filter_map(|response| match response {
            UntaggedResponse::Expunge(seq) => Some(seq),
            _ => None,
        })
        .collect()
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
    use tokio_test::io::{Builder, Mock};

    use super::*;
    use crate::types::Flag;

    fn script(capabilities: &str, select: &str) -> Builder {
        let greeting = format!("* OK [CAPABILITY IMAP4rev1{capabilities}] ready\r\n");
        let mut builder = Builder::new();
        builder
            .read(greeting.as_bytes())
            .write(b"A0001 LOGIN u p\r\n")
            .read(b"A0001 OK done\r\n")
            .write(format!("A0002 {select} INBOX\r\n").as_bytes())
            .read(b"* 2 EXISTS\r\nA0002 OK selected\r\n");
        builder
    }

    async fn open(mock: Mock, read_only: bool) -> Client<Mock, Selected> {
        let client = Client::from_stream(mock, None)
            .await
            .unwrap()
            .login("u", "p")
            .await
            .unwrap();
        if read_only {
            client.examine("INBOX").await.unwrap()
        } else {
            client.select("INBOX").await.unwrap()
        }
    }

    #[tokio::test]
    async fn search_unseen() {
        let mock = script("", "SELECT")
            .write(b"A0003 SEARCH UNSEEN UNDELETED\r\n")
            .read(b"* SEARCH 1 2\r\nA0003 OK done\r\n")
            .build();
        let mut client = open(mock, false).await;
        let found = client
            .search(&[SearchKey::Unseen, SearchKey::Undeleted])
            .await
            .unwrap();
        assert_eq!(found, vec![SeqNum::new(1).unwrap(), SeqNum::new(2).unwrap()]);
    }

    #[tokio::test]
    async fn fetch_each_streams_in_order() {
        let mock = script("", "SELECT")
            .write(b"A0003 FETCH 1:2 (UID BODY.PEEK[])\r\n")
            .read(b"* 1 FETCH (UID 101 BODY[] {2}\r\nhi)\r\n")
            .read(b"* 2 FETCH (UID 205 BODY[] {2}\r\nyo)\r\n")
            .read(b"A0003 OK done\r\n")
            .build();
        let mut client = open(mock, false).await;
        let mut seen = Vec::new();
        client
            .fetch_each(
                &SequenceSet::from_numbers([1, 2]),
                &[FetchAttribute::Uid, FetchAttribute::Body { peek: true }],
                |seq, items| seen.push((seq.get(), items.len())),
            )
            .await
            .unwrap();
        assert_eq!(seen, vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn empty_fetch_sends_nothing() {
        let mock = script("", "SELECT").build();
        let mut client = open(mock, false).await;
        let mut calls = 0;
        client
            .fetch_each(&SequenceSet::default(), &[FetchAttribute::Uid], |_, _| calls += 1)
            .await
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[tokio::test]
    async fn uid_expunge_with_uidplus() {
        let uids = UidSet::single(Uid::new(205).unwrap());
        let mock = script(" UIDPLUS", "SELECT")
            .write(b"A0003 UID STORE 205 +FLAGS.SILENT (\\Deleted)\r\n")
            .read(b"A0003 OK stored\r\n")
            .write(b"A0004 UID EXPUNGE 205\r\n")
            .read(b"* 2 EXPUNGE\r\nA0004 OK expunged\r\n")
            .build();
        let mut client = open(mock, false).await;
        client
            .uid_store(&uids, StoreAction::Add(vec![Flag::Deleted]))
            .await
            .unwrap();
        let gone = client.uid_expunge(&uids).await.unwrap();
        assert_eq!(gone, vec![SeqNum::new(2).unwrap()]);
    }

    #[tokio::test]
    async fn uid_expunge_without_uidplus_is_refused_locally() {
        let mock = script("", "SELECT").build();
        let mut client = open(mock, false).await;
        let uids = UidSet::single(Uid::new(1).unwrap());
        assert!(matches!(
            client.uid_expunge(&uids).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn read_only_mailbox_rejects_store() {
        let mock = script("", "EXAMINE").build();
        let mut client = open(mock, true).await;
        let uids = UidSet::single(Uid::new(1).unwrap());
        assert!(matches!(
            client.uid_store(&uids, StoreAction::Add(vec![Flag::Deleted])).await,
            Err(Error::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn uid_move_requires_capability() {
        let mock = script(" MOVE", "SELECT")
            .write(b"A0003 UID MOVE 7 Trash\r\n")
            .read(b"A0003 OK moved\r\n")
            .build();
        let mut client = open(mock, false).await;
        client
            .uid_move(&UidSet::single(Uid::new(7).unwrap()), "Trash")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn close_returns_to_authenticated() {
        let mock = script("", "SELECT")
            .write(b"A0003 CLOSE\r\n")
            .read(b"A0003 OK closed\r\n")
            .build();
        let client = open(mock, false).await;
        let _authenticated: Client<Mock, Authenticated> = client.close().await.unwrap();
    }
}
