//! End-to-end client flows against a replayed server transcript.

#![allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailbridge_imap::{
    Client, Error, FetchAttribute, FetchItem, Flag, SearchKey, SequenceSet, StoreAction, Uid,
    UidSet,
};

/// Replays canned server output and records what the client sends.
struct ReplayStream {
    server: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl ReplayStream {
    fn new(server: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            server: Cursor::new(server.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for ReplayStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.server.position()).unwrap();
        let data = self.server.get_ref();
        let remaining = data.get(pos..).unwrap_or_default();
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.server.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ReplayStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sent_commands(sent: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    String::from_utf8(sent.lock().unwrap().clone())
        .unwrap()
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn check_unread_flow() {
    let server = concat!(
        "* OK [CAPABILITY IMAP4rev1 UIDPLUS] ready\r\n",
        "A0001 OK logged in\r\n",
        "* 2 EXISTS\r\n",
        "A0002 OK [READ-ONLY] examined\r\n",
        "* SEARCH 1 2\r\n",
        "A0003 OK search done\r\n",
        "* 1 FETCH (UID 101 BODY[] {24}\r\nSubject: first\r\n\r\nbody\r\n)\r\n",
        "* 2 FETCH (BODY[] {25}\r\nSubject: second\r\n\r\nbody\r\n UID 205)\r\n",
        "A0004 OK fetch done\r\n",
        "* BYE bye\r\n",
        "A0005 OK logout\r\n",
    );
    let (stream, sent) = ReplayStream::new(server.as_bytes());

    let client = Client::from_stream(stream, None).await.unwrap();
    let mut inbox = client
        .login("bot@example.com", "secret")
        .await
        .unwrap()
        .examine("INBOX")
        .await
        .unwrap();
    assert!(inbox.selected().is_read_only());

    let unread = inbox
        .search(&[SearchKey::Unseen, SearchKey::Undeleted])
        .await
        .unwrap();
    assert_eq!(unread.len(), 2);

    let mut uids = Vec::new();
    inbox
        .fetch_each(
            &SequenceSet::from_seqs(&unread),
            &[FetchAttribute::Uid, FetchAttribute::Body { peek: true }],
            |_, items| {
                uids.extend(items.iter().filter_map(FetchItem::as_uid));
            },
        )
        .await
        .unwrap();
    assert_eq!(uids, vec![Uid::new(101).unwrap(), Uid::new(205).unwrap()]);

    inbox.logout().await;

    assert_eq!(
        sent_commands(&sent),
        vec![
            "A0001 LOGIN bot@example.com secret",
            "A0002 EXAMINE INBOX",
            "A0003 SEARCH UNSEEN UNDELETED",
            "A0004 FETCH 1:2 (UID BODY.PEEK[])",
            "A0005 LOGOUT",
        ]
    );
}

#[tokio::test]
async fn delete_flow_with_uidplus() {
    let server = concat!(
        "* OK [CAPABILITY IMAP4rev1 UIDPLUS] ready\r\n",
        "A0001 OK logged in\r\n",
        "A0002 OK [READ-WRITE] selected\r\n",
        "* SEARCH 205\r\n",
        "A0003 OK search done\r\n",
        "A0004 OK stored\r\n",
        "* 2 EXPUNGE\r\n",
        "A0005 OK expunged\r\n",
    );
    let (stream, sent) = ReplayStream::new(server.as_bytes());

    let mut inbox = Client::from_stream(stream, None)
        .await
        .unwrap()
        .login("u", "p")
        .await
        .unwrap()
        .select("INBOX")
        .await
        .unwrap();

    let target = UidSet::single(Uid::new(205).unwrap());
    let present = inbox
        .uid_search(&[SearchKey::Uid(target.clone())])
        .await
        .unwrap();
    assert_eq!(present, vec![Uid::new(205).unwrap()]);

    inbox
        .uid_store(&target, StoreAction::Add(vec![Flag::Deleted]))
        .await
        .unwrap();
    let expunged = inbox.uid_expunge(&target).await.unwrap();
    assert_eq!(expunged.len(), 1);

    let commands = sent_commands(&sent);
    assert_eq!(commands[3], "A0004 UID STORE 205 +FLAGS.SILENT (\\Deleted)");
    assert_eq!(commands[4], "A0005 UID EXPUNGE 205");
}

#[tokio::test]
async fn rejected_credentials_stop_the_flow() {
    let server = concat!(
        "* OK ready\r\n",
        "A0001 NO [AUTHENTICATIONFAILED] bad password\r\n",
    );
    let (stream, sent) = ReplayStream::new(server.as_bytes());
    let client = Client::from_stream(stream, None).await.unwrap();
    let err = client.login("u", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Auth(_)));
    assert_eq!(sent_commands(&sent).len(), 1);
}

#[tokio::test]
async fn server_closing_mid_command_is_io_error() {
    let server = concat!("* OK ready\r\n", "A0001 OK in\r\n", "* 3 EXI");
    let (stream, _) = ReplayStream::new(server.as_bytes());
    let client = Client::from_stream(stream, None).await.unwrap();
    let err = client.login("u", "p").await.unwrap().select("INBOX").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
