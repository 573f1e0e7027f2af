//! In-process IMAP server and recording sink for bridge tests.
//!
//! The server keeps its mailbox in memory and answers one connection per
//! [`Connector::connect`] over `tokio::io::duplex`. It understands exactly
//! the commands the bridge issues and logs each one without its tag.

#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use mailbridge_core::{
    BridgeConfig, Button, ChatId, Connector, MailConfig, MessageId, NotificationSink, SinkError,
};
use mailbridge_imap::{Client, NotAuthenticated};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

pub const USER: &str = "robot@example.com";
pub const PASSWORD: &str = "s3cret";

/// A message as the server stores it.
#[derive(Debug, Clone)]
pub struct Stored {
    pub uid: u32,
    pub raw: Vec<u8>,
    pub seen: bool,
    pub deleted: bool,
}

#[derive(Debug, Default)]
struct Folder {
    next_uid: u32,
    messages: Vec<Stored>,
    trash: bool,
}

impl Folder {
    fn append(&mut self, raw: Vec<u8>) -> u32 {
        let uid = self.next_uid.max(1);
        self.next_uid = uid + 1;
        self.messages.push(Stored {
            uid,
            raw,
            seen: false,
            deleted: false,
        });
        uid
    }

    fn max_uid(&self) -> u32 {
        self.messages.iter().map(|m| m.uid).max().unwrap_or(0)
    }
}

#[derive(Debug)]
struct Mailstore {
    folders: BTreeMap<String, Folder>,
    capabilities: Vec<String>,
    password: String,
    stall: Option<String>,
    hang_up: Option<String>,
    log: Vec<String>,
    connections: usize,
}

#[derive(Debug, Default)]
struct Connection {
    selected: Option<String>,
    writable: bool,
}

/// Scripted IMAP server; clones share the same mailbox.
#[derive(Debug, Clone)]
pub struct FakeServer {
    store: Arc<Mutex<Mailstore>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    /// Server with an empty INBOX that accepts [`USER`]/[`PASSWORD`].
    pub fn new() -> Self {
        let mut folders = BTreeMap::new();
        folders.insert("INBOX".to_string(), Folder::default());
        Self {
            store: Arc::new(Mutex::new(Mailstore {
                folders,
                capabilities: vec!["IMAP4rev1".to_string()],
                password: PASSWORD.to_string(),
                stall: None,
                hang_up: None,
                log: Vec::new(),
                connections: 0,
            })),
        }
    }

    /// Advertises an extra capability.
    pub fn with_capability(self, capability: &str) -> Self {
        self.store
            .lock()
            .unwrap()
            .capabilities
            .push(capability.to_string());
        self
    }

    /// Adds a folder, flagged `\Trash` when `trash` is set.
    pub fn with_folder(self, name: &str, trash: bool) -> Self {
        self.store.lock().unwrap().folders.insert(
            name.to_string(),
            Folder {
                trash,
                ..Folder::default()
            },
        );
        self
    }

    /// Makes every LOGIN fail.
    pub fn rejecting_logins(self) -> Self {
        self.store.lock().unwrap().password = String::new();
        self
    }

    /// Never answers commands with this name, e.g. `FETCH`.
    pub fn stalling_on(self, command: &str) -> Self {
        self.store.lock().unwrap().stall = Some(command.to_string());
        self
    }

    /// Drops the connection when a command with this name arrives.
    pub fn hanging_up_on(self, command: &str) -> Self {
        self.store.lock().unwrap().hang_up = Some(command.to_string());
        self
    }

    /// Sets the next UID of `folder`.
    pub fn with_next_uid(self, folder: &str, uid: u32) -> Self {
        self.store
            .lock()
            .unwrap()
            .folders
            .get_mut(folder)
            .unwrap()
            .next_uid = uid;
        self
    }

    /// Appends an unseen message to `folder` and returns its UID.
    pub fn deliver(&self, folder: &str, raw: impl Into<Vec<u8>>) -> u32 {
        self.store
            .lock()
            .unwrap()
            .folders
            .get_mut(folder)
            .unwrap()
            .append(raw.into())
    }

    /// Removes a message behind the bridge's back.
    pub fn remove(&self, folder: &str, uid: u32) {
        self.store
            .lock()
            .unwrap()
            .folders
            .get_mut(folder)
            .unwrap()
            .messages
            .retain(|m| m.uid != uid);
    }

    /// Messages currently in `folder`.
    pub fn messages(&self, folder: &str) -> Vec<Stored> {
        self.store.lock().unwrap().folders[folder].messages.clone()
    }

    /// Every command received so far, without tags.
    pub fn commands(&self) -> Vec<String> {
        self.store.lock().unwrap().log.clone()
    }

    /// Number of received commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.store.lock().unwrap().connections
    }
}

impl Connector for FakeServer {
    type Stream = DuplexStream;

    async fn connect(&self) -> mailbridge_imap::Result<Client<DuplexStream, NotAuthenticated>> {
        let (client, server) = tokio::io::duplex(1 << 16);
        tokio::spawn(serve(Arc::clone(&self.store), server));
        Client::from_stream(client, None).await
    }
}

async fn serve(store: Arc<Mutex<Mailstore>>, stream: DuplexStream) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    let greeting = {
        let mut store = store.lock().unwrap();
        store.connections += 1;
        format!(
            "* OK [CAPABILITY {}] fake server ready\r\n",
            store.capabilities.join(" ")
        )
    };
    if write.write_all(greeting.as_bytes()).await.is_err() {
        return;
    }

    let mut connection = Connection::default();
    while let Ok(Some(line)) = lines.next_line().await {
        let answer = store.lock().unwrap().respond(&mut connection, &line);
        let Some((reply, done)) = answer else {
            // Keep reading without answering until the client goes away.
            while let Ok(Some(line)) = lines.next_line().await {
                store.lock().unwrap().record(&line);
            }
            return;
        };
        if write.write_all(&reply).await.is_err() || done {
            return;
        }
    }
}

impl Mailstore {
    /// Returns the reply and whether the connection ends, or `None` when
    /// the command should never be answered.
    fn respond(&mut self, conn: &mut Connection, line: &str) -> Option<(Vec<u8>, bool)> {
        let (tag, rest) = line.split_once(' ').unwrap_or((line, ""));
        let (name, args) = command_name(rest);
        self.record(line);
        if self.stall.as_deref() == Some(name.as_str()) {
            return None;
        }
        if self.hang_up.as_deref() == Some(name.as_str()) {
            return Some((Vec::new(), true));
        }

        let mut out = Vec::new();
        let status = self.execute(conn, &name, args, &mut out);
        out.extend_from_slice(format!("{tag} {status}\r\n").as_bytes());
        Some((out, name == "LOGOUT"))
    }

    /// Logs a command line without its tag.
    fn record(&mut self, line: &str) {
        let rest = line.split_once(' ').map_or(line, |(_, rest)| rest);
        self.log.push(rest.to_string());
    }

    fn execute(&mut self, conn: &mut Connection, name: &str, args: &str, out: &mut Vec<u8>) -> String {
        let words = words(args);
        match name {
            "CAPABILITY" => {
                push(out, &format!("* CAPABILITY {}", self.capabilities.join(" ")));
                "OK CAPABILITY completed".to_string()
            }
            "NOOP" => "OK NOOP completed".to_string(),
            "LOGOUT" => {
                push(out, "* BYE logging out");
                "OK LOGOUT completed".to_string()
            }
            "LOGIN" => {
                if !self.password.is_empty() && words.get(1) == Some(&self.password) {
                    "OK LOGIN completed".to_string()
                } else {
                    "NO [AUTHENTICATIONFAILED] invalid credentials".to_string()
                }
            }
            "LIST" => {
                for (folder_name, folder) in &self.folders {
                    let attrs = if folder.trash {
                        "\\HasNoChildren \\Trash"
                    } else {
                        "\\HasNoChildren"
                    };
                    push(out, &format!("* LIST ({attrs}) \"/\" \"{folder_name}\""));
                }
                "OK LIST completed".to_string()
            }
            "SELECT" | "EXAMINE" => {
                let Some(folder) = words.first().and_then(|w| self.folders.get(w)) else {
                    conn.selected = None;
                    return "NO [NONEXISTENT] no such mailbox".to_string();
                };
                push(out, "* FLAGS (\\Seen \\Deleted)");
                push(out, &format!("* {} EXISTS", folder.messages.len()));
                push(out, "* OK [UIDVALIDITY 1] UIDs valid");
                conn.selected = words.first().cloned();
                conn.writable = name == "SELECT";
                if conn.writable {
                    "OK [READ-WRITE] SELECT completed".to_string()
                } else {
                    "OK [READ-ONLY] EXAMINE completed".to_string()
                }
            }
            _ => match conn.selected.clone() {
                Some(selected) => self.execute_selected(conn, &selected, name, &words, args, out),
                None => "BAD no mailbox selected".to_string(),
            },
        }
    }

    fn execute_selected(
        &mut self,
        conn: &mut Connection,
        selected: &str,
        name: &str,
        words: &[String],
        args: &str,
        out: &mut Vec<u8>,
    ) -> String {
        let has = |cap: &str| self.capabilities.iter().any(|c| c == cap);
        let move_supported = has("MOVE");
        let uidplus = has("UIDPLUS");
        let target_exists = words.get(1).is_some_and(|t| self.folders.contains_key(t));
        let folder = self.folders.get_mut(selected).unwrap();

        match name {
            "SEARCH" | "UID SEARCH" => {
                let found = search(folder, words, name == "UID SEARCH");
                let ids: Vec<String> = found.iter().map(u32::to_string).collect();
                if ids.is_empty() {
                    push(out, "* SEARCH");
                } else {
                    push(out, &format!("* SEARCH {}", ids.join(" ")));
                }
                "OK SEARCH completed".to_string()
            }
            "FETCH" => {
                let max = u32::try_from(folder.messages.len()).unwrap();
                let peek = args.contains("BODY.PEEK[]");
                for seq in numbers(&words[0], max) {
                    let Some(message) = folder.messages.get_mut(seq as usize - 1) else {
                        continue;
                    };
                    if !peek && conn.writable {
                        message.seen = true;
                    }
                    out.extend_from_slice(
                        format!(
                            "* {seq} FETCH (UID {} BODY[] {{{}}}\r\n",
                            message.uid,
                            message.raw.len()
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(&message.raw);
                    push(out, ")");
                }
                "OK FETCH completed".to_string()
            }
            "UID STORE" => {
                if !conn.writable {
                    return "NO mailbox is read-only".to_string();
                }
                let uids = numbers(&words[0], folder.max_uid());
                let deleted = args.contains("\\Deleted");
                let add = words.get(1).is_some_and(|op| op.starts_with('+'));
                for message in &mut folder.messages {
                    if uids.contains(&message.uid) && deleted {
                        message.deleted = add;
                    }
                }
                "OK STORE completed".to_string()
            }
            "UID EXPUNGE" => {
                if !uidplus {
                    return "BAD unknown command".to_string();
                }
                let uids = numbers(&words[0], folder.max_uid());
                expunge(folder, out, |m| m.deleted && uids.contains(&m.uid));
                "OK EXPUNGE completed".to_string()
            }
            "EXPUNGE" => {
                expunge(folder, out, |m| m.deleted);
                "OK EXPUNGE completed".to_string()
            }
            "CLOSE" => {
                if conn.writable {
                    expunge(folder, &mut Vec::new(), |m| m.deleted);
                }
                conn.selected = None;
                "OK CLOSE completed".to_string()
            }
            "UID COPY" | "UID MOVE" => {
                if name == "UID MOVE" && !move_supported {
                    return "BAD unknown command".to_string();
                }
                if !target_exists {
                    return "NO [TRYCREATE] no such mailbox".to_string();
                }
                let uids = numbers(&words[0], folder.max_uid());
                let copies: Vec<Vec<u8>> = folder
                    .messages
                    .iter()
                    .filter(|m| uids.contains(&m.uid))
                    .map(|m| m.raw.clone())
                    .collect();
                if name == "UID MOVE" {
                    expunge(folder, out, |m| uids.contains(&m.uid));
                }
                let Some(target) = words.get(1).and_then(|t| self.folders.get_mut(t)) else {
                    return "NO [TRYCREATE] no such mailbox".to_string();
                };
                for raw in copies {
                    target.append(raw);
                }
                format!("OK {} completed", &name[4..])
            }
            _ => "BAD unknown command".to_string(),
        }
    }
}

fn command_name(rest: &str) -> (String, &str) {
    let (first, args) = rest.split_once(' ').unwrap_or((rest, ""));
    let first = first.to_ascii_uppercase();
    if first == "UID" {
        let (second, args) = args.split_once(' ').unwrap_or((args, ""));
        (format!("UID {}", second.to_ascii_uppercase()), args)
    } else {
        (first, args)
    }
}

/// Splits arguments on spaces, honouring double quotes.
fn words(args: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = args.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => quoted = !quoted,
            '\\' if quoted => current.extend(chars.next()),
            ' ' if !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Expands `1:3,7,9:*`.
fn numbers(set: &str, max: u32) -> Vec<u32> {
    let value = |s: &str| if s == "*" { max } else { s.parse().unwrap() };
    let mut out = Vec::new();
    for part in set.split(',') {
        match part.split_once(':') {
            Some((a, b)) => {
                let (a, b) = (value(a), value(b));
                out.extend(a.min(b)..=a.max(b));
            }
            None => out.push(value(part)),
        }
    }
    out
}

fn search(folder: &Folder, words: &[String], by_uid: bool) -> Vec<u32> {
    let max_uid = folder.max_uid();
    let mut uid_filter: Option<Vec<u32>> = None;
    let mut criteria = Vec::new();
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        match word.to_ascii_uppercase().as_str() {
            "UID" => uid_filter = iter.next().map(|set| numbers(set, max_uid)),
            other => criteria.push(other.to_string()),
        }
    }

    folder
        .messages
        .iter()
        .enumerate()
        .filter(|(_, m)| uid_filter.as_ref().is_none_or(|uids| uids.contains(&m.uid)))
        .filter(|(_, m)| {
            criteria.iter().all(|c| match c.as_str() {
                "UNSEEN" => !m.seen,
                "SEEN" => m.seen,
                "DELETED" => m.deleted,
                "UNDELETED" => !m.deleted,
                _ => true,
            })
        })
        .map(|(i, m)| if by_uid { m.uid } else { u32::try_from(i).unwrap() + 1 })
        .collect()
}

fn expunge(folder: &mut Folder, out: &mut Vec<u8>, doomed: impl Fn(&Stored) -> bool) {
    while let Some(index) = folder.messages.iter().position(&doomed) {
        folder.messages.remove(index);
        push(out, &format!("* {} EXPUNGE", index + 1));
    }
}

fn push(out: &mut Vec<u8>, line: &str) {
    out.extend_from_slice(line.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Plain text message with the given headers; `None` leaves a header out.
pub fn message(from: Option<&str>, subject: Option<&str>, date: Option<&str>, body: &str) -> Vec<u8> {
    let mut raw = String::new();
    if let Some(from) = from {
        raw.push_str(&format!("From: {from}\r\n"));
    }
    if let Some(subject) = subject {
        raw.push_str(&format!("Subject: {subject}\r\n"));
    }
    if let Some(date) = date {
        raw.push_str(&format!("Date: {date}\r\n"));
    }
    raw.push_str("Message-ID: <test@example.com>\r\n");
    raw.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\n");
    raw.push_str(body);
    raw.push_str("\r\n");
    raw.into_bytes()
}

/// Standard test message.
pub fn simple(subject: &str) -> Vec<u8> {
    message(
        Some("Alice Example <alice@example.com>"),
        Some(subject),
        Some("Mon, 14 Sep 2026 09:30:00 +0000"),
        "Hello there.",
    )
}

/// Bytes that do not parse as a message.
pub fn garbage() -> Vec<u8> {
    b"this line has no colon\r\n\r\nnot a message\r\n".to_vec()
}

/// Bridge configuration pointing at the fake server.
pub fn config() -> BridgeConfig {
    BridgeConfig::new(MailConfig::builder(USER, PASSWORD).host("imap.test").build())
}

/// What the bridge handed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Text {
        chat: ChatId,
        id: MessageId,
        text: String,
    },
    Buttons {
        chat: ChatId,
        id: MessageId,
        text: String,
        buttons: Vec<Button>,
    },
    Edit {
        chat: ChatId,
        id: MessageId,
        text: String,
    },
}

impl Delivery {
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text, .. } | Self::Buttons { text, .. } | Self::Edit { text, .. } => text,
        }
    }

    pub fn buttons(&self) -> &[Button] {
        match self {
            Self::Buttons { buttons, .. } => buttons,
            _ => &[],
        }
    }
}

/// Sink that records everything; clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    next_id: Arc<AtomicI64>,
    failing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sends with buttons fail from now on.
    pub fn fail_buttons(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Texts in delivery order.
    pub fn texts(&self) -> Vec<String> {
        self.deliveries()
            .iter()
            .map(|d| d.text().to_string())
            .collect()
    }

    /// Every button action that was offered.
    pub fn actions(&self) -> Vec<String> {
        self.deliveries()
            .iter()
            .flat_map(|d| d.buttons().iter().map(|b| b.action.clone()).collect::<Vec<_>>())
            .collect()
    }

    fn record(&self, delivery: Delivery) {
        self.deliveries.lock().unwrap().push(delivery);
    }

    fn id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl NotificationSink for RecordingSink {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageId, SinkError> {
        let id = self.id();
        self.record(Delivery::Text {
            chat,
            id,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn send_with_buttons(
        &self,
        chat: ChatId,
        text: &str,
        buttons: &[Button],
    ) -> Result<MessageId, SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError("chat unreachable".to_string()));
        }
        let id = self.id();
        self.record(Delivery::Buttons {
            chat,
            id,
            text: text.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(id)
    }

    async fn edit_text(&self, chat: ChatId, id: MessageId, text: &str) -> Result<(), SinkError> {
        self.record(Delivery::Edit {
            chat,
            id,
            text: text.to_string(),
        });
        Ok(())
    }
}
