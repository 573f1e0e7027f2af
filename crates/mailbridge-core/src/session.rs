//! One mail session per request.
//!
//! A [`MailSession`] owns one authenticated connection from
//! [`open`](MailSession::open) to [`close`](MailSession::close). Callers run
//! their work against `&mut MailSession` and close it afterwards whatever
//! the outcome; a session dropped without `close` (panic, or a LOGOUT
//! that never completes) still releases its socket.

use std::future::Future;

use mailbridge_imap::{
    Authenticated, Client, ImapStream, Mailbox, MailboxStatus, NotAuthenticated, Selected,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::MailConfig;
use crate::error::{BridgeError, Result};

/// Opens transport connections and reads the greeting.
pub trait Connector: Send + Sync {
    /// Transport produced by this connector.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Establishes a fresh connection.
    fn connect(
        &self,
    ) -> impl Future<Output = mailbridge_imap::Result<Client<Self::Stream, NotAuthenticated>>> + Send;
}

/// Connects to a real server over TCP with the configured security.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    config: mailbridge_imap::Config,
}

impl ImapConnector {
    /// Uses the transport part of `mail`.
    #[must_use]
    pub fn new(mail: &MailConfig) -> Self {
        Self {
            config: mail.imap_config(),
        }
    }
}

impl Connector for ImapConnector {
    type Stream = ImapStream;

    async fn connect(&self) -> mailbridge_imap::Result<Client<ImapStream, NotAuthenticated>> {
        mailbridge_imap::connect(&self.config).await
    }
}

/// Lifecycle of a [`MailSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected yet.
    Disconnected,
    /// Connecting or logging in.
    Connecting,
    /// Logged in; a folder may be selected.
    Ready,
    /// A protocol or transport error occurred; the session is not reused.
    Error,
    /// Closed.
    Ended,
}

/// Status of the selected folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderInfo {
    /// Folder name as selected.
    pub name: String,
    /// Message count.
    pub exists: u32,
    /// True when opened with EXAMINE or forced read-only.
    pub read_only: bool,
}

impl FolderInfo {
    fn new(mailbox: &Mailbox, status: &MailboxStatus) -> Self {
        Self {
            name: mailbox.as_str().to_string(),
            exists: status.exists,
            read_only: status.read_only,
        }
    }
}

enum Link<S> {
    Closed,
    Authenticated(Client<S, Authenticated>),
    Selected(Client<S, Selected>),
}

/// An authenticated connection owned by a single request.
pub struct MailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    host: String,
    state: ConnectionState,
    link: Link<S>,
}

impl<S> std::fmt::Debug for MailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSession")
            .field("host", &self.host)
            .field("state", &self.state)
            .field("folder", &self.folder())
            .finish()
    }
}

impl<S> MailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Connects and logs in.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Authentication`] when the credentials are refused,
    /// [`BridgeError::Connection`] for everything else.
    pub async fn open<C>(connector: &C, config: &MailConfig) -> Result<Self>
    where
        C: Connector<Stream = S>,
    {
        let mut session = Self {
            host: config.host.clone(),
            state: ConnectionState::Disconnected,
            link: Link::Closed,
        };
        session.state = ConnectionState::Connecting;
        debug!(host = %config.host, user = %config.username, "opening mail session");

        let client = connector.connect().await.map_err(|e| {
            warn!(host = %config.host, error = %e, "connection failed");
            BridgeError::connecting(e)
        })?;
        let client = client
            .login(&config.username, &config.password)
            .await
            .map_err(|e| {
                warn!(host = %config.host, user = %config.username, error = %e, "login failed");
                BridgeError::connecting(e)
            })?;

        session.link = Link::Authenticated(client);
        session.state = ConnectionState::Ready;
        Ok(session)
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Name of the selected folder.
    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        match &self.link {
            Link::Selected(client) => Some(client.selected().mailbox().as_str()),
            _ => None,
        }
    }

    /// Selects `name`, replacing any previous selection.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Folder`]; the session is unusable afterwards.
    pub async fn select_folder(&mut self, name: &str, read_only: bool) -> Result<FolderInfo> {
        let link = std::mem::replace(&mut self.link, Link::Closed);
        let opened = match link {
            Link::Authenticated(client) => open_folder(client, name, read_only).await,
            Link::Selected(client) => open_folder(client, name, read_only).await,
            Link::Closed => {
                return Err(self.fail(BridgeError::Folder {
                    folder: name.to_string(),
                    message: "session is closed".to_string(),
                }));
            }
        };

        match opened {
            Ok(client) => {
                let info = FolderInfo::new(client.selected().mailbox(), client.selected().status());
                debug!(folder = %info.name, exists = info.exists, read_only = info.read_only, "folder selected");
                self.link = Link::Selected(client);
                Ok(info)
            }
            Err(e) => Err(self.fail(BridgeError::Folder {
                folder: name.to_string(),
                message: e.to_string(),
            })),
        }
    }

    /// The client of the selected folder.
    pub(crate) fn selected_mut(&mut self) -> Option<&mut Client<S, Selected>> {
        match &mut self.link {
            Link::Selected(client) => Some(client),
            _ => None,
        }
    }

    /// Lists all folders.
    pub(crate) async fn list_folders(
        &mut self,
    ) -> mailbridge_imap::Result<Vec<mailbridge_imap::ListResponse>> {
        match &mut self.link {
            Link::Authenticated(client) => client.list("", "*").await,
            Link::Selected(client) => client.list("", "*").await,
            Link::Closed => Err(mailbridge_imap::Error::InvalidState(
                "session is closed".to_string(),
            )),
        }
    }

    /// Marks the session failed and passes `err` through.
    pub(crate) fn fail(&mut self, err: BridgeError) -> BridgeError {
        self.state = ConnectionState::Error;
        err
    }

    /// Logs out and ends the session. Safe to call in any state.
    pub async fn close(mut self) {
        let link = std::mem::replace(&mut self.link, Link::Closed);
        match link {
            Link::Authenticated(client) => client.logout().await,
            Link::Selected(client) => client.logout().await,
            Link::Closed => {}
        }
        self.state = ConnectionState::Ended;
        info!(host = %self.host, "mail session closed");
    }
}

impl<S> Drop for MailSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn drop(&mut self) {
        if self.state != ConnectionState::Ended && !matches!(self.link, Link::Closed) {
            warn!(host = %self.host, state = ?self.state, "mail session dropped without logout");
        }
    }
}

async fn open_folder<S, State>(
    client: Client<S, State>,
    name: &str,
    read_only: bool,
) -> mailbridge_imap::Result<Client<S, Selected>>
where
    S: AsyncRead + AsyncWrite + Unpin,
    State: mailbridge_imap::Authorized,
{
    if read_only {
        client.examine(name).await
    } else {
        client.select(name).await
    }
}
