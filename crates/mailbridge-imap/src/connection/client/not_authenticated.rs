//! Greeting, STARTTLS and LOGIN.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use super::Client;
use super::states::{Authenticated, NotAuthenticated};
use crate::command::{Command, TagGenerator};
use crate::connection::framed::FramedStream;
use crate::connection::stream::ImapStream;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream and reads the server greeting.
    ///
    /// `read_timeout` bounds every later response read.
    pub async fn from_stream(stream: S, read_timeout: Option<Duration>) -> Result<Self> {
        let mut framed = FramedStream::new(stream).with_read_timeout(read_timeout);
        let greeting = framed.read_response().await?;

        let capabilities = match ResponseParser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Condition { status, code, text }) => {
                match status {
                    Status::Ok | Status::PreAuth => match code {
                        Some(ResponseCode::Capability(caps)) => caps,
                        _ => Vec::new(),
                    },
                    Status::Bye => return Err(Error::Bye(text)),
                    Status::No | Status::Bad => {
                        return Err(Error::Protocol(format!("server refused session: {text}")));
                    }
                }
            }
            other => return Err(Error::Protocol(format!("unexpected greeting: {other:?}"))),
        };

        debug!(capabilities = capabilities.len(), "greeting received");
        Ok(Self {
            stream: framed,
            tags: TagGenerator::default(),
            capabilities,
            state: NotAuthenticated,
        })
    }

    /// Logs in with a user name and password.
    ///
    /// A `NO` completion becomes [`Error::Auth`]; the password never appears
    /// in errors or logs.
    pub async fn login(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        if self.has_capability(&Capability::LoginDisabled) {
            return Err(Error::Auth(
                "server advertises LOGINDISABLED on this connection".to_string(),
            ));
        }

        let command = Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        };
        match self.run(&command).await {
            Ok((untagged, completion)) => {
                for response in untagged {
                    if let UntaggedResponse::Capability(caps) = response {
                        self.capabilities = caps;
                    }
                }
                info!(user = %username, "logged in");
                debug!(text = %completion.text, "LOGIN completed");
                Ok(self.into_state(Authenticated))
            }
            Err(Error::No(text) | Error::Bad(text)) => Err(Error::Auth(text)),
            Err(e) => Err(e),
        }
    }
}

impl Client<ImapStream, NotAuthenticated> {
    /// Issues STARTTLS and upgrades the transport.
    ///
    /// Capabilities are re-read afterwards since the pre-TLS list must not be
    /// trusted.
    pub async fn starttls(mut self, host: &str, connector: &TlsConnector) -> Result<Self> {
        if !self.capabilities.is_empty() && !self.has_capability(&Capability::StartTls) {
            return Err(Error::InvalidState(
                "server does not advertise STARTTLS".to_string(),
            ));
        }
        self.run(&Command::StartTls).await?;

        let read_timeout = self.stream.read_timeout();
        let tls = self.stream.into_inner().upgrade(host, connector).await?;
        let mut client = Self {
            stream: FramedStream::new(tls).with_read_timeout(read_timeout),
            tags: self.tags,
            capabilities: Vec::new(),
            state: NotAuthenticated,
        };
        client.refresh_capabilities().await?;
        debug!("STARTTLS negotiated");
        Ok(client)
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
    use tokio_test::io::Builder;

    use super::*;

    #[tokio::test]
    async fn login_success_updates_capabilities() {
        let mock = Builder::new()
            .read(b"* OK IMAP ready\r\n")
            .write(b"A0001 LOGIN user secret\r\n")
            .read(b"A0001 OK [CAPABILITY IMAP4rev1 UIDPLUS MOVE] logged in\r\n")
            .build();
        let client = Client::from_stream(mock, None).await.unwrap();
        let client = client.login("user", "secret").await.unwrap();
        assert!(client.supports_uidplus());
        assert!(client.supports_move());
    }

    #[tokio::test]
    async fn rejected_login_is_auth_error() {
        let mock = Builder::new()
            .read(b"* OK IMAP ready\r\n")
            .write(b"A0001 LOGIN user wrong\r\n")
            .read(b"A0001 NO [AUTHENTICATIONFAILED] invalid credentials\r\n")
            .build();
        let client = Client::from_stream(mock, None).await.unwrap();
        let err = client.login("user", "wrong").await.unwrap_err();
        assert!(matches!(err, Error::Auth(text) if text == "invalid credentials"));
    }

    #[tokio::test]
    async fn login_disabled_sends_nothing() {
        let mock = Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 STARTTLS LOGINDISABLED] ready\r\n")
            .build();
        let client = Client::from_stream(mock, None).await.unwrap();
        assert!(matches!(
            client.login("user", "pw").await,
            Err(Error::Auth(_))
        ));
    }

    #[tokio::test]
    async fn refused_greeting() {
        let mock = Builder::new().read(b"* NO maintenance\r\n").build();
        assert!(matches!(
            Client::from_stream(mock, None).await,
            Err(Error::Protocol(_))
        ));
    }
}
