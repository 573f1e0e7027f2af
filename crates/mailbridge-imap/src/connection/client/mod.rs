//! Type-state IMAP client.
//!
//! ```text
//! NotAuthenticated --login--> Authenticated --select/examine--> Selected
//!                                   ^                              |
//!                                   +------------close-------------+
//! ```
//!
//! Each state only exposes the commands valid in it. Transitions consume the
//! client; when a transition fails the connection is dropped with it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace, warn};

pub use self::states::{Authenticated, Authorized, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, ResponseCode, Status};
use crate::{Error, Result};

/// IMAP client in connection state `State`.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tags: TagGenerator,
    capabilities: Vec<Capability>,
    state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Tagged completion of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Bracketed response code, if any.
    pub code: Option<ResponseCode>,
    /// Completion text.
    pub text: String,
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn into_state<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tags: self.tags,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Capabilities as last reported by the server.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Returns true if the server advertised `cap`.
    fn has_capability(&self, cap: &Capability) -> bool {
        self.capabilities.contains(cap)
    }

    /// `UIDPLUS` (RFC 4315), which provides `UID EXPUNGE`.
    #[must_use]
    pub fn supports_uidplus(&self) -> bool {
        self.has_capability(&Capability::UidPlus)
    }

    /// `MOVE` (RFC 6851).
    #[must_use]
    pub fn supports_move(&self) -> bool {
        self.has_capability(&Capability::Move)
    }

    /// Re-reads the capability list.
    async fn refresh_capabilities(&mut self) -> Result<&[Capability]> {
        let (untagged, _) = self.run(&Command::Capability).await?;
        for response in untagged {
            if let UntaggedResponse::Capability(caps) = response {
                self.capabilities = caps;
            }
        }
        Ok(&self.capabilities)
    }

    /// Ends the session with LOGOUT and shuts the stream down.
    ///
    /// Errors are logged, not returned: the connection is gone either way.
    pub async fn logout(mut self) {
        if let Err(e) = self.run(&Command::Logout).await {
            debug!(error = %e, "LOGOUT did not complete cleanly");
        }
        if let Err(e) = self.stream.shutdown().await {
            trace!(error = %e, "stream shutdown failed");
        }
    }

    /// Runs a command and collects its untagged data.
    pub(crate) async fn run(
        &mut self,
        command: &Command,
    ) -> Result<(Vec<UntaggedResponse>, Completion)> {
        let mut untagged = Vec::new();
        let completion = self
            .run_with(command, |response| untagged.push(response))
            .await?;
        Ok((untagged, completion))
    }

    /// Runs a command, handing each untagged response to `on_untagged` as
    /// soon as it is read.
    pub(crate) async fn run_with(
        &mut self,
        command: &Command,
        mut on_untagged: impl FnMut(UntaggedResponse),
    ) -> Result<Completion> {
        let tag = self.tags.next_tag();
        debug!(%tag, command = command.name(), "sending");
        self.stream.write_command(&command.serialize(&tag)).await?;

        let mut bye: Option<String> = None;
        loop {
            let raw = match self.stream.read_response().await {
                Ok(raw) => raw,
                Err(Error::Io(e)) if bye.is_some() => {
                    trace!(error = %e, "connection closed after BYE");
                    return Err(Error::Bye(bye.unwrap_or_default()));
                }
                Err(e) => return Err(e),
            };

            match ResponseParser::parse(&raw) {
                Ok(Response::Tagged {
                    tag: done,
                    status,
                    code,
                    text,
                }) if done.as_str() == tag => {
                    if let Some(ResponseCode::Capability(caps)) = &code {
                        self.capabilities.clone_from(caps);
                    }
                    return match status {
                        Status::Ok | Status::PreAuth => Ok(Completion { code, text }),
                        Status::No => Err(Error::No(text)),
                        Status::Bad => Err(Error::Bad(text)),
                        Status::Bye => Err(Error::Bye(text)),
                    };
                }
                Ok(Response::Tagged { tag: other, .. }) => {
                    warn!(expected = %tag, got = %other, "ignoring completion for unknown tag");
                }
                Ok(Response::Untagged(UntaggedResponse::Condition {
                    status: Status::Bye,
                    text,
                    ..
                })) => bye = Some(text),
                Ok(Response::Untagged(response)) => on_untagged(response),
                Ok(Response::Continuation { .. }) => {
                    return Err(Error::Protocol(format!(
                        "unexpected continuation request during {}",
                        command.name()
                    )));
                }
                Err(e) => {
                    // A line we cannot parse must not be mistaken for the end
                    // of the command; keep reading until the tagged completion.
                    warn!(error = %e, command = command.name(), "skipping unparseable response");
                }
            }
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

    async fn client(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock, NotAuthenticated> {
        Client::from_stream(mock, None).await.unwrap()
    }

    #[tokio::test]
    async fn greeting_capabilities_are_recorded() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK [CAPABILITY IMAP4rev1 UIDPLUS] hello\r\n")
            .build();
        let c = client(mock).await;
        assert!(c.supports_uidplus());
        assert!(!c.supports_move());
    }

    #[tokio::test]
    async fn bye_greeting_is_error() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* BYE too many connections\r\n")
            .build();
        let err = Client::from_stream(mock, None).await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
    }

    #[tokio::test]
    async fn capability_refresh() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* CAPABILITY IMAP4rev1 MOVE\r\nA0001 OK done\r\n")
            .build();
        let mut c = client(mock).await;
        c.refresh_capabilities().await.unwrap();
        assert!(c.supports_move());
    }

    #[tokio::test]
    async fn bad_completion_is_error() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"A0001 BAD what\r\n")
            .build();
        let mut c = client(mock).await;
        assert!(matches!(c.refresh_capabilities().await, Err(Error::Bad(_))));
    }

    #[tokio::test]
    async fn unparseable_untagged_line_is_skipped() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 CAPABILITY\r\n")
            .read(b"* 0 FETCH (UID 1)\r\n* CAPABILITY IMAP4rev1 UIDPLUS\r\nA0001 OK done\r\n")
            .build();
        let mut c = client(mock).await;
        c.refresh_capabilities().await.unwrap();
        assert!(c.supports_uidplus());
    }

    #[tokio::test]
    async fn logout_tolerates_bye_and_close() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0001 LOGOUT\r\n")
            .read(b"* BYE see you\r\n")
            .build();
        client(mock).await.logout().await;
    }
}
