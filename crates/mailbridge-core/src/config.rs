//! Bridge configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use mailbridge_imap::Security;

/// Default IMAP host.
pub const DEFAULT_HOST: &str = "imap.mail.yandex.ru";

/// Default folder polled for unread mail.
pub const DEFAULT_FOLDER: &str = "INBOX";

/// Mailbox connection settings.
#[derive(Clone)]
pub struct MailConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Transport security.
    pub security: Security,
    /// Login name.
    pub username: String,
    /// Login secret, usually an application password.
    pub password: String,
    /// Folder to poll.
    pub folder: String,
    /// Extra PEM trust anchors.
    pub ca_file: Option<PathBuf>,
    /// Bound on connect, TLS handshake and greeting.
    pub connect_timeout: Duration,
    /// Bound on each server response.
    pub io_timeout: Duration,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("folder", &self.folder)
            .field("ca_file", &self.ca_file)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

impl MailConfig {
    /// Starts a builder with the given credentials and defaults for the rest.
    #[must_use]
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> MailConfigBuilder {
        MailConfigBuilder::new(username, password)
    }

    /// Transport settings for the IMAP client.
    #[must_use]
    pub fn imap_config(&self) -> mailbridge_imap::Config {
        let builder = mailbridge_imap::Config::builder(&self.host)
            .port(self.port)
            .security(self.security)
            .connect_timeout(self.connect_timeout)
            .io_timeout(self.io_timeout);
        match &self.ca_file {
            Some(path) => builder.ca_file(path),
            None => builder,
        }
        .build()
    }
}

/// Builder for [`MailConfig`].
#[derive(Debug)]
#[must_use]
pub struct MailConfigBuilder {
    config: MailConfig,
    port_set: bool,
}

impl MailConfigBuilder {
    fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            config: MailConfig {
                host: DEFAULT_HOST.to_string(),
                port: Security::Implicit.default_port(),
                security: Security::Implicit,
                username: username.into(),
                password: password.into(),
                folder: DEFAULT_FOLDER.to_string(),
                ca_file: None,
                connect_timeout: Duration::from_secs(30),
                io_timeout: Duration::from_secs(60),
            },
            port_set: false,
        }
    }

    /// Server hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Server port; defaults to the security mode's standard port.
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self.port_set = true;
        self
    }

    /// Transport security.
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Folder to poll.
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.config.folder = folder.into();
        self
    }

    /// Extra PEM trust anchors.
    pub fn ca_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_file = Some(path.into());
        self
    }

    /// Connect timeout.
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Per-response timeout.
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.config.io_timeout = timeout;
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(mut self) -> MailConfig {
        if !self.port_set {
            self.config.port = self.config.security.default_port();
        }
        self.config
    }
}

/// How unread mail is searched, fetched and shown.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Skip messages already flagged `\Deleted`.
    pub exclude_deleted: bool,
    /// Fetch with `BODY[]` so the server marks messages seen.
    pub mark_seen: bool,
    /// Fetch at most this many messages per check.
    pub max_messages: usize,
    /// Body excerpt length in characters; zero disables excerpts.
    pub excerpt_chars: usize,
    /// Offset dates are shown in.
    pub display_offset: FixedOffset,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            exclude_deleted: true,
            mark_seen: false,
            max_messages: 20,
            excerpt_chars: 0,
            display_offset: FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

/// What "delete" does to a message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeleteStrategy {
    /// Flag `\Deleted` and expunge.
    #[default]
    Expunge,
    /// Move to a trash folder, discovered through `\Trash` when not named.
    MoveToTrash {
        /// Explicit trash folder.
        folder: Option<String>,
    },
}

/// Everything the bridge needs.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Mailbox connection.
    pub mail: MailConfig,
    /// Check behaviour.
    pub check: CheckOptions,
    /// Delete behaviour.
    pub delete: DeleteStrategy,
    /// Deadline for one check or delete request.
    pub operation_timeout: Duration,
}

impl BridgeConfig {
    /// Bundles a mail configuration with default options.
    #[must_use]
    pub fn new(mail: MailConfig) -> Self {
        Self {
            mail,
            check: CheckOptions::default(),
            delete: DeleteStrategy::default(),
            operation_timeout: Duration::from_secs(60),
        }
    }

    /// Replaces the check options.
    #[must_use]
    pub fn with_check(mut self, check: CheckOptions) -> Self {
        self.check = check;
        self
    }

    /// Replaces the delete strategy.
    #[must_use]
    pub fn with_delete(mut self, delete: DeleteStrategy) -> Self {
        self.delete = delete;
        self
    }

    /// Replaces the per-request deadline.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Checks the configuration, reporting every problem at once.
    ///
    /// # Errors
    ///
    /// Returns all [`ValidationError`]s found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mail = &self.mail;

        if mail.host.trim().is_empty() {
            errors.push(ValidationError::EmptyHost);
        }
        if mail.port == 0 {
            errors.push(ValidationError::InvalidPort);
        }
        if mail.username.trim().is_empty() {
            errors.push(ValidationError::EmptyUsername);
        }
        if mail.password.is_empty() {
            errors.push(ValidationError::EmptyPassword);
        }
        if mail.folder.trim().is_empty() {
            errors.push(ValidationError::EmptyFolder);
        }
        if self.check.max_messages == 0 {
            errors.push(ValidationError::ZeroMaxMessages);
        }
        if self.operation_timeout.is_zero() {
            errors.push(ValidationError::ZeroTimeout);
        }
        if let DeleteStrategy::MoveToTrash { folder: Some(name) } = &self.delete
            && name.trim().is_empty()
        {
            errors.push(ValidationError::EmptyTrashFolder);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// A configuration problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// IMAP host is empty.
    EmptyHost,
    /// IMAP port is zero.
    InvalidPort,
    /// IMAP username is empty.
    EmptyUsername,
    /// IMAP password is empty.
    EmptyPassword,
    /// Folder name is empty.
    EmptyFolder,
    /// Trash folder named but empty.
    EmptyTrashFolder,
    /// `max_messages` is zero.
    ZeroMaxMessages,
    /// Operation timeout is zero.
    ZeroTimeout,
}

impl ValidationError {
    /// Human-readable message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyHost => "IMAP host is required",
            Self::InvalidPort => "IMAP port must be 1-65535",
            Self::EmptyUsername => "IMAP username is required",
            Self::EmptyPassword => "IMAP password is required",
            Self::EmptyFolder => "folder name must not be empty",
            Self::EmptyTrashFolder => "trash folder name must not be empty",
            Self::ZeroMaxMessages => "max messages must be at least 1",
            Self::ZeroTimeout => "check timeout must be at least 1 second",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for ValidationError {}

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
    fn builder_defaults() {
        let mail = MailConfig::builder("user@yandex.ru", "app-password").build();
        assert_eq!(mail.host, DEFAULT_HOST);
        assert_eq!(mail.port, 993);
        assert_eq!(mail.folder, "INBOX");
    }

    #[test]
    fn port_follows_security_unless_set() {
        let starttls = MailConfig::builder("u", "p")
            .security(Security::StartTls)
            .build();
        assert_eq!(starttls.port, 143);

        let explicit = MailConfig::builder("u", "p")
            .security(Security::StartTls)
            .port(1143)
            .build();
        assert_eq!(explicit.port, 1143);
    }

    #[test]
    fn debug_redacts_password() {
        let mail = MailConfig::builder("user", "hunter2").build();
        let debug = format!("{mail:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn imap_config_carries_transport() {
        let mail = MailConfig::builder("u", "p")
            .host("imap.example.com")
            .ca_file("/etc/ca.pem")
            .build();
        let imap = mail.imap_config();
        assert_eq!(imap.host, "imap.example.com");
        assert_eq!(imap.port, 993);
        assert!(imap.ca_file.is_some());
    }

    #[test]
    fn validation_reports_everything() {
        let mail = MailConfig::builder("", "").host(" ").port(0).folder("").build();
        let config = BridgeConfig::new(mail)
            .with_check(CheckOptions {
                max_messages: 0,
                ..CheckOptions::default()
            })
            .with_delete(DeleteStrategy::MoveToTrash {
                folder: Some(String::new()),
            });
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 7);
        assert!(errors.contains(&ValidationError::EmptyTrashFolder));
    }

    #[test]
    fn valid_config() {
        let config = BridgeConfig::new(MailConfig::builder("u", "p").build());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.check.display_offset,
            FixedOffset::east_opt(10800).unwrap()
        );
    }
}
