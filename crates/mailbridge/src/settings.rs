//! Settings from `MAILBRIDGE_*` environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use mailbridge_core::{BridgeConfig, CheckOptions, DeleteStrategy, MailConfig, ValidationError};
use mailbridge_imap::Security;

const PREFIX: &str = "MAILBRIDGE_";

/// Configuration problems, all of them.
#[derive(Debug, thiserror::Error)]
#[error("{}", .0.join("; "))]
pub struct SettingsError(pub Vec<String>);

/// Everything the binary needs to start.
#[derive(Clone)]
pub struct Settings {
    /// Telegram bot token.
    pub bot_token: String,
    /// Mail side.
    pub bridge: BridgeConfig,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bot_token", &"<redacted>")
            .field("bridge", &self.bridge)
            .finish()
    }
}

impl Settings {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Lists every missing or malformed variable.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, which maps a full variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let mut env = Env {
            lookup,
            problems: Vec::new(),
        };

        let bot_token = env.required("BOT_TOKEN");
        let username = env.required("IMAP_USER");
        let password = env.required("IMAP_PASSWORD");

        let security: Security = env.parsed("IMAP_SECURITY").unwrap_or_default();
        let mut mail = MailConfig::builder(username, password)
            .host(env.text("IMAP_HOST").unwrap_or_else(|| mailbridge_core::DEFAULT_HOST.to_string()))
            .security(security)
            .folder(env.text("FOLDER").unwrap_or_else(|| mailbridge_core::DEFAULT_FOLDER.to_string()));
        if let Some(port) = env.parsed::<u16>("IMAP_PORT") {
            mail = mail.port(port);
        }
        if let Some(path) = env.text("IMAP_CA_FILE") {
            mail = mail.ca_file(path);
        }

        let defaults = CheckOptions::default();
        let check = CheckOptions {
            exclude_deleted: true,
            mark_seen: env.flag("MARK_SEEN").unwrap_or(defaults.mark_seen),
            max_messages: env.parsed("MAX_MESSAGES").unwrap_or(defaults.max_messages),
            excerpt_chars: env.parsed("EXCERPT_CHARS").unwrap_or(defaults.excerpt_chars),
            display_offset: env.offset("TZ_OFFSET").unwrap_or(defaults.display_offset),
        };

        let trash_folder = env.text("TRASH_FOLDER");
        let delete = match env.text("DELETE_MODE").as_deref().map(str::to_ascii_lowercase) {
            None => DeleteStrategy::Expunge,
            Some(mode) if mode == "expunge" => DeleteStrategy::Expunge,
            Some(mode) if mode == "trash" => DeleteStrategy::MoveToTrash {
                folder: trash_folder,
            },
            Some(other) => {
                env.problem(format!(
                    "{PREFIX}DELETE_MODE: unknown mode '{other}' (expected expunge or trash)"
                ));
                DeleteStrategy::Expunge
            }
        };

        let mut bridge = BridgeConfig::new(mail.build())
            .with_check(check)
            .with_delete(delete);
        if let Some(secs) = env.parsed::<u64>("CHECK_TIMEOUT_SECS") {
            bridge = bridge.with_operation_timeout(Duration::from_secs(secs));
        }

        if let Err(errors) = bridge.validate() {
            // Missing credentials were already reported by name.
            env.problems.extend(
                errors
                    .iter()
                    .filter(|e| {
                        !matches!(e, ValidationError::EmptyUsername | ValidationError::EmptyPassword)
                    })
                    .map(ToString::to_string),
            );
        }

        if env.problems.is_empty() {
            Ok(Self { bot_token, bridge })
        } else {
            Err(SettingsError(env.problems))
        }
    }
}

struct Env<F> {
    lookup: F,
    problems: Vec<String>,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn text(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{PREFIX}{name}"))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn problem(&mut self, message: String) {
        self.problems.push(message);
    }

    fn required(&mut self, name: &str) -> String {
        self.text(name).unwrap_or_else(|| {
            self.problem(format!("{PREFIX}{name} is not set"));
            String::new()
        })
    }

    fn parsed<T>(&mut self, name: &str) -> Option<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.text(name)?;
        raw.parse()
            .map_err(|e| self.problem(format!("{PREFIX}{name}: invalid value '{raw}': {e}")))
            .ok()
    }

    fn flag(&mut self, name: &str) -> Option<bool> {
        let raw = self.text(name)?;
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => {
                self.problem(format!("{PREFIX}{name}: expected true or false, got '{raw}'"));
                None
            }
        }
    }

    fn offset(&mut self, name: &str) -> Option<FixedOffset> {
        let raw = self.text(name)?;
        let offset = parse_offset(&raw);
        if offset.is_none() {
            self.problem(format!("{PREFIX}{name}: expected an offset like +03:00, got '{raw}'"));
        }
        offset
    }
}

/// `+HH:MM`, `-HH:MM`, `+HHMM` or `Z`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
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
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (format!("{PREFIX}{k}"), (*v).to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BOT_TOKEN", "123:abc"),
        ("IMAP_USER", "me@yandex.ru"),
        ("IMAP_PASSWORD", "app-password"),
    ];

    #[test]
    fn defaults() {
        let settings = load(&REQUIRED).unwrap();
        let mail = &settings.bridge.mail;
        assert_eq!(mail.host, "imap.mail.yandex.ru");
        assert_eq!(mail.port, 993);
        assert_eq!(mail.security, Security::Implicit);
        assert_eq!(mail.folder, "INBOX");
        assert_eq!(settings.bridge.delete, DeleteStrategy::Expunge);
        assert_eq!(settings.bridge.check.max_messages, 20);
        assert_eq!(settings.bridge.check.excerpt_chars, 0);
        assert!(!settings.bridge.check.mark_seen);
        assert_eq!(settings.bridge.check.display_offset.local_minus_utc(), 3 * 3600);
        assert_eq!(settings.bridge.operation_timeout, Duration::from_secs(60));
    }

    #[test]
    fn every_missing_variable_is_listed() {
        let err = load(&[]).unwrap_err();
        assert_eq!(
            err.0,
            vec![
                "MAILBRIDGE_BOT_TOKEN is not set",
                "MAILBRIDGE_IMAP_USER is not set",
                "MAILBRIDGE_IMAP_PASSWORD is not set",
            ]
        );
    }

    #[test]
    fn malformed_values_are_collected() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("IMAP_PORT", "99999"),
            ("IMAP_SECURITY", "carrier-pigeon"),
            ("MARK_SEEN", "maybe"),
            ("TZ_OFFSET", "Moscow"),
            ("DELETE_MODE", "shred"),
            ("MAX_MESSAGES", "0"),
        ]);
        let err = load(&vars).unwrap_err();
        assert_eq!(err.0.len(), 6, "{err}");
        assert!(err.0.iter().any(|p| p.starts_with("MAILBRIDGE_IMAP_PORT")));
        assert!(err.0.iter().any(|p| p.contains("carrier-pigeon")));
    }

    #[test]
    fn starttls_uses_its_port_and_trash_mode() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("IMAP_SECURITY", "starttls"),
            ("IMAP_HOST", "mail.example.org"),
            ("DELETE_MODE", "trash"),
            ("TRASH_FOLDER", "Bin"),
            ("TZ_OFFSET", "-05:30"),
            ("CHECK_TIMEOUT_SECS", "15"),
        ]);
        let settings = load(&vars).unwrap();
        assert_eq!(settings.bridge.mail.port, 143);
        assert_eq!(settings.bridge.mail.host, "mail.example.org");
        assert_eq!(
            settings.bridge.delete,
            DeleteStrategy::MoveToTrash {
                folder: Some("Bin".to_string())
            }
        );
        assert_eq!(
            settings.bridge.check.display_offset.local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert_eq!(settings.bridge.operation_timeout, Duration::from_secs(15));
    }

    #[test]
    fn secrets_are_not_printed() {
        let settings = load(&REQUIRED).unwrap();
        let shown = format!("{settings:?}");
        assert!(!shown.contains("123:abc"));
        assert!(!shown.contains("app-password"));
    }

    #[test]
    fn offsets() {
        assert_eq!(parse_offset("+03:00").unwrap().local_minus_utc(), 10800);
        assert_eq!(parse_offset("+0300").unwrap().local_minus_utc(), 10800);
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_offset("03:00").is_none());
        assert!(parse_offset("+3").is_none());
        assert!(parse_offset("+03:75").is_none());
    }
}
