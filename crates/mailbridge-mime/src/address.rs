//! Mailbox addresses from `From`-style headers.

use std::fmt;

use crate::encoding::decode_rfc2047;

/// One mailbox: optional display name and address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    /// Display name with encoded words decoded.
    pub name: Option<String>,
    /// `local@domain`
    pub email: Option<String>,
}

impl Address {
    /// Parses the first mailbox of an address-list header value.
    ///
    /// Handles `Name <addr>`, `"Quoted, Name" <addr>`, bare `addr` and the
    /// legacy `addr (Name)` form. Returns `None` when nothing usable is found.
    #[must_use]
    pub fn parse_first(value: &str) -> Option<Self> {
        split_outside_quotes(value, ',')
            .into_iter()
            .map(Self::parse_mailbox)
            .find(|addr| addr.name.is_some() || addr.email.is_some())
    }

    fn parse_mailbox(segment: &str) -> Self {
        let segment = segment.trim();

        if let Some(open) = find_outside_quotes(segment, '<') {
            let after = &segment[open + 1..];
            let email = after.find('>').map_or(after, |close| &after[..close]);
            return Self {
                name: display_name(&segment[..open]),
                email: non_empty(email.trim()),
            };
        }

        let (bare, comment) = split_comment(segment);
        if bare.contains('@') {
            Self {
                name: comment.and_then(display_name),
                email: non_empty(bare),
            }
        } else {
            Self {
                name: display_name(segment),
                email: None,
            }
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => write!(f, "{name} <{email}>"),
            (Some(only), None) | (None, Some(only)) => f.write_str(only),
            (None, None) => Ok(()),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn display_name(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let unquoted = match raw.strip_prefix('"') {
        Some(inner) => unescape(inner.strip_suffix('"').unwrap_or(inner)),
        None => raw.to_string(),
    };
    let decoded = decode_rfc2047(&unquoted);
    non_empty(decoded.trim())
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

/// `addr (comment)` into `("addr", Some("comment"))`.
fn split_comment(s: &str) -> (&str, Option<&str>) {
    match (s.find('('), s.rfind(')')) {
        (Some(open), Some(close)) if open < close => {
            (s[..open].trim(), Some(&s[open + 1..close]))
        }
        _ => (s, None),
    }
}

fn find_outside_quotes(s: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == target && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(i) = find_outside_quotes(rest, sep) {
        parts.push(&rest[..i]);
        rest = &rest[i + sep.len_utf8()..];
    }
    parts.push(rest);
    parts
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

    fn first(value: &str) -> String {
        Address::parse_first(value).unwrap().to_string()
    }

    #[test]
    fn name_and_angle_address() {
        assert_eq!(first("Alice Smith <alice@example.com>"), "Alice Smith <alice@example.com>");
    }

    #[test]
    fn quoted_name_with_comma() {
        let addr = Address::parse_first("\"Smith, Alice\" <alice@example.com>, bob@example.com").unwrap();
        assert_eq!(addr.name.as_deref(), Some("Smith, Alice"));
        assert_eq!(addr.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn encoded_name() {
        assert_eq!(
            first("=?UTF-8?B?0J/RgNC40LLQtdGC?= <hi@example.ru>"),
            "Привет <hi@example.ru>"
        );
    }

    #[test]
    fn bare_and_legacy_forms() {
        assert_eq!(first("bob@example.com"), "bob@example.com");
        assert_eq!(first("<bob@example.com>"), "bob@example.com");
        assert_eq!(first("bob@example.com (Bob)"), "Bob <bob@example.com>");
    }

    #[test]
    fn name_without_address() {
        assert_eq!(first("Mailer Daemon"), "Mailer Daemon");
    }

    #[test]
    fn nothing_usable() {
        assert!(Address::parse_first("").is_none());
        assert!(Address::parse_first(" , <> ").is_none());
    }
}
