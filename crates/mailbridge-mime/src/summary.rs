//! Notification-sized view of a message.

use chrono::{DateTime, FixedOffset};

use crate::address::Address;
use crate::encoding::decode_rfc2047;
use crate::error::Result;
use crate::message::Message;
use crate::text::{collapse_whitespace, excerpt};

/// Sender, subject, date and an optional excerpt.
///
/// Every field is optional; presentation decides the placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Summary {
    /// Sender as `Name <addr>`, bare address or bare name.
    pub from: Option<String>,
    /// Decoded subject.
    pub subject: Option<String>,
    /// Parsed `Date` header with its original offset.
    pub date: Option<DateTime<FixedOffset>>,
    /// Start of the readable body, when requested.
    pub excerpt: Option<String>,
}

impl Summary {
    /// Parses `raw` and summarizes it.
    ///
    /// `excerpt_chars` of zero skips body decoding entirely.
    ///
    /// # Errors
    ///
    /// Returns the [`Message::parse`] error for malformed input.
    pub fn parse(raw: &[u8], excerpt_chars: usize) -> Result<Self> {
        Message::parse(raw).map(|message| Self::from_message(&message, excerpt_chars))
    }

    /// Summarizes a parsed message.
    ///
    /// A body that fails to decode yields no excerpt rather than an error.
    #[must_use]
    pub fn from_message(message: &Message, excerpt_chars: usize) -> Self {
        let from = message.from().and_then(|raw| {
            Address::parse_first(raw)
                .map(|addr| addr.to_string())
                .or_else(|| {
                    let decoded = collapse_whitespace(&decode_rfc2047(raw));
                    (!decoded.is_empty()).then_some(decoded)
                })
        });

        let excerpt = if excerpt_chars == 0 {
            None
        } else {
            message
                .text_body()
                .ok()
                .flatten()
                .and_then(|text| excerpt(&text, excerpt_chars))
        };

        Self {
            from,
            subject: message.subject().map(|s| collapse_whitespace(&s)),
            date: message.date().and_then(parse_date),
            excerpt,
        }
    }
}

/// Parses an RFC 5322 date, tolerating comments such as `(MSK)` and
/// irregular spacing.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let cleaned = collapse_whitespace(&strip_comments(value));
    DateTime::parse_from_rfc2822(&cleaned)
        .or_else(|_| DateTime::parse_from_rfc3339(&cleaned))
        .ok()
}

fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
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
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn full_summary() {
        let raw = concat!(
            "From: \"Alice\" <alice@example.com>\r\n",
            "Subject: =?UTF-8?Q?Quarterly_report?=\r\n",
            "Date: Mon, 14 Oct 2024 10:00:00 +0300 (MSK)\r\n",
            "\r\n",
            "Numbers   are\r\n  up.\r\n",
        );
        let summary = Summary::parse(raw.as_bytes(), 100).unwrap();
        assert_eq!(summary.from.as_deref(), Some("Alice <alice@example.com>"));
        assert_eq!(summary.subject.as_deref(), Some("Quarterly report"));
        assert_eq!(summary.excerpt.as_deref(), Some("Numbers are up."));

        let date = summary.date.unwrap();
        assert_eq!(date.offset().local_minus_utc(), 3 * 3600);
        assert_eq!(
            date.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 10, 14, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_fields_stay_absent() {
        let summary = Summary::parse(b"X-Mailer: test\r\n\r\nbody", 0).unwrap();
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn unparseable_date_is_absent() {
        let summary = Summary::parse(b"Date: sometime soon\r\n\r\n", 0).unwrap();
        assert!(summary.date.is_none());
    }

    #[test]
    fn undecodable_body_gives_no_excerpt() {
        let raw = b"Subject: x\r\nContent-Transfer-Encoding: base64\r\n\r\n@@@@\r\n";
        let summary = Summary::parse(raw, 50).unwrap();
        assert_eq!(summary.subject.as_deref(), Some("x"));
        assert!(summary.excerpt.is_none());
    }

    #[test]
    fn date_variants() {
        assert!(parse_date("14 Oct 2024 10:00:00 GMT").is_some());
        assert!(parse_date("Mon,  14 Oct 2024   10:00:00 +0000").is_some());
        assert!(parse_date("2024-10-14T10:00:00+03:00").is_some());
        assert!(parse_date("").is_none());
    }
}
