//! Header block parsing.

use std::collections::HashMap;

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};

/// Header fields of a message or body part.
///
/// Names are case-insensitive; repeated fields keep their order.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates an empty header set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_ascii_lowercase();
        self.fields.entry(name).or_default().push(value.into());
    }

    /// First raw value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first().map(String::as_str))
    }

    /// All raw values of a field.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(|values| values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// First value of a field with RFC 2047 encoded words decoded.
    ///
    /// Blank values count as absent.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        let decoded = decode_rfc2047(self.get(name)?);
        let trimmed = decoded.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Number of distinct field names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true when no field was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses an unfolded or folded header block.
    ///
    /// Parsing stops at the first empty line. A leading mbox `From ` line is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] for a line that is neither a field
    /// nor a continuation, or for a continuation with nothing to continue.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for (index, line) in text.lines().enumerate() {
            if line.is_empty() {
                break;
            }
            if index == 0 && line.starts_with("From ") {
                continue;
            }

            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = current.as_mut() else {
                    return Err(Error::InvalidHeader(format!(
                        "continuation line without a field: {}",
                        preview(line)
                    )));
                };
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(line.trim());
                continue;
            }

            let Some((name, value)) = line.split_once(':') else {
                return Err(Error::InvalidHeader(format!(
                    "line without a colon: {}",
                    preview(line)
                )));
            };
            let name = name.trim_end();
            if name.is_empty() || !name.bytes().all(is_field_name_byte) {
                return Err(Error::InvalidHeader(format!(
                    "bad field name: {}",
                    preview(name)
                )));
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }
            current = Some((name.to_string(), value.trim().to_string()));
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }
        Ok(headers)
    }
}

/// Printable US-ASCII except colon (RFC 5322 `ftext`).
const fn is_field_name_byte(b: u8) -> bool {
    matches!(b, 33..=57 | 59..=126)
}

fn preview(line: &str) -> String {
    line.chars().take(40).collect()
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

    #[test]
    fn folded_fields_are_unfolded() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Subject: Quarterly\r\n",
            "\treport\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n",
        );
        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.get("subject"), Some("Quarterly report"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain; charset=utf-8"));
        assert!(headers.get("body").is_none());
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn repeated_fields_keep_order() {
        let headers = Headers::parse("Received: a\nReceived: b\n").unwrap();
        assert_eq!(headers.get_all("received"), vec!["a", "b"]);
        assert_eq!(headers.get("received"), Some("a"));
    }

    #[test]
    fn decoded_value() {
        let headers = Headers::parse("Subject: =?UTF-8?B?0J/RgNC40LLQtdGC?=\n").unwrap();
        assert_eq!(headers.get_decoded("subject").as_deref(), Some("Привет"));
    }

    #[test]
    fn blank_value_is_absent() {
        let headers = Headers::parse("Subject:   \n").unwrap();
        assert_eq!(headers.get("subject"), Some(""));
        assert!(headers.get_decoded("subject").is_none());
    }

    #[test]
    fn mbox_separator_is_skipped() {
        let headers =
            Headers::parse("From alice@example.com Mon Jan  1 00:00:00 2024\nSubject: x\n").unwrap();
        assert_eq!(headers.get("subject"), Some("x"));
    }

    #[test]
    fn line_without_colon_is_rejected() {
        let err = Headers::parse("Subject: x\nthis is not a header\n").unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn leading_continuation_is_rejected() {
        assert!(matches!(
            Headers::parse(" orphan\nSubject: x\n"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn space_in_name_is_rejected() {
        assert!(Headers::parse("Bad Name: x\n").is_err());
        assert!(Headers::parse("Subject : tolerated\n").is_ok());
    }
}
