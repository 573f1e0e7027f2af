//! Transfer and header decoding.
//!
//! Supports Base64, Quoted-Printable and RFC 2047 encoded words.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::charset::decode_charset;
use crate::error::{Error, Result};

/// Standard alphabet, padding optional. Mail agents disagree on padding
/// inside encoded words.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes Base64, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable (RFC 2045) to raw bytes.
///
/// Soft line breaks (`=` at end of line) are removed.
///
/// # Errors
///
/// Returns an error on a truncated or non-hex escape sequence.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }

        match data.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => i += 3,
            Some([b'\n', ..]) => i += 2,
            Some([hi, lo, ..]) => {
                let byte = hex_value(*hi)
                    .zip(hex_value(*lo))
                    .map(|(h, l)| (h << 4) | l)
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "bad quoted-printable escape ={}{}",
                            char::from(*hi),
                            char::from(*lo)
                        ))
                    })?;
                out.push(byte);
                i += 3;
            }
            _ => {
                // Trailing '=' with only whitespace after it is a soft break.
                if data[i + 1..].iter().all(u8::is_ascii_whitespace) {
                    break;
                }
                return Err(Error::InvalidEncoding(
                    "truncated quoted-printable escape".to_string(),
                ));
            }
        }
    }

    Ok(out)
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Malformed words
/// are kept verbatim so a broken subject still shows something.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space: Option<&str> = None;
    let mut last_was_word = false;

    while !rest.is_empty() {
        let Some(start) = rest.find("=?") else {
            flush(&mut out, pending_space.take());
            out.push_str(rest);
            break;
        };

        let (before, candidate) = rest.split_at(start);
        match parse_encoded_word(candidate) {
            Some((decoded, consumed)) => {
                if before.chars().all(char::is_whitespace) && last_was_word {
                    pending_space = None;
                } else {
                    flush(&mut out, pending_space.take());
                    out.push_str(before);
                }
                out.push_str(&decoded);
                last_was_word = true;
                rest = &candidate[consumed..];

                let gap = rest.len() - rest.trim_start().len();
                if gap > 0 {
                    pending_space = Some(&rest[..gap]);
                    rest = &rest[gap..];
                }
            }
            None => {
                flush(&mut out, pending_space.take());
                out.push_str(before);
                out.push_str("=?");
                last_was_word = false;
                rest = &candidate[2..];
            }
        }
    }

    flush(&mut out, pending_space);
    out
}

fn flush(out: &mut String, pending: Option<&str>) {
    if let Some(space) = pending {
        out.push_str(space);
    }
}

/// Parses `=?charset?enc?text?=` at the start of `input`.
///
/// Returns the decoded text and the number of bytes consumed.
fn parse_encoded_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let end = body.find("?=")?;
    let payload = &body[..end];
    let consumed = input.len() - (body.len() - end - 2);

    if charset.is_empty() || payload.contains(char::is_whitespace) {
        return None;
    }
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes()).ok()?,
        "Q" | "q" => {
            let unescaped = payload.replace('_', " ");
            decode_quoted_printable(unescaped.as_bytes()).ok()?
        }
        _ => return None,
    };

    Some((decode_charset(&bytes, charset), consumed))
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
    fn base64_with_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn base64_without_padding() {
        assert_eq!(decode_base64(b"SGk").unwrap(), b"Hi");
    }

    #[test]
    fn base64_garbage_is_error() {
        assert!(matches!(decode_base64(b"@@@@"), Err(Error::Base64Decode(_))));
    }

    #[test]
    fn quoted_printable() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo").unwrap(), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld").unwrap(), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"soft=\nbreak").unwrap(), b"softbreak");
        assert_eq!(decode_quoted_printable(b"end=\r\n").unwrap(), b"end");
        assert_eq!(decode_quoted_printable(b"lower=e9").unwrap(), b"lower\xe9");
    }

    #[test]
    fn quoted_printable_bad_escape() {
        assert!(decode_quoted_printable(b"=ZZ").is_err());
        assert!(decode_quoted_printable(b"x=4").is_err());
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(decode_rfc2047("Hello world"), "Hello world");
        assert_eq!(decode_rfc2047(""), "");
    }

    #[test]
    fn single_word() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_rfc2047("=?UTF-8?Q?H=C3=A9llo_you?="), "Héllo you");
    }

    #[test]
    fn adjacent_words_join_without_space() {
        let text = "=?UTF-8?B?0J/RgNC4?= =?UTF-8?B?0LLQtdGC?=";
        assert_eq!(decode_rfc2047(text), "Привет");
    }

    #[test]
    fn word_embedded_in_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?= tomorrow"),
            "Re: café tomorrow"
        );
    }

    #[test]
    fn latin1_and_language_suffix() {
        assert_eq!(decode_rfc2047("=?ISO-8859-1*fr?Q?caf=E9?="), "café");
    }

    #[test]
    fn malformed_word_kept_verbatim() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("cost =? unknown"), "cost =? unknown");
    }
}
