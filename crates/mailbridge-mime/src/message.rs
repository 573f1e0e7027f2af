//! Message structure.
//!
//! A message is parsed into its top-level headers and a flat list of leaf
//! parts; nested multiparts are walked depth first.

use crate::charset::decode_charset;
use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::text::html_to_text;

/// Multipart nesting deeper than this is not descended into.
const MAX_DEPTH: usize = 8;

/// Content-Transfer-Encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64.
    Base64,
    /// Quoted-Printable.
    QuotedPrintable,
    /// Binary.
    Binary,
}

impl TransferEncoding {
    /// Parses a header value; unknown values fall back to 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

/// Leaf body part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Encoded body.
    pub body: Vec<u8>,
    content_type: ContentType,
}

impl Part {
    fn new(headers: Headers, body: Vec<u8>, content_type: ContentType) -> Self {
        Self {
            headers,
            body,
            content_type,
        }
    }

    /// Content type, defaulted to `text/plain` when absent.
    #[must_use]
    pub const fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    /// Content-Transfer-Encoding, 7bit when absent.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns true when Content-Disposition marks the part as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers.get("content-disposition").is_some_and(|d| {
            d.trim_start()
                .get(..10)
                .is_some_and(|kind| kind.eq_ignore_ascii_case("attachment"))
        })
    }

    /// Body with the transfer encoding removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid for its transfer encoding.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => decode_quoted_printable(&self.body),
            _ => Ok(self.body.clone()),
        }
    }

    /// Decoded body converted from its charset.
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer encoding is malformed.
    pub fn text(&self) -> Result<String> {
        let bytes = self.decode_body()?;
        let charset = self.content_type.charset().unwrap_or("us-ascii");
        Ok(decode_charset(&bytes, charset))
    }
}

/// Parsed message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Top-level headers.
    pub headers: Headers,
    /// Leaf parts in document order. A single-part message has exactly one,
    /// carrying the top-level headers.
    pub parts: Vec<Part>,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] for blank input
    /// - [`Error::InvalidHeader`] for a malformed header block or a message
    ///   without any header field
    /// - [`Error::InvalidContentType`] / [`Error::MissingBoundary`] for a
    ///   broken MIME structure
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::Empty);
        }

        let (header_bytes, body) = split_header_body(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(header_bytes))?;
        if headers.is_empty() {
            return Err(Error::InvalidHeader("message has no header fields".to_string()));
        }

        let mut parts = Vec::new();
        collect_parts(headers.clone(), body, 0, &mut parts)?;
        Ok(Self { headers, parts })
    }

    /// Raw `From` value.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers.get("from")
    }

    /// Decoded `Subject`, absent when missing or blank.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.get_decoded("subject")
    }

    /// Raw `Date` value.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// Readable body text.
    ///
    /// Prefers the first inline `text/plain` part and falls back to the first
    /// inline `text/html` part with markup removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen part cannot be decoded.
    pub fn text_body(&self) -> Result<Option<String>> {
        let inline = || self.parts.iter().filter(|p| !p.is_attachment());

        if let Some(part) = inline().find(|p| p.content_type().is("text", "plain")) {
            return part.text().map(Some);
        }
        if let Some(part) = inline().find(|p| p.content_type().is("text", "html")) {
            return part.text().map(|html| Some(html_to_text(&html)));
        }
        Ok(None)
    }
}

fn collect_parts(headers: Headers, body: &[u8], depth: usize, out: &mut Vec<Part>) -> Result<()> {
    let content_type = match headers.get("content-type") {
        Some(value) => ContentType::parse(value)?,
        None => ContentType::default_text(),
    };

    if !content_type.is_multipart() || depth >= MAX_DEPTH {
        out.push(Part::new(headers, body.to_vec(), content_type));
        return Ok(());
    }

    let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
    for raw in split_multipart(body, boundary) {
        let (part_headers, part_body) = split_header_body(raw);
        let part_headers = Headers::parse(&String::from_utf8_lossy(part_headers))?;
        collect_parts(part_headers, part_body, depth + 1, out)?;
    }
    Ok(())
}

/// Splits at the first empty line. Without one, everything is header.
fn split_header_body(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < raw.len() {
        let end = line_end(raw, pos);
        let line = &raw[pos..end];
        if line == b"\n" || line == b"\r\n" {
            return (&raw[..pos], &raw[end..]);
        }
        pos = end;
    }
    (raw, &[])
}

/// Bodies of the parts delimited by `--boundary` lines.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut open: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let end = line_end(body, pos);
        if let Some(rest) = body[pos..end].strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                if let Some(start) = open.take() {
                    parts.push(strip_line_break(&body[start..pos]));
                }
                if closing {
                    return parts;
                }
                open = Some(end);
            }
        }
        pos = end;
    }

    if let Some(start) = open {
        parts.push(&body[start..]);
    }
    parts
}

/// Index just past the next `\n` at or after `pos`, or the end of input.
fn line_end(data: &[u8], pos: usize) -> usize {
    data[pos..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |i| pos + i + 1)
}

fn strip_line_break(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .unwrap_or(data)
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
    fn single_part() {
        let raw = b"From: a@example.com\r\nSubject: Hi\r\n\r\nHello, World!\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.from(), Some("a@example.com"));
        assert_eq!(message.subject().as_deref(), Some("Hi"));
        assert_eq!(message.parts.len(), 1);
        assert_eq!(
            message.text_body().unwrap().as_deref(),
            Some("Hello, World!\r\n")
        );
    }

    #[test]
    fn headers_only() {
        let message = Message::parse(b"Subject: no body").unwrap();
        assert_eq!(message.subject().as_deref(), Some("no body"));
        assert_eq!(message.text_body().unwrap().as_deref(), Some(""));
    }

    #[test]
    fn empty_input() {
        assert!(matches!(Message::parse(b""), Err(Error::Empty)));
        assert!(matches!(Message::parse(b" \r\n\r\n"), Err(Error::Empty)));
    }

    #[test]
    fn body_without_headers_is_rejected() {
        assert!(matches!(
            Message::parse(b"\r\njust text"),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn multipart_alternative_prefers_plain() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "preamble\r\n",
            "--b1\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>html</p>\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "caf=C3=A9\r\n",
            "--b1--\r\n",
            "epilogue\r\n",
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.parts.len(), 2);
        assert_eq!(message.text_body().unwrap().as_deref(), Some("café"));
    }

    #[test]
    fn nested_multipart_with_attachment() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=inner\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<b>Hello</b> there\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=notes.txt\r\n",
            "\r\n",
            "attached\r\n",
            "--outer--\r\n",
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.parts.len(), 2);
        assert!(message.parts[1].is_attachment());
        assert_eq!(message.text_body().unwrap().as_deref(), Some("Hello there"));
    }

    #[test]
    fn base64_cp1251_body() {
        let raw = concat!(
            "Content-Type: text/plain; charset=windows-1251\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "z/Do4uXy\r\n",
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.text_body().unwrap().as_deref(), Some("Привет"));
    }

    #[test]
    fn multipart_without_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody\r\n";
        assert!(matches!(Message::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn bad_content_type() {
        let raw = b"Content-Type: garbage\r\n\r\nbody\r\n";
        assert!(matches!(
            Message::parse(raw),
            Err(Error::InvalidContentType(_))
        ));
    }

    #[test]
    fn unterminated_multipart_keeps_last_part() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\n\n--x\n\nonly part\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.parts.len(), 1);
        assert_eq!(message.parts[0].body, b"only part\n");
    }

    #[test]
    fn transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
    }
}
