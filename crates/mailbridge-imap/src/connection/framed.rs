//! Line and literal framing.
//!
//! A response is one line, extended by every `{n}` literal
//! announced at the end of a line: the literal bytes and the continuation
//! line after them belong to the same response.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 8192;

/// Upper bound for a single line.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Upper bound for a single literal.
const MAX_LITERAL_SIZE: usize = 64 * 1024 * 1024;

/// Buffered, framed connection.
pub struct FramedStream<S> {
    reader: BufReader<S>,
    read_timeout: Option<Duration>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
            read_timeout: None,
        }
    }

    /// Bounds every [`read_response`](Self::read_response) call.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// The per-response deadline, if any.
    #[must_use]
    pub const fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_framed())
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => self.read_framed().await,
        }
    }

    async fn read_framed(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();
        loop {
            let line_start = response.len();
            self.read_line_into(&mut response).await?;

            let Some(size) = literal_size(&response[line_start..]) else {
                return Ok(response);
            };
            if size > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal of {size} bytes exceeds limit of {MAX_LITERAL_SIZE}"
                )));
            }
            let offset = response.len();
            response.resize(offset + size, 0);
            self.reader.read_exact(&mut response[offset..]).await?;
        }
    }

    async fn read_line_into(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by server",
                )));
            }

            if let Some(pos) = available.iter().position(|&b| b == b'\n') {
                out.extend_from_slice(&available[..=pos]);
                self.reader.consume(pos + 1);
                return Ok(());
            }
            let len = available.len();
            out.extend_from_slice(available);
            self.reader.consume(len);

            if out.len() - start > MAX_LINE_LENGTH {
                return Err(Error::Protocol("response line too long".to_string()));
            }
        }
    }

    /// Writes and flushes a serialized command.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Shuts down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }

    /// Returns the underlying stream. Buffered unread bytes are dropped.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Size announced by a trailing `{n}` or `{n+}` on a CRLF-terminated line.
fn literal_size(line: &[u8]) -> Option<usize> {
    let body = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let body = body.strip_suffix(b"+").unwrap_or(body);
    let open = body.iter().rposition(|&b| b == b'{')?;
    let digits = &body[open + 1..];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
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
    fn literal_size_detection() {
        assert_eq!(literal_size(b"* 1 FETCH (BODY[] {42}\r\n"), Some(42));
        assert_eq!(literal_size(b"A1 APPEND x {7+}\r\n"), Some(7));
        assert_eq!(literal_size(b"* OK done\r\n"), None);
        assert_eq!(literal_size(b"* OK {}\r\n"), None);
        assert_eq!(literal_size(b"* OK {12}"), None);
    }

    #[tokio::test]
    async fn reads_simple_lines() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK ready\r\nA0001 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"A0001 OK done\r\n");
    }

    #[tokio::test]
    async fn literal_is_part_of_response() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\n")
            .read(b"hello")
            .read(b" UID 7)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (BODY[] {5}\r\nhello UID 7)\r\n"
        );
    }

    #[tokio::test]
    async fn literal_containing_crlf() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* 1 FETCH (BODY[] {4}\r\na\r\nb)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (BODY[] {4}\r\na\r\nb)\r\n"
        );
    }

    #[tokio::test]
    async fn crlf_split_across_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"* OK split\r")
            .read(b"\n")
            .build();
        let mut framed = FramedStream::new(mock);
        assert_eq!(framed.read_response().await.unwrap(), b"* OK split\r\n");
    }

    #[tokio::test]
    async fn eof_is_io_error() {
        let mock = tokio_test::io::Builder::new().read(b"* OK part").build();
        let mut framed = FramedStream::new(mock);
        assert!(matches!(framed.read_response().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn write_command_flushes() {
        let mock = tokio_test::io::Builder::new()
            .write(b"A0001 NOOP\r\n")
            .build();
        let mut framed = FramedStream::new(mock);
        framed.write_command(b"A0001 NOOP\r\n").await.unwrap();
    }
}
