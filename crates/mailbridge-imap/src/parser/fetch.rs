//! FETCH data items.

use crate::Result;
use crate::types::{Flags, Uid};

use super::lexer::{Lexer, Token};
use super::response::parse_flag_list;

/// One data item of a FETCH response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// `UID n`
    Uid(Uid),
    /// `FLAGS (...)`
    Flags(Flags),
    /// `RFC822.SIZE n`
    Rfc822Size(u32),
    /// `INTERNALDATE "..."`
    InternalDate(String),
    /// `BODY[section]<origin> data`, also used for the `RFC822*` forms.
    Body {
        /// Section specifier, `None` for the whole message.
        section: Option<String>,
        /// Partial origin.
        origin: Option<u32>,
        /// Payload; `None` when the server returned `NIL`.
        data: Option<Vec<u8>>,
    },
}

impl FetchItem {
    /// Returns the UID if this item is one.
    #[must_use]
    pub const fn as_uid(&self) -> Option<Uid> {
        match self {
            Self::Uid(uid) => Some(*uid),
            _ => None,
        }
    }
}

/// Parses `( item *(SP item) )`. Unknown items are skipped.
pub(super) fn parse_fetch_items(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;
    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            token => return Err(lexer.error(format!("unexpected FETCH token {token:?}"))),
        };

        let section = read_bracketed(lexer, b'[', b']');
        let origin = read_bracketed(lexer, b'<', b'>').and_then(|o| o.parse().ok());
        lexer.expect_space()?;

        match name.as_str() {
            "UID" => {
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID 0 in FETCH"))?;
                items.push(FetchItem::Uid(uid));
            }
            "FLAGS" => items.push(FetchItem::Flags(parse_flag_list(lexer)?)),
            "RFC822.SIZE" => items.push(FetchItem::Rfc822Size(lexer.read_number()?)),
            "INTERNALDATE" => match lexer.next_token()? {
                Token::Quoted(date) => items.push(FetchItem::InternalDate(date)),
                token => return Err(lexer.error(format!("bad INTERNALDATE {token:?}"))),
            },
            "BODY" if section.is_none() => skip_value(lexer)?,
            "BODY" | "RFC822" | "RFC822.HEADER" | "RFC822.TEXT" => {
                let data = lexer.read_nstring()?;
                items.push(FetchItem::Body {
                    section: section.filter(|s| !s.is_empty()),
                    origin,
                    data,
                });
            }
            _ => skip_value(lexer)?,
        }
    }

    Ok(items)
}

/// Reads `open ... close` verbatim if the next byte is `open`.
fn read_bracketed(lexer: &mut Lexer<'_>, open: u8, close: u8) -> Option<String> {
    if lexer.peek() != Some(open) {
        return None;
    }
    lexer.advance();
    let rest = lexer.remaining();
    let end = rest.iter().position(|&b| b == close).unwrap_or(rest.len());
    let inner = String::from_utf8_lossy(&rest[..end]).into_owned();
    lexer.skip(end + 1);
    Some(inner)
}

/// Skips one value: a parenthesized group or a single token.
fn skip_value(lexer: &mut Lexer<'_>) -> Result<()> {
    let mut depth = 0usize;
    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth > 0 => depth -= 1,
            Token::Eof | Token::Crlf => return Err(lexer.error("unterminated FETCH value")),
            Token::RParen => return Err(lexer.error("unbalanced ')' in FETCH value")),
            _ => {}
        }
        if depth == 0 {
            return Ok(());
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
    use crate::parser::{Response, ResponseParser, UntaggedResponse};
    use crate::types::Flag;

    use super::*;

    fn fetch(input: &[u8]) -> Vec<FetchItem> {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Fetch { items, .. }) => items,
            other => panic!("expected FETCH, got {other:?}"),
        }
    }

    #[test]
    fn uid_and_body_literal() {
        let items = fetch(b"* 1 FETCH (UID 101 BODY[] {11}\r\nSubject: x\n)\r\n");
        assert_eq!(items[0], FetchItem::Uid(Uid::new(101).unwrap()));
        assert_eq!(
            items[1],
            FetchItem::Body {
                section: None,
                origin: None,
                data: Some(b"Subject: x\n".to_vec()),
            }
        );
    }

    #[test]
    fn body_before_uid() {
        let items = fetch(b"* 2 FETCH (BODY[] {3}\r\nabc UID 205)\r\n");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_uid(), Uid::new(205));
    }

    #[test]
    fn flags_and_size() {
        let items = fetch(b"* 3 FETCH (FLAGS (\\Seen \\Deleted) RFC822.SIZE 4096)\r\n");
        let FetchItem::Flags(flags) = &items[0] else {
            panic!("expected flags");
        };
        assert!(flags.contains(&Flag::Deleted));
        assert_eq!(items[1], FetchItem::Rfc822Size(4096));
    }

    #[test]
    fn section_and_origin() {
        let items = fetch(b"* 1 FETCH (BODY[HEADER.FIELDS (SUBJECT)]<0> \"Subject: hi\")\r\n");
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: Some("HEADER.FIELDS (SUBJECT)".to_string()),
                origin: Some(0),
                data: Some(b"Subject: hi".to_vec()),
            }
        );
    }

    #[test]
    fn nil_body() {
        let items = fetch(b"* 1 FETCH (BODY[] NIL UID 7)\r\n");
        assert!(matches!(items[0], FetchItem::Body { data: None, .. }));
        assert_eq!(items[1].as_uid(), Uid::new(7));
    }

    #[test]
    fn unknown_items_skipped() {
        let items = fetch(
            b"* 1 FETCH (MODSEQ (12345) ENVELOPE (NIL \"s\" NIL NIL NIL NIL NIL NIL NIL NIL) UID 9)\r\n",
        );
        assert_eq!(items, vec![FetchItem::Uid(Uid::new(9).unwrap())]);
    }

    #[test]
    fn zero_uid_rejected() {
        assert!(ResponseParser::parse(b"* 1 FETCH (UID 0)\r\n").is_err());
    }
}
