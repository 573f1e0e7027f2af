//! Response structure and the top-level parser.

use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, SeqNum,
    Status, Tag, Uid, UidValidity,
};
use crate::{Error, Result};

use super::fetch::{FetchItem, parse_fetch_items};
use super::lexer::{Lexer, Token};

/// One complete server response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Command completion.
    Tagged {
        /// Tag of the completed command.
        tag: Tag,
        /// Completion status.
        status: Status,
        /// Optional bracketed code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Server data.
    Untagged(UntaggedResponse),
    /// Command continuation request.
    Continuation {
        /// Text following `+`, if any.
        text: Option<String>,
    },
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedResponse {
    /// `* OK`, `* NO`, `* BAD`, `* PREAUTH` or `* BYE`.
    Condition {
        /// Condition status.
        status: Status,
        /// Optional bracketed code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`
    Capability(Vec<Capability>),
    /// `* LIST ...`
    List(ListResponse),
    /// `* FLAGS (...)`
    Flags(Flags),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n RECENT`
    Recent(u32),
    /// `* n EXPUNGE`
    Expunge(SeqNum),
    /// `* SEARCH ...`: sequence numbers, or UIDs for `UID SEARCH`.
    Search(Vec<u32>),
    /// `* n FETCH (...)`
    Fetch {
        /// Sequence number of the message.
        seq: SeqNum,
        /// Returned data items.
        items: Vec<FetchItem>,
    },
    /// Any untagged data not modelled above, by keyword.
    Other(String),
}

/// Response parser entry point.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one framed response, literals included.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);
        match lexer.next_token()? {
            Token::Asterisk => {
                lexer.expect_space()?;
                parse_untagged(&mut lexer).map(Response::Untagged)
            }
            Token::Plus => {
                if lexer.peek() == Some(b' ') {
                    lexer.advance();
                }
                let text = lexer.read_text_line();
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => {
                let tag = Tag::new(tag);
                lexer.expect_space()?;
                let status = parse_status(lexer.read_atom_str()?)
                    .ok_or_else(|| lexer.error("unknown completion status"))?;
                let (code, text) = parse_resp_text(&mut lexer)?;
                Ok(Response::Tagged {
                    tag,
                    status,
                    code,
                    text,
                })
            }
            token => Err(Error::Parse {
                position: 0,
                message: format!("expected '*', '+' or a tag, got {token:?}"),
            }),
        }
    }
}

fn parse_status(word: &str) -> Option<Status> {
    match word.to_ascii_uppercase().as_str() {
        "OK" => Some(Status::Ok),
        "NO" => Some(Status::No),
        "BAD" => Some(Status::Bad),
        "PREAUTH" => Some(Status::PreAuth),
        "BYE" => Some(Status::Bye),
        _ => None,
    }
}

fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<UntaggedResponse> {
    match lexer.next_token()? {
        Token::Number(n) => {
            lexer.expect_space()?;
            let keyword = lexer.read_atom_str()?.to_ascii_uppercase();
            match keyword.as_str() {
                "EXISTS" => Ok(UntaggedResponse::Exists(n)),
                "RECENT" => Ok(UntaggedResponse::Recent(n)),
                "EXPUNGE" => Ok(UntaggedResponse::Expunge(nonzero_seq(lexer, n)?)),
                "FETCH" => {
                    let seq = nonzero_seq(lexer, n)?;
                    lexer.expect_space()?;
                    let items = parse_fetch_items(lexer)?;
                    Ok(UntaggedResponse::Fetch { seq, items })
                }
                _ => {
                    lexer.read_text_line();
                    Ok(UntaggedResponse::Other(keyword))
                }
            }
        }
        Token::Atom(word) => {
            if let Some(status) = parse_status(word) {
                let (code, text) = parse_resp_text(lexer)?;
                return Ok(UntaggedResponse::Condition { status, code, text });
            }
            let keyword = word.to_ascii_uppercase();
            match keyword.as_str() {
                "CAPABILITY" => Ok(UntaggedResponse::Capability(parse_capabilities(lexer)?)),
                "FLAGS" => {
                    lexer.expect_space()?;
                    Ok(UntaggedResponse::Flags(parse_flag_list(lexer)?))
                }
                "LIST" | "LSUB" => {
                    lexer.expect_space()?;
                    Ok(UntaggedResponse::List(parse_list(lexer)?))
                }
                "SEARCH" => Ok(UntaggedResponse::Search(parse_search(lexer)?)),
                _ => {
                    lexer.read_text_line();
                    Ok(UntaggedResponse::Other(keyword))
                }
            }
        }
        token => Err(lexer.error(format!("unexpected token in untagged response: {token:?}"))),
    }
}

fn nonzero_seq(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
    SeqNum::new(n).ok_or_else(|| lexer.error("sequence number 0"))
}

/// Parses `[SP] ["[" code "]" SP] text`.
fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
    if lexer.peek() == Some(b' ') {
        lexer.advance();
    }
    let code = if lexer.peek() == Some(b'[') {
        let code = parse_response_code(lexer)?;
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        Some(code)
    } else {
        None
    };
    Ok((code, lexer.read_text_line()))
}

fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;
    let name = lexer.read_atom_str()?.to_ascii_uppercase();

    let code = match name.as_str() {
        "ALERT" => ResponseCode::Alert,
        "AUTHENTICATIONFAILED" => ResponseCode::AuthenticationFailed,
        "NONEXISTENT" => ResponseCode::NonExistent,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "CAPABILITY" => ResponseCode::Capability(parse_capabilities(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.iter().cloned().collect())
        }
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(Uid::new(n).ok_or_else(|| lexer.error("UIDNEXT 0"))?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidValidity(
                UidValidity::new(n).ok_or_else(|| lexer.error("UIDVALIDITY 0"))?,
            )
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::Unseen(nonzero_seq(lexer, n)?)
        }
        _ => {
            let rest = lexer.remaining();
            let end = rest.iter().position(|&b| b == b']').unwrap_or(rest.len());
            let argument = String::from_utf8_lossy(&rest[..end]).trim().to_string();
            lexer.skip(end);
            ResponseCode::Other(name, (!argument.is_empty()).then_some(argument))
        }
    };

    lexer.expect(Token::RBracket)?;
    Ok(code)
}

fn parse_capabilities(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();
    while lexer.peek() == Some(b' ') {
        lexer.advance();
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(Capability::parse(s)),
            Token::Number(n) => caps.push(Capability::parse(&n.to_string())),
            token => return Err(lexer.error(format!("unexpected capability token {token:?}"))),
        }
    }
    Ok(caps)
}

/// Parses a parenthesized flag list.
pub(super) fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;
    let mut flags = Flags::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            // `\*` lexes as `\` followed by `*`.
            Token::Atom("\\") => {}
            Token::Asterisk => flags.insert(Flag::Keyword("\\*".to_string())),
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            token => return Err(lexer.error(format!("unexpected token in flag list: {token:?}"))),
        }
    }
    Ok(flags)
}

fn parse_list(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();
    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            token => return Err(lexer.error(format!("unexpected LIST attribute {token:?}"))),
        }
    }
    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::Quoted(s) => s.chars().next(),
        token => return Err(lexer.error(format!("expected delimiter, got {token:?}"))),
    };
    lexer.expect_space()?;

    let name = lexer.read_astring()?;
    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(name),
    })
}

fn parse_search(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    loop {
        while lexer.peek() == Some(b' ') {
            lexer.advance();
        }
        if !lexer.peek().is_some_and(|b| b.is_ascii_digit()) {
            break;
        }
        ids.push(lexer.read_number()?);
    }
    Ok(ids)
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

    fn untagged(input: &[u8]) -> UntaggedResponse {
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(u) => u,
            other => panic!("expected untagged, got {other:?}"),
        }
    }

    #[test]
    fn tagged_ok() {
        let response = ResponseParser::parse(b"A0001 OK LOGIN completed\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: Tag::new("A0001"),
                status: Status::Ok,
                code: None,
                text: "LOGIN completed".to_string(),
            }
        );
    }

    #[test]
    fn tagged_no_with_code() {
        let response =
            ResponseParser::parse(b"A0002 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                .unwrap();
        let Response::Tagged {
            status, code, text, ..
        } = response
        else {
            panic!("expected tagged");
        };
        assert_eq!(status, Status::No);
        assert_eq!(code, Some(ResponseCode::AuthenticationFailed));
        assert_eq!(text, "Invalid credentials");
    }

    #[test]
    fn greeting_with_capabilities() {
        let u = untagged(b"* OK [CAPABILITY IMAP4rev1 UIDPLUS MOVE AUTH=PLAIN] ready\r\n");
        let UntaggedResponse::Condition {
            status,
            code: Some(ResponseCode::Capability(caps)),
            ..
        } = u
        else {
            panic!("expected capability code");
        };
        assert_eq!(status, Status::Ok);
        assert!(caps.contains(&Capability::UidPlus));
        assert!(caps.contains(&Capability::Move));
        assert!(caps.contains(&Capability::Auth("PLAIN".to_string())));
    }

    #[test]
    fn select_codes() {
        assert!(matches!(
            untagged(b"* OK [UIDVALIDITY 1700000000] UIDs valid\r\n"),
            UntaggedResponse::Condition {
                code: Some(ResponseCode::UidValidity(_)),
                ..
            }
        ));
        let u = untagged(b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n");
        let UntaggedResponse::Condition {
            code: Some(ResponseCode::PermanentFlags(flags)),
            ..
        } = u
        else {
            panic!("expected PERMANENTFLAGS");
        };
        assert!(flags.contains(&Flag::Deleted));
        assert!(flags.contains(&Flag::Keyword("\\*".to_string())));
    }

    #[test]
    fn unknown_code_keeps_argument() {
        let u = untagged(b"* OK [HIGHESTMODSEQ 715194045007] ok\r\n");
        assert!(matches!(
            u,
            UntaggedResponse::Condition {
                code: Some(ResponseCode::Other(ref name, Some(ref arg))),
                ..
            } if name == "HIGHESTMODSEQ" && arg == "715194045007"
        ));
    }

    #[test]
    fn exists_and_expunge() {
        assert_eq!(untagged(b"* 23 EXISTS\r\n"), UntaggedResponse::Exists(23));
        assert_eq!(
            untagged(b"* 3 EXPUNGE\r\n"),
            UntaggedResponse::Expunge(SeqNum::new(3).unwrap())
        );
    }

    #[test]
    fn search_results() {
        assert_eq!(
            untagged(b"* SEARCH 2 5 9\r\n"),
            UntaggedResponse::Search(vec![2, 5, 9])
        );
        assert_eq!(untagged(b"* SEARCH\r\n"), UntaggedResponse::Search(vec![]));
        assert_eq!(untagged(b"* SEARCH \r\n"), UntaggedResponse::Search(vec![]));
    }

    #[test]
    fn list_with_trash_attribute() {
        let UntaggedResponse::List(list) =
            untagged(b"* LIST (\\HasNoChildren \\Trash) \"|\" \"Deleted Items\"\r\n")
        else {
            panic!("expected LIST");
        };
        assert!(list.is_trash());
        assert_eq!(list.delimiter, Some('|'));
        assert_eq!(list.mailbox.as_str(), "Deleted Items");
    }

    #[test]
    fn list_unquoted_bracket_name() {
        let UntaggedResponse::List(list) =
            untagged(b"* LIST (\\HasNoChildren) \"/\" [Gmail]/Trash\r\n")
        else {
            panic!("expected LIST");
        };
        assert_eq!(list.mailbox.as_str(), "[Gmail]/Trash");
    }

    #[test]
    fn unknown_untagged_is_other() {
        assert_eq!(
            untagged(b"* ENABLED CONDSTORE\r\n"),
            UntaggedResponse::Other("ENABLED".to_string())
        );
        assert_eq!(
            untagged(b"* 4 VANISHED\r\n"),
            UntaggedResponse::Other("VANISHED".to_string())
        );
    }

    #[test]
    fn bye_condition() {
        assert!(matches!(
            untagged(b"* BYE logging out\r\n"),
            UntaggedResponse::Condition {
                status: Status::Bye,
                ..
            }
        ));
    }

    #[test]
    fn continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ Ready for literal\r\n").unwrap(),
            Response::Continuation {
                text: Some("Ready for literal".to_string())
            }
        );
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            ResponseParser::parse(b")))\r\n"),
            Err(Error::Parse { .. })
        ));
    }
}
