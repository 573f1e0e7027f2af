//! Sans-I/O response parser.
//!
//! [`ResponseParser::parse`] turns one framed response into a [`Response`].
//! Untagged data the bridge has no use for is surfaced as
//! [`UntaggedResponse::Other`] rather than rejected.

#![allow(clippy::missing_errors_doc)]

mod fetch;
pub mod lexer;
mod response;

pub use fetch::FetchItem;
pub use response::{Response, ResponseParser, UntaggedResponse};

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
mod proptests {
    use proptest::prelude::*;

    use super::ResponseParser;

    proptest! {
        #[test]
        fn parse_never_panics(input in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = ResponseParser::parse(&input);
        }

        #[test]
        fn fetch_prefix_never_panics(tail in "[ -~]{0,200}") {
            let line = format!("* 1 FETCH ({tail}\r\n");
            let _ = ResponseParser::parse(line.as_bytes());
        }
    }
}
