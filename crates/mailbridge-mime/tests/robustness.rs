//! Arbitrary input never panics the parsers.

#![allow(clippy::unwrap_used)]

use mailbridge_mime::encoding::{decode_quoted_printable, decode_rfc2047};
use mailbridge_mime::{Address, Message, Summary, excerpt, html_to_text, parse_date};
use proptest::prelude::*;

proptest! {
    #[test]
    fn message_parse_never_panics(raw in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = Message::parse(&raw);
    }

    #[test]
    fn summary_never_panics(raw in "[ -~\r\n\t]{0,400}", chars in 0usize..64) {
        let _ = Summary::parse(raw.as_bytes(), chars);
    }

    #[test]
    fn address_decoding_never_panics(value in "\\PC{0,120}") {
        let _ = Address::parse_first(&value);
        let _ = decode_rfc2047(&value);
    }

    #[test]
    fn encoded_word_like_input(value in "(=\\?[a-zA-Z0-9*-]{0,8}\\?[bBqQx]?\\?[ -~]{0,16}\\?= ?){0,4}") {
        let _ = decode_rfc2047(&value);
    }

    #[test]
    fn body_helpers_never_panic(value in "\\PC{0,200}", max in 0usize..40) {
        let _ = html_to_text(&value);
        let _ = decode_quoted_printable(value.as_bytes());
        let _ = parse_date(&value);
        if let Some(cut) = excerpt(&value, max) {
            prop_assert!(cut.chars().count() <= max + 1);
        }
    }

    #[test]
    fn plain_subject_survives(subject in "[A-Za-z0-9][A-Za-z0-9 ]{0,40}[A-Za-z0-9]") {
        let raw = format!("Subject: {subject}\r\n\r\n");
        let summary = Summary::parse(raw.as_bytes(), 0).unwrap();
        let expected = subject.split_whitespace().collect::<Vec<_>>().join(" ");
        prop_assert_eq!(summary.subject, Some(expected));
    }
}

#[test]
fn realistic_yandex_notification() {
    let raw = concat!(
        "Return-Path: <noreply@example.ru>\r\n",
        "From: =?koi8-r?B?8NLJ18XU?= <noreply@example.ru>\r\n",
        "To: user@yandex.ru\r\n",
        "Subject: =?windows-1251?B?z/Do4uXy?=\r\n",
        "Date: Tue, 15 Oct 2024 09:30:00 +0300\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/alternative;\r\n",
        "\tboundary=\"=_sep\"\r\n",
        "\r\n",
        "--=_sep\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "0JTQvtCx0YDQviDQv9C+0LbQsNC70L7QstCw0YLRjA==\r\n",
        "--=_sep--\r\n",
    );
    let summary = Summary::parse(raw.as_bytes(), 40).unwrap();
    assert_eq!(summary.from.as_deref(), Some("Привет <noreply@example.ru>"));
    assert_eq!(summary.subject.as_deref(), Some("Привет"));
    assert_eq!(summary.excerpt.as_deref(), Some("Добро пожаловать"));
    assert!(summary.date.is_some());
}
