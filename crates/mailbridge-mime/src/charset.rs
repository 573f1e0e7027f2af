//! Charset conversion for decoded text.
//!
//! Labels are resolved through `mail-parser`'s charset map; anything it does
//! not know is read as UTF-8 with invalid sequences replaced.

use mail_parser::decoders::charsets::map::charset_decoder;

/// Converts `bytes` in charset `label` to a `String`.
#[must_use]
pub fn decode_charset(bytes: &[u8], label: &str) -> String {
    let label = label.trim().trim_matches('"').to_ascii_lowercase();
    match label.as_str() {
        "" | "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        _ => charset_decoder(label.as_bytes()).map_or_else(
            || String::from_utf8_lossy(bytes).into_owned(),
            |decode| decode(bytes),
        ),
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
    use super::*;

    #[test]
    fn utf8_and_unknown_labels() {
        assert_eq!(decode_charset("Привет".as_bytes(), "UTF-8"), "Привет");
        assert_eq!(decode_charset(b"ok\xff", "x-unknown"), "ok\u{FFFD}");
    }

    #[test]
    fn latin1() {
        assert_eq!(decode_charset(b"caf\xe9", "ISO-8859-1"), "café");
    }

    #[test]
    fn windows_1252_punctuation() {
        assert_eq!(
            decode_charset(b"\x80 \x93quoted\x94 \x97", "windows-1252"),
            "€ \u{201C}quoted\u{201D} \u{2014}"
        );
    }

    #[test]
    fn windows_1251() {
        let bytes = [0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2, b' ', 0xA8, 0xB8, 0xB9];
        assert_eq!(decode_charset(&bytes, "\"windows-1251\""), "Привет Ёё№");
    }

    #[test]
    fn koi8_r() {
        let bytes = [0xF0, 0xD2, 0xC9, 0xD7, 0xC5, 0xD4, 0xA3];
        assert_eq!(decode_charset(&bytes, "KOI8-R"), "Приветё");
    }
}
