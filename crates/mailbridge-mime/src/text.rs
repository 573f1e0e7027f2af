//! Plain-text helpers for body excerpts.

/// Strips markup from an HTML body.
///
/// Conversion is `mail-parser`'s; its output is collapsed to single spaces.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    collapse_whitespace(&mail_parser::decoders::html::html_to_text(html))
}

/// Collapses runs of whitespace to a single space and trims the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max_chars` characters of `text` with whitespace collapsed.
///
/// Returns `None` when `max_chars` is zero or nothing readable remains.
/// A truncated excerpt ends with an ellipsis.
#[must_use]
pub fn excerpt(text: &str, max_chars: usize) -> Option<String> {
    if max_chars == 0 {
        return None;
    }
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return None;
    }
    if collapsed.chars().count() <= max_chars {
        return Some(collapsed);
    }
    let mut cut: String = collapsed.chars().take(max_chars).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    Some(cut)
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
    fn strips_tags_and_entities() {
        let text = html_to_text("<html><body><p>Fish &amp; chips</p><p>&lt;today&gt;</p></body></html>");
        assert!(text.contains("Fish & chips"), "{text}");
        assert!(text.contains("<today>"), "{text}");
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn breaks_become_single_spaces() {
        let text = html_to_text("one<br>\n\n  two");
        assert_eq!(text, "one two");
    }

    #[test]
    fn excerpt_limits() {
        assert_eq!(excerpt("hello", 0), None);
        assert_eq!(excerpt("  \r\n ", 10), None);
        assert_eq!(excerpt("short\r\ntext", 20).as_deref(), Some("short text"));
        assert_eq!(excerpt("one two three", 8).as_deref(), Some("one two…"));
        assert_eq!(excerpt("Привет мир", 6).as_deref(), Some("Привет…"));
    }
}
