//! Chat text for check results.

use chrono::FixedOffset;

use crate::cache::Reference;
use crate::pipeline::MessageSummary;
use crate::sink::Button;

/// Longest text a single chat message may carry, in characters.
pub const MESSAGE_LIMIT: usize = 4096;

/// Sender placeholder.
pub const UNKNOWN_SENDER: &str = "unknown sender";
/// Subject placeholder.
pub const NO_SUBJECT: &str = "(no subject)";
/// Date placeholder.
pub const UNKNOWN_DATE: &str = "unknown date";
/// Reply when the search found nothing.
pub const NO_NEW_MESSAGES: &str = "No new messages.";
/// Action token of the "Check mail" button.
pub const CHECK_ACTION: &str = "check";

/// One outgoing chat message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chunk {
    /// Message text, at most [`MESSAGE_LIMIT`] characters.
    pub text: String,
    /// Delete buttons for the summaries in this chunk.
    pub buttons: Vec<Button>,
}

/// A message together with the reference it was given.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    /// Assigned reference.
    pub reference: &'a Reference,
    /// Parsed message.
    pub summary: &'a MessageSummary,
}

/// Formats one summary. Missing fields render as placeholders.
#[must_use]
pub fn render_summary(reference: &Reference, summary: &MessageSummary, offset: FixedOffset) -> String {
    let from = summary.from.as_deref().unwrap_or(UNKNOWN_SENDER);
    let subject = summary.subject.as_deref().unwrap_or(NO_SUBJECT);
    let date = summary.date.map_or_else(
        || UNKNOWN_DATE.to_string(),
        |date| date.with_timezone(&offset).format("%d.%m.%Y %H:%M").to_string(),
    );

    let mut text = format!("#{reference}\nFrom: {from}\nSubject: {subject}\nDate: {date}");
    if let Some(excerpt) = &summary.excerpt {
        text.push('\n');
        text.push_str(excerpt);
    }
    text
}

/// Status line for a non-empty result.
#[must_use]
pub fn headline(shown: usize, remaining: usize) -> String {
    let noun = if shown == 1 { "message" } else { "messages" };
    if remaining == 0 {
        format!("{shown} new {noun}:")
    } else {
        format!("{shown} new {noun} shown, {remaining} more waiting:")
    }
}

/// Splits the rendered summaries into chat-sized chunks at summary
/// boundaries.
///
/// Each summary gets a "Delete #N" button in the chunk that contains it; the
/// last chunk also offers "Check again". A single summary longer than the
/// limit is cut.
#[must_use]
pub fn render_batch(entries: &[Entry<'_>], failures: usize, offset: FixedOffset) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Chunk::default();

    for entry in entries {
        let block = truncate_chars(
            &render_summary(entry.reference, entry.summary, offset),
            MESSAGE_LIMIT,
        );
        push_block(&mut chunks, &mut current, &block);
        if let Some(action) = entry.reference.action_token() {
            current
                .buttons
                .push(Button::new(format!("Delete #{}", entry.reference), action));
        }
    }
    if failures > 0 {
        push_block(&mut chunks, &mut current, &failure_note(failures));
    }

    if !current.text.is_empty() {
        current.buttons.push(Button::new("Check again", CHECK_ACTION));
        chunks.push(current);
    }
    chunks
}

/// Note about messages that were skipped.
#[must_use]
pub fn failure_note(failures: usize) -> String {
    format!("{failures} message(s) could not be read.")
}

fn push_block(chunks: &mut Vec<Chunk>, current: &mut Chunk, block: &str) {
    let separator = if current.text.is_empty() { 0 } else { 2 };
    if char_len(&current.text) + separator + char_len(block) > MESSAGE_LIMIT {
        chunks.push(std::mem::take(current));
    }
    if !current.text.is_empty() {
        current.text.push_str("\n\n");
    }
    current.text.push_str(block);
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn truncate_chars(s: &str, max: usize) -> String {
    if char_len(s) <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
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
    use chrono::DateTime;
    use mailbridge_imap::{SeqNum, Uid};

    use super::*;

    fn msk() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn summary(n: u32) -> MessageSummary {
        MessageSummary {
            seq: SeqNum::new(n).unwrap(),
            uid: Uid::new(100 + n).unwrap(),
            from: Some(format!("Sender {n} <s{n}@example.com>")),
            subject: Some(format!("Subject {n}")),
            date: Some(DateTime::parse_from_rfc2822("Mon, 14 Oct 2024 07:00:00 +0000").unwrap()),
            excerpt: None,
        }
    }

    fn reference(key: &str) -> Reference {
        Reference {
            generation: Some(5),
            key: key.to_string(),
        }
    }

    #[test]
    fn summary_in_display_timezone() {
        let text = render_summary(&reference("1"), &summary(1), msk());
        assert_eq!(
            text,
            "#1\nFrom: Sender 1 <s1@example.com>\nSubject: Subject 1\nDate: 14.10.2024 10:00"
        );
    }

    #[test]
    fn placeholders() {
        let bare = MessageSummary {
            from: None,
            subject: None,
            date: None,
            ..summary(1)
        };
        let text = render_summary(&reference("1"), &bare, msk());
        assert!(text.contains(UNKNOWN_SENDER));
        assert!(text.contains(NO_SUBJECT));
        assert!(text.contains(UNKNOWN_DATE));
    }

    #[test]
    fn excerpt_appended() {
        let with_body = MessageSummary {
            excerpt: Some("Numbers are up".to_string()),
            ..summary(2)
        };
        let text = render_summary(&reference("2"), &with_body, msk());
        assert!(text.ends_with("\nNumbers are up"));
    }

    #[test]
    fn batch_with_buttons_and_notes() {
        let refs = [reference("1"), reference("2")];
        let summaries = [summary(1), summary(2)];
        let entries: Vec<_> = refs
            .iter()
            .zip(&summaries)
            .map(|(reference, summary)| Entry { reference, summary })
            .collect();

        let chunks = render_batch(&entries, 1, msk());
        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert!(chunk.text.starts_with("#1\n"));
        assert!(chunk.text.contains("\n\n#2\n"));
        assert!(chunk.text.ends_with("1 message(s) could not be read."));
        assert_eq!(
            chunk.buttons,
            vec![
                Button::new("Delete #1", "del:5:1"),
                Button::new("Delete #2", "del:5:2"),
                Button::new("Check again", CHECK_ACTION),
            ]
        );
    }

    #[test]
    fn long_batches_split_at_summary_boundaries() {
        let refs: Vec<_> = (1..=40).map(|n| reference(&n.to_string())).collect();
        let summaries: Vec<_> = (1..=40)
            .map(|n| MessageSummary {
                excerpt: Some("x".repeat(200)),
                ..summary(n)
            })
            .collect();
        let entries: Vec<_> = refs
            .iter()
            .zip(&summaries)
            .map(|(reference, summary)| Entry { reference, summary })
            .collect();

        let chunks = render_batch(&entries, 0, msk());
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= MESSAGE_LIMIT);
            assert!(chunk.text.starts_with('#'));
        }
        let deletes = chunks
            .iter()
            .flat_map(|c| &c.buttons)
            .filter(|b| b.action.starts_with("del:"))
            .count();
        assert_eq!(deletes, 40);
        assert_eq!(chunks.last().unwrap().buttons.last().unwrap().action, CHECK_ACTION);
    }

    #[test]
    fn oversized_summary_is_cut() {
        let huge = MessageSummary {
            subject: Some("s".repeat(10_000)),
            ..summary(1)
        };
        let refs = [reference("1")];
        let entries = [Entry {
            reference: &refs[0],
            summary: &huge,
        }];
        let chunks = render_batch(&entries, 0, msk());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), MESSAGE_LIMIT);
        assert!(chunks[0].text.ends_with('…'));
    }

    #[test]
    fn only_failures() {
        let chunks = render_batch(&[], 2, msk());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "2 message(s) could not be read.");
    }

    #[test]
    fn headline_grammar() {
        assert_eq!(headline(1, 0), "1 new message:");
        assert_eq!(headline(2, 0), "2 new messages:");
        assert_eq!(headline(20, 5), "20 new messages shown, 5 more waiting:");
    }
}
