//! Fetch and parse pipeline.
//!
//! FETCH data for one message may arrive split over several untagged
//! responses. Items are accumulated per sequence number; once a message has
//! both its UID and its body, a parse task is spawned. The FETCH command
//! and the parse tasks overlap, and every task is joined before the
//! pipeline returns.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use mailbridge_imap::{FetchAttribute, FetchItem, SeqNum, SequenceSet, Uid};
use mailbridge_mime::Summary;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::session::MailSession;

/// One unread message, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// Sequence number at fetch time.
    pub seq: SeqNum,
    /// Durable identifier.
    pub uid: Uid,
    /// Sender display text.
    pub from: Option<String>,
    /// Decoded subject.
    pub subject: Option<String>,
    /// Date header.
    pub date: Option<DateTime<FixedOffset>>,
    /// Body excerpt.
    pub excerpt: Option<String>,
}

impl MessageSummary {
    fn new(seq: SeqNum, uid: Uid, summary: Summary) -> Self {
        Self {
            seq,
            uid,
            from: summary.from,
            subject: summary.subject,
            date: summary.date,
            excerpt: summary.excerpt,
        }
    }
}

/// Pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    /// Use `BODY[]` so the server sets `\Seen`.
    pub mark_seen: bool,
    /// Excerpt length; zero disables.
    pub excerpt_chars: usize,
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Parsed messages in sequence order.
    pub summaries: Vec<MessageSummary>,
    /// Messages skipped because they could not be fetched or parsed.
    pub failures: usize,
}

#[derive(Default)]
struct Pending {
    uid: Option<Uid>,
    body: Option<Vec<u8>>,
    dispatched: bool,
}

type ParseResult = (SeqNum, Uid, mailbridge_mime::Result<Summary>);

/// Fetches `ids` from the selected folder and parses them concurrently.
///
/// # Errors
///
/// [`BridgeError::Fetch`] when the FETCH command itself fails. Per-message
/// parse failures are counted in [`FetchOutcome::failures`] instead.
pub async fn fetch_summaries<S>(
    session: &mut MailSession<S>,
    ids: &[SeqNum],
    options: FetchOptions,
) -> Result<FetchOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    if ids.is_empty() {
        return Ok(FetchOutcome::default());
    }
    let Some(client) = session.selected_mut() else {
        return Err(session.fail(BridgeError::Fetch("no folder selected".to_string())));
    };

    let attributes = [
        FetchAttribute::Uid,
        FetchAttribute::Body {
            peek: !options.mark_seen,
        },
    ];
    let excerpt_chars = options.excerpt_chars;
    let mut pending: HashMap<SeqNum, Pending> = HashMap::with_capacity(ids.len());
    let mut tasks: JoinSet<ParseResult> = JoinSet::new();

    let fetched = client
        .fetch_each(&SequenceSet::from_seqs(ids), &attributes, |seq, items| {
            let entry = pending.entry(seq).or_default();
            for item in items {
                match item {
                    FetchItem::Uid(uid) => entry.uid = Some(uid),
                    FetchItem::Body {
                        section: None,
                        data: Some(data),
                        ..
                    } => entry.body = Some(data),
                    _ => {}
                }
            }
            if !entry.dispatched
                && let Some(uid) = entry.uid
                && let Some(body) = entry.body.take()
            {
                entry.dispatched = true;
                debug!(%seq, %uid, bytes = body.len(), "dispatching parse");
                tasks.spawn(async move { (seq, uid, Summary::parse(&body, excerpt_chars)) });
            }
        })
        .await;

    if let Err(e) = fetched {
        tasks.shutdown().await;
        return Err(session.fail(BridgeError::Fetch(e.to_string())));
    }

    let mut failures = 0;
    for (seq, entry) in &pending {
        if !entry.dispatched && ids.contains(seq) {
            warn!(%seq, has_uid = entry.uid.is_some(), "incomplete FETCH data, skipping message");
            failures += 1;
        }
    }
    let missing = ids.iter().filter(|seq| !pending.contains_key(seq)).count();
    if missing > 0 {
        warn!(missing, "server returned no data for some messages");
        failures += missing;
    }

    let mut summaries = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((seq, uid, Ok(summary))) => summaries.push(MessageSummary::new(seq, uid, summary)),
            Ok((seq, uid, Err(e))) => {
                let err = BridgeError::Parse {
                    seq,
                    message: e.to_string(),
                };
                warn!(%uid, error = %err, "skipping unparseable message");
                failures += 1;
            }
            Err(e) => {
                warn!(error = %e, "parse task failed");
                failures += 1;
            }
        }
    }

    summaries.sort_by_key(|s| s.seq);
    debug!(parsed = summaries.len(), failures, "fetch pipeline complete");
    Ok(FetchOutcome {
        summaries,
        failures,
    })
}
