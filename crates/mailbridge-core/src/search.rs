//! Unread search.

use mailbridge_imap::{SearchKey, SeqNum};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::session::MailSession;

/// Which messages a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchPredicate {
    /// Only messages without `\Seen`.
    pub unseen: bool,
    /// Skip messages flagged `\Deleted`.
    pub exclude_deleted: bool,
}

impl SearchPredicate {
    /// `UNSEEN`, optionally `UNDELETED`.
    #[must_use]
    pub const fn unread(exclude_deleted: bool) -> Self {
        Self {
            unseen: true,
            exclude_deleted,
        }
    }

    fn keys(self) -> Vec<SearchKey> {
        let mut keys = Vec::with_capacity(2);
        if self.unseen {
            keys.push(SearchKey::Unseen);
        }
        if self.exclude_deleted {
            keys.push(SearchKey::Undeleted);
        }
        if keys.is_empty() {
            keys.push(SearchKey::All);
        }
        keys
    }
}

/// Runs SEARCH in the selected folder.
///
/// Returns sequence numbers ascending; an empty result is valid.
///
/// # Errors
///
/// [`BridgeError::Search`] when no folder is selected or the server fails
/// the command. The caller still closes the session.
pub async fn search<S>(session: &mut MailSession<S>, predicate: SearchPredicate) -> Result<Vec<SeqNum>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let Some(client) = session.selected_mut() else {
        return Err(session.fail(BridgeError::Search("no folder selected".to_string())));
    };

    match client.search(&predicate.keys()).await {
        Ok(mut ids) => {
            ids.sort_unstable();
            ids.dedup();
            debug!(count = ids.len(), ?predicate, "search complete");
            Ok(ids)
        }
        Err(e) => Err(session.fail(BridgeError::Search(e.to_string()))),
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
    fn predicate_keys() {
        assert_eq!(
            SearchPredicate::unread(true).keys(),
            vec![SearchKey::Unseen, SearchKey::Undeleted]
        );
        assert_eq!(SearchPredicate::unread(false).keys(), vec![SearchKey::Unseen]);
        let all = SearchPredicate {
            unseen: false,
            exclude_deleted: false,
        };
        assert_eq!(all.keys(), vec![SearchKey::All]);
    }
}
