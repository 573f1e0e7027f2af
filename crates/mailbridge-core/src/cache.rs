//! Short references for delete actions.
//!
//! Each check starts a [`Batch`] that numbers its messages `1..=n`. The batch
//! becomes visible only when [`ReferenceCache::commit`] is called after the
//! summaries have been delivered, replacing whatever the chat had before.
//! Every batch carries a generation; action tokens embed it, so a button
//! from an older check can never resolve to a message of a newer one.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use mailbridge_imap::Uid;
use tracing::debug;

use crate::sink::ChatId;

const DELETE_PREFIX: &str = "del:";

/// A reference as presented by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Batch generation; `None` for a typed `/delete N`, which means the
    /// current batch.
    pub generation: Option<u64>,
    /// Position label within the batch.
    pub key: String,
}

impl Reference {
    /// Reference into the current batch.
    #[must_use]
    pub fn current(key: impl Into<String>) -> Self {
        Self {
            generation: None,
            key: key.into(),
        }
    }

    /// Parses a `del:<generation>:<key>` action token.
    #[must_use]
    pub fn from_action(token: &str) -> Option<Self> {
        let (generation, key) = token.strip_prefix(DELETE_PREFIX)?.split_once(':')?;
        let generation = generation.parse().ok()?;
        (!key.is_empty()).then(|| Self {
            generation: Some(generation),
            key: key.to_string(),
        })
    }

    /// The `del:<generation>:<key>` token, for generation-bound references.
    #[must_use]
    pub fn action_token(&self) -> Option<String> {
        self.generation
            .map(|generation| format!("{DELETE_PREFIX}{generation}:{}", self.key))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// References being assigned during one check.
#[derive(Debug)]
pub struct Batch {
    chat: ChatId,
    generation: u64,
    entries: Vec<(String, Uid)>,
}

impl Batch {
    /// Assigns the next reference to `uid`.
    pub fn push(&mut self, uid: Uid) -> Reference {
        let key = (self.entries.len() + 1).to_string();
        self.entries.push((key.clone(), uid));
        Reference {
            generation: Some(self.generation),
            key,
        }
    }

    /// Generation of this batch.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of references assigned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing was assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct ChatEntries {
    generation: u64,
    refs: HashMap<String, Uid>,
}

/// Process-lifetime map from reference to UID, per chat.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    chats: Mutex<HashMap<ChatId, ChatEntries>>,
    next_generation: AtomicU64,
}

impl ReferenceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a batch with a fresh generation.
    #[must_use]
    pub fn begin(&self, chat: ChatId) -> Batch {
        Batch {
            chat,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed) + 1,
            entries: Vec::new(),
        }
    }

    /// Publishes a batch, replacing the chat's previous references.
    pub fn commit(&self, batch: Batch) {
        debug!(chat = %batch.chat, generation = batch.generation, refs = batch.len(), "references published");
        let entries = ChatEntries {
            generation: batch.generation,
            refs: batch.entries.into_iter().collect(),
        };
        self.lock().insert(batch.chat, entries);
    }

    /// Associates `uid` with `key` in the chat's current batch.
    ///
    /// Creates the batch if the chat has none. Existing keys are left
    /// untouched.
    pub fn put(&self, chat: ChatId, key: impl Into<String>, uid: Uid) {
        let mut chats = self.lock();
        let entries = chats.entry(chat).or_insert_with(|| ChatEntries {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed) + 1,
            refs: HashMap::new(),
        });
        entries.refs.entry(key.into()).or_insert(uid);
    }

    /// Resolves a reference; `None` when unknown or from an older batch.
    #[must_use]
    pub fn get(&self, chat: ChatId, reference: &Reference) -> Option<Uid> {
        let chats = self.lock();
        let entries = chats.get(&chat)?;
        if reference.generation.is_some_and(|g| g != entries.generation) {
            return None;
        }
        entries.refs.get(&reference.key).copied()
    }

    /// Drops a reference after its message is gone.
    pub fn remove(&self, chat: ChatId, reference: &Reference) -> Option<Uid> {
        let mut chats = self.lock();
        let entries = chats.get_mut(&chat)?;
        if reference.generation.is_some_and(|g| g != entries.generation) {
            return None;
        }
        entries.refs.remove(&reference.key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, ChatEntries>> {
        self.chats.lock().unwrap_or_else(PoisonError::into_inner)
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

    const CHAT: ChatId = ChatId(42);

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn batch_numbers_from_one() {
        let cache = ReferenceCache::new();
        let mut batch = cache.begin(CHAT);
        let first = batch.push(uid(101));
        let second = batch.push(uid(205));
        assert_eq!(first.key, "1");
        assert_eq!(second.key, "2");
        cache.commit(batch);

        assert_eq!(cache.get(CHAT, &first), Some(uid(101)));
        assert_eq!(cache.get(CHAT, &Reference::current("2")), Some(uid(205)));
    }

    #[test]
    fn uncommitted_batch_is_invisible() {
        let cache = ReferenceCache::new();
        let mut batch = cache.begin(CHAT);
        let reference = batch.push(uid(7));
        assert_eq!(cache.get(CHAT, &reference), None);
    }

    #[test]
    fn older_generation_is_stale() {
        let cache = ReferenceCache::new();
        let mut old = cache.begin(CHAT);
        let old_ref = old.push(uid(101));
        cache.commit(old);

        let mut new = cache.begin(CHAT);
        new.push(uid(300));
        cache.commit(new);

        assert_eq!(cache.get(CHAT, &old_ref), None);
        assert_eq!(cache.get(CHAT, &Reference::current("1")), Some(uid(300)));
    }

    #[test]
    fn remove_once() {
        let cache = ReferenceCache::new();
        let mut batch = cache.begin(CHAT);
        let one = batch.push(uid(101));
        let two = batch.push(uid(205));
        cache.commit(batch);

        assert_eq!(cache.remove(CHAT, &two), Some(uid(205)));
        assert_eq!(cache.remove(CHAT, &two), None);
        assert_eq!(cache.get(CHAT, &one), Some(uid(101)));
    }

    #[test]
    fn chats_are_independent() {
        let cache = ReferenceCache::new();
        cache.put(ChatId(1), "1", uid(10));
        cache.put(ChatId(2), "1", uid(20));
        cache.put(ChatId(1), "1", uid(99));
        assert_eq!(cache.get(ChatId(1), &Reference::current("1")), Some(uid(10)));
        assert_eq!(cache.get(ChatId(2), &Reference::current("1")), Some(uid(20)));
        assert_eq!(cache.get(ChatId(3), &Reference::current("1")), None);
    }

    #[test]
    fn action_tokens() {
        let reference = Reference::from_action("del:17:3").unwrap();
        assert_eq!(reference.generation, Some(17));
        assert_eq!(reference.key, "3");
        assert_eq!(reference.action_token().as_deref(), Some("del:17:3"));

        assert!(Reference::from_action("del:x:3").is_none());
        assert!(Reference::from_action("del:1:").is_none());
        assert!(Reference::from_action("check").is_none());
        assert!(Reference::current("3").action_token().is_none());
    }
}
