//! Message and command identifiers.

use std::num::NonZeroU32;

/// Command tag correlating a request with its tagged completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Wraps a raw value, rejecting zero.
            #[must_use]
            pub fn new(n: u32) -> Option<Self> {
                NonZeroU32::new(n).map(Self)
            }

            /// Returns the raw value.
            #[must_use]
            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonzero_id!(
    /// Message sequence number.
    ///
    /// Positional and transient: numbers shift when messages are expunged,
    /// so they are only meaningful inside the session that produced them.
    SeqNum
);

nonzero_id!(
    /// Durable message identifier within one `UIDVALIDITY` epoch.
    Uid
);

nonzero_id!(
    /// `UIDVALIDITY` of a mailbox. A change invalidates every known UID.
    UidValidity
);

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
    fn zero_is_rejected() {
        assert!(SeqNum::new(0).is_none());
        assert!(Uid::new(0).is_none());
        assert!(UidValidity::new(0).is_none());
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(Uid::new(205).unwrap().to_string(), "205");
        assert_eq!(SeqNum::new(3).unwrap().to_string(), "3");
        assert_eq!(Tag::new("A0007").to_string(), "A0007");
    }

    #[test]
    fn ordering_follows_value() {
        assert!(Uid::new(101).unwrap() < Uid::new(205).unwrap());
        assert_eq!(UidValidity::new(1700000000).unwrap().get(), 1700000000);
    }
}
