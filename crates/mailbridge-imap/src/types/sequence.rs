//! Sequence sets.

use super::{SeqNum, Uid};

/// A set of message numbers, kept as sorted, non-overlapping inclusive ranges.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequenceSet {
    ranges: Vec<(u32, u32)>,
}

impl SequenceSet {
    /// Builds a set from arbitrary numbers, merging runs into ranges.
    /// Zero is not a valid message number and is dropped.
    #[must_use]
    pub fn from_numbers(numbers: impl IntoIterator<Item = u32>) -> Self {
        let mut sorted: Vec<u32> = numbers.into_iter().filter(|&n| n != 0).collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for n in sorted {
            match ranges.last_mut() {
                Some((_, end)) if end.checked_add(1) == Some(n) => *end = n,
                _ => ranges.push((n, n)),
            }
        }
        Self { ranges }
    }

    /// A set holding a single sequence number.
    #[must_use]
    pub fn single(seq: SeqNum) -> Self {
        Self::from_numbers([seq.get()])
    }

    /// Builds a set from sequence numbers.
    #[must_use]
    pub fn from_seqs<'a>(seqs: impl IntoIterator<Item = &'a SeqNum>) -> Self {
        Self::from_numbers(seqs.into_iter().map(|s| s.get()))
    }

    /// Returns true if the set contains no numbers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl std::fmt::Display for SequenceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}:{end}")?;
            }
        }
        Ok(())
    }
}

/// A set of UIDs, for the `UID` command family.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UidSet(SequenceSet);

impl UidSet {
    /// A set holding one UID.
    #[must_use]
    pub fn single(uid: Uid) -> Self {
        Self(SequenceSet::from_numbers([uid.get()]))
    }

    /// Builds a set from UIDs.
    #[must_use]
    pub fn from_uids<'a>(uids: impl IntoIterator<Item = &'a Uid>) -> Self {
        Self(SequenceSet::from_numbers(uids.into_iter().map(|u| u.get())))
    }

    /// Returns true if the set contains no UIDs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
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
    fn runs_collapse_into_ranges() {
        let set = SequenceSet::from_numbers([5, 1, 2, 3, 9, 10, 2]);
        assert_eq!(set.to_string(), "1:3,5,9:10");
    }

    #[test]
    fn zero_is_dropped() {
        let set = SequenceSet::from_numbers([0]);
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "");
    }

    #[test]
    fn max_value_does_not_overflow() {
        let set = SequenceSet::from_numbers([u32::MAX - 1, u32::MAX]);
        assert_eq!(set.to_string(), format!("{}:{}", u32::MAX - 1, u32::MAX));
    }

    #[test]
    fn uid_set_single() {
        let set = UidSet::single(Uid::new(205).unwrap());
        assert_eq!(set.to_string(), "205");
    }

    #[test]
    fn uid_set_from_uids() {
        let uids = [Uid::new(101).unwrap(), Uid::new(205).unwrap()];
        assert_eq!(UidSet::from_uids(&uids).to_string(), "101,205");
    }
}
