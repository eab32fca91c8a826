//! Pure quorum tracking - counts per-acceptor votes and detects quorum

use std::collections::BTreeSet;

/// Majority rule for a fixed number of acceptors.
///
/// A quorum is strictly more than half of `num_acceptors`: 3 of 5, 3 of 4,
/// 1 of 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Quorum {
    num_acceptors: usize,
}

impl Quorum {
    #[must_use]
    pub fn new(num_acceptors: usize) -> Self {
        Self { num_acceptors }
    }

    #[must_use]
    pub fn num_acceptors(&self) -> usize {
        self.num_acceptors
    }

    /// Smallest count that is a quorum.
    #[must_use]
    pub fn threshold(&self) -> usize {
        self.num_acceptors / 2 + 1
    }

    #[must_use]
    pub fn is_reached(&self, count: usize) -> bool {
        count > self.num_acceptors / 2
    }
}

/// Vote counts for one phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Tally {
    pub granted: usize,
    pub rejected: usize,
    /// Timed out, unreachable, or answered with something unusable
    pub unresponsive: usize,
}

/// Where a phase stands after the latest vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum QuorumStatus {
    /// More votes may still change the result
    Pending,
    Reached,
    /// Even if every outstanding acceptor grants, there is no quorum
    Unreachable,
}

/// Per-phase vote tracker.
///
/// Each acceptor counts at most once: as granting, rejecting, or
/// non-responsive. Non-responsive acceptors are excluded from the count, they
/// are not rejections.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct QuorumCore<I: Ord> {
    quorum: Quorum,
    granted: BTreeSet<I>,
    rejected: BTreeSet<I>,
    silent: BTreeSet<I>,
}

impl<I: Ord> QuorumCore<I> {
    #[must_use]
    pub(crate) fn new(num_acceptors: usize) -> Self {
        Self {
            quorum: Quorum::new(num_acceptors),
            granted: BTreeSet::new(),
            rejected: BTreeSet::new(),
            silent: BTreeSet::new(),
        }
    }

    fn has_voted(&self, id: &I) -> bool {
        self.granted.contains(id) || self.rejected.contains(id) || self.silent.contains(id)
    }

    /// Record a decisive answer. Duplicate answers from one acceptor are ignored.
    pub(crate) fn record(&mut self, id: I, granted: bool) -> QuorumStatus {
        if !self.has_voted(&id) {
            if granted {
                self.granted.insert(id);
            } else {
                self.rejected.insert(id);
            }
        }
        self.status()
    }

    /// Exclude an acceptor that did not answer (or answered invalidly).
    pub(crate) fn mark_silent(&mut self, id: I) -> QuorumStatus {
        if !self.has_voted(&id) {
            self.silent.insert(id);
        }
        self.status()
    }

    pub(crate) fn granted(&self) -> usize {
        self.granted.len()
    }

    pub(crate) fn rejected(&self) -> usize {
        self.rejected.len()
    }

    pub(crate) fn silent(&self) -> usize {
        self.silent.len()
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.quorum
            .num_acceptors()
            .saturating_sub(self.granted() + self.rejected() + self.silent())
    }

    /// Counts so far. With `expired`, acceptors that never answered are
    /// counted as unresponsive.
    pub(crate) fn tally(&self, expired: bool) -> Tally {
        let pending = if expired { self.outstanding() } else { 0 };
        Tally {
            granted: self.granted(),
            rejected: self.rejected(),
            unresponsive: self.silent() + pending,
        }
    }

    pub(crate) fn status(&self) -> QuorumStatus {
        if self.quorum.is_reached(self.granted()) {
            QuorumStatus::Reached
        } else if !self.quorum.is_reached(self.granted() + self.outstanding()) {
            QuorumStatus::Unreachable
        } else {
            QuorumStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict_majority() {
        assert_eq!(Quorum::new(1).threshold(), 1);
        assert_eq!(Quorum::new(3).threshold(), 2);
        assert_eq!(Quorum::new(4).threshold(), 3);
        assert_eq!(Quorum::new(5).threshold(), 3);

        assert!(!Quorum::new(4).is_reached(2));
        assert!(Quorum::new(4).is_reached(3));
        assert!(!Quorum::new(5).is_reached(2));
        assert!(Quorum::new(5).is_reached(3));
    }

    #[test]
    fn test_reached_after_majority_grants() {
        let mut q = QuorumCore::new(5);
        assert_eq!(q.record(0, true), QuorumStatus::Pending);
        assert_eq!(q.record(1, false), QuorumStatus::Pending);
        assert_eq!(q.record(2, true), QuorumStatus::Pending);
        assert_eq!(q.record(3, true), QuorumStatus::Reached);
    }

    #[test]
    fn test_unreachable_once_majority_lost() {
        let mut q = QuorumCore::new(5);
        q.record(0, true);
        q.mark_silent(1);
        assert_eq!(q.record(2, false), QuorumStatus::Pending);
        assert_eq!(q.mark_silent(3), QuorumStatus::Unreachable);
    }

    #[test]
    fn test_duplicate_votes_ignored() {
        let mut q = QuorumCore::new(3);
        q.record(0, true);
        q.record(0, true);
        q.mark_silent(0);
        assert_eq!(q.granted(), 1);
        assert_eq!(q.silent(), 0);
        assert_eq!(q.outstanding(), 2);
    }

    #[test]
    fn test_even_cluster_needs_more_than_half() {
        let mut q = QuorumCore::new(4);
        q.record(0, true);
        q.record(1, true);
        q.mark_silent(2);
        assert_eq!(q.status(), QuorumStatus::Pending);
        assert_eq!(q.mark_silent(3), QuorumStatus::Unreachable);
    }
}
