//! Core type definitions for the Paxos protocol
//!
//! These types are shared between the async runtime and the model checker.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// BALLOT
// =============================================================================

/// Ballot number identifying one proposal attempt.
///
/// Ballots are totally ordered. "No ballot seen yet" is modelled as
/// `Option::<Ballot>::None`, which sorts below every ballot, so ballot `0` is
/// a valid first ballot.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
pub struct Ballot(pub u64);

impl Ballot {
    /// The next ballot after this one, if there is one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for Ballot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Ballot {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

// =============================================================================
// CORE MESSAGE TYPES
// =============================================================================

/// A (ballot, value) pair an acceptor has accepted.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Accepted<V> {
    pub ballot: Ballot,
    pub value: V,
}

/// Phase 1b: an acceptor's answer to `Prepare`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Promise<V> {
    /// The acceptor promised the ballot.
    ///
    /// `prior` is the highest ballot the acceptor has accepted so far, with its
    /// value. `None` means it has never accepted anything.
    Granted { prior: Option<Accepted<V>> },
    /// The acceptor had already seen `promised`, which is at least as high.
    Rejected { promised: Ballot },
}

impl<V> Promise<V> {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Phase 2b: an acceptor's answer to `Accept`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Ack {
    Granted,
    /// A higher ballot (`promised`) superseded the one being accepted.
    Rejected { promised: Ballot },
}

impl Ack {
    #[must_use]
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// One protocol message. Exactly one variant per message.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Message<V> {
    /// Phase 1a
    Prepare { ballot: Ballot },
    /// Phase 1b
    Promise(Promise<V>),
    /// Phase 2a
    Accept { ballot: Ballot, value: V },
    /// Phase 2b
    Ack(Ack),
}

impl<V> Message<V> {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Prepare { .. } => MessageKind::Prepare,
            Self::Promise(_) => MessageKind::Promise,
            Self::Accept { .. } => MessageKind::Accept,
            Self::Ack(_) => MessageKind::Ack,
        }
    }
}

/// Message tag as carried on the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum MessageKind {
    Prepare,
    Promise,
    Accept,
    Ack,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Prepare => "Prepare",
            Self::Promise => "Promise",
            Self::Accept => "Accept",
            Self::Ack => "Ack",
        };
        f.write_str(s)
    }
}

/// A message of the wrong kind for where it arrived, e.g. a `Promise` in
/// answer to an `Accept`, or a response sent to an acceptor as a request.
///
/// This points at a routing bug rather than a liveness problem, so it is kept
/// apart from quorum failures.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ProtocolViolation {
    pub expected: &'static [MessageKind],
    pub received: MessageKind,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol violation: expected ")?;
        for (i, kind) in self.expected.iter().enumerate() {
            if i > 0 {
                f.write_str(" or ")?;
            }
            write!(f, "{kind}")?;
        }
        write!(f, ", received {}", self.received)
    }
}

impl std::error::Error for ProtocolViolation {}

// =============================================================================
// OUTCOME
// =============================================================================

/// Why an attempt ended without consensus.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FailureReason {
    PrepareQuorumNotReached,
    AcceptQuorumNotReached,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrepareQuorumNotReached => f.write_str("prepare-quorum-not-reached"),
            Self::AcceptQuorumNotReached => f.write_str("accept-quorum-not-reached"),
        }
    }
}

/// Result of one consensus attempt.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Outcome<V> {
    /// `value` was acked by a quorum under `ballot`.
    Decided { ballot: Ballot, value: V },
    Failed(FailureReason),
}

impl<V> Outcome<V> {
    #[must_use]
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Decided { .. })
    }
}

impl<V: fmt::Display> fmt::Display for Outcome<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decided { ballot, value } => write!(f, "Decided(ballot={ballot}, value={value})"),
            Self::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}
