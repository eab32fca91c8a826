//! Pure acceptor state machine - no I/O, no async, no synchronization
//!
//! This module contains the core state transition logic for a Paxos acceptor.

use super::types::{Accepted, Ack, Ballot, Message, MessageKind, Promise, ProtocolViolation};

/// Pure acceptor state - no I/O, no async, no synchronization
///
/// Tracks a single "highest ballot seen" used by both `Prepare` and `Accept`
/// handling, and the accepted (ballot, value) pair.
///
/// Invariant: when `accepted` is set, `accepted.ballot <= highest_seen`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AcceptorCore<V> {
    /// Highest ballot promised or accepted. `None` sorts below every ballot.
    pub(crate) highest_seen: Option<Ballot>,
    /// Accepted (ballot, value); set only by a successful `Accept`
    pub(crate) accepted: Option<Accepted<V>>,
}

impl<V> Default for AcceptorCore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> AcceptorCore<V> {
    /// Create a new empty acceptor state
    #[must_use]
    pub fn new() -> Self {
        Self {
            highest_seen: None,
            accepted: None,
        }
    }

    #[must_use]
    pub fn highest_seen(&self) -> Option<Ballot> {
        self.highest_seen
    }

    #[must_use]
    pub fn accepted(&self) -> Option<&Accepted<V>> {
        self.accepted.as_ref()
    }
}

impl<V: Clone> AcceptorCore<V> {
    /// Handle a Prepare request - pure state transition
    ///
    /// A prepare succeeds only if `ballot` is strictly higher than anything
    /// seen so far. On success the promise reports the accepted pair, if any.
    /// Accepted state is never modified here.
    pub fn prepare(&mut self, ballot: Ballot) -> Promise<V> {
        match self.highest_seen {
            Some(seen) if ballot <= seen => Promise::Rejected { promised: seen },
            _ => {
                self.highest_seen = Some(ballot);
                Promise::Granted {
                    prior: self.accepted.clone(),
                }
            }
        }
    }

    /// Handle an Accept request - pure state transition
    ///
    /// An accept succeeds unless a higher ballot has been seen since. Unlike
    /// `prepare`, an equal ballot is fine: that is the proposer we promised.
    pub fn accept(&mut self, ballot: Ballot, value: V) -> Ack {
        match self.highest_seen {
            Some(seen) if ballot < seen => Ack::Rejected { promised: seen },
            _ => {
                self.highest_seen = Some(ballot);
                self.accepted = Some(Accepted { ballot, value });
                Ack::Granted
            }
        }
    }

    /// Handle a request and produce a response.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolViolation`] if `request` is a response kind; the
    /// state is left untouched in that case.
    pub fn handle_request(&mut self, request: Message<V>) -> Result<Message<V>, ProtocolViolation> {
        match request {
            Message::Prepare { ballot } => Ok(Message::Promise(self.prepare(ballot))),
            Message::Accept { ballot, value } => Ok(Message::Ack(self.accept(ballot, value))),
            other => Err(ProtocolViolation {
                expected: &[MessageKind::Prepare, MessageKind::Accept],
                received: other.kind(),
            }),
        }
    }
}
