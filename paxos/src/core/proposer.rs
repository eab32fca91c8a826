//! Pure proposer state machine - no I/O, no async
//!
//! This module contains the core state transition logic for a Paxos proposer.

use super::quorum::{QuorumCore, QuorumStatus, Tally};
use super::types::{Accepted, Ack, Ballot, FailureReason, Outcome, Promise};

/// Pure proposer state - tracks phase and quorum for a single attempt
///
/// This holds the phase tracking logic shared between:
/// - The async runtime proposer
/// - The Stateright model checker
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProposerCore<I: Ord, V> {
    /// Ballot this attempt uses
    ballot: Ballot,
    /// Value proposed if no promise reports a prior acceptance
    initial_value: V,
    /// Current phase
    phase: ProposerPhase<I, V>,
    num_acceptors: usize,
    /// Counts from phase 1, once it has finished
    prepare_tally: Option<Tally>,
    /// Counts from phase 2, once it has finished
    accept_tally: Option<Tally>,
    /// Highest ballot reported by any rejection
    highest_rejection: Option<Ballot>,
}

/// Proposer phase
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ProposerPhase<I: Ord, V> {
    /// Collecting promises (Phase 1)
    Preparing {
        votes: QuorumCore<I>,
        /// Highest prior acceptance reported by a granted promise
        highest_prior: Option<Accepted<V>>,
    },
    /// Collecting acks (Phase 2)
    Accepting {
        /// The adopted value
        value: V,
        votes: QuorumCore<I>,
    },
    /// A quorum acked `value`
    Decided { value: V },
    Failed(FailureReason),
}

/// Result of processing a response during the Prepare phase
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreparePhaseResult<V> {
    /// Need more promises
    Pending,
    /// Got quorum - ready to accept with this value
    Quorum {
        /// The value to accept (may be adopted from a prior acceptance)
        value: V,
    },
    /// A quorum of promises can no longer be reached
    Failed,
}

/// Result of processing a response during the Accept phase
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcceptPhaseResult<V> {
    /// Need more acks
    Pending,
    /// Got quorum - value is chosen
    Decided { ballot: Ballot, value: V },
    /// A quorum of acks can no longer be reached
    Failed,
}

impl<I, V> ProposerCore<I, V>
where
    I: Ord,
    V: Clone,
{
    /// Create a new proposer core in the Preparing phase
    #[must_use]
    pub fn new(ballot: Ballot, initial_value: V, num_acceptors: usize) -> Self {
        Self {
            ballot,
            initial_value,
            phase: ProposerPhase::Preparing {
                votes: QuorumCore::new(num_acceptors),
                highest_prior: None,
            },
            num_acceptors,
            prepare_tally: None,
            accept_tally: None,
            highest_rejection: None,
        }
    }

    #[must_use]
    pub fn ballot(&self) -> Ballot {
        self.ballot
    }

    #[must_use]
    pub fn initial_value(&self) -> &V {
        &self.initial_value
    }

    /// The value adopted at the end of phase 1, if phase 1 succeeded.
    #[must_use]
    pub fn adopted_value(&self) -> Option<&V> {
        match &self.phase {
            ProposerPhase::Accepting { value, .. } | ProposerPhase::Decided { value } => {
                Some(value)
            }
            ProposerPhase::Preparing { .. } | ProposerPhase::Failed(_) => None,
        }
    }

    #[must_use]
    pub fn is_preparing(&self) -> bool {
        matches!(self.phase, ProposerPhase::Preparing { .. })
    }

    #[must_use]
    pub fn is_accepting(&self) -> bool {
        matches!(self.phase, ProposerPhase::Accepting { .. })
    }

    /// The final outcome, once the attempt is over.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<V>> {
        match &self.phase {
            ProposerPhase::Decided { value } => Some(Outcome::Decided {
                ballot: self.ballot,
                value: value.clone(),
            }),
            ProposerPhase::Failed(reason) => Some(Outcome::Failed(*reason)),
            ProposerPhase::Preparing { .. } | ProposerPhase::Accepting { .. } => None,
        }
    }

    #[must_use]
    pub fn prepare_tally(&self) -> Option<Tally> {
        self.prepare_tally
    }

    #[must_use]
    pub fn accept_tally(&self) -> Option<Tally> {
        self.accept_tally
    }

    /// Highest ballot any acceptor reported when rejecting this attempt.
    ///
    /// A retry must use a ballot above this to have a chance.
    #[must_use]
    pub fn highest_rejection(&self) -> Option<Ballot> {
        self.highest_rejection
    }

    /// Process a promise during the Prepare phase.
    ///
    /// Responses outside the Prepare phase are ignored.
    pub fn handle_promise(&mut self, acceptor_id: I, promise: Promise<V>) -> PreparePhaseResult<V> {
        let ProposerPhase::Preparing {
            votes,
            highest_prior,
        } = &mut self.phase
        else {
            return PreparePhaseResult::Pending;
        };

        match promise {
            Promise::Granted { prior } => {
                if let Some(prior) = prior
                    && highest_prior
                        .as_ref()
                        .is_none_or(|highest| prior.ballot > highest.ballot)
                {
                    *highest_prior = Some(prior);
                }
                votes.record(acceptor_id, true);
            }
            Promise::Rejected { promised } => {
                self.highest_rejection = self.highest_rejection.max(Some(promised));
                votes.record(acceptor_id, false);
            }
        }

        self.settle_prepare(false)
    }

    /// Exclude an acceptor from the Prepare quorum (no answer or unusable answer).
    pub fn prepare_unresponsive(&mut self, acceptor_id: I) -> PreparePhaseResult<V> {
        if let ProposerPhase::Preparing { votes, .. } = &mut self.phase {
            votes.mark_silent(acceptor_id);
        }
        self.settle_prepare(false)
    }

    /// The Prepare round's wait is over: everyone who has not answered is
    /// non-responsive.
    pub fn prepare_timed_out(&mut self) -> PreparePhaseResult<V> {
        self.settle_prepare(true)
    }

    fn settle_prepare(&mut self, expired: bool) -> PreparePhaseResult<V> {
        let ProposerPhase::Preparing {
            votes,
            highest_prior,
        } = &self.phase
        else {
            return PreparePhaseResult::Pending;
        };

        match votes.status() {
            QuorumStatus::Reached => {
                // Paxos safety rule: a possibly chosen value must be re-proposed.
                let value = highest_prior
                    .as_ref()
                    .map_or_else(|| self.initial_value.clone(), |a| a.value.clone());
                self.prepare_tally = Some(votes.tally(false));
                self.phase = ProposerPhase::Accepting {
                    value: value.clone(),
                    votes: QuorumCore::new(self.num_acceptors),
                };
                PreparePhaseResult::Quorum { value }
            }
            QuorumStatus::Pending if !expired => PreparePhaseResult::Pending,
            QuorumStatus::Pending | QuorumStatus::Unreachable => {
                self.prepare_tally = Some(votes.tally(true));
                self.phase = ProposerPhase::Failed(FailureReason::PrepareQuorumNotReached);
                PreparePhaseResult::Failed
            }
        }
    }

    /// Process an ack during the Accept phase.
    ///
    /// Responses outside the Accept phase are ignored.
    pub fn handle_ack(&mut self, acceptor_id: I, ack: Ack) -> AcceptPhaseResult<V> {
        let ProposerPhase::Accepting { votes, .. } = &mut self.phase else {
            return AcceptPhaseResult::Pending;
        };

        match ack {
            Ack::Granted => {
                votes.record(acceptor_id, true);
            }
            Ack::Rejected { promised } => {
                self.highest_rejection = self.highest_rejection.max(Some(promised));
                votes.record(acceptor_id, false);
            }
        }

        self.settle_accept(false)
    }

    /// Exclude an acceptor from the Accept quorum.
    pub fn accept_unresponsive(&mut self, acceptor_id: I) -> AcceptPhaseResult<V> {
        if let ProposerPhase::Accepting { votes, .. } = &mut self.phase {
            votes.mark_silent(acceptor_id);
        }
        self.settle_accept(false)
    }

    /// The Accept round's wait is over.
    pub fn accept_timed_out(&mut self) -> AcceptPhaseResult<V> {
        self.settle_accept(true)
    }

    fn settle_accept(&mut self, expired: bool) -> AcceptPhaseResult<V> {
        let ProposerPhase::Accepting { value, votes } = &self.phase else {
            return AcceptPhaseResult::Pending;
        };

        match votes.status() {
            QuorumStatus::Reached => {
                let value = value.clone();
                self.accept_tally = Some(votes.tally(false));
                self.phase = ProposerPhase::Decided {
                    value: value.clone(),
                };
                AcceptPhaseResult::Decided {
                    ballot: self.ballot,
                    value,
                }
            }
            QuorumStatus::Pending if !expired => AcceptPhaseResult::Pending,
            QuorumStatus::Pending | QuorumStatus::Unreachable => {
                self.accept_tally = Some(votes.tally(true));
                self.phase = ProposerPhase::Failed(FailureReason::AcceptQuorumNotReached);
                AcceptPhaseResult::Failed
            }
        }
    }
}
