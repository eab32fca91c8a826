//! Paxos state machines without I/O
//!
//! The acceptor and proposer rules live here as plain synchronous
//! transitions. The tokio runtime in [`crate::acceptor`] and
//! [`crate::proposer`] drives them over real channels, and the model checker
//! tests drive the very same transitions over a simulated lossy network.
//!
//! - [`types`]: ballots, messages, outcomes
//! - [`acceptor`]: [`AcceptorCore`], the Prepare/Accept rules
//! - [`proposer`]: [`ProposerCore`], value adoption and phase progress
//! - [`quorum`]: the majority rule and per-phase response tracking

pub(crate) mod acceptor;
pub(crate) mod proposer;
pub(crate) mod quorum;
pub(crate) mod types;

pub use acceptor::AcceptorCore;
pub use proposer::{AcceptPhaseResult, PreparePhaseResult, ProposerCore};
pub use quorum::{Quorum, Tally};
pub use types::{
    Accepted, Ack, Ballot, FailureReason, Message, MessageKind, Outcome, Promise,
    ProtocolViolation,
};
