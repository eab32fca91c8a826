//! Single-decree Paxos
//!
//! One proposer and a fixed set of acceptors agree on exactly one value,
//! tolerating message loss and the failure of a minority of acceptors.
//!
//! # Architecture
//!
//! - **Acceptors**: answer Prepare/Accept by fixed rules ([`core::AcceptorCore`],
//!   shared between connections by [`acceptor::SharedAcceptorState`])
//! - **Proposers**: run both phases concurrently against all acceptors
//!   ([`proposer::Proposer`] driving [`core::ProposerCore`])
//! - **Channels**: anything implementing [`Connector`] / [`AcceptorConn`],
//!   usually a byte stream framed with [`codec::WireCodec`]
//!
//! # Quick Start
//!
//! ```ignore
//! use single_decree_paxos::acceptor::{SharedAcceptorState, run_acceptor};
//! use single_decree_paxos::proposer::Proposer;
//!
//! // Acceptor side, once per incoming connection
//! let state = SharedAcceptorState::new();
//! run_acceptor(state.clone(), Framed::new(stream, WireCodec::new())).await?;
//!
//! // Proposer side
//! let cluster = ClusterConfig::new(acceptor_addrs)?;
//! let mut proposer = Proposer::new(cluster, connector, ProposerConfig::default());
//! let report = proposer.propose(Ballot(0), 7).await?;
//! ```

#![warn(clippy::pedantic)]

pub mod acceptor;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
mod messages;
pub mod proposer;
mod traits;

pub use crate::config::{BackoffConfig, ClusterConfig, ProposerConfig, Sleep, TokioSleep};
pub use crate::core::{Accepted, Ack, Ballot, FailureReason, Message, MessageKind, Outcome, Promise};
pub use crate::error::{AcceptorError, ConfigError, ConnectorError, ProposerError};
pub use crate::messages::{MalformedMessage, Value, WireMessage};
pub use crate::proposer::{AttemptReport, PhaseTally, Proposer};
pub use crate::traits::{AcceptorConn, Connector};
