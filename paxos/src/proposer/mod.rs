//! Proposer runtime implementation
//!
//! [`Proposer`] drives one consensus attempt at a time against a fixed
//! cluster. Each phase fans a request out to every acceptor on its own task
//! and feeds replies into [`ProposerCore`] as they arrive, until the core
//! settles the phase or the phase timeout expires.
//!
//! # Example
//!
//! ```ignore
//! let cluster = ClusterConfig::new(addrs)?;
//! let mut proposer = Proposer::new(cluster, connector, ProposerConfig::default());
//! let report = proposer.propose(Ballot(0), 7).await?;
//! if let Outcome::Decided { value, .. } = report.outcome {
//!     println!("decided {value}");
//! }
//! ```

mod exchange;

use std::collections::HashMap;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use error_stack::Report;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, trace, warn};

use exchange::{Exchange, ExchangeParams, exchange};

use crate::config::{ClusterConfig, ProposerConfig, Sleep, TokioSleep};
use crate::core::{
    Ballot, FailureReason, Message, MessageKind, Outcome, ProposerCore, ProtocolViolation, Tally,
};
use crate::error::ProposerError;
use crate::messages::Value;
use crate::traits::Connector;

/// Counts for one phase of an attempt.
///
/// Acceptors that committed a protocol violation are counted as
/// `unresponsive` and also listed in `violations` by index into the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseTally {
    pub granted: usize,
    pub rejected: usize,
    pub unresponsive: usize,
    pub violations: Vec<(usize, ProtocolViolation)>,
}

impl PhaseTally {
    fn new(tally: Tally, violations: Vec<(usize, ProtocolViolation)>) -> Self {
        Self {
            granted: tally.granted,
            rejected: tally.rejected,
            unresponsive: tally.unresponsive,
            violations,
        }
    }
}

/// What happened during one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    pub ballot: Ballot,
    pub outcome: Outcome<Value>,
    pub prepare: PhaseTally,
    /// `None` when the prepare phase failed.
    pub accept: Option<PhaseTally>,
    /// Highest ballot any acceptor reported while rejecting this attempt.
    pub highest_rejection: Option<Ballot>,
}

impl AttemptReport {
    /// The smallest ballot a retry could possibly succeed with, or `None`
    /// once no higher ballot exists.
    #[must_use]
    pub fn next_ballot(&self) -> Option<Ballot> {
        self.highest_rejection.map_or(self.ballot, |b| b.max(self.ballot)).next()
    }
}

/// A proposer bound to a cluster of acceptors.
pub struct Proposer<C: Connector, S: Sleep = TokioSleep, R: Rng = StdRng> {
    cluster: ClusterConfig<C::Addr>,
    connector: C,
    config: ProposerConfig<S, R>,
}

impl<C, S, R> Proposer<C, S, R>
where
    C: Connector,
    S: Sleep,
    R: Rng,
{
    pub fn new(
        cluster: ClusterConfig<C::Addr>,
        connector: C,
        config: ProposerConfig<S, R>,
    ) -> Self {
        debug!(num_acceptors = cluster.len(), "creating proposer");
        Self {
            cluster,
            connector,
            config,
        }
    }

    #[must_use]
    pub fn cluster(&self) -> &ClusterConfig<C::Addr> {
        &self.cluster
    }

    /// Run one attempt: Prepare/Promise, then Accept/Ack.
    ///
    /// Failing to reach a quorum is a normal [`Outcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`ProposerError`] if no channel could be opened to any
    /// acceptor during a phase.
    #[instrument(
        skip_all,
        name = "propose",
        fields(ballot = %ballot, initial_value = initial_value)
    )]
    pub async fn propose(
        &mut self,
        ballot: Ballot,
        initial_value: Value,
    ) -> Result<AttemptReport, Report<ProposerError>> {
        let mut core = ProposerCore::new(ballot, initial_value, self.cluster.len());

        let prepare_violations = self.run_phase(&mut core, Message::Prepare { ballot }).await?;
        let prepare = PhaseTally::new(
            core.prepare_tally().unwrap_or_default(),
            prepare_violations,
        );

        let accept = match core.adopted_value().copied() {
            Some(value) => {
                debug!(value, granted = prepare.granted, "prepare quorum reached");
                let violations = self
                    .run_phase(&mut core, Message::Accept { ballot, value })
                    .await?;
                Some(PhaseTally::new(
                    core.accept_tally().unwrap_or_default(),
                    violations,
                ))
            }
            None => None,
        };

        // Both phases always settle, so the outcome is known here.
        let outcome = core
            .outcome()
            .unwrap_or(Outcome::Failed(FailureReason::AcceptQuorumNotReached));
        match outcome {
            Outcome::Decided { value, .. } => info!(value, "decided"),
            Outcome::Failed(reason) => info!(%reason, "attempt failed"),
        }

        Ok(AttemptReport {
            ballot,
            outcome,
            prepare,
            accept,
            highest_rejection: core.highest_rejection(),
        })
    }

    /// Run attempts with increasing ballots until one decides.
    ///
    /// Each retry uses a ballot above both the previous one and any ballot
    /// reported in rejections, after a backoff. Returns the last attempt's
    /// report once a value is decided, `max_attempts` is used up, or the
    /// ballot space runs out.
    ///
    /// # Errors
    ///
    /// Returns [`ProposerError`] as soon as an attempt fails fatally.
    pub async fn propose_until_decided(
        &mut self,
        first_ballot: Ballot,
        initial_value: Value,
        max_attempts: u32,
    ) -> Result<AttemptReport, Report<ProposerError>> {
        let mut ballot = first_ballot;
        let mut attempt = 0;
        loop {
            let report = self.propose(ballot, initial_value).await?;
            attempt += 1;
            if report.outcome.is_decided() || attempt >= max_attempts {
                return Ok(report);
            }

            let Some(next) = report.next_ballot() else {
                warn!(ballot = %report.ballot, "no higher ballot left to retry with");
                return Ok(report);
            };
            ballot = next;
            let backoff = self.config.backoff.duration(attempt - 1, &mut self.config.rng);
            debug!(%ballot, ?backoff, attempt, "retrying with higher ballot");
            self.config.sleep.sleep(backoff).await;
        }
    }

    /// Fan `request` out to every acceptor and feed replies to `core` until
    /// the phase settles or times out.
    ///
    /// Returns the protocol violations seen during the phase.
    async fn run_phase(
        &mut self,
        core: &mut ProposerCore<usize, Value>,
        request: Message<Value>,
    ) -> Result<Vec<(usize, ProtocolViolation)>, Report<ProposerError>> {
        let phase = request.kind();
        let in_phase = |core: &ProposerCore<usize, Value>| match phase {
            MessageKind::Accept => core.is_accepting(),
            _ => core.is_preparing(),
        };

        let connected = Arc::new(AtomicBool::new(false));
        let mut exchanges = JoinSet::new();
        let mut acceptor_of = HashMap::with_capacity(self.cluster.len());
        for (id, addr) in self.cluster.acceptors().iter().enumerate() {
            let params = ExchangeParams {
                connector: self.connector.clone(),
                addr: addr.clone(),
                request,
                max_retries: self.config.max_retries,
                backoff: self.config.backoff.clone(),
                sleep: self.config.sleep.clone(),
                rng: StdRng::seed_from_u64(self.config.rng.random()),
                connected: connected.clone(),
            };
            let handle = exchanges.spawn(exchange(params));
            acceptor_of.insert(handle.id(), id);
        }
        trace!(%phase, num_acceptors = exchanges.len(), "fanned out");

        let mut deadline = pin!(self.config.sleep.sleep(self.config.phase_timeout));
        let mut violations = Vec::new();

        // A settled phase keeps draining until some channel has opened, so an
        // unreachable cluster is not mistaken for a lost quorum.
        while in_phase(core) || !connected.load(Ordering::Acquire) {
            let joined = tokio::select! {
                joined = exchanges.join_next_with_id() => joined,
                () = &mut deadline => {
                    debug!(%phase, outstanding = exchanges.len(), "phase timed out");
                    break;
                }
            };
            let Some(joined) = joined else {
                break;
            };
            let (task, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!(error = %e, "exchange task failed");
                    (e.id(), Exchange::Unresponsive)
                }
            };
            let Some(&id) = acceptor_of.get(&task) else {
                continue;
            };
            if !in_phase(core) {
                continue;
            }

            match result {
                Exchange::Promise(promise) => {
                    core.handle_promise(id, promise);
                }
                Exchange::Ack(ack) => {
                    core.handle_ack(id, ack);
                }
                Exchange::Violation(violation) => {
                    error!(acceptor = id, %violation, "acceptor broke protocol");
                    violations.push((id, violation));
                    mark_unresponsive(core, phase, id);
                }
                Exchange::Unresponsive => {
                    warn!(acceptor = id, "acceptor unresponsive");
                    mark_unresponsive(core, phase, id);
                }
            }
        }

        if !connected.load(Ordering::Acquire) {
            return Err(Report::new(ProposerError)
                .attach(format!("{phase} phase at ballot {}", core.ballot())));
        }

        // Everyone who has not answered by now is non-responsive.
        if in_phase(core) {
            match phase {
                MessageKind::Accept => {
                    core.accept_timed_out();
                }
                _ => {
                    core.prepare_timed_out();
                }
            }
        }

        // Late replies are discarded.
        exchanges.abort_all();
        Ok(violations)
    }
}

fn mark_unresponsive(core: &mut ProposerCore<usize, Value>, phase: MessageKind, id: usize) {
    match phase {
        MessageKind::Accept => {
            core.accept_unresponsive(id);
        }
        _ => {
            core.prepare_unresponsive(id);
        }
    }
}
