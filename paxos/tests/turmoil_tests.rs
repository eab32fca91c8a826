//! Turmoil-based simulation tests for Paxos
//!
//! These tests use turmoil's network simulation for more realistic
//! distributed systems testing with network partitions, latency, etc.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use error_stack::{Report, ResultExt};
use rand::rngs::StdRng;
use single_decree_paxos::acceptor::{SharedAcceptorState, run_acceptor};
use single_decree_paxos::codec::WireCodec;
use single_decree_paxos::proposer::Proposer;
use single_decree_paxos::{
    AttemptReport, BackoffConfig, Ballot, ClusterConfig, Connector, ConnectorError, FailureReason,
    Outcome, ProposerConfig, Sleep, Value,
};
use tokio_util::codec::Framed;
use turmoil::Builder;

/// Initialize tracing for tests. Call at the start of each test.
/// Uses RUST_LOG env var for filtering (defaults to "debug" for this crate).
fn init_tracing() -> impl Sized {
    use tracing::Dispatch;
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("single_decree_paxos=debug")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_test_writer()
        .finish();

    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_default(&dispatch)
}

const ACCEPTOR_PORT: u16 = 9999;

const THREE: &[&str] = &["acceptor-0", "acceptor-1", "acceptor-2"];
const FIVE: &[&str] = &[
    "acceptor-0",
    "acceptor-1",
    "acceptor-2",
    "acceptor-3",
    "acceptor-4",
];

// --- Turmoil Sleep Implementation ---

#[derive(Clone, Copy, Default)]
struct TurmoilSleep;

impl Sleep for TurmoilSleep {
    async fn sleep(&self, duration: Duration) {
        // Turmoil intercepts tokio::time, so we use tokio's sleep
        tokio::time::sleep(duration).await;
    }
}

/// Proposer config with a seeded RNG for deterministic jitter
fn turmoil_config(seed: u64) -> ProposerConfig<TurmoilSleep, StdRng> {
    ProposerConfig::with_seed(
        BackoffConfig {
            initial: Duration::from_millis(10),
            max: Duration::from_millis(200),
            multiplier: 2.0,
        },
        TurmoilSleep,
        seed,
    )
    .phase_timeout(Duration::from_secs(2))
}

// --- Turmoil TCP connector ---

#[derive(Clone, Copy, Default)]
struct TcpConnector;

impl Connector for TcpConnector {
    type Addr = SocketAddr;
    type Connection = Framed<turmoil::net::TcpStream, WireCodec>;

    async fn connect(&self, addr: &SocketAddr) -> Result<Self::Connection, Report<ConnectorError>> {
        let stream = turmoil::net::TcpStream::connect(*addr)
            .await
            .change_context(ConnectorError)
            .attach(format!("connecting to {addr}"))?;
        Ok(Framed::new(stream, WireCodec::new()))
    }
}

/// Convert hostnames to SocketAddrs using turmoil's DNS lookup
fn resolve_acceptors(names: &[&str]) -> ClusterConfig<SocketAddr> {
    ClusterConfig::new(
        names
            .iter()
            .map(|name| SocketAddr::new(turmoil::lookup(*name), ACCEPTOR_PORT)),
    )
    .unwrap()
}

fn start_acceptor(sim: &mut turmoil::Sim<'_>, name: &'static str) {
    sim.host(name, || async {
        let listener =
            turmoil::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, ACCEPTOR_PORT)).await?;
        let shared = SharedAcceptorState::new();
        loop {
            let (stream, _) = listener.accept().await?;
            let conn = Framed::new(stream, WireCodec::new());
            tokio::spawn(run_acceptor(shared.clone(), conn));
        }
    });
}

type Reports = Arc<Mutex<Vec<AttemptReport>>>;

fn to_io(
    report: &Report<impl std::error::Error + Send + Sync + 'static>,
) -> Box<dyn std::error::Error> {
    Box::new(io::Error::other(format!("{report:?}")))
}

/// Run one proposer client that records its final report.
fn start_proposer(
    sim: &mut turmoil::Sim<'_>,
    name: &'static str,
    acceptors: &'static [&'static str],
    ballot: u64,
    value: Value,
    attempts: u32,
    reports: &Reports,
) {
    let reports = reports.clone();
    sim.client(name, async move {
        let mut proposer = Proposer::new(
            resolve_acceptors(acceptors),
            TcpConnector,
            turmoil_config(ballot),
        );
        let report = proposer
            .propose_until_decided(Ballot(ballot), value, attempts)
            .await
            .map_err(|e| to_io(&e))?;
        reports.lock().unwrap().push(report);
        Ok(())
    });
}

fn decided_values(reports: &Reports) -> Vec<Value> {
    reports
        .lock()
        .unwrap()
        .iter()
        .filter_map(|r| match r.outcome {
            Outcome::Decided { value, .. } => Some(value),
            Outcome::Failed(_) => None,
        })
        .collect()
}

// --- Turmoil Tests ---

#[test]
fn turmoil_basic_consensus() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .build();

    for name in THREE {
        start_acceptor(&mut sim, name);
    }
    let reports = Reports::default();
    start_proposer(&mut sim, "proposer", THREE, 0, 7, 1, &reports);

    sim.run().unwrap();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].outcome,
        Outcome::Decided {
            ballot: Ballot(0),
            value: 7
        }
    );
}

#[test]
fn turmoil_with_latency() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .min_message_latency(Duration::from_millis(10))
        .max_message_latency(Duration::from_millis(100))
        .build();

    for name in FIVE {
        start_acceptor(&mut sim, name);
    }
    let reports = Reports::default();
    start_proposer(&mut sim, "proposer", FIVE, 1, 99, 5, &reports);

    sim.run().unwrap();

    assert_eq!(decided_values(&reports), vec![99]);
}

#[test]
fn turmoil_minority_partition_still_decides() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .build();

    for name in FIVE {
        start_acceptor(&mut sim, name);
    }
    let reports = Reports::default();
    let reports_clone = reports.clone();
    sim.client("proposer", async move {
        turmoil::partition("acceptor-3", "proposer");
        turmoil::partition("acceptor-4", "proposer");

        let mut proposer =
            Proposer::new(resolve_acceptors(FIVE), TcpConnector, turmoil_config(0));
        let report = proposer
            .propose(Ballot(0), 5)
            .await
            .map_err(|e| to_io(&e))?;
        reports_clone.lock().unwrap().push(report);
        Ok(())
    });

    sim.run().unwrap();

    assert_eq!(decided_values(&reports), vec![5]);
}

#[test]
fn turmoil_majority_partition_fails_prepare() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .build();

    for name in FIVE {
        start_acceptor(&mut sim, name);
    }
    let reports = Reports::default();
    let reports_clone = reports.clone();
    sim.client("proposer", async move {
        for name in &FIVE[2..] {
            turmoil::partition(*name, "proposer");
        }

        let mut proposer =
            Proposer::new(resolve_acceptors(FIVE), TcpConnector, turmoil_config(0));
        let report = proposer
            .propose(Ballot(0), 5)
            .await
            .map_err(|e| to_io(&e))?;
        reports_clone.lock().unwrap().push(report);
        Ok(())
    });

    sim.run().unwrap();

    let reports = reports.lock().unwrap();
    assert_eq!(
        reports[0].outcome,
        Outcome::Failed(FailureReason::PrepareQuorumNotReached)
    );
    assert!(reports[0].prepare.granted <= 2);
    assert_eq!(reports[0].accept, None);
}

#[test]
fn turmoil_later_proposer_adopts_decided_value() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(30))
        .build();

    for name in FIVE {
        start_acceptor(&mut sim, name);
    }
    let reports = Reports::default();
    start_proposer(&mut sim, "first", FIVE, 1, 10, 5, &reports);

    let reports_clone = reports.clone();
    sim.client("second", async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let mut proposer =
            Proposer::new(resolve_acceptors(FIVE), TcpConnector, turmoil_config(1));
        let report = proposer
            .propose_until_decided(Ballot(2), 20, 5)
            .await
            .map_err(|e| to_io(&e))?;
        reports_clone.lock().unwrap().push(report);
        Ok(())
    });

    sim.run().unwrap();

    assert_eq!(decided_values(&reports), vec![10, 10]);
}

#[test]
fn turmoil_competing_proposers_agree() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(60))
        .min_message_latency(Duration::from_millis(1))
        .max_message_latency(Duration::from_millis(20))
        .build();

    for name in FIVE {
        start_acceptor(&mut sim, name);
    }
    let reports = Reports::default();
    start_proposer(&mut sim, "proposer-a", FIVE, 1, 100, 20, &reports);
    start_proposer(&mut sim, "proposer-b", FIVE, 2, 200, 20, &reports);

    sim.run().unwrap();

    let values = decided_values(&reports);
    assert!(!values.is_empty());
    assert!(
        values.windows(2).all(|w| w[0] == w[1]),
        "proposers decided different values: {values:?}"
    );
}

#[test]
fn turmoil_healed_partition_allows_retry() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(60))
        .build();

    for name in THREE {
        start_acceptor(&mut sim, name);
    }
    let reports = Reports::default();
    let reports_clone = reports.clone();
    sim.client("proposer", async move {
        turmoil::partition("acceptor-1", "proposer");
        turmoil::partition("acceptor-2", "proposer");

        tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            turmoil::repair("acceptor-1", "proposer");
            turmoil::repair("acceptor-2", "proposer");
        });

        let mut proposer =
            Proposer::new(resolve_acceptors(THREE), TcpConnector, turmoil_config(0));
        let report = proposer
            .propose_until_decided(Ballot(0), 8, 50)
            .await
            .map_err(|e| to_io(&e))?;
        reports_clone.lock().unwrap().push(report);
        Ok(())
    });

    sim.run().unwrap();

    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].ballot > Ballot(0));
    assert_eq!(
        reports[0].outcome,
        Outcome::Decided {
            ballot: reports[0].ballot,
            value: 8
        }
    );
}
