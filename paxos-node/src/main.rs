use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Parser, Subcommand};
use error_stack::{Report, ResultExt};
use paxos_node::{TcpConnector, serve};
use single_decree_paxos::acceptor::SharedAcceptorState;
use single_decree_paxos::proposer::Proposer;
use single_decree_paxos::{AttemptReport, Ballot, ClusterConfig, ProposerConfig, Value};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "paxos-node")]
#[command(about = "Run single-decree Paxos acceptors and proposers over TCP")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve one acceptor
    Acceptor {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:7000")]
        bind: SocketAddr,
    },
    /// Try to get a value chosen by a running cluster
    Propose {
        /// Acceptor address (repeat once per acceptor)
        #[arg(short, long = "acceptor", required = true)]
        acceptors: Vec<SocketAddr>,

        #[command(flatten)]
        proposal: ProposalArgs,
    },
    /// Start a local cluster and run one proposer against it
    Demo {
        /// Number of acceptors
        #[arg(short = 'n', long, default_value_t = 5)]
        acceptors: u16,

        /// First acceptor port, the rest follow consecutively
        #[arg(long, default_value_t = 7000)]
        base_port: u16,

        #[command(flatten)]
        proposal: ProposalArgs,
    },
}

#[derive(clap::Args, Debug)]
struct ProposalArgs {
    /// Ballot of the first attempt
    #[arg(short, long, default_value_t = 0)]
    ballot: u64,

    /// Value to propose if no acceptor reports an earlier acceptance
    #[arg(short, long)]
    value: Value,

    /// Attempts before giving up, each with a higher ballot
    #[arg(long, default_value_t = 1)]
    attempts: u32,

    /// Per-phase timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
}

#[derive(Debug)]
struct NodeError;

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("paxos node failed")
    }
}

impl std::error::Error for NodeError {}

#[tokio::main]
async fn main() -> Result<(), Report<NodeError>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Acceptor { bind } => {
            let listener = TcpListener::bind(bind)
                .await
                .change_context(NodeError)
                .attach(format!("binding {bind}"))?;
            serve(listener, SharedAcceptorState::new())
                .await
                .change_context(NodeError)
        }
        Command::Propose { acceptors, proposal } => {
            let report = run_proposer(acceptors, &proposal).await?;
            print_report(&report);
            Ok(())
        }
        Command::Demo {
            acceptors,
            base_port,
            proposal,
        } => {
            let mut addrs = Vec::with_capacity(usize::from(acceptors));
            for i in 0..acceptors {
                let port = base_port.checked_add(i).ok_or_else(|| {
                    Report::new(NodeError).attach(format!("port range overflows at acceptor {i}"))
                })?;
                let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
                let listener = TcpListener::bind(addr)
                    .await
                    .change_context(NodeError)
                    .attach(format!("binding {addr}"))?;
                tokio::spawn(async move {
                    if let Err(e) = serve(listener, SharedAcceptorState::new()).await {
                        error!(error = ?e, %addr, "acceptor stopped");
                    }
                });
                addrs.push(addr);
            }
            info!(acceptors = addrs.len(), "local cluster started");

            let report = run_proposer(addrs, &proposal).await?;
            print_report(&report);
            Ok(())
        }
    }
}

async fn run_proposer(
    acceptors: Vec<SocketAddr>,
    args: &ProposalArgs,
) -> Result<AttemptReport, Report<NodeError>> {
    let cluster = ClusterConfig::new(acceptors).change_context(NodeError)?;
    let config = ProposerConfig::default().phase_timeout(Duration::from_millis(args.timeout_ms));
    let mut proposer = Proposer::new(cluster, TcpConnector::default(), config);
    proposer
        .propose_until_decided(Ballot(args.ballot), args.value, args.attempts.max(1))
        .await
        .change_context(NodeError)
}

fn print_report(report: &AttemptReport) {
    println!("{}", report.outcome);
    println!(
        "  ballot {}: prepare granted={} rejected={} unresponsive={}",
        report.ballot, report.prepare.granted, report.prepare.rejected, report.prepare.unresponsive
    );
    if let Some(accept) = &report.accept {
        println!(
            "  accept granted={} rejected={} unresponsive={}",
            accept.granted, accept.rejected, accept.unresponsive
        );
    }
    let accept_violations = report.accept.iter().flat_map(|a| &a.violations);
    for (id, violation) in report.prepare.violations.iter().chain(accept_violations) {
        println!("  acceptor {id}: {violation}");
    }
}
