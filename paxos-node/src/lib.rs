//! TCP transport for single-decree Paxos.
//!
//! - [`serve`]: run an acceptor behind a [`tokio::net::TcpListener`]
//! - [`TcpConnector`]: let a proposer reach acceptors by socket address

#![warn(clippy::pedantic)]

pub mod connector;
pub mod server;

pub use connector::{TcpConnection, TcpConnector};
pub use server::serve;
