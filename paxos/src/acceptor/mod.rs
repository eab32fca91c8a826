//! Acceptor runtime: shared voting state and the per-connection loop.

mod runner;
mod state;

pub use runner::run_acceptor;
pub use state::SharedAcceptorState;
