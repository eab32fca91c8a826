//! Error contexts for `error-stack` reports.

use std::fmt;

/// Opening, writing to or reading from a channel to an acceptor failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectorError;

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("acceptor channel error")
    }
}

impl std::error::Error for ConnectorError {}

/// Invalid cluster or proposer configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConfigError;

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid configuration")
    }
}

impl std::error::Error for ConfigError {}

/// The acceptor loop stopped on a channel error.
#[derive(Debug, Clone, Copy)]
pub struct AcceptorError;

impl fmt::Display for AcceptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("acceptor connection failed")
    }
}

impl std::error::Error for AcceptorError {}

/// Not a single acceptor could be reached during a round.
///
/// Quorum failures are not errors; they are reported as
/// [`Outcome::Failed`](crate::Outcome::Failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProposerError;

impl fmt::Display for ProposerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("could not open a channel to any acceptor")
    }
}

impl std::error::Error for ProposerError {}
