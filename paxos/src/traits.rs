//! Channel traits between the proposer and acceptors.

use std::fmt;
use std::future::Future;
use std::io;

use error_stack::Report;
use futures::{Sink, Stream};

use crate::error::ConnectorError;
use crate::messages::WireMessage;

/// Opens channels to acceptors by address.
///
/// Each exchange opens its own channel; the proposer handles retries and
/// backoff, so implementations should make a single attempt per call.
pub trait Connector: Clone + Send + Sync + 'static {
    type Addr: Clone + fmt::Debug + Send + Sync + 'static;
    type Connection: AcceptorConn + Send + Unpin + 'static;

    fn connect(
        &self,
        addr: &Self::Addr,
    ) -> impl Future<Output = Result<Self::Connection, Report<ConnectorError>>> + Send;
}

/// A bidirectional message channel. Decoding failures surface as
/// [`io::ErrorKind::InvalidData`].
pub trait AcceptorConn:
    Sink<WireMessage, Error = io::Error> + Stream<Item = Result<WireMessage, io::Error>>
{
}

impl<T> AcceptorConn for T where
    T: Sink<WireMessage, Error = io::Error> + Stream<Item = Result<WireMessage, io::Error>>
{
}
