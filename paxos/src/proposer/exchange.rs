//! One request/response exchange with one acceptor.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use tracing::{debug, instrument, trace, warn};

use crate::config::{BackoffConfig, Sleep};
use crate::core::{Ack, Message, MessageKind, Promise, ProtocolViolation};
use crate::messages::{Value, WireMessage};
use crate::traits::{AcceptorConn, Connector};

/// How an exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exchange {
    /// The answer to a `Prepare`.
    Promise(Promise<Value>),
    /// The answer to an `Accept`.
    Ack(Ack),
    /// A well-formed reply of the wrong kind.
    Violation(ProtocolViolation),
    /// No usable reply.
    Unresponsive,
}

/// Everything an exchange task needs, owned so the task can be spawned.
pub(crate) struct ExchangeParams<C: Connector, S> {
    pub connector: C,
    pub addr: C::Addr,
    pub request: Message<Value>,
    pub max_retries: u32,
    pub backoff: BackoffConfig,
    pub sleep: S,
    pub rng: StdRng,
    /// Set once any exchange of the phase opens a channel.
    pub connected: Arc<AtomicBool>,
}

/// Reply kinds that may answer `request`.
pub(crate) fn expected_replies(request: &Message<Value>) -> &'static [MessageKind] {
    match request {
        Message::Prepare { .. } => &[MessageKind::Promise],
        Message::Accept { .. } => &[MessageKind::Ack],
        Message::Promise(_) | Message::Ack(_) => &[],
    }
}

async fn round_trip<T>(conn: &mut T, request: WireMessage) -> Result<WireMessage, io::Error>
where
    T: AcceptorConn + Unpin,
{
    conn.send(request).await?;
    match conn.next().await {
        Some(reply) => reply,
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "channel closed before reply",
        )),
    }
}

/// Open a channel, send the request, read one reply.
///
/// Connection and I/O failures are retried with backoff up to `max_retries`
/// times. Undecodable or malformed replies are not retried.
///
/// A retried `Prepare` may reach an acceptor that already handled an earlier
/// copy whose reply was lost. That acceptor rejects the copy with exactly our
/// ballot, which is reported as [`Exchange::Unresponsive`] rather than as a
/// rejection.
#[instrument(
    skip_all,
    name = "exchange",
    fields(acceptor = ?params.addr, kind = %params.request.kind())
)]
pub(crate) async fn exchange<C, S>(mut params: ExchangeParams<C, S>) -> Exchange
where
    C: Connector,
    S: Sleep,
{
    let expected = expected_replies(&params.request);
    let mut maybe_delivered = false;

    for retries in 0..=params.max_retries {
        if retries > 0 {
            let backoff = params.backoff.duration(retries - 1, &mut params.rng);
            trace!(?backoff, retries, "backing off before retry");
            params.sleep.sleep(backoff).await;
        }

        let mut conn = match params.connector.connect(&params.addr).await {
            Ok(conn) => conn,
            Err(report) => {
                debug!(retries, error = ?report, "connect failed");
                continue;
            }
        };
        params.connected.store(true, Ordering::Release);
        let resent = maybe_delivered;
        maybe_delivered = true;

        let wire = match round_trip(&mut conn, WireMessage::from(params.request)).await {
            Ok(wire) => wire,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(error = %e, "undecodable reply");
                return Exchange::Unresponsive;
            }
            Err(e) => {
                debug!(retries, error = %e, "channel failed");
                continue;
            }
        };

        let reply = match Message::try_from(wire) {
            Ok(reply) => reply,
            Err(malformed) => {
                warn!(%malformed, "ignoring reply");
                return Exchange::Unresponsive;
            }
        };
        trace!(?reply, "received reply");

        return match (params.request, reply) {
            (
                Message::Prepare { ballot },
                Message::Promise(Promise::Rejected { promised }),
            ) if resent && promised == ballot => {
                debug!(%ballot, "earlier copy of this prepare was handled, reply lost");
                Exchange::Unresponsive
            }
            (Message::Prepare { .. }, Message::Promise(promise)) => Exchange::Promise(promise),
            (Message::Accept { .. }, Message::Ack(ack)) => Exchange::Ack(ack),
            _ => Exchange::Violation(ProtocolViolation {
                expected,
                received: reply.kind(),
            }),
        };
    }

    debug!("giving up on acceptor");
    Exchange::Unresponsive
}
