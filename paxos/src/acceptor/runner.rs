//! Acceptor run loop.

use std::io;
use std::pin::pin;

use error_stack::{Report, ResultExt};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tracing::{debug, error, instrument, trace, warn};

use super::SharedAcceptorState;
use crate::core::Message;
use crate::error::AcceptorError;
use crate::messages::WireMessage;

/// Answer requests on one channel until the peer closes it.
///
/// Malformed frames and protocol violations end the channel without a reply;
/// the proposer then counts this acceptor as non-responsive for the round.
///
/// # Errors
///
/// Returns [`AcceptorError`] if reading or writing the channel fails.
#[instrument(skip_all, name = "acceptor")]
pub async fn run_acceptor<C>(
    state: SharedAcceptorState,
    conn: C,
) -> Result<(), Report<AcceptorError>>
where
    C: Stream<Item = Result<WireMessage, io::Error>> + Sink<WireMessage, Error = io::Error>,
{
    let mut conn = pin!(conn);

    while let Some(frame) = conn.next().await {
        let wire = match frame {
            Ok(wire) => wire,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!(error = %e, "undecodable frame, closing channel");
                return Ok(());
            }
            Err(e) => return Err(Report::new(e).change_context(AcceptorError)),
        };

        let request = match Message::try_from(wire) {
            Ok(request) => request,
            Err(malformed) => {
                warn!(%malformed, "closing channel");
                return Ok(());
            }
        };
        trace!(kind = %request.kind(), ballot = wire.ballot, "received request");

        let response = match state.handle(request) {
            Ok(response) => response,
            Err(violation) => {
                error!(%violation, "closing channel");
                return Ok(());
            }
        };

        conn.send(WireMessage::from(response))
            .await
            .change_context(AcceptorError)?;
    }

    debug!("connection closed");
    Ok(())
}
