//! Acceptor accept loop over TCP.

use error_stack::{Report, ResultExt};
use single_decree_paxos::AcceptorError;
use single_decree_paxos::acceptor::{SharedAcceptorState, run_acceptor};
use single_decree_paxos::codec::WireCodec;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{Instrument, debug, info, info_span, warn};

/// Serve one acceptor on `listener` until accepting fails.
///
/// Every connection runs [`run_acceptor`] on its own task against the same
/// `state`.
///
/// # Errors
///
/// Returns [`AcceptorError`] if the listener stops accepting connections.
pub async fn serve(
    listener: TcpListener,
    state: SharedAcceptorState,
) -> Result<(), Report<AcceptorError>> {
    let local = listener.local_addr().change_context(AcceptorError)?;
    info!(%local, "acceptor listening");

    loop {
        let (stream, peer) = listener.accept().await.change_context(AcceptorError)?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, error = %e, "could not set TCP_NODELAY");
        }

        let conn = Framed::new(stream, WireCodec::new());
        let state = state.clone();
        tokio::spawn(
            async move {
                if let Err(e) = run_acceptor(state, conn).await {
                    warn!(error = ?e, "connection error");
                }
            }
            .instrument(info_span!("connection", %local, %peer)),
        );
    }
}
