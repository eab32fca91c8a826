//! [`Connector`] implementation over plain TCP.
//!
//! Traffic is not encrypted or authenticated. Run it on a trusted network, or
//! put an encrypted stream underneath [`WireCodec`] instead.

use std::net::SocketAddr;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use single_decree_paxos::codec::WireCodec;
use single_decree_paxos::{Connector, ConnectorError};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::trace;

pub type TcpConnection = Framed<TcpStream, WireCodec>;

/// Opens one TCP connection per exchange.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl TcpConnector {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Connector for TcpConnector {
    type Addr = SocketAddr;
    type Connection = TcpConnection;

    async fn connect(&self, addr: &SocketAddr) -> Result<TcpConnection, Report<ConnectorError>> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .change_context(ConnectorError)
            .attach(format!("timed out connecting to {addr}"))?
            .change_context(ConnectorError)
            .attach(format!("connecting to {addr}"))?;
        stream.set_nodelay(true).change_context(ConnectorError)?;
        trace!(%addr, "connected");
        Ok(Framed::new(stream, WireCodec::new()))
    }
}
