//! Daemon-side accept loop.

use std::time::Duration;

use tokio::net::TcpListener;

use crate::connection::Connection;
use crate::error::{TransportError, TransportResult};

/// Binds a TCP listener for the daemon's request/reply port.
pub struct Listener {
    listener: TcpListener,
    deadline: Duration,
}

impl Listener {
    pub async fn bind(address: &str, deadline: Duration) -> TransportResult<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|e| TransportError::connect(address, e))?;
        Ok(Self { listener, deadline })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts the next inbound connection, wrapped in the same framing and
    /// deadline every client connection uses.
    pub async fn accept(&self) -> TransportResult<Connection> {
        let (stream, _peer) = self.listener.accept().await.map_err(TransportError::Io)?;
        Ok(Connection::from_stream(stream, self.deadline))
    }
}
