//! The uniform adapter façade every broker kind is made to speak (ยง4.5).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{PeerError, PeerResult};

/// Default destination name every adapter publishes to and consumes from.
///
/// AMQP-style fanout adapters additionally bind a unique per-process queue
/// (ยง4.5); that binding is adapter-internal state, not part of this
/// interface.
pub const DESTINATION: &str = "test";

/// Capacity of the internal channel an adapter's `Setup` loop drains and
/// the channel a subscribed adapter pre-buffers into (ยง5: "capacity โ‰ˆ 10 000").
pub const CHANNEL_CAPACITY: usize = 10_000;

/// Default flush size for batched adapters (Kestrel, NSQ, Cloud Pub/Sub).
pub const BATCH_BUFFER_SIZE: usize = 100;

/// The per-worker façade for a concrete broker client.
///
/// A peer is created for, and owned by, exactly one worker; it is never
/// shared. `setup` must be called before any send; `done` flushes and must
/// be awaited before `teardown` closes the underlying connection.
#[async_trait]
pub trait Peer: Send {
    /// Prepares to consume from [`DESTINATION`]. Idempotent; only called on
    /// consumer-side peers.
    async fn subscribe(&mut self) -> PeerResult<()>;

    /// Blocks until one message is available and returns its payload.
    async fn recv(&mut self) -> PeerResult<Vec<u8>>;

    /// A cloneable handle onto which byte slices may be published; the
    /// adapter's `setup` loop drains it.
    fn sender(&self) -> mpsc::Sender<Vec<u8>>;

    /// The single-reader channel onto which publish errors are posted.
    fn errors(&mut self) -> &mut mpsc::Receiver<PeerError>;

    /// Starts the adapter's internal sender loop. Must be called exactly
    /// once before any send.
    fn setup(&mut self);

    /// Signals the sender loop to flush any partial batch and exit;
    /// resolves once the flush has completed.
    async fn done(&mut self);

    /// Closes the underlying broker connection. Safe to call after `done`.
    async fn teardown(&mut self);
}

/// A peer that refuses every operation, returned in place of a real
/// adapter for broker kinds this workspace does not implement (ยง4.5).
pub struct UnimplementedPeer {
    kind: String,
    errors: mpsc::Receiver<PeerError>,
    _errors_tx: mpsc::Sender<PeerError>,
}

impl UnimplementedPeer {
    pub fn new(kind: impl Into<String>) -> Self {
        let (_errors_tx, errors) = mpsc::channel(1);
        Self {
            kind: kind.into(),
            errors,
            _errors_tx,
        }
    }
}

#[async_trait]
impl Peer for UnimplementedPeer {
    async fn subscribe(&mut self) -> PeerResult<()> {
        Err(PeerError::not_implemented(&self.kind))
    }

    async fn recv(&mut self) -> PeerResult<Vec<u8>> {
        Err(PeerError::not_implemented(&self.kind))
    }

    fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        mpsc::channel(1).0
    }

    fn errors(&mut self) -> &mut mpsc::Receiver<PeerError> {
        &mut self.errors
    }

    fn setup(&mut self) {}

    async fn done(&mut self) {}

    async fn teardown(&mut self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unimplemented_peer_rejects_subscribe_and_recv() {
        let mut peer = UnimplementedPeer::new("activemq");
        assert!(peer.subscribe().await.is_err());
        assert!(peer.recv().await.is_err());
    }
}
