//! An in-process peer adapter standing in for a real broker connection.
//!
//! Used by this workspace's own test suite (here, and by `flotilla-daemon`'s
//! and `flotilla-client`'s integration tests) so the dispatcher, the wire
//! transport and the worker loops can be exercised end to end without a
//! container runtime or a live broker (ยง10.4).

use async_trait::async_trait;
use tokio::sync::mpsc;

use flotilla_core::BrokerKind;

use crate::broker::{BrokerController, MockBrokerController};
use crate::error::PeerError;
use crate::factory::PeerFactory;
use crate::peer::{Peer, CHANNEL_CAPACITY};

/// A shared in-memory "broker": one queue that every producer peer created
/// from it publishes into, and that a single consumer peer drains.
#[derive(Clone)]
pub struct MockBroker {
    sender: mpsc::Sender<Vec<u8>>,
    receiver: std::sync::Arc<tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>>,
}

impl MockBroker {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            receiver: std::sync::Arc::new(tokio::sync::Mutex::new(receiver)),
        }
    }

    /// A producer-side peer. `fail_after`, if set, makes the adapter post a
    /// send error instead of forwarding the Nth message (ยง8 scenario 5).
    pub fn producer_peer(&self, fail_after: Option<usize>) -> MockPeer {
        MockPeer::producer(self.sender.clone(), fail_after)
    }

    /// A consumer-side peer reading from the shared queue.
    pub fn consumer_peer(&self) -> MockPeer {
        MockPeer::consumer(self.receiver.clone())
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

enum Role {
    Producer {
        broker_tx: mpsc::Sender<Vec<u8>>,
        fail_after: Option<usize>,
    },
    Consumer {
        broker_rx: std::sync::Arc<tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>>,
    },
}

/// Either half of a [`MockBroker`] connection, implementing the full
/// [`Peer`] capability set.
pub struct MockPeer {
    role: Role,
    send_tx: mpsc::Sender<Vec<u8>>,
    send_rx: Option<mpsc::Receiver<Vec<u8>>>,
    errors_tx: mpsc::Sender<PeerError>,
    errors_rx: mpsc::Receiver<PeerError>,
    done_tx: Option<tokio::sync::oneshot::Sender<()>>,
    flushed_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    setup_task: Option<tokio::task::JoinHandle<()>>,
}

impl MockPeer {
    fn producer(broker_tx: mpsc::Sender<Vec<u8>>, fail_after: Option<usize>) -> Self {
        Self::new(Role::Producer { broker_tx, fail_after })
    }

    fn consumer(broker_rx: std::sync::Arc<tokio::sync::Mutex<mpsc::Receiver<Vec<u8>>>>) -> Self {
        Self::new(Role::Consumer { broker_rx })
    }

    fn new(role: Role) -> Self {
        let (send_tx, send_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        Self {
            role,
            send_tx,
            send_rx: Some(send_rx),
            errors_tx,
            errors_rx,
            done_tx: None,
            flushed_rx: None,
            setup_task: None,
        }
    }
}

#[async_trait]
impl Peer for MockPeer {
    async fn subscribe(&mut self) -> Result<(), PeerError> {
        Ok(())
    }

    async fn recv(&mut self) -> Result<Vec<u8>, PeerError> {
        match &self.role {
            Role::Consumer { broker_rx } => broker_rx
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| PeerError::recv("mock broker queue closed")),
            Role::Producer { .. } => Err(PeerError::recv("recv called on a producer peer")),
        }
    }

    fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.send_tx.clone()
    }

    fn errors(&mut self) -> &mut mpsc::Receiver<PeerError> {
        &mut self.errors_rx
    }

    fn setup(&mut self) {
        let Some(mut send_rx) = self.send_rx.take() else {
            // Already set up; the sender loop is already running.
            return;
        };
        let (done_tx, mut done_rx) = tokio::sync::oneshot::channel();
        let (flushed_tx, flushed_rx) = tokio::sync::oneshot::channel();
        self.done_tx = Some(done_tx);
        self.flushed_rx = Some(flushed_rx);

        let errors_tx = self.errors_tx.clone();
        let broker_tx = match &self.role {
            Role::Producer { broker_tx, .. } => Some(broker_tx.clone()),
            Role::Consumer { .. } => None,
        };
        let fail_after = match &self.role {
            Role::Producer { fail_after, .. } => *fail_after,
            Role::Consumer { .. } => None,
        };

        self.setup_task = Some(tokio::spawn(async move {
            let mut forwarded = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut done_rx => break,
                    message = send_rx.recv() => {
                        let Some(message) = message else { break };
                        if let Some(limit) = fail_after {
                            if forwarded >= limit {
                                let _ = errors_tx.send(PeerError::send("mock injected send failure")).await;
                                continue;
                            }
                        }
                        if let Some(broker_tx) = &broker_tx {
                            if broker_tx.send(message).await.is_err() {
                                let _ = errors_tx.send(PeerError::send("mock broker queue closed")).await;
                            }
                        }
                        forwarded += 1;
                    }
                }
            }
            let _ = flushed_tx.send(());
        }));
    }

    async fn done(&mut self) {
        if let Some(done_tx) = self.done_tx.take() {
            let _ = done_tx.send(());
        }
        if let Some(flushed_rx) = self.flushed_rx.take() {
            let _ = flushed_rx.await;
        }
    }

    async fn teardown(&mut self) {
        if let Some(task) = self.setup_task.take() {
            task.abort();
        }
    }
}

/// A [`PeerFactory`] backed by one shared [`MockBroker`], used by this
/// workspace's own integration tests to drive a real dispatcher and wire
/// transport without a container runtime or a live broker (ยง10.4, ยง8
/// scenarios 1, 3, 4, 5, 6).
pub struct MockPeerFactory {
    broker: MockBroker,
    fail_producer_after: Option<usize>,
}

impl MockPeerFactory {
    pub fn new() -> Self {
        Self {
            broker: MockBroker::new(),
            fail_producer_after: None,
        }
    }

    /// Every producer peer this factory hands out reports a send failure
    /// starting with its `fail_after`-th message (ยง8 scenario 5).
    pub fn with_producer_failure(fail_after: usize) -> Self {
        Self {
            broker: MockBroker::new(),
            fail_producer_after: Some(fail_after),
        }
    }
}

impl Default for MockPeerFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerFactory for MockPeerFactory {
    async fn producer(&self, _kind: BrokerKind, _host: &str) -> Result<Box<dyn Peer>, PeerError> {
        Ok(Box::new(self.broker.producer_peer(self.fail_producer_after)))
    }

    async fn consumer(&self, _kind: BrokerKind, _host: &str) -> Result<Box<dyn Peer>, PeerError> {
        Ok(Box::new(self.broker.consumer_peer()))
    }

    fn broker_controller(&self, _kind: BrokerKind) -> Box<dyn BrokerController> {
        Box::new(MockBrokerController::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn producer_and_consumer_exchange_one_message() {
        let broker = MockBroker::new();
        let mut producer = broker.producer_peer(None);
        let mut consumer = broker.consumer_peer();

        producer.setup();
        producer.sender().send(vec![1, 2, 3]).await.unwrap();
        producer.done().await;

        let received = consumer.recv().await.unwrap();
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_on_the_errors_channel() {
        let broker = MockBroker::new();
        let mut producer = broker.producer_peer(Some(0));
        producer.setup();
        producer.sender().send(vec![9]).await.unwrap();

        let error = producer.errors().recv().await.unwrap();
        assert_eq!(error.category(), "adapter.send");
    }

    #[tokio::test]
    async fn teardown_stops_the_sender_task() {
        let broker = MockBroker::new();
        let mut producer = broker.producer_peer(None);
        producer.setup();
        producer.teardown().await;
    }

    #[tokio::test]
    async fn mock_peer_factory_wires_producers_to_consumers() {
        let factory = MockPeerFactory::new();
        let mut producer = factory.producer(BrokerKind::Kafka, "ignored:0").await.unwrap();
        let mut consumer = factory.consumer(BrokerKind::Kafka, "ignored:0").await.unwrap();

        producer.setup();
        producer.sender().send(vec![7, 7]).await.unwrap();
        producer.done().await;

        assert_eq!(consumer.recv().await.unwrap(), vec![7, 7]);
    }
}
