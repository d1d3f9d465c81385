//! Producer worker (ยง4.3): embeds a send timestamp in each message and
//! races the peer's send and error channels until `num_messages` have gone
//! out or a send fails.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flotilla_core::{varint, WorkerResult};
use flotilla_peer::Peer;

use crate::worker::ResultSlot;

pub struct Publisher {
    pub id: u32,
    peer: Box<dyn Peer>,
    num_messages: u64,
    message_size: usize,
    results: ResultSlot,
}

/// Nanoseconds since the Unix epoch. A clock set before 1970 reads as 0
/// rather than panicking; the resulting latency samples simply clamp at
/// the consumer (ยง4.4) like any other clock-skew artifact.
fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as i64
}

impl Publisher {
    pub fn new(id: u32, peer: Box<dyn Peer>, num_messages: u64, message_size: usize) -> Self {
        Self {
            id,
            peer,
            num_messages,
            message_size,
            results: ResultSlot::new(),
        }
    }

    pub fn results(&self) -> ResultSlot {
        self.results.clone()
    }

    /// Runs to completion: embeds a fresh timestamp into every message,
    /// sends `num_messages` of them, then deposits a result. Stops early and
    /// deposits an error result the first time the adapter reports a send
    /// failure (ยง8 scenario 5).
    pub async fn run(mut self) {
        self.peer.setup();
        let send = self.peer.sender();

        let start = now_nanos();
        for _ in 0..self.num_messages {
            let mut message = vec![0u8; self.message_size];
            varint::encode_timestamp(&mut message, now_nanos());

            tokio::select! {
                biased;
                error = self.peer.errors().recv() => {
                    let reason = error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "adapter closed its error channel".to_string());
                    tracing::warn!(publisher = self.id, %reason, "failed to send message");
                    self.results.set(WorkerResult::error(reason));
                    self.peer.done().await;
                    self.peer.teardown().await;
                    return;
                }
                sent = send.send(message) => {
                    if sent.is_err() {
                        self.results.set(WorkerResult::error("adapter send channel closed"));
                        self.peer.done().await;
                        self.peer.teardown().await;
                        return;
                    }
                }
            }
        }

        self.peer.done().await;
        let stop = now_nanos();
        let duration_ms = (stop - start) as f32 / 1_000_000.0;
        let throughput = 1000.0 * self.num_messages as f32 / duration_ms;
        self.results.set(WorkerResult::success(duration_ms, throughput, None));
        tracing::info!(publisher = self.id, "publisher completed");
        self.peer.teardown().await;
    }

    /// Tears down this publisher's peer without ever running its send loop.
    ///
    /// Used by the dispatcher's `teardown` handler (ยง4.2) for a publisher
    /// that was constructed by `publishers` but never unlocked by `run`: it
    /// still owns a live peer connection that must be closed exactly once.
    pub async fn teardown_peer(mut self) {
        self.peer.done().await;
        self.peer.teardown().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flotilla_peer::MockBroker;

    #[tokio::test]
    async fn publisher_reports_duration_and_throughput_on_success() {
        let broker = MockBroker::new();
        let consumer = broker.consumer_peer();
        let producer = broker.producer_peer(None);

        let publisher = Publisher::new(0, Box::new(producer), 100, 16);
        let results = publisher.results();

        tokio::spawn(async move {
            let mut consumer = consumer;
            for _ in 0..100 {
                let _ = consumer.recv().await;
            }
        });

        publisher.run().await;
        let result = results.get().unwrap();
        assert!(!result.is_error());
        assert!(result.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn publisher_reports_send_failure() {
        let broker = MockBroker::new();
        let producer = broker.producer_peer(Some(0));
        let publisher = Publisher::new(0, Box::new(producer), 100, 16);
        let results = publisher.results();

        publisher.run().await;
        let result = results.get().unwrap();
        assert!(result.is_error());
    }
}
