//! Consumer worker (ยง4.4): receives `num_messages` messages, recording the
//! send-to-receive latency of each into a histogram, until the count is
//! reached or the adapter reports a receive failure.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flotilla_core::{varint, LatencyHistogram, WorkerResult};
use flotilla_peer::Peer;

use crate::worker::ResultSlot;

pub struct Subscriber {
    pub id: u32,
    peer: Box<dyn Peer>,
    num_messages: u64,
    results: ResultSlot,
}

/// Nanoseconds since the Unix epoch. A clock set before 1970 reads as 0
/// rather than panicking; the resulting latency samples simply clamp like
/// any other clock-skew artifact.
fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as i64
}

impl Subscriber {
    pub fn new(id: u32, peer: Box<dyn Peer>, num_messages: u64) -> Self {
        Self {
            id,
            peer,
            num_messages,
            results: ResultSlot::new(),
        }
    }

    pub fn results(&self) -> ResultSlot {
        self.results.clone()
    }

    /// Subscribes and starts consuming. Intended to be spawned: this
    /// returns only once the configured message count has been received or
    /// the adapter has reported a failure.
    pub async fn run(mut self) {
        if let Err(e) = self.peer.subscribe().await {
            self.results.set(WorkerResult::error(e.to_string()));
            return;
        }

        let mut latencies = LatencyHistogram::new();
        let mut started: Option<i64> = None;
        let mut received = 0u64;

        loop {
            let message = match self.peer.recv().await {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!(subscriber = self.id, error = %e, "receive failed");
                    self.results.set(WorkerResult::error(e.to_string()));
                    return;
                }
            };
            let received_at = now_nanos();

            if let Ok(sent_at) = varint::decode_timestamp(&message) {
                latencies.record_ms((received_at - sent_at) / 1_000_000);
            }

            let started = *started.get_or_insert(received_at);
            received += 1;

            if received == self.num_messages {
                let stopped = now_nanos();
                let duration_ms = (stopped - started) as f32 / 1_000_000.0;
                let throughput = 1000.0 * self.num_messages as f32 / duration_ms;
                self.results.set(WorkerResult::success(
                    duration_ms,
                    throughput,
                    Some(latencies.stats()),
                ));
                tracing::info!(subscriber = self.id, "subscriber completed");
                return;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flotilla_peer::MockBroker;

    #[tokio::test]
    async fn subscriber_reports_latency_stats_on_completion() {
        let broker = MockBroker::new();
        let producer = broker.producer_peer(None);
        let consumer = broker.consumer_peer();

        let subscriber = Subscriber::new(0, Box::new(consumer), 50);
        let results = subscriber.results();

        let producer_task = tokio::spawn(async move {
            let mut producer = producer;
            producer.setup();
            let sender = producer.sender();
            for _ in 0..50 {
                let mut message = vec![0u8; 16];
                varint::encode_timestamp(&mut message, now_nanos());
                sender.send(message).await.unwrap();
            }
            producer.done().await;
        });

        subscriber.run().await;
        producer_task.await.unwrap();

        let result = results.get().unwrap();
        assert!(!result.is_error());
        assert!(result.latency.is_some());
    }

    #[tokio::test]
    async fn subscriber_reports_receive_failure() {
        let broker = MockBroker::new();
        let consumer = broker.consumer_peer();
        drop(broker); // drops the only sender; the consumer's recv now errors

        let subscriber = Subscriber::new(0, Box::new(consumer), 10);
        let results = subscriber.results();

        subscriber.run().await;
        assert!(results.get().unwrap().is_error());
    }
}
