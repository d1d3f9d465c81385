//! Daemon request dispatcher (§4.2): one handler per [`Operation`], driving
//! the single broker controller and the publisher/subscriber lists a
//! connection's requests accumulate.

use tokio::task::JoinHandle;

use flotilla_core::{BrokerKind, Operation, Request, Response, WorkerResult};
use flotilla_peer::{BrokerController, DefaultPeerFactory, PeerFactory};

use crate::error::DaemonError;
use crate::publisher::Publisher;
use crate::subscriber::Subscriber;
use crate::worker::ResultSlot;

/// `pending` holds a publisher constructed by `publishers` but not yet
/// unlocked by `run`; `handle` is populated once it has been spawned.
/// Exactly one of the two is ever set.
struct PublisherEntry {
    results: ResultSlot,
    pending: Option<Publisher>,
    handle: Option<JoinHandle<()>>,
}

struct SubscriberEntry {
    results: ResultSlot,
    handle: JoinHandle<()>,
}

/// Owns at most one broker controller and the publisher/subscriber lists
/// for the test currently in flight on this daemon (§3, §4.2).
pub struct Daemon {
    factory: Box<dyn PeerFactory>,
    broker_kind: Option<BrokerKind>,
    broker: Option<Box<dyn BrokerController>>,
    publishers: Vec<PublisherEntry>,
    subscribers: Vec<SubscriberEntry>,
}

impl Daemon {
    pub fn new() -> Self {
        Self::with_factory(Box::new(DefaultPeerFactory))
    }

    /// Constructs a daemon that builds peers and broker controllers through
    /// `factory` instead of the production adapter stack, so tests can
    /// substitute [`flotilla_peer::MockPeerFactory`] (§10.4).
    pub fn with_factory(factory: Box<dyn PeerFactory>) -> Self {
        Self {
            factory,
            broker_kind: None,
            broker: None,
            publishers: Vec::new(),
            subscribers: Vec::new(),
        }
    }

    /// Handles one request end to end, matching §4.2's dispatch table.
    ///
    /// Never panics: every handler failure is folded into a
    /// `{success:false}` response. Only a response *serialization* failure
    /// one layer up, in the connection loop, is treated as the documented
    /// unrecoverable condition.
    pub async fn handle(&mut self, request: Request) -> Response {
        match request.operation {
            Operation::Start => self.start(request).await,
            Operation::Stop => self.stop().await,
            Operation::Publishers => self.publishers(request).await,
            Operation::Subscribers => self.subscribers(request).await,
            Operation::Run => self.run().await,
            Operation::Results => self.results(),
            Operation::Teardown => self.teardown().await,
        }
    }

    async fn start(&mut self, request: Request) -> Response {
        if self.broker.is_some() {
            return Response::failure(DaemonError::BrokerAlreadyRunning.to_string());
        }
        let Some(kind) = request.broker else {
            return Response::failure("start requires a broker kind");
        };
        let Some(port) = request.port else {
            return Response::failure("start requires a port");
        };

        let mut controller = self.factory.broker_controller(kind);
        match controller.start(&request.host, port).await {
            Ok(container_id) => {
                tracing::info!(broker = %kind, %container_id, "broker started");
                self.broker_kind = Some(kind);
                self.broker = Some(controller);
                Response::ok()
            }
            Err(e) => {
                tracing::warn!(broker = %kind, error = %e, "broker start failed");
                Response::failure(e.to_string())
            }
        }
    }

    async fn stop(&mut self) -> Response {
        let Some(mut controller) = self.broker.take() else {
            return Response::failure(DaemonError::NoBrokerRunning.to_string());
        };
        let broker_kind = self.broker_kind.take();
        match controller.stop().await {
            Ok(()) => {
                tracing::info!(broker = ?broker_kind, "broker stopped");
                Response::ok()
            }
            Err(e) => {
                tracing::warn!(broker = ?broker_kind, error = %e, "broker stop failed");
                Response::failure(e.to_string())
            }
        }
    }

    async fn publishers(&mut self, request: Request) -> Response {
        let Some(kind) = request.broker else {
            return Response::failure("publishers requires a broker kind");
        };

        let mut created = Vec::with_capacity(request.count as usize);
        for id in 0..request.count {
            let peer = match self.factory.producer(kind, &request.host).await {
                Ok(peer) => peer,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to construct a producer peer");
                    return Response::failure(e.to_string());
                }
            };
            let publisher = Publisher::new(id, peer, request.num_messages, request.message_size);
            created.push(PublisherEntry {
                results: publisher.results(),
                pending: Some(publisher),
                handle: None,
            });
        }

        tracing::info!(count = request.count, broker = %kind, "publishers created");
        self.publishers.extend(created);
        Response::ok()
    }

    async fn subscribers(&mut self, request: Request) -> Response {
        let Some(kind) = request.broker else {
            return Response::failure("subscribers requires a broker kind");
        };

        let mut created = Vec::with_capacity(request.count as usize);
        for id in 0..request.count {
            let peer = match self.factory.consumer(kind, &request.host).await {
                Ok(peer) => peer,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to construct a consumer peer");
                    return Response::failure(e.to_string());
                }
            };
            let subscriber = Subscriber::new(id, peer, request.num_messages);
            let results = subscriber.results();
            let handle = tokio::spawn(subscriber.run());
            created.push(SubscriberEntry { results, handle });
        }

        tracing::info!(count = request.count, broker = %kind, "subscribers created and started");
        self.subscribers.extend(created);
        Response::ok()
    }

    async fn run(&mut self) -> Response {
        let mut started = 0;
        for entry in &mut self.publishers {
            if let Some(publisher) = entry.pending.take() {
                entry.handle = Some(tokio::spawn(publisher.run()));
                started += 1;
            }
        }
        tracing::info!(count = started, "publishers started");
        Response::ok()
    }

    fn results(&self) -> Response {
        let subscriber_results = match collect(self.subscribers.iter().map(|e| &e.results)) {
            Some(results) => results,
            None => return Response::not_ready(),
        };
        let publisher_results = match collect(self.publishers.iter().map(|e| &e.results)) {
            Some(results) => results,
            None => return Response::not_ready(),
        };
        Response::results(publisher_results, subscriber_results)
    }

    async fn teardown(&mut self) -> Response {
        for entry in self.subscribers.drain(..) {
            entry.handle.abort();
        }
        for entry in self.publishers.drain(..) {
            if let Some(handle) = entry.handle {
                handle.abort();
            } else if let Some(publisher) = entry.pending {
                publisher.teardown_peer().await;
            }
        }
        tracing::info!("workers torn down");
        Response::ok()
    }
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects every slot's deposited result, or `None` the moment one is
/// still empty (ยง4.2 "results" handler: not-ready is all-or-nothing).
fn collect<'a>(slots: impl Iterator<Item = &'a ResultSlot>) -> Option<Vec<WorkerResult>> {
    let mut results = Vec::new();
    for slot in slots {
        match slot.get() {
            Ok(result) => results.push(result),
            Err(_) => return None,
        }
    }
    Some(results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flotilla_core::BrokerKind;
    use flotilla_peer::MockPeerFactory;

    fn daemon() -> Daemon {
        Daemon::with_factory(Box::new(MockPeerFactory::new()))
    }

    #[tokio::test]
    async fn starting_a_broker_twice_is_rejected() {
        let mut daemon = daemon();
        let first = daemon
            .handle(Request::start(BrokerKind::Kafka, "localhost", 9092))
            .await;
        assert!(first.success);

        let second = daemon
            .handle(Request::start(BrokerKind::Kafka, "localhost", 9092))
            .await;
        assert!(!second.success);
        assert_eq!(second.message, "Broker already running");
    }

    #[tokio::test]
    async fn stopping_without_a_broker_is_rejected() {
        let mut daemon = daemon();
        let response = daemon.handle(Request::stop()).await;
        assert!(!response.success);
        assert_eq!(response.message, "No broker running");
    }

    #[tokio::test]
    async fn results_before_run_reports_not_ready() {
        let mut daemon = daemon();
        daemon
            .handle(Request::subscribers(BrokerKind::Kafka, "localhost:9092", 1, 10, 16))
            .await;
        daemon
            .handle(Request::publishers(BrokerKind::Kafka, "localhost:9092", 1, 10, 16))
            .await;

        let response = daemon.handle(Request::results()).await;
        assert!(!response.success);
        assert_eq!(response.message, "Results not ready");
    }

    #[tokio::test]
    async fn full_lifecycle_reports_matching_worker_counts() {
        let mut daemon = daemon();
        daemon
            .handle(Request::subscribers(BrokerKind::Kafka, "localhost:9092", 1, 50, 16))
            .await;
        daemon
            .handle(Request::publishers(BrokerKind::Kafka, "localhost:9092", 1, 50, 16))
            .await;
        let run_response = daemon.handle(Request::run()).await;
        assert!(run_response.success);

        let response = loop {
            let response = daemon.handle(Request::results()).await;
            if !response.is_not_ready() {
                break response;
            }
        };

        assert!(response.success);
        assert_eq!(response.publisher_results.unwrap().len(), 1);
        assert_eq!(response.subscriber_results.unwrap().len(), 1);

        let teardown = daemon.handle(Request::teardown()).await;
        assert!(teardown.success);

        // Idempotent: a second teardown on the now-empty lists still succeeds.
        let second_teardown = daemon.handle(Request::teardown()).await;
        assert!(second_teardown.success);
    }

    #[tokio::test]
    async fn producer_send_failure_is_reported_without_aborting_results() {
        let mut daemon = Daemon::with_factory(Box::new(MockPeerFactory::with_producer_failure(50)));
        daemon
            .handle(Request::publishers(BrokerKind::Kafka, "localhost:9092", 1, 1_000, 16))
            .await;
        daemon.handle(Request::run()).await;

        let response = loop {
            let response = daemon.handle(Request::results()).await;
            if !response.is_not_ready() {
                break response;
            }
        };

        assert!(response.success);
        let publisher_results = response.publisher_results.unwrap();
        assert_eq!(publisher_results.len(), 1);
        assert!(publisher_results[0].is_error());
        assert_eq!(publisher_results[0].duration_ms, 0.0);
        assert_eq!(publisher_results[0].throughput_msg_per_sec, 0.0);
    }

    #[tokio::test]
    async fn kafka_port_collision_is_rejected() {
        let mut daemon = daemon();
        let response = daemon
            .handle(Request::start(BrokerKind::Kafka, "localhost", 2181))
            .await;
        assert!(!response.success);
        assert_eq!(response.message, "Port 2181 is reserved");
    }
}
