//! Runs the orchestrator end to end against in-process daemons wired with
//! the mock peer adapter, over real loopback TCP connections (§10.4).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use flotilla_client::Orchestrator;
use flotilla_core::{BenchmarkConfig, BrokerKind};
use flotilla_daemon::Daemon;
use flotilla_peer::MockPeerFactory;
use flotilla_transport::Listener;

const DEADLINE: Duration = Duration::from_secs(5);

/// Binds a loopback listener and spawns a task that accepts connections in
/// a loop, serving every one against a single mock-backed daemon shared
/// across connections, mirroring the production accept loop in
/// `flotilla-daemon`'s binary. Returns the address a client should dial.
async fn spawn_daemon() -> String {
    let listener = Listener::bind("127.0.0.1:0", DEADLINE).await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let mut daemon = Daemon::with_factory(Box::new(MockPeerFactory::new()));
        loop {
            let Ok(mut connection) = listener.accept().await else {
                return;
            };
            loop {
                let request = match connection.recv_request().await {
                    Ok(request) => request,
                    Err(_) => break,
                };
                let response = daemon.handle(request).await;
                if connection.send_response(&response).await.is_err() {
                    break;
                }
            }
        }
    });

    addr
}

#[tokio::test]
async fn full_run_collects_and_aggregates_results_from_every_peer() {
    let broker_endpoint = spawn_daemon().await;
    let peer_a = spawn_daemon().await;
    let peer_b = spawn_daemon().await;

    let config = BenchmarkConfig {
        broker_kind: BrokerKind::Beanstalkd,
        broker_host: "localhost".into(),
        broker_port: 11300,
        broker_daemon_endpoint: broker_endpoint,
        peer_endpoints: vec![peer_a, peer_b],
        producers_per_host: 1,
        consumers_per_host: 1,
        messages_per_producer: 100,
        message_size_bytes: 16,
        startup_sleep_seconds: 0,
        daemon_timeout_seconds: 5,
    };
    config.validate().unwrap();

    let orchestrator = Orchestrator::new(config);
    let results = orchestrator.run(CancellationToken::new()).await.unwrap();

    assert_eq!(results.len(), 2);
    for container in &results {
        assert_eq!(container.publisher_results.len(), 1);
        assert_eq!(container.subscriber_results.len(), 1);
        assert!(!container.publisher_results[0].is_error());
        assert!(!container.subscriber_results[0].is_error());
    }
}

#[tokio::test]
async fn broker_already_running_surfaces_as_a_daemon_error() {
    let broker_endpoint = spawn_daemon().await;
    let peer_endpoint = spawn_daemon().await;

    // Prime the broker-daemon with a `start` before the orchestrator gets to it.
    {
        let mut priming = flotilla_transport::Connection::connect(&broker_endpoint, DEADLINE)
            .await
            .unwrap();
        let response = priming
            .request(&flotilla_core::Request::start(BrokerKind::Beanstalkd, "localhost", 11300))
            .await
            .unwrap();
        assert!(response.success);
    }

    let config = BenchmarkConfig {
        broker_kind: BrokerKind::Beanstalkd,
        broker_host: "localhost".into(),
        broker_port: 11300,
        broker_daemon_endpoint: broker_endpoint,
        peer_endpoints: vec![peer_endpoint],
        producers_per_host: 1,
        consumers_per_host: 1,
        messages_per_producer: 100,
        message_size_bytes: 16,
        startup_sleep_seconds: 0,
        daemon_timeout_seconds: 5,
    };

    let orchestrator = Orchestrator::new(config);
    let error = orchestrator.run(CancellationToken::new()).await.unwrap_err();
    match error {
        flotilla_client::ClientError::Daemon { message, .. } => {
            assert_eq!(message, "Broker already running");
        }
        other => panic!("expected a Daemon error, got {other:?}"),
    }
}
