//! Orchestrator (§3, §4.7): drives the broker-daemon and every peer-daemon
//! through the benchmark lifecycle and collects the aggregated results.

use std::time::Duration;

use futures::future::try_join_all;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use flotilla_core::{BenchmarkConfig, Request, ResultContainer};
use flotilla_transport::Connection;

use crate::error::{ClientError, ClientResult};

const RESULTS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Drives one benchmark run to completion against the fleet named by a
/// [`BenchmarkConfig`].
pub struct Orchestrator {
    config: BenchmarkConfig,
}

impl Orchestrator {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    /// Runs the full lifecycle: start the broker, warm it up, create
    /// subscribers then publishers on every peer-daemon (§3's ordering),
    /// unlock them, collect results, then unconditionally tear everything
    /// down regardless of whether the drive succeeded, failed, or was
    /// cancelled by `cancel` (a client-issued interrupt, §4.7).
    pub async fn run(&self, cancel: CancellationToken) -> ClientResult<Vec<ResultContainer>> {
        let deadline = Duration::from_secs(self.config.daemon_timeout_seconds);

        let mut broker_conn = Connection::connect(&self.config.broker_daemon_endpoint, deadline).await?;
        let mut peer_conns = Vec::with_capacity(self.config.peer_endpoints.len());
        for endpoint in &self.config.peer_endpoints {
            let conn = Connection::connect(endpoint, deadline).await?;
            peer_conns.push((endpoint.clone(), conn));
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::error!("run interrupted; tearing down the fleet");
                Err(ClientError::interrupted())
            }
            result = self.drive(&mut broker_conn, &mut peer_conns) => result,
        };

        self.teardown(&mut broker_conn, &mut peer_conns).await;
        result
    }

    async fn drive(
        &self,
        broker_conn: &mut Connection,
        peer_conns: &mut [(String, Connection)],
    ) -> ClientResult<Vec<ResultContainer>> {
        self.start_broker(broker_conn).await?;

        tracing::info!(seconds = self.config.startup_sleep_seconds, "warming up broker");
        sleep(Duration::from_secs(self.config.startup_sleep_seconds)).await;

        let broker_address = format!("{}:{}", self.config.broker_host, self.config.broker_port);

        // Subscribers are created and started before publishers exist, so
        // there is always a reader in place before any message is sent
        // (§3's lifecycle narrative).
        for (endpoint, conn) in peer_conns.iter_mut() {
            let request = Request::subscribers(
                self.config.broker_kind,
                &broker_address,
                self.config.consumers_per_host,
                self.config.messages_per_producer,
                self.config.message_size_bytes,
            );
            expect_ok(conn, request, endpoint).await?;
        }
        tracing::info!("subscribers created");

        for (endpoint, conn) in peer_conns.iter_mut() {
            let request = Request::publishers(
                self.config.broker_kind,
                &broker_address,
                self.config.producers_per_host,
                self.config.messages_per_producer,
                self.config.message_size_bytes,
            );
            expect_ok(conn, request, endpoint).await?;
        }
        tracing::info!("publishers created");

        for (endpoint, conn) in peer_conns.iter_mut() {
            expect_ok(conn, Request::run(), endpoint).await?;
        }
        tracing::info!("run unlocked on every peer-daemon");

        let collected = try_join_all(
            peer_conns
                .iter_mut()
                .map(|(endpoint, conn)| collect_results(endpoint, conn)),
        )
        .await?;

        tracing::info!(peers = collected.len(), "results collected from every peer-daemon");
        Ok(collected)
    }

    async fn start_broker(&self, broker_conn: &mut Connection) -> ClientResult<()> {
        let request = Request::start(self.config.broker_kind, &self.config.broker_host, self.config.broker_port);
        let response = broker_conn.request(&request).await?;
        if !response.success {
            return Err(ClientError::daemon(&self.config.broker_daemon_endpoint, response.message));
        }
        tracing::info!(broker = %self.config.broker_kind, "broker started");
        Ok(())
    }

    /// Tears down every peer-daemon's workers then stops the broker,
    /// regardless of how `drive` concluded. Best-effort: a teardown failure
    /// on one connection does not skip the rest.
    async fn teardown(&self, broker_conn: &mut Connection, peer_conns: &mut [(String, Connection)]) {
        for (endpoint, conn) in peer_conns.iter_mut() {
            match conn.request(&Request::teardown()).await {
                Ok(response) if response.success => {}
                Ok(response) => tracing::warn!(%endpoint, message = %response.message, "teardown reported failure"),
                Err(e) => tracing::warn!(%endpoint, error = %e, "failed to send teardown"),
            }
        }

        match broker_conn.request(&Request::stop()).await {
            Ok(response) if response.success => tracing::info!("broker stopped"),
            Ok(response) => tracing::warn!(message = %response.message, "broker stop reported failure"),
            Err(e) => tracing::warn!(error = %e, "failed to send stop"),
        }
    }
}

async fn expect_ok(conn: &mut Connection, request: Request, endpoint: &str) -> ClientResult<()> {
    let response = conn.request(&request).await?;
    if !response.success {
        return Err(ClientError::daemon(endpoint, response.message));
    }
    Ok(())
}

/// Polls one peer-daemon's `results` until it stops reporting the soft
/// "not ready" signal, retrying on a fixed interval (§7, §9: the spec leaves
/// this retry unbounded rather than timing it out).
async fn collect_results(endpoint: &str, conn: &mut Connection) -> ClientResult<ResultContainer> {
    loop {
        let response = conn.request(&Request::results()).await?;
        if response.is_not_ready() {
            sleep(RESULTS_POLL_INTERVAL).await;
            continue;
        }
        if !response.success {
            return Err(ClientError::daemon(endpoint, response.message));
        }
        return Ok(ResultContainer {
            peer_endpoint: endpoint.to_string(),
            publisher_results: response.publisher_results.unwrap_or_default(),
            subscriber_results: response.subscriber_results.unwrap_or_default(),
        });
    }
}
