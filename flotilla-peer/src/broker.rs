//! Broker lifecycle orchestration (ยง4.6): starting and stopping the
//! container(s) a benchmark run needs, shelling out to `docker` the way the
//! original per-kind orchestrators did.

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::{sleep, Duration};

use flotilla_core::BrokerKind;

use crate::error::{BrokerError, BrokerResult};

/// Ports owned by a broker's supporting process (ZooKeeper, nsqlookupd, the
/// Kafka JMX port) and therefore off-limits as the benchmark's own broker
/// port.
pub const RESERVED_PORTS: &[u16] = &[2181, 7203, 4151, 4160, 4161];

const KAFKA_POST_START_DELAY_SECS: u64 = 60;

/// Invokes `command` through `/bin/sh -c`. A failure to spawn the shell at
/// all (the runtime is missing or unreachable) surfaces as
/// `RuntimeNotAvailable`; a non-zero exit is reported through
/// `on_exit_failure` so callers can label it `StartFailed` or
/// `StopFailed` as appropriate.
async fn run_shell(command: String, on_exit_failure: impl Fn(String) -> BrokerError) -> BrokerResult<String> {
    let output = Command::new("/bin/sh")
        .arg("-c")
        .arg(&command)
        .output()
        .await
        .map_err(|e| BrokerError::runtime_not_available(format!("failed to invoke shell: {e}")))?;
    if !output.status.success() {
        return Err(on_exit_failure(format!(
            "command `{command}` exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn run_start_command(command: String) -> BrokerResult<String> {
    run_shell(command, BrokerError::start_failed).await
}

async fn kill_container(container_id: &str) -> BrokerResult<()> {
    run_shell(format!("docker kill {container_id}"), BrokerError::stop_failed)
        .await
        .map(|_| ())
}

fn check_not_reserved(port: u16) -> BrokerResult<()> {
    if RESERVED_PORTS.contains(&port) {
        Err(BrokerError::port_reserved(port))
    } else {
        Ok(())
    }
}

/// Starts and stops the broker process(es) a benchmark run targets.
#[async_trait]
pub trait BrokerController: Send {
    /// Starts the broker (and any composite dependency it needs), binding
    /// its client-facing port to `port` on `host`. Returns an
    /// implementation-defined handle, logged but otherwise unused.
    async fn start(&mut self, host: &str, port: u16) -> BrokerResult<String>;

    /// Stops everything `start` brought up. Best-effort: a failure to stop
    /// the dependency does not prevent stopping the primary container, and
    /// vice versa; the first error encountered is returned.
    async fn stop(&mut self) -> BrokerResult<()>;
}

/// [`BrokerController`] that shells out to a local `docker` binary,
/// mirroring each kind's original per-broker orchestrator.
pub struct DockerBrokerController {
    kind: BrokerKind,
    primary_container_id: Option<String>,
    dependency_container_id: Option<String>,
}

impl DockerBrokerController {
    pub fn new(kind: BrokerKind) -> Self {
        Self {
            kind,
            primary_container_id: None,
            dependency_container_id: None,
        }
    }

    async fn start_beanstalkd(&mut self, port: u16) -> BrokerResult<String> {
        let container_id =
            run_start_command(format!("docker run -d -p {port}:11300 m0ikz/beanstalkd")).await?;
        self.primary_container_id = Some(container_id.clone());
        Ok(container_id)
    }

    async fn start_kafka(&mut self, host: &str, port: u16) -> BrokerResult<String> {
        check_not_reserved(port)?;
        let zookeeper_id =
            run_start_command("docker run -d -p 2181:2181 jplock/zookeeper:3.4.6".to_string()).await?;
        self.dependency_container_id = Some(zookeeper_id);

        let kafka_cmd = format!(
            "docker run -d -h {host} -p {port}:9092 -p 7203:7203 \
             -e EXPOSED_HOST={host} -e ZOOKEEPER_IP={host} ches/kafka"
        );
        let kafka_id = match run_start_command(kafka_cmd).await {
            Ok(id) => id,
            Err(e) => {
                let _ = self.stop().await;
                return Err(e);
            }
        };
        self.primary_container_id = Some(kafka_id.clone());

        // The Kafka image needs time to elect a leader before it will
        // accept producer connections.
        sleep(Duration::from_secs(KAFKA_POST_START_DELAY_SECS)).await;
        Ok(kafka_id)
    }

    async fn start_nsq(&mut self, host: &str, port: u16) -> BrokerResult<String> {
        check_not_reserved(port)?;
        let lookupd_id =
            run_start_command("docker run -d -p 4160:4160 -p 4161:4161 nsqio/nsqlookupd".to_string())
                .await?;
        self.dependency_container_id = Some(lookupd_id);

        let nsqd_cmd = format!(
            "docker run -d -p {port}:4150 -p 4151:4151 nsqio/nsqd \
             --broadcast-address={host} --lookupd-tcp-address={host}:4160"
        );
        let nsqd_id = match run_start_command(nsqd_cmd).await {
            Ok(id) => id,
            Err(e) => {
                let _ = self.stop().await;
                return Err(e);
            }
        };
        self.primary_container_id = Some(nsqd_id.clone());
        Ok(nsqd_id)
    }
}

#[async_trait]
impl BrokerController for DockerBrokerController {
    async fn start(&mut self, host: &str, port: u16) -> BrokerResult<String> {
        match self.kind {
            BrokerKind::Beanstalkd => self.start_beanstalkd(port).await,
            BrokerKind::Kafka => self.start_kafka(host, port).await,
            BrokerKind::Nsq => self.start_nsq(host, port).await,
            other => Err(BrokerError::start_failed(format!(
                "no container orchestration for broker kind {other}"
            ))),
        }
    }

    async fn stop(&mut self) -> BrokerResult<()> {
        let mut first_error = None;

        if let Some(dependency_id) = self.dependency_container_id.take() {
            if let Err(e) = kill_container(&dependency_id).await {
                first_error.get_or_insert(e);
            }
        }
        if let Some(primary_id) = self.primary_container_id.take() {
            if let Err(e) = kill_container(&primary_id).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// [`BrokerController`] that records calls instead of touching a container
/// runtime, for tests that exercise the client orchestrator's state machine
/// (ยง10.4) without docker available.
#[derive(Default)]
pub struct MockBrokerController {
    pub start_calls: Vec<(String, u16)>,
    pub stop_calls: u32,
    pub fail_start: bool,
}

#[async_trait]
impl BrokerController for MockBrokerController {
    async fn start(&mut self, host: &str, port: u16) -> BrokerResult<String> {
        self.start_calls.push((host.to_string(), port));
        check_not_reserved(port)?;
        if self.fail_start {
            return Err(BrokerError::start_failed("mock configured to fail"));
        }
        Ok("mock-container".to_string())
    }

    async fn stop(&mut self) -> BrokerResult<()> {
        self.stop_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ports_rejected() {
        assert!(check_not_reserved(2181).is_err());
        assert!(check_not_reserved(9092).is_ok());
    }

    #[tokio::test]
    async fn mock_controller_records_start_and_stop() {
        let mut controller = MockBrokerController::default();
        controller.start("localhost", 9092).await.unwrap();
        controller.stop().await.unwrap();
        assert_eq!(controller.start_calls, vec![("localhost".to_string(), 9092)]);
        assert_eq!(controller.stop_calls, 1);
    }

    #[tokio::test]
    async fn mock_controller_start_failure_is_reported() {
        let mut controller = MockBrokerController {
            fail_start: true,
            ..Default::default()
        };
        assert!(controller.start("localhost", 9092).await.is_err());
    }

    #[tokio::test]
    async fn mock_controller_rejects_reserved_ports_like_the_real_one() {
        let mut controller = MockBrokerController::default();
        let error = controller.start("localhost", 2181).await.unwrap_err();
        assert_eq!(error.to_string(), "Port 2181 is reserved");
    }
}
