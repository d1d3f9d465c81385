//! Wire-visible data model shared by the client, daemon and peer adapters.
//!
//! Every type here is `Serialize`/`Deserialize` because it crosses the
//! length-delimited JSON wire described by `flotilla-transport`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Minimum message size in bytes: large enough to hold a varint-encoded
/// nanosecond timestamp in the message head.
pub const MIN_MESSAGE_SIZE: usize = 9;
/// Minimum number of messages a producer/consumer pair may be configured for.
pub const MIN_NUM_MESSAGES: u64 = 100;

/// Default daemon listening port, and the port implied by every CLI
/// endpoint default named in §6 ("localhost:9500").
pub const DEFAULT_DAEMON_PORT: u16 = 9500;
/// Default `--num-messages` (§6).
pub const DEFAULT_NUM_MESSAGES: u64 = 500_000;
/// Default `--message-size` (§6).
pub const DEFAULT_MESSAGE_SIZE: usize = 1_000;
/// Default `--startup-sleep`, in seconds (§6).
pub const DEFAULT_STARTUP_SLEEP_SECS: u64 = 8;
/// Default `--daemon-timeout`, in seconds (§4.1, §6).
pub const DEFAULT_DAEMON_TIMEOUT_SECS: u64 = 5;

/// The broker families a daemon knows how to provision and speak to.
///
/// Every kind is represented here so the request/response shapes and the
/// CLI surface stay stable even for kinds whose peer adapter is not
/// implemented by this workspace (see `flotilla-peer::adapter`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    Beanstalkd,
    Nats,
    Kafka,
    Kestrel,
    Activemq,
    Rabbitmq,
    Nsq,
    Pubsub,
}

impl BrokerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beanstalkd => "beanstalkd",
            Self::Nats => "nats",
            Self::Kafka => "kafka",
            Self::Kestrel => "kestrel",
            Self::Activemq => "activemq",
            Self::Rabbitmq => "rabbitmq",
            Self::Nsq => "nsq",
            Self::Pubsub => "pubsub",
        }
    }

    pub fn all() -> &'static [BrokerKind] {
        &[
            Self::Beanstalkd,
            Self::Nats,
            Self::Kafka,
            Self::Kestrel,
            Self::Activemq,
            Self::Rabbitmq,
            Self::Nsq,
            Self::Pubsub,
        ]
    }
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beanstalkd" => Ok(Self::Beanstalkd),
            "nats" => Ok(Self::Nats),
            "kafka" => Ok(Self::Kafka),
            "kestrel" => Ok(Self::Kestrel),
            "activemq" => Ok(Self::Activemq),
            "rabbitmq" => Ok(Self::Rabbitmq),
            "nsq" => Ok(Self::Nsq),
            "pubsub" => Ok(Self::Pubsub),
            other => Err(CoreError::unknown_broker_kind(other)),
        }
    }
}

/// The seven operations a daemon dispatches (ยง4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Start,
    Stop,
    Publishers,
    Subscribers,
    Run,
    Results,
    Teardown,
}

/// A client -> daemon request. Every operation uses the same envelope;
/// unused fields are simply left at their default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub operation: Operation,
    #[serde(default)]
    pub broker: Option<BrokerKind>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub num_messages: u64,
    #[serde(default)]
    pub message_size: usize,
    /// Target broker address as "host:port", used by workers to dial the broker.
    #[serde(default)]
    pub host: String,
}

impl Request {
    pub fn start(broker: BrokerKind, host: impl Into<String>, port: u16) -> Self {
        Self {
            operation: Operation::Start,
            broker: Some(broker),
            port: Some(port),
            host: host.into(),
            ..Self::empty(Operation::Start)
        }
    }

    pub fn stop() -> Self {
        Self::empty(Operation::Stop)
    }

    pub fn publishers(
        broker: BrokerKind,
        host: impl Into<String>,
        count: u32,
        num_messages: u64,
        message_size: usize,
    ) -> Self {
        Self {
            operation: Operation::Publishers,
            broker: Some(broker),
            host: host.into(),
            count,
            num_messages,
            message_size,
            port: None,
        }
    }

    pub fn subscribers(
        broker: BrokerKind,
        host: impl Into<String>,
        count: u32,
        num_messages: u64,
        message_size: usize,
    ) -> Self {
        Self {
            operation: Operation::Subscribers,
            broker: Some(broker),
            host: host.into(),
            count,
            num_messages,
            message_size,
            port: None,
        }
    }

    pub fn run() -> Self {
        Self::empty(Operation::Run)
    }

    pub fn results() -> Self {
        Self::empty(Operation::Results)
    }

    pub fn teardown() -> Self {
        Self::empty(Operation::Teardown)
    }

    fn empty(operation: Operation) -> Self {
        Self {
            operation,
            broker: None,
            port: None,
            count: 0,
            num_messages: 0,
            message_size: 0,
            host: String::new(),
        }
    }
}

/// Literal soft-signal message used by `results` before every worker has
/// deposited a result. The client matches on this exact string (ยง8).
pub const RESULTS_NOT_READY: &str = "Results not ready";

/// A daemon -> client response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub publisher_results: Option<Vec<WorkerResult>>,
    #[serde(default)]
    pub subscriber_results: Option<Vec<WorkerResult>>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
            publisher_results: None,
            subscriber_results: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            publisher_results: None,
            subscriber_results: None,
        }
    }

    pub fn not_ready() -> Self {
        Self::failure(RESULTS_NOT_READY)
    }

    pub fn results(publisher: Vec<WorkerResult>, subscriber: Vec<WorkerResult>) -> Self {
        Self {
            success: true,
            message: String::new(),
            publisher_results: Some(publisher),
            subscriber_results: Some(subscriber),
        }
    }

    /// True iff this response is the soft "not ready" signal (ยง7) rather
    /// than a terminal failure.
    pub fn is_not_ready(&self) -> bool {
        !self.success && self.message == RESULTS_NOT_READY
    }
}

/// Latency quantiles, in milliseconds, extracted from a consumer's histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min: i64,
    pub q1: i64,
    pub q2: i64,
    pub q3: i64,
    pub max: i64,
    pub mean: f64,
    pub std_dev: f64,
}

/// The outcome of a single producer or consumer worker. Exactly one of
/// `error` or `(duration_ms, throughput_msg_per_sec)` is meaningful (ยง3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub duration_ms: f32,
    pub throughput_msg_per_sec: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<LatencyStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerResult {
    pub fn success(duration_ms: f32, throughput_msg_per_sec: f32, latency: Option<LatencyStats>) -> Self {
        Self {
            duration_ms,
            throughput_msg_per_sec,
            latency,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            duration_ms: 0.0,
            throughput_msg_per_sec: 0.0,
            latency: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregated results for one peer-daemon, tagged with its endpoint (ยง4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultContainer {
    pub peer_endpoint: String,
    pub publisher_results: Vec<WorkerResult>,
    pub subscriber_results: Vec<WorkerResult>,
}

/// Client-side, immutable-once-a-run-starts benchmark configuration (ยง3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    pub broker_kind: BrokerKind,
    pub broker_host: String,
    pub broker_port: u16,
    pub broker_daemon_endpoint: String,
    pub peer_endpoints: Vec<String>,
    pub producers_per_host: u32,
    pub consumers_per_host: u32,
    pub messages_per_producer: u64,
    pub message_size_bytes: usize,
    pub startup_sleep_seconds: u64,
    pub daemon_timeout_seconds: u64,
}

impl BenchmarkConfig {
    /// Rejects the configurations ยง3 and ยง8 name as invalid before any
    /// socket is opened.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.broker_daemon_endpoint.trim().is_empty() {
            return Err(CoreError::configuration("broker-daemon endpoint must not be empty"));
        }
        if self.peer_endpoints.is_empty() || self.peer_endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(CoreError::configuration("peer endpoints must not be empty"));
        }
        if self.broker_host.trim().is_empty() {
            return Err(CoreError::configuration("broker host must not be empty"));
        }
        if self.producers_per_host < 1 {
            return Err(CoreError::configuration("producers must be at least 1"));
        }
        if self.consumers_per_host < 1 {
            return Err(CoreError::configuration("consumers must be at least 1"));
        }
        if self.messages_per_producer < MIN_NUM_MESSAGES {
            return Err(CoreError::configuration(format!(
                "num-messages must be at least {MIN_NUM_MESSAGES}"
            )));
        }
        if self.message_size_bytes < MIN_MESSAGE_SIZE {
            return Err(CoreError::configuration(format!(
                "message-size must be at least {MIN_MESSAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn valid_config() -> BenchmarkConfig {
        BenchmarkConfig {
            broker_kind: BrokerKind::Beanstalkd,
            broker_host: "localhost".into(),
            broker_port: 11300,
            broker_daemon_endpoint: "localhost:9500".into(),
            peer_endpoints: vec!["localhost:9500".into()],
            producers_per_host: 1,
            consumers_per_host: 1,
            messages_per_producer: 100,
            message_size_bytes: 16,
            startup_sleep_seconds: 8,
            daemon_timeout_seconds: 5,
        }
    }

    #[test]
    fn broker_kind_round_trips_through_str() {
        for kind in BrokerKind::all() {
            let parsed: BrokerKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, *kind);
        }
    }

    #[test]
    fn unknown_broker_kind_is_rejected() {
        assert!("not-a-broker".parse::<BrokerKind>().is_err());
    }

    #[test]
    fn valid_configuration_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn message_size_below_minimum_is_rejected() {
        let mut config = valid_config();
        config.message_size_bytes = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn num_messages_below_minimum_is_rejected() {
        let mut config = valid_config();
        config.messages_per_producer = 99;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_producers_is_rejected() {
        let mut config = valid_config();
        config.producers_per_host = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_peer_endpoints_is_rejected() {
        let mut config = valid_config();
        config.peer_endpoints = vec![];
        assert!(config.validate().is_err());
    }

    #[test]
    fn response_not_ready_matches_literal_message() {
        let response = Response::not_ready();
        assert!(response.is_not_ready());
        assert_eq!(response.message, RESULTS_NOT_READY);
    }

    #[test]
    fn response_results_is_not_the_soft_not_ready_signal() {
        let response = Response::results(vec![], vec![]);
        assert!(!response.is_not_ready());
    }

    #[test]
    fn worker_result_error_has_zeroed_duration_and_throughput() {
        let result = WorkerResult::error("send failed");
        assert!(result.is_error());
        assert_eq!(result.duration_ms, 0.0);
        assert_eq!(result.throughput_msg_per_sec, 0.0);
    }
}
