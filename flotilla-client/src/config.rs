//! Client CLI surface (§6): every flag maps onto one [`BenchmarkConfig`]
//! field, with the defaults §6 names encoded as `clap` defaults.

use clap::Parser;

use flotilla_core::{
    BenchmarkConfig, BrokerKind, DEFAULT_DAEMON_TIMEOUT_SECS, DEFAULT_MESSAGE_SIZE,
    DEFAULT_NUM_MESSAGES, DEFAULT_STARTUP_SLEEP_SECS,
};

/// Flotilla orchestrator: drives one broker-daemon and a fleet of
/// peer-daemons through a benchmark run.
#[derive(Parser, Debug)]
#[command(name = "flotilla-client", version, about)]
pub struct ClientArgs {
    /// Broker kind to provision and benchmark.
    #[arg(long)]
    pub broker: BrokerKind,

    /// Host the broker container will bind to and advertise to workers.
    #[arg(long, visible_alias = "docker-host")]
    pub broker_host: String,

    /// Port the broker container will listen on. No spec-mandated default;
    /// left required so a misconfigured run fails fast at argument parsing.
    #[arg(long)]
    pub broker_port: u16,

    /// Broker-daemon endpoint (`host:port`).
    #[arg(long, default_value = "localhost:9500")]
    pub host: String,

    /// Comma-separated peer-daemon endpoints (`host:port`, ...).
    #[arg(long, default_value = "localhost:9500")]
    pub peer_hosts: String,

    /// Producers spawned per peer-daemon.
    #[arg(long, default_value_t = 1)]
    pub producers: u32,

    /// Consumers spawned per peer-daemon.
    #[arg(long, default_value_t = 1)]
    pub consumers: u32,

    /// Messages each producer sends.
    #[arg(long, default_value_t = DEFAULT_NUM_MESSAGES)]
    pub num_messages: u64,

    /// Message size in bytes (minimum 9, to hold the varint timestamp).
    #[arg(long, default_value_t = DEFAULT_MESSAGE_SIZE)]
    pub message_size: usize,

    /// Seconds to sleep after starting the broker before creating workers.
    #[arg(long, default_value_t = DEFAULT_STARTUP_SLEEP_SECS)]
    pub startup_sleep: u64,

    /// Send/receive deadline applied to every daemon connection, in seconds.
    #[arg(long, default_value_t = DEFAULT_DAEMON_TIMEOUT_SECS)]
    pub daemon_timeout: u64,

    /// Tracing filter directive (e.g. `info`, `debug`, `flotilla_client=trace`).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl ClientArgs {
    /// Builds the immutable-once-a-run-starts configuration this binary
    /// hands to the orchestrator. Does not validate; call
    /// [`BenchmarkConfig::validate`] on the result before dialing anything.
    pub fn into_config(self) -> BenchmarkConfig {
        let peer_endpoints = self
            .peer_hosts
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        BenchmarkConfig {
            broker_kind: self.broker,
            broker_host: self.broker_host,
            broker_port: self.broker_port,
            broker_daemon_endpoint: self.host,
            peer_endpoints,
            producers_per_host: self.producers,
            consumers_per_host: self.consumers,
            messages_per_producer: self.num_messages,
            message_size_bytes: self.message_size,
            startup_sleep_seconds: self.startup_sleep,
            daemon_timeout_seconds: self.daemon_timeout,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn peer_hosts_are_split_and_trimmed() {
        let args = ClientArgs {
            broker: BrokerKind::Kafka,
            broker_host: "localhost".into(),
            broker_port: 9092,
            host: "localhost:9500".into(),
            peer_hosts: " localhost:9500 , localhost:9501".into(),
            producers: 1,
            consumers: 1,
            num_messages: 100,
            message_size: 16,
            startup_sleep: 1,
            daemon_timeout: 1,
            log_level: "info".into(),
        };
        let config = args.into_config();
        assert_eq!(config.peer_endpoints, vec!["localhost:9500", "localhost:9501"]);
    }
}
