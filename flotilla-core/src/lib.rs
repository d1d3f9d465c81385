//! Shared data model, error types, latency aggregation and timestamp
//! encoding for the Flotilla benchmarking harness.
//!
//! This crate has no network or process dependencies; it is linked into
//! the daemon, the client and every peer adapter so they agree on the
//! wire-visible shapes without duplicating them.

pub mod error;
pub mod latency;
pub mod model;
pub mod varint;

pub use error::{CoreError, CoreResult};
pub use latency::LatencyHistogram;
pub use model::{
    BenchmarkConfig, BrokerKind, LatencyStats, Operation, Request, Response, ResultContainer,
    WorkerResult, DEFAULT_DAEMON_PORT, DEFAULT_DAEMON_TIMEOUT_SECS, DEFAULT_MESSAGE_SIZE,
    DEFAULT_NUM_MESSAGES, DEFAULT_STARTUP_SLEEP_SECS, MIN_MESSAGE_SIZE, MIN_NUM_MESSAGES,
    RESULTS_NOT_READY,
};
