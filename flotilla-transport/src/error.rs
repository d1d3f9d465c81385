//! Transport-layer error taxonomy (ยง7).

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("{operation} timed out after {deadline_secs}s")]
    Timeout {
        operation: &'static str,
        deadline_secs: u64,
    },

    #[error("peer closed the connection")]
    Closed,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

impl TransportError {
    pub fn connect(address: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Connect {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn timeout(operation: &'static str, deadline_secs: u64) -> Self {
        Self::Timeout {
            operation,
            deadline_secs,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "transport.connect",
            Self::Timeout { .. } => "transport.timeout",
            Self::Closed => "transport.closed",
            Self::Io(_) => "transport.io",
            Self::Encode(_) => "transport.encode",
            Self::Decode(_) => "transport.decode",
        }
    }

    /// Whether retrying the same operation might plausibly succeed, as
    /// opposed to a condition that will not change without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Io(_))
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
