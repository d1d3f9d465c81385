//! Structured error types shared across the Flotilla workspace.

use thiserror::Error;

/// Errors that can occur while validating or operating on the core data model.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("unknown broker kind: {kind}")]
    UnknownBrokerKind { kind: String },

    #[error("decode failed: {reason}")]
    Decode { reason: String },
}

impl CoreError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn unknown_broker_kind(kind: impl Into<String>) -> Self {
        Self::UnknownBrokerKind { kind: kind.into() }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Coarse category for logging and metrics, independent of the exact variant.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::UnknownBrokerKind { .. } => "configuration",
            Self::Decode { .. } => "decode",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
