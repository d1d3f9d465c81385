//! Orchestrator error taxonomy (§7).

use thiserror::Error;

use flotilla_core::CoreError;
use flotilla_transport::TransportError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Configuration(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A daemon reported `{success: false}` for a request other than the
    /// soft "not ready" signal, which is handled internally by retrying.
    #[error("daemon at {endpoint} reported a failure: {message}")]
    Daemon { endpoint: String, message: String },

    /// A ctrl-c interrupt arrived while a run was in flight (§4.7); the
    /// orchestrator still performs teardown before surfacing this.
    #[error("run interrupted")]
    Interrupted,
}

impl ClientError {
    pub fn daemon(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Daemon {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn interrupted() -> Self {
        Self::Interrupted
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "client.configuration",
            Self::Transport(e) => e.category(),
            Self::Daemon { .. } => "client.daemon",
            Self::Interrupted => "client.interrupted",
        }
    }

    /// Whether the orchestrator might plausibly succeed if the whole run
    /// were retried unchanged, as opposed to a condition requiring the
    /// operator to change something first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::Configuration(_) | Self::Daemon { .. } | Self::Interrupted => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
