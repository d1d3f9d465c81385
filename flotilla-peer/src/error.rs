//! Adapter and broker-lifecycle error taxonomy (ยง7).

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PeerError {
    #[error("broker kind '{kind}' has no adapter implementation in this workspace")]
    NotImplemented { kind: String },

    #[error("failed to connect to broker at {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("failed to subscribe: {reason}")]
    Subscribe { reason: String },

    #[error("send failed: {reason}")]
    Send { reason: String },

    #[error("receive failed: {reason}")]
    Recv { reason: String },
}

impl PeerError {
    pub fn not_implemented(kind: impl Into<String>) -> Self {
        Self::NotImplemented { kind: kind.into() }
    }

    pub fn connect(address: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Connect {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn subscribe(reason: impl std::fmt::Display) -> Self {
        Self::Subscribe {
            reason: reason.to_string(),
        }
    }

    pub fn send(reason: impl std::fmt::Display) -> Self {
        Self::Send {
            reason: reason.to_string(),
        }
    }

    pub fn recv(reason: impl std::fmt::Display) -> Self {
        Self::Recv {
            reason: reason.to_string(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::NotImplemented { .. } => "adapter.not_implemented",
            Self::Connect { .. } => "adapter.connect",
            Self::Subscribe { .. } => "adapter.subscribe",
            Self::Send { .. } => "adapter.send",
            Self::Recv { .. } => "adapter.recv",
        }
    }
}

pub type PeerResult<T> = Result<T, PeerError>;

/// Broker-lifecycle error taxonomy (ยง4.6, ยง7).
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("container runtime not available: {reason}")]
    RuntimeNotAvailable { reason: String },

    /// Display text is the literal wire message §8 scenario 6 pins.
    #[error("Port {port} is reserved")]
    PortReserved { port: u16 },

    #[error("failed to start broker: {reason}")]
    StartFailed { reason: String },

    #[error("failed to stop broker: {reason}")]
    StopFailed { reason: String },
}

impl BrokerError {
    pub fn runtime_not_available(reason: impl std::fmt::Display) -> Self {
        Self::RuntimeNotAvailable {
            reason: reason.to_string(),
        }
    }

    pub fn port_reserved(port: u16) -> Self {
        Self::PortReserved { port }
    }

    pub fn start_failed(reason: impl std::fmt::Display) -> Self {
        Self::StartFailed {
            reason: reason.to_string(),
        }
    }

    pub fn stop_failed(reason: impl std::fmt::Display) -> Self {
        Self::StopFailed {
            reason: reason.to_string(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::RuntimeNotAvailable { .. } => "broker.runtime_not_available",
            Self::PortReserved { .. } => "broker.port_reserved",
            Self::StartFailed { .. } => "broker.start_failed",
            Self::StopFailed { .. } => "broker.stop_failed",
        }
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
