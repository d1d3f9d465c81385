//! Daemon dispatch error taxonomy (ยง4.2, ยง7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaemonError {
    /// Display text is the literal wire message §8 scenario 4 pins: a
    /// second `start` without an intervening `stop` must echo this exact
    /// string back to the client.
    #[error("Broker already running")]
    BrokerAlreadyRunning,

    #[error("No broker running")]
    NoBrokerRunning,

    #[error(transparent)]
    Broker(#[from] flotilla_peer::BrokerError),

    #[error(transparent)]
    Peer(#[from] flotilla_peer::PeerError),

    #[error(transparent)]
    Core(#[from] flotilla_core::error::CoreError),
}

impl DaemonError {
    pub fn category(&self) -> &'static str {
        match self {
            Self::BrokerAlreadyRunning => "daemon.broker_already_running",
            Self::NoBrokerRunning => "daemon.no_broker_running",
            Self::Broker(e) => e.category(),
            Self::Peer(e) => e.category(),
            Self::Core(_) => "daemon.core",
        }
    }
}

pub type DaemonResult<T> = Result<T, DaemonError>;
