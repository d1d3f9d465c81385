//! Flotilla orchestrator library: CLI configuration, the run lifecycle, and
//! the terminal summary printed at the end of a run (§3, §4.7, §6).

pub mod aggregate;
pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::ClientArgs;
pub use error::{ClientError, ClientResult};
pub use orchestrator::Orchestrator;
