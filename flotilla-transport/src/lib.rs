//! Length-delimited JSON request/reply transport between the client and
//! its fleet of daemons (ยง4.1).
//!
//! A single [`connection::Connection`] type is reused on both sides of the
//! wire: the client drives it with `request`, a daemon's connection handler
//! drives it with `recv_request`/`send_response`.

pub mod connection;
pub mod error;
pub mod listener;

pub use connection::Connection;
pub use error::{TransportError, TransportResult};
pub use listener::Listener;
