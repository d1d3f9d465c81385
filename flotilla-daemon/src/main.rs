//! Flotilla daemon binary: binds the wire-protocol listening port and
//! serves one dispatcher for as long as the process runs (§4.2, §6).

use std::time::Duration;

use clap::Parser;

use flotilla_core::{Response, DEFAULT_DAEMON_PORT};
use flotilla_daemon::Daemon;
use flotilla_transport::{Connection, Listener, TransportError};

/// Per-host Flotilla benchmark daemon.
#[derive(Parser, Debug)]
#[command(name = "flotilla-daemon", version, about)]
struct DaemonArgs {
    /// Port to listen on for client connections.
    #[arg(long, default_value_t = DEFAULT_DAEMON_PORT)]
    port: u16,

    /// Send/receive deadline applied to every connection, in seconds.
    #[arg(long, default_value_t = flotilla_core::DEFAULT_DAEMON_TIMEOUT_SECS)]
    daemon_timeout: u64,

    /// Google Cloud project id, required only when serving the `pubsub` broker kind.
    #[arg(long)]
    pubsub_project_id: Option<String>,

    /// Path to a Cloud Pub/Sub service account JSON key, required only when
    /// serving the `pubsub` broker kind.
    #[arg(long)]
    pubsub_credentials_path: Option<String>,

    /// Tracing filter directive (e.g. `info`, `debug`, `flotilla_daemon=trace`).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = DaemonArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let address = format!("0.0.0.0:{}", args.port);
    let deadline = Duration::from_secs(args.daemon_timeout);
    let listener = match Listener::bind(&address, deadline).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %address, "failed to bind the listening port");
            std::process::exit(1);
        }
    };
    tracing::info!(%address, "daemon listening");

    let mut daemon = Daemon::new();
    loop {
        let connection = match listener.accept().await {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept a connection");
                continue;
            }
        };
        serve_connection(&mut daemon, connection).await;
    }
}

/// Serves every request on one connection sequentially, matching the
/// protocol's one-outstanding-request-per-connection rule (§4.1). A
/// response-serialization failure is the one condition this loop treats as
/// unrecoverable: everything else is logged and the daemon moves on to its
/// next accepted connection.
async fn serve_connection(daemon: &mut Daemon, mut connection: Connection) {
    loop {
        let request = match connection.recv_request().await {
            Ok(request) => request,
            Err(TransportError::Closed) => return,
            Err(TransportError::Decode(e)) => {
                tracing::warn!(error = %e, "invalid request frame");
                let response = Response::failure(format!("Invalid request: {e}"));
                if let Err(e) = connection.send_response(&response).await {
                    tracing::warn!(error = %e, "failed to send the invalid-request reply");
                    return;
                }
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "connection error while awaiting a request");
                return;
            }
        };

        let response = daemon.handle(request).await;

        if let Err(e) = connection.send_response(&response).await {
            match e {
                TransportError::Encode(_) => {
                    tracing::error!(error = %e, "failed to serialize a response");
                    std::process::exit(1);
                }
                _ => {
                    tracing::warn!(error = %e, "failed to send a response");
                    return;
                }
            }
        }
    }
}
