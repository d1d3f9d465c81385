//! Flotilla client binary: parses the CLI surface, drives one benchmark run
//! and prints the aggregated summary (§3, §4.7, §6).

use clap::Parser;
use tokio_util::sync::CancellationToken;

use flotilla_client::{aggregate, ClientArgs, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ClientArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = args.into_config();
    config.validate()?;

    let cancel = CancellationToken::new();
    let interrupt_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; tearing down the fleet");
            interrupt_cancel.cancel();
        }
    });

    let orchestrator = Orchestrator::new(config);
    let results = orchestrator.run(cancel).await?;

    aggregate::print_summary(&results);
    Ok(())
}
