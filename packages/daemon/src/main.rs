//! `sitewatch` daemon: runs the job queue and monitoring scheduler until
//! interrupted.
//!
//! Configuration comes from `SITEWATCH_*` environment variables. Targets to
//! watch can be listed in the JSON file named by `SITEWATCH_TARGETS_FILE`;
//! URLs passed as arguments are scraped once.

mod analyzer;
mod init;

use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let engine = init::init_engine().await?;

    let mut events = engine.subscribe();
    let event_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::info!("{}", event.description()),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log fell behind; skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    init::submit_urls(&engine, std::env::args().skip(1)).await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    engine.shutdown().await;
    event_log.abort();
    Ok(())
}
