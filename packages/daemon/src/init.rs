//! Engine initialization for the daemon.

use std::error::Error;
use std::path::Path;

use actors::{Capabilities, Engine, EngineConfig, HttpFetcher, SelectorExtractor, WebhookNotifier};
use watch_core::validation::{validate_new_target, validate_url};
use watch_core::{NewTarget, ScrapeOptions};

use crate::analyzer::PageSummaryAnalyzer;

const TARGETS_FILE: &str = "SITEWATCH_TARGETS_FILE";

/// Build the engine from the environment and register configured targets.
pub async fn init_engine() -> Result<Engine, Box<dyn Error>> {
    tracing::info!("Initializing site watch engine...");

    let config = EngineConfig::from_env()?;
    let capabilities = Capabilities::new(
        HttpFetcher::new(&config.user_agent)?,
        SelectorExtractor,
        PageSummaryAnalyzer,
        WebhookNotifier::new(config.webhook_timeout, &config.user_agent)?,
    );

    let engine = Engine::start(config, capabilities).await?;

    if let Ok(path) = std::env::var(TARGETS_FILE) {
        let registered = load_targets(&engine, Path::new(&path)).await?;
        tracing::info!("Registered {} targets from {}", registered, path);
    }

    tracing::info!("Site watch engine initialized");
    Ok(engine)
}

/// Register every valid target in a JSON array file. Invalid entries are
/// skipped with a warning.
async fn load_targets(engine: &Engine, path: &Path) -> Result<usize, Box<dyn Error>> {
    let raw = tokio::fs::read_to_string(path).await?;
    let targets: Vec<NewTarget> = serde_json::from_str(&raw)?;

    let mut registered = 0;
    for target in targets {
        let name = target.name.clone();
        let target = match validate_new_target(target) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Skipping target '{}': {}", name, e);
                continue;
            }
        };
        match engine.create_target(target).await {
            Ok(id) => {
                tracing::info!("Watching '{}' as {}", name, id);
                registered += 1;
            }
            Err(e) => tracing::warn!("Failed to register target '{}': {}", name, e),
        }
    }
    Ok(registered)
}

/// Submit one-shot scrape jobs for URLs given on the command line.
pub async fn submit_urls(engine: &Engine, urls: impl Iterator<Item = String>) {
    for raw in urls {
        match validate_url(&raw) {
            Ok(url) => match engine
                .submit_job(url.to_string(), ScrapeOptions::default(), None)
                .await
            {
                Ok(id) => tracing::info!("Submitted job {} for {}", id, url),
                Err(e) => tracing::warn!("Failed to submit {}: {}", url, e),
            },
            Err(e) => tracing::warn!("Ignoring argument '{}': {}", raw, e),
        }
    }
}
