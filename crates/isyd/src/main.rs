//! isyd entry point: config, logging, engine wiring, HTTP server.

use anyhow::{Context, Result};
use isy_common::{Config, GeminiTransport};
use isyd::agent::CommandEngine;
use isyd::server::{self, AppState};
use isyd::tools::{JsonStore, ToolRegistry, TutorOps};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(
        "[BOOT] ISY tutor daemon v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load();
    info!(
        "[BOOT] Config loaded (model: {}, data dir: {})",
        config.llm.model,
        config.data.dir.display()
    );
    if config.llm.resolve_api_key().is_none() {
        warn!("[BOOT] No API key set; commands will fail until llm.api_key or ISY_API_KEY is configured");
    }

    let transport =
        GeminiTransport::new(&config.llm).context("Failed to build the LLM transport")?;
    let store = JsonStore::new(&config.data.dir);
    let engine = CommandEngine::new(
        Arc::new(transport),
        ToolRegistry::new(TutorOps::new(store)),
        config.policy.clone(),
        &config.agent,
    );

    info!("[READY] isyd operational");

    server::run(AppState::new(engine), &config.server.bind_addr)
        .await
        .context("HTTP server error")?;

    Ok(())
}
