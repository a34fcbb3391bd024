use anyhow::Result;
use std::sync::Arc;
use tessie_bridge::api::HttpApiFactory;
use tessie_bridge::entries::{ConfigEntry, EntryStore};
use tessie_bridge::logging::init_logging;
use tessie_bridge::registry::IntegrationRegistry;
use tessie_bridge::web::{self, AppState};
use tessie_bridge::{Config, config_flow};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Logging init failed: {}", e))?;

    info!("Tessie Bridge {} starting up", env!("APP_VERSION"));

    let mut store = EntryStore::open(&config.entries_file)
        .map_err(|e| anyhow::anyhow!("Failed to open entries file: {}", e))?;

    // Seed an entry from the config file token on first start
    let token = config.tessie.access_token.trim();
    if store.is_empty() && !token.is_empty() {
        info!("No entries stored; creating one from the configured access token");
        store.add(ConfigEntry::new(config_flow::ENTRY_TITLE, token))?;
    }

    let factory = Arc::new(HttpApiFactory::from_config(&config.tessie)?);
    let registry = Arc::new(IntegrationRegistry::new(factory, config.poll.clone()));

    for entry in store.list().to_vec() {
        let entry_id = entry.entry_id.clone();
        match registry.setup_entry(entry).await {
            Ok(()) => info!("Entry {} ready", entry_id),
            // Not ready; the entry stays stored and can be retried over the API
            Err(e) => warn!("Entry {} not ready: {}", entry_id, e),
        }
    }

    let state = AppState {
        registry: Arc::clone(&registry),
        entries: Arc::new(Mutex::new(store)),
        config: Arc::new(config),
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown requested");
    };

    let served = web::serve(state, shutdown).await;
    registry.unload_all().await;

    match served {
        Ok(()) => {
            info!("Tessie Bridge stopped");
            Ok(())
        }
        Err(e) => {
            error!("Web server failed: {}", e);
            Err(e)
        }
    }
}
