use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::app::{router, AppState};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::session::{MemoryTokenStore, RedisTokenStore, TokenStore};

const PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub async fn handle(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env();
    if let Some(port) = port {
        config.server.port = port;
    }
    tracing::info!("Starting admin portal in {:?} mode", config.environment);
    tracing::info!(
        "Backends: auth={} posts={} assets={}",
        config.backends.auth_url,
        config.backends.posts_url,
        config.backends.assets_url
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = token_store(&config, clock.clone()).await?;

    let bind_addr = config.bind_addr();
    let state = AppState::new(config, store, clock).context("failed to initialise application state")?;

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Admin portal listening on http://{}", bind_addr);
    axum::serve(listener, router(state)).await.context("server error")?;
    Ok(())
}

/// Redis when `REDIS_URL` is set, otherwise process memory with a
/// background purge of dead entries.
async fn token_store(config: &AppConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn TokenStore>> {
    if config.store.redis_url.is_some() {
        let store = RedisTokenStore::connect(&config.store, clock)
            .await
            .context("failed to connect to the Redis token store")?;
        return Ok(Arc::new(store));
    }

    if config.is_production() {
        tracing::warn!("REDIS_URL not set; sessions live in memory and end on restart");
    }
    let store = Arc::new(MemoryTokenStore::new());
    store.spawn_purge(clock, PURGE_INTERVAL);
    Ok(store)
}
