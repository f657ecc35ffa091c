use std::sync::Arc;

use anyhow::Context;

use crate::clock::SystemClock;
use crate::devauth::{self, DevAuthService};

pub async fn handle(host: &str, port: u16, secret: &str) -> anyhow::Result<()> {
    let service = DevAuthService::new(secret, Arc::new(SystemClock)).context("invalid dev-auth secret")?;

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::warn!("dev-auth is a development stand-in; do not expose it");
    tracing::info!("dev-auth listening on http://{} (users: admin/admin, viewer/viewer)", bind_addr);
    axum::serve(listener, devauth::router(service)).await.context("dev-auth server error")?;
    Ok(())
}
