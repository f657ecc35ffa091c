use clap::Parser;
use tracing_subscriber::EnvFilter;

use admin_portal::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so SESSION_SECRET, AUTH_API, etc. are picked up
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("admin_portal=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = admin_portal::cli::run(cli).await {
        tracing::error!("{:#}", e);
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }

    Ok(())
}
