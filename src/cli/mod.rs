pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "admin-portal")]
#[command(about = "Admin portal for posts, assets and users")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the portal web server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on, overriding PORTAL_PORT/PORT")]
        port: Option<u16>,
    },

    #[cfg(feature = "dev-auth")]
    #[command(about = "Run a development stand-in for the auth service")]
    DevAuth {
        #[arg(long, default_value = "127.0.0.1", help = "Address to bind")]
        host: String,

        #[arg(long, default_value_t = 4000, help = "Port to listen on")]
        port: u16,

        #[arg(long, default_value = "dev-auth-secret", help = "HMAC secret for issued tokens")]
        secret: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::handle(port).await,
        #[cfg(feature = "dev-auth")]
        Commands::DevAuth { host, port, secret } => commands::dev_auth::handle(&host, port, &secret).await,
    }
}
