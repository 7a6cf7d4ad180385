mod api;
mod config;

use clap::Parser;
use config::ServerConfig;
use sealbox_core::{SqliteRegistry, Storage, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sealbox-server")]
#[command(about = "Item registry for commit-reveal polls and sealed-bid auctions")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// SQLite database holding the registry
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "sealbox_server={level},sealbox_core={level},tower_http={level}",
            level = log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ServerConfig::default();
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    config.validate()?;

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let storage = Arc::new(Storage::new(&config.database_path).await?);
    let registry = Arc::new(SqliteRegistry::new(storage, Arc::new(SystemClock)));

    tracing::info!("Registry database at {}", config.database_path.display());
    api::ApiServer::new(registry, config.socket_addr()?)
        .start()
        .await
}
