//! z-web - publish directories as encrypted sites

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zweb_cli::{config::DEFAULT_PORT, run, CliConfig, Command};
use zweb_core::KeyStore;
use zweb_storage::NetworkConfig;

#[derive(Parser, Debug)]
#[command(name = "z-web")]
#[command(about = "Publish directories as encrypted sites and serve them locally")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Key store file (defaults to ~/.z-web-store)
    #[arg(long, global = true, env = "KEY_STORE")]
    key_store: Option<PathBuf>,

    /// Network settings, e.g. "storageDriver=ipfs nodeList=http://localhost:5001"
    #[arg(long, global = true, env = "Z_WEB_NETWORK")]
    network: Option<NetworkConfig>,

    /// Port to serve fetched sites on
    #[arg(short, long, global = true, default_value_t = DEFAULT_PORT, env = "PORT")]
    port: u16,

    /// Maximum parallel uploads/downloads
    #[arg(long, global = true, default_value_t = zweb_core::sync::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Enable debug logging
    #[arg(short, long, global = true, env = "Z_WEB_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!(
                "zweb_cli={0},zweb_core={0},zweb_storage={0},tower_http={0}",
                log_level
            )
            .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cwd = std::env::current_dir()?;
    let config = CliConfig {
        key_store: args
            .key_store
            .map(|path| cwd.join(path))
            .unwrap_or_else(KeyStore::default_path),
        network: args.network.unwrap_or_default(),
        port: args.port,
        concurrency: args.concurrency,
        ..Default::default()
    };

    tracing::debug!("Key store: {}", config.key_store.display());

    run(config, args.command).await
}
