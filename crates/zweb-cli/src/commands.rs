//! Actions behind the `z-web` subcommands

use crate::CliConfig;
use anyhow::Context;
use clap::Subcommand;
use std::path::PathBuf;
use tracing::{info, warn};
use zweb_core::{KeyStore, SiteHandle, SiteSync, SyncConfig};

/// A `z-web` action
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch and serve the requested site
    Get {
        /// Site name
        name: String,
    },
    /// Fetch the requested site and open it in the default browser
    Browse {
        /// Site name
        name: String,
    },
    /// Publish the given directory under the given name
    Publish {
        /// Site name
        name: String,
        /// Directory to publish
        dir: PathBuf,
    },
    /// Remove the given name
    Remove {
        /// Site name
        name: String,
    },
    /// List published sites
    List,
}

/// Run one action to completion
pub async fn run(config: CliConfig, command: Command) -> anyhow::Result<()> {
    let storage = zweb_storage::connect(&config.network)
        .await
        .context("failed to set up storage")?;
    if !storage.is_persistent() {
        warn!("⚠️  Using in-memory storage - published sites will NOT persist!");
    }

    let sync = SiteSync::new(KeyStore::new(&config.key_store), storage).with_config(
        SyncConfig::default()
            .with_scratch_root(&config.scratch_root)
            .with_concurrency(config.concurrency),
    );

    match command {
        Command::Get { name } => {
            let site = sync.fetch(&name).await?;
            serve(&config, site, false).await
        }
        Command::Browse { name } => {
            let site = sync.fetch(&name).await?;
            serve(&config, site, true).await
        }
        Command::Publish { name, dir } => {
            let dir = std::env::current_dir()?.join(dir);
            let report = sync.publish(&name, &dir).await?;
            if let Some(error) = report.membership_error {
                warn!("Published {} but the network was not refreshed: {}", name, error);
            }
            info!("Published {} ({} files)", report.name, report.files);
            Ok(())
        }
        Command::Remove { name } => {
            let report = sync.remove(&name).await?;
            if !report.existed {
                info!("No site named {}", name);
            } else if report.failed > 0 {
                warn!(
                    "Removed {}; {} of {} files could not be released from the network",
                    name,
                    report.failed,
                    report.failed + report.released
                );
            } else {
                info!("Removed {}", name);
            }
            Ok(())
        }
        Command::List => {
            for site in sync.list().await {
                println!("{}\t{} files", site.name, site.files);
            }
            Ok(())
        }
    }
}

async fn serve(config: &CliConfig, mut site: SiteHandle, open_browser: bool) -> anyhow::Result<()> {
    site.start(config.port).await?;
    info!("Serving {} on port {}", site.name(), config.port);

    if open_browser {
        if let Some(url) = site.url() {
            info!("Opening in default browser");
            if let Err(e) = open::that(&url) {
                warn!("Could not open {}: {}", url, e);
            }
        }
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutting down");
    site.stop().await?;
    site.cleanup().await?;
    Ok(())
}
