mod config;
mod credentials;
mod gdrive;
mod remote;
mod token_manager;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dbsync_core::{EnsureOutcome, RemoteId, RemoteObjectClient, SyncManager, SyncOutcome};
use dbsync_local::{FsPresence, PurchaseStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Command, Config};
use gdrive::GDriveClient;
use remote::GDriveRemote;
use token_manager::TokenManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging (stderr, so command output stays on stdout)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    info!("Starting dbsync-gdrive");
    info!("  Database: {}", config.db_path.display());
    match config.remote_id() {
        Some(id) => info!("  Drive file: {}", id),
        None => info!("  Drive file: none configured"),
    }

    // Token manager (service account or refresh token)
    let token_manager = Arc::new(TokenManager::new(config.token_source()?));

    // Google Drive API client (stateless, tokens provided per-call)
    let gdrive_client = Arc::new(GDriveClient::new(
        &config.api_base,
        Duration::from_secs(config.http_timeout_secs),
    )?);

    let remote: Arc<dyn RemoteObjectClient> =
        Arc::new(GDriveRemote::new(gdrive_client, token_manager));
    let manager = SyncManager::new(remote, Arc::new(FsPresence::new()), config.sync_target());

    let remote_id = config.remote_id();
    run(&manager, remote_id.as_ref(), config.command).await
}

async fn run(
    manager: &SyncManager,
    remote_id: Option<&RemoteId>,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::List { limit } => {
            let entries = manager.list(limit).await?;
            if entries.is_empty() {
                println!("No files found.");
            } else {
                println!("Files:");
                for entry in entries {
                    println!("{} ({})", entry.name, entry.id);
                }
            }
        }
        Command::Ensure => {
            let path = manager.target().path().display();
            match ensure_local(manager, remote_id).await? {
                EnsureOutcome::Present => println!("Local database already present at {}", path),
                EnsureOutcome::Fetched => println!("Downloaded database to {}", path),
                EnsureOutcome::Unbound => println!(
                    "No local database and no file ID configured; a new database will be created at {}",
                    path
                ),
            }
        }
        Command::Add {
            item,
            category,
            amount,
        } => {
            ensure_local(manager, remote_id).await?;
            let store = PurchaseStore::open(manager.target().path())?;
            let id = store.add_purchase(&item, &category, amount)?;
            store.close()?;
            println!("Purchase added! (id {})", id);
        }
        Command::Purchases => {
            ensure_local(manager, remote_id).await?;
            let store = PurchaseStore::open(manager.target().path())?;
            let purchases = store.list_purchases()?;
            store.close()?;

            if purchases.is_empty() {
                println!("No purchases recorded.");
            }
            for p in purchases {
                println!(
                    "{}\t{}\t{}\t{:.2}",
                    p.id, p.item_name, p.category, p.amount
                );
            }
        }
        Command::Publish => {
            if ensure_local(manager, remote_id).await? == EnsureOutcome::Unbound {
                // First run on this machine: publish an empty, initialized store.
                PurchaseStore::open(manager.target().path())?.close()?;
            }
            let outcome = manager
                .publish(remote_id)
                .await
                .context("Failed to upload or update the database")?;

            match &outcome {
                SyncOutcome::Created(id) => {
                    println!("Database uploaded successfully! File ID: {}", id);
                    println!("Set DBSYNC_FILE_ID={} so later publishes update this file", id);
                }
                SyncOutcome::Updated(id) => {
                    println!("Database updated successfully! File ID: {}", id);
                }
            }
        }
    }

    Ok(())
}

/// Startup step: the local store is only opened once this returns.
async fn ensure_local(
    manager: &SyncManager,
    remote_id: Option<&RemoteId>,
) -> anyhow::Result<EnsureOutcome> {
    let outcome = manager
        .ensure(remote_id)
        .await
        .context("Failed to materialize the local database")?;
    info!("Local database: {:?}", outcome);
    Ok(outcome)
}
