use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dbsync_core::{RemoteId, SyncTarget};

use crate::credentials::{ServiceAccountKey, DEFAULT_TOKEN_URL};
use crate::gdrive::DEFAULT_API_BASE;
use crate::token_manager::TokenSource;

/// Configuration for the dbsync-gdrive command.
#[derive(Parser, Debug, Clone)]
#[command(name = "dbsync-gdrive")]
#[command(about = "Keep a local SQLite database file in sync with a Google Drive file")]
pub struct Config {
    /// Local database file
    #[arg(long, default_value = "tracking_expenses_app.db", env = "DBSYNC_DB_PATH")]
    pub db_path: PathBuf,

    /// Google Drive file ID of the database. Unset means the next publish creates it.
    #[arg(long, env = "DBSYNC_FILE_ID")]
    pub file_id: Option<String>,

    /// Name given to the Drive file on creation (defaults to the database file name)
    #[arg(long, env = "DBSYNC_REMOTE_NAME")]
    pub remote_name: Option<String>,

    /// Service-account key file
    #[arg(
        long,
        default_value = "credentials.json",
        env = "GOOGLE_APPLICATION_CREDENTIALS"
    )]
    pub credentials: PathBuf,

    /// Google OAuth2 Client ID (refresh-token auth)
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    /// Google OAuth2 Client Secret (refresh-token auth)
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    /// Google OAuth2 refresh token; when set, used instead of the service account
    #[arg(long, env = "GOOGLE_REFRESH_TOKEN", hide_env_values = true)]
    pub google_refresh_token: Option<String>,

    /// Base URL of the Google APIs
    #[arg(long, default_value = DEFAULT_API_BASE, env = "GDRIVE_API_BASE")]
    pub api_base: String,

    /// OAuth2 token endpoint for refresh-token auth
    #[arg(long, default_value = DEFAULT_TOKEN_URL, env = "GOOGLE_TOKEN_URL")]
    pub token_url: String,

    /// Per-request HTTP timeout, transfer included (seconds)
    #[arg(long, default_value = "300", env = "GDRIVE_HTTP_TIMEOUT")]
    pub http_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Download the database if it is not present locally
    Ensure,
    /// List files visible in Google Drive
    List {
        /// Maximum number of files to show
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    /// Record a purchase in the local database
    Add {
        #[arg(long)]
        item: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        amount: f64,
    },
    /// Show all purchases in the local database
    Purchases,
    /// Upload the database: update the configured file, or create one if no file ID is set
    Publish,
}

impl Config {
    /// The configured remote identifier, if any. Blank counts as unset.
    pub fn remote_id(&self) -> Option<RemoteId> {
        self.file_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(RemoteId::from)
    }

    pub fn sync_target(&self) -> SyncTarget {
        match &self.remote_name {
            Some(name) => SyncTarget::new(self.db_path.clone(), name.clone()),
            None => SyncTarget::from_path(self.db_path.clone()),
        }
    }

    /// Refresh-token auth when a refresh token is configured, else the service-account key.
    pub fn token_source(&self) -> anyhow::Result<TokenSource> {
        if let Some(refresh_token) = &self.google_refresh_token {
            let client_id = self
                .google_client_id
                .clone()
                .context("--google-client-id is required with --google-refresh-token")?;
            let client_secret = self
                .google_client_secret
                .clone()
                .context("--google-client-secret is required with --google-refresh-token")?;

            return Ok(TokenSource::RefreshToken {
                client_id,
                client_secret,
                refresh_token: refresh_token.clone(),
                token_url: self.token_url.clone(),
            });
        }

        let key = ServiceAccountKey::from_file(&self.credentials).with_context(|| {
            format!(
                "Failed to load service account credentials from {}",
                self.credentials.display()
            )
        })?;
        Ok(TokenSource::ServiceAccount(key))
    }
}
