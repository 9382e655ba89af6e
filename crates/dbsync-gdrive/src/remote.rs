//! Google Drive `RemoteObjectClient` implementation.
//!
//! Resolves the OAuth token via TokenManager on every call and maps Drive
//! responses onto `RemoteError` (404 → `NotFound`, anything else → `Transient`).

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dbsync_core::{RemoteEntry, RemoteError, RemoteId, RemoteObjectClient};
use tokio::fs;
use tracing::{debug, instrument};

use crate::gdrive::GDriveClient;
use crate::token_manager::TokenManager;

/// Largest page the Drive API accepts for `files.list`.
const MAX_PAGE_SIZE: u32 = 1000;

/// Google Drive backed remote store.
pub struct GDriveRemote {
    client: Arc<GDriveClient>,
    token_manager: Arc<TokenManager>,
}

impl GDriveRemote {
    pub fn new(client: Arc<GDriveClient>, token_manager: Arc<TokenManager>) -> Self {
        Self {
            client,
            token_manager,
        }
    }

    async fn token(&self) -> Result<String, RemoteError> {
        self.token_manager
            .get_valid_token()
            .await
            .map_err(|e| RemoteError::Transient(format!("Token error: {}", e)))
    }

    /// Local filesystem failures stay `LocalIo`; everything else is transient.
    fn classify(context: &str, e: anyhow::Error) -> RemoteError {
        match e.downcast_ref::<std::io::Error>() {
            Some(io) => RemoteError::LocalIo(format!("{}: {}", context, io)),
            None => RemoteError::Transient(format!("{}: {}", context, e)),
        }
    }
}

#[async_trait]
impl RemoteObjectClient for GDriveRemote {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, id: &RemoteId, destination: &Path) -> Result<(), RemoteError> {
        let token = self.token().await?;

        let written = self
            .client
            .download_to(&token, id.as_str(), destination)
            .await
            .map_err(|e| Self::classify("Google Drive download failed", e))?
            .ok_or_else(|| {
                RemoteError::NotFound(format!("Google Drive file not found: {}", id))
            })?;

        debug!(
            "Fetched {} bytes from Google Drive file {} into {}",
            written,
            id,
            destination.display()
        );
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn exists(&self, id: &RemoteId) -> Result<bool, RemoteError> {
        let token = self.token().await?;

        let metadata = self
            .client
            .get_metadata(&token, id.as_str())
            .await
            .map_err(|e| Self::classify("Google Drive metadata lookup failed", e))?;

        if let Some(m) = &metadata {
            debug!(
                "Google Drive file {} exists (name={:?}, size={:?}, modified={:?})",
                m.id, m.name, m.size, m.modified_time
            );
        }
        Ok(metadata.is_some())
    }

    #[instrument(skip(self), level = "debug")]
    async fn create(&self, source: &Path, name: &str) -> Result<RemoteId, RemoteError> {
        let data = fs::read(source).await?;
        let token = self.token().await?;

        let id = self
            .client
            .create_file(&token, name, &data)
            .await
            .map_err(|e| Self::classify("Google Drive create failed", e))?;

        debug!("Created Google Drive file {} from {}", id, source.display());
        Ok(RemoteId::from(id))
    }

    #[instrument(skip(self), level = "debug")]
    async fn update(&self, id: &RemoteId, source: &Path) -> Result<RemoteId, RemoteError> {
        let data = fs::read(source).await?;
        let token = self.token().await?;

        let updated = self
            .client
            .update_file(&token, id.as_str(), &data)
            .await
            .map_err(|e| Self::classify("Google Drive upload failed", e))?
            .ok_or_else(|| {
                RemoteError::NotFound(format!("Google Drive file not found: {}", id))
            })?;

        Ok(RemoteId::from(updated))
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(&self, limit: u32) -> Result<Vec<RemoteEntry>, RemoteError> {
        let token = self.token().await?;
        let mut entries: Vec<RemoteEntry> = Vec::new();
        let mut page_token: Option<String> = None;

        while (entries.len() as u32) < limit {
            let page_size = (limit - entries.len() as u32).min(MAX_PAGE_SIZE);
            let (files, next) = self
                .client
                .list_files(&token, page_token.as_deref(), page_size)
                .await
                .map_err(|e| Self::classify("Google Drive list failed", e))?;

            entries.extend(files.into_iter().map(|f| RemoteEntry {
                id: RemoteId::from(f.id),
                name: f.name,
            }));

            match next {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        entries.truncate(limit as usize);
        debug!("Listed {} Google Drive files", entries.len());
        Ok(entries)
    }
}
