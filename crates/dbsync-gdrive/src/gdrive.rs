//! Google Drive API v3 client wrapper.
//!
//! Token is passed per-call by the caller (TokenManager resolves it).
//! `None` results mean the API answered 404.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

/// MIME type attached to uploaded database files.
pub const SQLITE_MIME_TYPE: &str = "application/x-sqlite3";

/// Metadata returned by Google Drive API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

/// One file from a listing page.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

/// Google Drive API client (stateless, token provided per-call).
pub struct GDriveClient {
    http: Client,
    api_base: String,
}

impl GDriveClient {
    pub fn new(api_base: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Get file metadata from Google Drive.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn get_metadata(
        &self,
        token: &str,
        file_id: &str,
    ) -> anyhow::Result<Option<FileMetadata>> {
        let url = format!(
            "{}/drive/v3/files/{}?fields=id,name,size,modifiedTime",
            self.api_base, file_id
        );

        let resp = self.http.get(&url).bearer_auth(token).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Drive API error {}: {}", status, body);
        }

        let metadata: FileMetadata = resp.json().await?;
        debug!("Got metadata for file {}", file_id);
        Ok(Some(metadata))
    }

    /// Download file content chunk by chunk into `destination`.
    ///
    /// Bytes land in a uniquely named `.part` sibling first and are renamed
    /// onto `destination` only once the body is complete, so concurrent
    /// downloads of the same file never share a temp file.
    /// Returns the number of bytes written.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn download_to(
        &self,
        token: &str,
        file_id: &str,
        destination: &Path,
    ) -> anyhow::Result<Option<u64>> {
        let url = format!("{}/drive/v3/files/{}?alt=media", self.api_base, file_id);

        let mut resp = self.http.get(&url).bearer_auth(token).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Drive download error {}: {}", status, body);
        }

        let partial = partial_path(destination);
        let transfer = async {
            let mut file = fs::File::create(&partial).await?;
            let mut written = 0u64;
            while let Some(chunk) = resp.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.sync_all().await?;
            drop(file);
            fs::rename(&partial, destination).await?;
            anyhow::Ok(written)
        }
        .await;

        match transfer {
            Ok(written) => {
                debug!("Downloaded {} bytes for file {}", written, file_id);
                Ok(Some(written))
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&partial).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove {}: {}", partial.display(), rm);
                    }
                }
                Err(e)
            }
        }
    }

    /// Create a new file with content in a single multipart request.
    #[instrument(skip(self, token, data), level = "debug", fields(data_len = data.len()))]
    pub async fn create_file(
        &self,
        token: &str,
        name: &str,
        data: &[u8],
    ) -> anyhow::Result<String> {
        let url = format!(
            "{}/upload/drive/v3/files?uploadType=multipart&fields=id",
            self.api_base
        );

        let boundary = format!("dbsync-{}", uuid::Uuid::new_v4().simple());
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": SQLITE_MIME_TYPE,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", boundary),
            )
            .body(multipart_related(&boundary, &metadata, data))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Drive create error {}: {}", status, body);
        }

        let created: IdResponse = resp.json().await?;
        debug!("Created file {} '{}' ({} bytes)", created.id, name, data.len());
        Ok(created.id)
    }

    /// Upload (update) file content on Google Drive.
    #[instrument(skip(self, token, data), level = "debug", fields(data_len = data.len()))]
    pub async fn update_file(
        &self,
        token: &str,
        file_id: &str,
        data: &[u8],
    ) -> anyhow::Result<Option<String>> {
        let url = format!(
            "{}/upload/drive/v3/files/{}?uploadType=media&fields=id",
            self.api_base, file_id
        );

        let resp = self
            .http
            .patch(&url)
            .bearer_auth(token)
            .header("Content-Type", SQLITE_MIME_TYPE)
            .body(data.to_vec())
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Drive upload error {}: {}", status, body);
        }

        let updated: IdResponse = resp.json().await?;
        debug!("Updated file {} ({} bytes)", updated.id, data.len());
        Ok(Some(updated.id))
    }

    /// List one page of files visible to the token.
    #[instrument(skip(self, token), level = "debug")]
    pub async fn list_files(
        &self,
        token: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<(Vec<DriveFile>, Option<String>)> {
        let url = format!("{}/drive/v3/files", self.api_base);

        let mut query = vec![
            ("pageSize", page_size.to_string()),
            ("fields", "nextPageToken,files(id,name)".to_string()),
        ];
        if let Some(next) = page_token {
            query.push(("pageToken", next.to_string()));
        }

        let resp = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Drive list error {}: {}", status, body);
        }

        let page: FileListResponse = resp.json().await?;
        debug!("Listed {} files", page.files.len());
        Ok((page.files, page.next_page_token))
    }
}

/// `app.db` -> `app.db.<uuid>.part`, in the same directory.
fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(format!(".{}.part", uuid::Uuid::new_v4().simple()));
    PathBuf::from(name)
}

/// Body for a Drive `uploadType=multipart` request: JSON metadata, then media.
fn multipart_related(boundary: &str, metadata: &serde_json::Value, data: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{boundary}\r\n\
         Content-Type: application/json; charset=UTF-8\r\n\r\n\
         {metadata}\r\n\
         --{boundary}\r\n\
         Content-Type: {SQLITE_MIME_TYPE}\r\n\r\n"
    );
    let tail = format!("\r\n--{boundary}--\r\n");

    let mut body = Vec::with_capacity(head.len() + data.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(tail.as_bytes());
    body
}
