use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// Opaque identifier naming one object in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RemoteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// An object listed from the remote namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub id: RemoteId,
    pub name: String,
}

/// Authenticated capability over a remote blob namespace.
///
/// Transfers always move the whole file. `NotFound` is reported as
/// `RemoteError::NotFound`, never folded into a generic failure.
#[async_trait]
pub trait RemoteObjectClient: Send + Sync {
    /// Stream the object into `destination`.
    ///
    /// On failure the destination must not be left looking complete.
    async fn fetch(&self, id: &RemoteId, destination: &Path) -> Result<(), RemoteError>;

    /// Probe for existence without transferring content.
    async fn exists(&self, id: &RemoteId) -> Result<bool, RemoteError>;

    /// Upload `source` as a new object called `name`.
    async fn create(&self, source: &Path, name: &str) -> Result<RemoteId, RemoteError>;

    /// Overwrite the content of an existing object in place.
    async fn update(&self, id: &RemoteId, source: &Path) -> Result<RemoteId, RemoteError>;

    /// List at most `limit` objects, in remote listing order.
    async fn list(&self, limit: u32) -> Result<Vec<RemoteEntry>, RemoteError>;
}
