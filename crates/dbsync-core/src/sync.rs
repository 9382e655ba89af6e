use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::remote::RemoteId;

/// The local file kept in sync, and the name it carries remotely.
///
/// Built once at startup and handed to `SyncManager`; never mutated during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncTarget {
    /// Path of the database file on local storage
    pub path: PathBuf,
    /// Object name used when the remote copy is first created
    pub remote_name: String,
}

impl SyncTarget {
    pub fn new(path: impl Into<PathBuf>, remote_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            remote_name: remote_name.into(),
        }
    }

    /// Target named after the file name of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let remote_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, remote_name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of a successful Ensure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    /// The file was already on local storage; nothing was transferred.
    Present,
    /// The file was downloaded from the remote store.
    Fetched,
    /// No local file and no remote identifier: the caller starts a fresh
    /// database, and the first Publish creates the remote object.
    Unbound,
}

/// Result of a successful Publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "id")]
pub enum SyncOutcome {
    Created(RemoteId),
    Updated(RemoteId),
}

impl SyncOutcome {
    /// The identifier now live for this database.
    pub fn id(&self) -> &RemoteId {
        match self {
            Self::Created(id) | Self::Updated(id) => id,
        }
    }

    pub fn into_id(self) -> RemoteId {
        match self {
            Self::Created(id) | Self::Updated(id) => id,
        }
    }
}
