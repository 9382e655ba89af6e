use crate::remote::RemoteId;

/// Failures reported by a `RemoteObjectClient`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The identifier does not resolve to an object.
    #[error("Remote object not found: {0}")]
    NotFound(String),

    /// Network, auth or quota failure. Retryable in principle.
    #[error("Remote error: {0}")]
    Transient(String),

    /// Reading or writing the local side of a transfer failed.
    #[error("Local I/O error: {0}")]
    LocalIo(String),
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        Self::LocalIo(e.to_string())
    }
}

/// Failures surfaced by `SyncManager` to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Remote object {0} does not exist")]
    MissingRemote(RemoteId),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Listing remote objects failed: {0}")]
    ListFailed(String),

    #[error("Local I/O error: {0}")]
    LocalIo(String),
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        Self::LocalIo(e.to_string())
    }
}
