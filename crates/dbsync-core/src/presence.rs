use std::path::Path;

/// Whether the synchronization target already exists on local storage.
pub trait LocalFilePresence: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
}
