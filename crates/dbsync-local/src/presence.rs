use std::path::Path;

use dbsync_core::LocalFilePresence;
use tracing::debug;

/// Filesystem-backed presence check.
///
/// Only regular files count: a directory sitting at the target path is not a
/// database and must not short-circuit a fetch.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsPresence;

impl FsPresence {
    pub fn new() -> Self {
        Self
    }
}

impl LocalFilePresence for FsPresence {
    fn exists(&self, path: &Path) -> bool {
        let present = path.is_file();
        debug!("Presence check {}: {}", path.display(), present);
        present
    }
}
