//! Ensure/Publish orchestration over injected remote and presence capabilities.

use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::{RemoteError, SyncError};
use crate::presence::LocalFilePresence;
use crate::remote::{RemoteEntry, RemoteId, RemoteObjectClient};
use crate::sync::{EnsureOutcome, SyncOutcome, SyncTarget};

/// Keeps one local database file and one remote object in step.
///
/// Every operation runs to completion (or reported failure) before returning.
/// Nothing is retried, and remote failures are never swallowed.
pub struct SyncManager {
    remote: Arc<dyn RemoteObjectClient>,
    presence: Arc<dyn LocalFilePresence>,
    target: SyncTarget,
}

impl SyncManager {
    pub fn new(
        remote: Arc<dyn RemoteObjectClient>,
        presence: Arc<dyn LocalFilePresence>,
        target: SyncTarget,
    ) -> Self {
        Self {
            remote,
            presence,
            target,
        }
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    /// Materialize the local copy if it is not already there.
    ///
    /// With the file present this makes no remote call at all. A failed
    /// fetch never touches the target path itself: the client only moves a
    /// complete transfer into place, and a concurrent Ensure may already
    /// have done so.
    #[instrument(skip(self), level = "debug", fields(path = %self.target.path.display()))]
    pub async fn ensure(&self, id: Option<&RemoteId>) -> Result<EnsureOutcome, SyncError> {
        let path = self.target.path();

        if self.presence.exists(path) {
            debug!("Local copy already present at {}", path.display());
            return Ok(EnsureOutcome::Present);
        }

        let Some(id) = id else {
            info!(
                "No local copy at {} and no remote identifier configured",
                path.display()
            );
            return Ok(EnsureOutcome::Unbound);
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        match self.remote.fetch(id, path).await {
            Ok(()) => {
                info!("Fetched remote object {} into {}", id, path.display());
                Ok(EnsureOutcome::Fetched)
            }
            Err(e) => {
                warn!("Fetching remote object {} failed: {}", id, e);
                Err(match e {
                    RemoteError::NotFound(_) => SyncError::MissingRemote(id.clone()),
                    RemoteError::Transient(msg) => SyncError::FetchFailed(msg),
                    RemoteError::LocalIo(msg) => SyncError::LocalIo(msg),
                })
            }
        }
    }

    /// Push the local copy outward: create when `maybe_id` is absent,
    /// update in place when present.
    ///
    /// An identifier that no longer resolves is an error; it never turns
    /// into a create. The local file is only read.
    #[instrument(skip(self), level = "debug", fields(path = %self.target.path.display()))]
    pub async fn publish(&self, maybe_id: Option<&RemoteId>) -> Result<SyncOutcome, SyncError> {
        let source = self.target.path();

        if !self.presence.exists(source) {
            return Err(SyncError::LocalIo(format!(
                "Nothing to publish: {} does not exist",
                source.display()
            )));
        }

        let Some(id) = maybe_id else {
            let created = self
                .remote
                .create(source, &self.target.remote_name)
                .await
                .map_err(|e| Self::publish_error(None, e))?;
            info!(
                "Created remote object {} from {}",
                created,
                source.display()
            );
            return Ok(SyncOutcome::Created(created));
        };

        let exists = self
            .remote
            .exists(id)
            .await
            .map_err(|e| Self::publish_error(Some(id), e))?;

        if !exists {
            warn!("Remote object {} no longer exists; not publishing", id);
            return Err(SyncError::MissingRemote(id.clone()));
        }

        let updated = self
            .remote
            .update(id, source)
            .await
            .map_err(|e| Self::publish_error(Some(id), e))?;

        info!("Updated remote object {} from {}", updated, source.display());
        Ok(SyncOutcome::Updated(updated))
    }

    /// Enumerate remote objects for display, capped at `limit`.
    #[instrument(skip(self), level = "debug")]
    pub async fn list(&self, limit: u32) -> Result<Vec<RemoteEntry>, SyncError> {
        let mut entries = self.remote.list(limit).await.map_err(|e| match e {
            RemoteError::LocalIo(msg) => SyncError::LocalIo(msg),
            other => SyncError::ListFailed(other.to_string()),
        })?;
        entries.truncate(limit as usize);

        debug!("Listed {} remote objects", entries.len());
        Ok(entries)
    }

    fn publish_error(id: Option<&RemoteId>, e: RemoteError) -> SyncError {
        match (e, id) {
            (RemoteError::NotFound(_), Some(id)) => SyncError::MissingRemote(id.clone()),
            (RemoteError::NotFound(msg), None) | (RemoteError::Transient(msg), _) => {
                SyncError::PublishFailed(msg)
            }
            (RemoteError::LocalIo(msg), _) => SyncError::LocalIo(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Fetch(String),
        Exists(String),
        Create(String),
        Update(String),
        List(u32),
    }

    /// In-memory remote store recording every call made against it.
    #[derive(Default)]
    struct FakeRemote {
        objects: Mutex<BTreeMap<String, (String, Vec<u8>)>>,
        calls: Mutex<Vec<Call>>,
        next_id: AtomicUsize,
        fetch_failure: Option<RemoteError>,
        /// Bytes another process moves into place while this fetch fails.
        raced_by: Option<Vec<u8>>,
        update_failure: Option<RemoteError>,
    }

    impl FakeRemote {
        fn with_object(self, id: &str, name: &str, data: &[u8]) -> Self {
            self.objects
                .lock()
                .unwrap()
                .insert(id.to_string(), (name.to_string(), data.to_vec()));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn content(&self, id: &str) -> Option<Vec<u8>> {
            self.objects.lock().unwrap().get(id).map(|(_, d)| d.clone())
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl RemoteObjectClient for FakeRemote {
        async fn fetch(&self, id: &RemoteId, destination: &Path) -> Result<(), RemoteError> {
            self.record(Call::Fetch(id.to_string()));
            if let Some(err) = &self.fetch_failure {
                if let Some(winner) = &self.raced_by {
                    std::fs::write(destination, winner)?;
                }
                return Err(err.clone());
            }
            let data = self
                .content(id.as_str())
                .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
            std::fs::write(destination, data)?;
            Ok(())
        }

        async fn exists(&self, id: &RemoteId) -> Result<bool, RemoteError> {
            self.record(Call::Exists(id.to_string()));
            Ok(self.objects.lock().unwrap().contains_key(id.as_str()))
        }

        async fn create(&self, source: &Path, name: &str) -> Result<RemoteId, RemoteError> {
            self.record(Call::Create(name.to_string()));
            let data = std::fs::read(source)?;
            let id = format!("R{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            self.objects
                .lock()
                .unwrap()
                .insert(id.clone(), (name.to_string(), data));
            Ok(RemoteId::new(id))
        }

        async fn update(&self, id: &RemoteId, source: &Path) -> Result<RemoteId, RemoteError> {
            self.record(Call::Update(id.to_string()));
            if let Some(err) = &self.update_failure {
                return Err(err.clone());
            }
            let data = std::fs::read(source)?;
            let mut objects = self.objects.lock().unwrap();
            let entry = objects
                .get_mut(id.as_str())
                .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
            entry.1 = data;
            Ok(id.clone())
        }

        async fn list(&self, limit: u32) -> Result<Vec<RemoteEntry>, RemoteError> {
            self.record(Call::List(limit));
            // Deliberately ignores the limit.
            Ok(self
                .objects
                .lock()
                .unwrap()
                .iter()
                .map(|(id, (name, _))| RemoteEntry {
                    id: RemoteId::new(id.clone()),
                    name: name.clone(),
                })
                .collect())
        }
    }

    struct PathExists;

    impl LocalFilePresence for PathExists {
        fn exists(&self, path: &Path) -> bool {
            path.is_file()
        }
    }

    fn setup(remote: FakeRemote) -> (SyncManager, Arc<FakeRemote>, PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tracking_expenses_app.db");
        let remote = Arc::new(remote);
        let manager = SyncManager::new(
            remote.clone(),
            Arc::new(PathExists),
            SyncTarget::from_path(&path),
        );
        (manager, remote, path, temp_dir)
    }

    #[tokio::test]
    async fn test_ensure_with_local_copy_makes_no_remote_calls() {
        let (manager, remote, path, _temp_dir) = setup(FakeRemote::default());
        std::fs::write(&path, b"local").unwrap();
        let id = RemoteId::new("R1");

        assert_eq!(manager.ensure(Some(&id)).await, Ok(EnsureOutcome::Present));
        assert_eq!(manager.ensure(Some(&id)).await, Ok(EnsureOutcome::Present));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_fetches_once() {
        let (manager, remote, path, _temp_dir) =
            setup(FakeRemote::default().with_object("R1", "db", b"remote bytes"));
        let id = RemoteId::new("R1");

        assert_eq!(manager.ensure(Some(&id)).await, Ok(EnsureOutcome::Fetched));
        assert_eq!(std::fs::read(&path).unwrap(), b"remote bytes");

        // Second run finds the file and stays local.
        assert_eq!(manager.ensure(Some(&id)).await, Ok(EnsureOutcome::Present));
        assert_eq!(remote.calls(), vec![Call::Fetch("R1".to_string())]);
    }

    #[tokio::test]
    async fn test_ensure_missing_remote() {
        let (manager, _remote, path, _temp_dir) = setup(FakeRemote::default());
        let id = RemoteId::new("R1");

        let result = manager.ensure(Some(&id)).await;
        assert_eq!(result, Err(SyncError::MissingRemote(id)));
        assert!(!PathExists.exists(&path));
    }

    #[tokio::test]
    async fn test_ensure_failed_transfer_leaves_no_file() {
        let remote = FakeRemote {
            fetch_failure: Some(RemoteError::Transient("connection reset".to_string())),
            ..Default::default()
        };
        let (manager, _remote, path, _temp_dir) = setup(remote.with_object("R1", "db", b"x"));

        let result = manager.ensure(Some(&RemoteId::new("R1"))).await;
        assert_eq!(
            result,
            Err(SyncError::FetchFailed("connection reset".to_string()))
        );
        assert!(!PathExists.exists(&path));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_file_finished_by_concurrent_ensure() {
        let remote = FakeRemote {
            fetch_failure: Some(RemoteError::LocalIo("rename failed".to_string())),
            raced_by: Some(b"complete copy".to_vec()),
            ..Default::default()
        };
        let (manager, _remote, path, _temp_dir) = setup(remote.with_object("R1", "db", b"x"));

        let result = manager.ensure(Some(&RemoteId::new("R1"))).await;
        assert_eq!(result, Err(SyncError::LocalIo("rename failed".to_string())));
        assert_eq!(std::fs::read(&path).unwrap(), b"complete copy");
    }

    #[tokio::test]
    async fn test_ensure_without_identifier_is_unbound() {
        let (manager, remote, path, _temp_dir) = setup(FakeRemote::default());

        assert_eq!(manager.ensure(None).await, Ok(EnsureOutcome::Unbound));
        assert!(remote.calls().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_ensure_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("app.db");
        let remote = Arc::new(FakeRemote::default().with_object("R1", "app.db", b"db"));
        let manager = SyncManager::new(
            remote.clone(),
            Arc::new(PathExists),
            SyncTarget::from_path(&path),
        );

        let outcome = manager.ensure(Some(&RemoteId::new("R1"))).await.unwrap();
        assert_eq!(outcome, EnsureOutcome::Fetched);
        assert_eq!(std::fs::read(&path).unwrap(), b"db");
    }

    #[tokio::test]
    async fn test_publish_create_then_update() {
        let (manager, remote, path, _temp_dir) = setup(FakeRemote::default());
        std::fs::write(&path, b"v1").unwrap();

        let created = manager.publish(None).await.unwrap();
        assert_eq!(created, SyncOutcome::Created(RemoteId::new("R1")));

        std::fs::write(&path, b"v2").unwrap();
        let updated = manager.publish(Some(created.id())).await.unwrap();
        assert_eq!(updated, SyncOutcome::Updated(RemoteId::new("R1")));

        assert_eq!(
            remote.calls(),
            vec![
                Call::Create("tracking_expenses_app.db".to_string()),
                Call::Exists("R1".to_string()),
                Call::Update("R1".to_string()),
            ]
        );
        assert_eq!(remote.content("R1").unwrap(), b"v2");
        // Publish only reads the local side.
        assert_eq!(std::fs::read(&path).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_publish_stale_identifier_is_rejected() {
        let (manager, remote, path, _temp_dir) = setup(FakeRemote::default());
        std::fs::write(&path, b"v1").unwrap();
        let id = RemoteId::new("deleted-out-of-band");

        let result = manager.publish(Some(&id)).await;
        assert_eq!(result, Err(SyncError::MissingRemote(id)));
        assert_eq!(
            remote.calls(),
            vec![Call::Exists("deleted-out-of-band".to_string())]
        );
    }

    #[tokio::test]
    async fn test_publish_update_failure_does_not_fall_back_to_create() {
        let remote = FakeRemote {
            update_failure: Some(RemoteError::Transient("quota exceeded".to_string())),
            ..Default::default()
        };
        let (manager, remote, path, _temp_dir) = setup(remote.with_object("R1", "db", b"old"));
        std::fs::write(&path, b"new").unwrap();

        let result = manager.publish(Some(&RemoteId::new("R1"))).await;
        assert_eq!(
            result,
            Err(SyncError::PublishFailed("quota exceeded".to_string()))
        );
        assert!(!remote
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Create(_))));
        assert_eq!(remote.content("R1").unwrap(), b"old");
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_publish_update_not_found_is_missing_remote() {
        let remote = FakeRemote {
            update_failure: Some(RemoteError::NotFound("R1".to_string())),
            ..Default::default()
        };
        let (manager, remote, path, _temp_dir) = setup(remote.with_object("R1", "db", b"old"));
        std::fs::write(&path, b"new").unwrap();

        let id = RemoteId::new("R1");
        assert_eq!(
            manager.publish(Some(&id)).await,
            Err(SyncError::MissingRemote(id))
        );
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_publish_without_local_file() {
        let (manager, remote, _path, _temp_dir) = setup(FakeRemote::default());

        let result = manager.publish(None).await;
        assert!(matches!(result, Err(SyncError::LocalIo(_))));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_list_respects_cap() {
        let mut remote = FakeRemote::default();
        for i in 0..5 {
            remote = remote.with_object(&format!("id-{}", i), &format!("file-{}", i), b"");
        }
        let (manager, _remote, _path, _temp_dir) = setup(remote);

        let entries = manager.list(3).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "file-0");

        assert!(manager.list(0).await.unwrap().is_empty());
        assert_eq!(manager.list(10).await.unwrap().len(), 5);
    }
}
