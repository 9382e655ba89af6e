//! Core traits and types for keeping a single database file in sync with a remote object store.
//!
//! This crate defines the abstractions shared between the local side and remote backends:
//! - `RemoteObjectClient`: Fetch, probe, create, update and list remote objects
//! - `LocalFilePresence`: Whether the synchronization target exists locally
//! - `SyncManager`: Ensure (download-if-absent) and Publish (create-or-update)

mod error;
mod manager;
mod presence;
mod remote;
mod sync;

pub use error::{RemoteError, SyncError};
pub use manager::SyncManager;
pub use presence::LocalFilePresence;
pub use remote::{RemoteEntry, RemoteId, RemoteObjectClient};
pub use sync::{EnsureOutcome, SyncOutcome, SyncTarget};
