pub mod error;
pub mod presence;
pub mod store;

pub use error::{Result, StoreError};
pub use presence::FsPresence;
pub use store::{Purchase, PurchaseStore};
