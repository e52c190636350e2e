//! Durable state for Prism.
//!
//! The engine keeps everything in memory and periodically writes a full
//! [`Snapshot`]. Every storage backend implements [`SnapshotStore`]; the rest
//! of the codebase depends only on the trait.

pub mod error;
pub mod json;
pub mod snapshot;

pub use error::StoreError;
pub use json::JsonFileStore;
pub use snapshot::{Snapshot, SplitRecord, StoredToken, TargetRecord, SNAPSHOT_VERSION};

/// Load-on-start / save-on-interval storage of the whole state graph.
pub trait SnapshotStore: Send + Sync {
    /// The last saved snapshot, or `None` on first start.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}
