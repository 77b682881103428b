//! Snapshot persistence for gate state.
//!
//! # Data Flow
//! ```text
//! component mutation (limiter admit, ledger violation)
//!     → build snapshot (plain serde types)
//!     → SnapshotStore::save (file.rs: JSON + atomic rename, memory.rs: tests)
//!
//! process start
//!     → SnapshotStore::load → component state
//! ```
//!
//! # Design Decisions
//! - Components own no I/O; the store is injected at construction
//! - Persist failures never fail a request; callers log and continue

pub mod file;
pub mod memory;

use thiserror::Error;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Errors raised by snapshot stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The store refused the write (used by test fakes).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Load/save capability for a single component snapshot.
pub trait SnapshotStore<T>: Send + Sync {
    /// Load the last saved snapshot. `None` when nothing was saved yet.
    fn load(&self) -> StorageResult<Option<T>>;

    /// Replace the saved snapshot.
    fn save(&self, snapshot: &T) -> StorageResult<()>;

    /// Short label used in logs and metrics.
    fn describe(&self) -> String;
}
