//! In-memory snapshot store, used in tests and when persistence is disabled.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{SnapshotStore, StorageError, StorageResult};

pub struct MemoryStore<T> {
    slot: Mutex<Option<T>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            fail_saves: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent save fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> StorageResult<Option<T>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &T) -> StorageResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("saves disabled".to_string()));
        }
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
