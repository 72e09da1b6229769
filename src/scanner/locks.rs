//! Per-library scan serialization.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct LockTable {
    busy: Mutex<HashSet<i64>>,
    released: Condvar,
}

/// Advisory locks keyed by library id.
///
/// Clones share the same lock table. Scans of different libraries never
/// wait on each other.
#[derive(Debug, Clone, Default)]
pub struct ScanLocks {
    table: Arc<LockTable>,
}

/// Held while a library is being scanned; releases on drop.
#[derive(Debug)]
pub struct LibraryGuard {
    table: Arc<LockTable>,
    library_id: i64,
}

impl Drop for LibraryGuard {
    fn drop(&mut self) {
        self.table.busy.lock().remove(&self.library_id);
        self.table.released.notify_all();
    }
}

impl ScanLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self, library_id: i64) -> LibraryGuard {
        LibraryGuard {
            table: Arc::clone(&self.table),
            library_id,
        }
    }

    /// Block until no other scan of `library_id` is running.
    #[must_use]
    pub fn lock(&self, library_id: i64) -> LibraryGuard {
        let mut busy = self.table.busy.lock();
        if busy.contains(&library_id) {
            tracing::debug!(library_id, "Waiting for running scan of library");
            while busy.contains(&library_id) {
                self.table.released.wait(&mut busy);
            }
        }
        busy.insert(library_id);
        drop(busy);
        self.guard(library_id)
    }

    /// Take the lock only if the library is idle.
    #[must_use]
    pub fn try_lock(&self, library_id: i64) -> Option<LibraryGuard> {
        let inserted = self.table.busy.lock().insert(library_id);
        inserted.then(|| self.guard(library_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_same_library_is_exclusive() {
        let locks = ScanLocks::new();
        let guard = locks.lock(1);
        assert!(locks.try_lock(1).is_none());
        drop(guard);
        assert!(locks.try_lock(1).is_some());
    }

    #[test]
    fn test_different_libraries_are_independent() {
        let locks = ScanLocks::new();
        let _one = locks.lock(1);
        assert!(locks.try_lock(2).is_some());
    }

    #[test]
    fn test_clones_share_table() {
        let locks = ScanLocks::new();
        let other = locks.clone();
        let _guard = locks.lock(5);
        assert!(other.try_lock(5).is_none());
    }

    #[test]
    fn test_lock_serializes_threads() {
        let locks = ScanLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let locks = locks.clone();
                let active = Arc::clone(&active);
                let overlap = Arc::clone(&overlap);
                thread::spawn(move || {
                    let _guard = locks.lock(9);
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlap.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
