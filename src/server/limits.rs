//! Bound on concurrent walks over the same project folder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Hands out at most `per_root` walk permits per folder
#[derive(Debug)]
pub struct WalkLimiter {
    per_root: usize,
    roots: Mutex<HashMap<PathBuf, Arc<Semaphore>>>,
}

impl WalkLimiter {
    pub fn new(per_root: usize) -> Self {
        Self {
            per_root: per_root.max(1),
            roots: Mutex::new(HashMap::new()),
        }
    }

    /// Take a permit for `root` without waiting; `None` when the folder is saturated.
    ///
    /// Paths are compared by their real location, so two spellings of the
    /// same folder share one budget.
    pub fn try_acquire(&self, root: &Path) -> Option<OwnedSemaphorePermit> {
        let key = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let mut roots = self
            .roots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Idle folders are dropped so the map only holds walks in flight
        let per_root = self.per_root;
        roots.retain(|_, sem| sem.available_permits() < per_root);

        let semaphore = roots
            .entry(key)
            .or_insert_with(|| Arc::new(Semaphore::new(per_root)));
        Arc::clone(semaphore).try_acquire_owned().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn permits_are_bounded_per_root() {
        let dir = tempdir().unwrap();
        let other = tempdir().unwrap();
        let limiter = WalkLimiter::new(2);

        let first = limiter.try_acquire(dir.path());
        let second = limiter.try_acquire(dir.path());
        assert!(first.is_some() && second.is_some());
        assert!(limiter.try_acquire(dir.path()).is_none());
        assert!(limiter.try_acquire(other.path()).is_some());

        drop(first);
        assert!(limiter.try_acquire(dir.path()).is_some());
    }

    #[test]
    fn same_folder_through_different_spellings_shares_permits() {
        let dir = tempdir().unwrap();
        let limiter = WalkLimiter::new(1);

        let _held = limiter.try_acquire(dir.path()).unwrap();
        let dotted = dir.path().join(".");
        assert!(limiter.try_acquire(&dotted).is_none());
    }
}
