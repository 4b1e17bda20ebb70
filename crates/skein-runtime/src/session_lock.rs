//! Session lock backed by a std mutex.

#![allow(clippy::disallowed_types, reason = "Session lock is a blocking std mutex")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use skein_core::SessionLock;

/// Account-wide session lock.
///
/// Clones share the same mutex, so the transport and the key lifecycle
/// manager can each hold a handle. A poisoned lock is recovered: the guarded
/// state is `()`, and store consistency is the store's concern.
#[derive(Clone, Default)]
pub struct MutexSessionLock {
    inner: Arc<Mutex<()>>,
}

impl MutexSessionLock {
    /// Create an unlocked session lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the lock is currently held by anyone.
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl SessionLock for MutexSessionLock {
    type Guard<'a> = MutexGuard<'a, ()>;

    fn acquire(&self) -> Self::Guard<'_> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = MutexSessionLock::new();
        {
            let _guard = lock.acquire();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_clones_share_the_lock() {
        let lock = MutexSessionLock::new();
        let handle = lock.clone();

        let _guard = lock.acquire();
        assert!(handle.is_locked());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let lock = MutexSessionLock::new();
        let handle = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = handle.acquire();
            panic!("poison");
        })
        .join();

        let _guard = lock.acquire();
        assert!(lock.is_locked());
    }
}
