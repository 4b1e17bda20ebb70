//! Session lock seam.
//!
//! The transport mutates sender-key state while it sends. Rotation deletes
//! that same state, so both must be serialized by one session-scoped lock.

/// Mutual exclusion over the account's session and sender-key state.
///
/// The guard releases the lock when dropped, so every exit path (including
/// `?` and panics) unlocks.
pub trait SessionLock: Send + Sync {
    /// RAII guard held for the duration of the critical section.
    type Guard<'a>
    where
        Self: 'a;

    /// Block until the lock is held.
    fn acquire(&self) -> Self::Guard<'_>;
}
