//! Profile refresh seam.

use crate::{store::ProfileEntry, types::Recipient};

/// Queue for background profile refreshes.
///
/// Fire-and-forget: the policy never waits for, or observes, the refresh.
/// Implementations decide whether `entry` is stale and must be idempotent
/// (a recipient already pending is not queued again).
pub trait RefreshQueue: Send + Sync {
    /// Request a refresh of `recipient`'s profile if `entry` is missing or
    /// stale.
    fn queue_if_needed(&self, recipient: &Recipient, entry: Option<&ProfileEntry>);
}
