//! Channel-backed profile refresh queue.
//!
//! The dispatch path only enqueues. A worker owning the receiver fetches
//! profiles and calls [`ChannelRefreshQueue::mark_complete`] when done.

#![allow(clippy::disallowed_types, reason = "Pending set is held only for an insert")]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use skein_core::{Environment, ProfileEntry, RefreshQueue, Recipient};
use tokio::sync::mpsc;
use tracing::debug;

/// Profiles older than this are refreshed.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Deduplicating refresh queue feeding an unbounded tokio channel.
#[derive(Clone)]
pub struct ChannelRefreshQueue<E: Environment> {
    env: E,
    interval: Duration,
    /// Recipients queued but not yet marked complete
    pending: Arc<Mutex<HashSet<Recipient>>>,
    tx: mpsc::UnboundedSender<Recipient>,
}

impl<E: Environment> ChannelRefreshQueue<E> {
    /// Queue using [`DEFAULT_REFRESH_INTERVAL`], and the worker's receiver.
    pub fn new(env: E) -> (Self, mpsc::UnboundedReceiver<Recipient>) {
        Self::with_interval(env, DEFAULT_REFRESH_INTERVAL)
    }

    /// Queue refreshing entries older than `interval`, and the worker's
    /// receiver.
    pub fn with_interval(env: E, interval: Duration) -> (Self, mpsc::UnboundedReceiver<Recipient>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Self { env, interval, pending: Arc::new(Mutex::new(HashSet::new())), tx };
        (queue, rx)
    }

    /// Worker finished with `recipient`; it may be queued again.
    pub fn mark_complete(&self, recipient: &Recipient) {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).remove(recipient);
    }

    /// Check if `recipient` is queued and not yet complete.
    pub fn is_pending(&self, recipient: &Recipient) -> bool {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).contains(recipient)
    }

    /// Entry needs a refresh: missing, never fetched, or older than the
    /// interval.
    fn is_stale(&self, entry: Option<&ProfileEntry>) -> bool {
        let Some(entry) = entry else {
            return true;
        };
        if entry.profile.is_none() {
            return true;
        }
        let age = self.env.wall_clock_millis().saturating_sub(entry.last_updated_millis);
        Duration::from_millis(age) > self.interval
    }
}

impl<E: Environment> RefreshQueue for ChannelRefreshQueue<E> {
    fn queue_if_needed(&self, recipient: &Recipient, entry: Option<&ProfileEntry>) {
        if !self.is_stale(entry) {
            return;
        }

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.insert(*recipient) {
            return;
        }
        if self.tx.send(*recipient).is_err() {
            pending.remove(recipient);
            debug!(recipient = %recipient.redacted(), "refresh worker gone, dropping request");
            return;
        }
        debug!(recipient = %recipient.redacted(), "queued profile refresh");
    }
}
