//! Refresh queue that records every request.

#![allow(clippy::disallowed_types, reason = "Synchronous recording only")]

use std::sync::{Arc, Mutex, PoisonError};

use skein_core::{ProfileEntry, Recipient, RefreshQueue};

/// Records each `queue_if_needed` call without deduplicating or judging
/// staleness.
#[derive(Clone, Default)]
pub struct RecordingRefreshQueue {
    requests: Arc<Mutex<Vec<Recipient>>>,
}

impl RecordingRefreshQueue {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recipient passed to `queue_if_needed`, in call order.
    pub fn requests(&self) -> Vec<Recipient> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl RefreshQueue for RecordingRefreshQueue {
    fn queue_if_needed(&self, recipient: &Recipient, _entry: Option<&ProfileEntry>) {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(*recipient);
    }
}
