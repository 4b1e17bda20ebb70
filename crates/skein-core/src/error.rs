//! Dispatch error types.
//!
//! Only errors that abort a whole group send surface here. Mechanism-level
//! multicast failures are recovered by falling back to legacy sends, and
//! per-recipient failures are reported as [`crate::SendOutcome`]s.

use thiserror::Error;

use crate::{
    key_lifecycle::KeyLifecycleError,
    store::StoreError,
    transport::TransportError,
    types::GroupId,
};

/// Errors that abort a group send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Group is not known locally.
    #[error("unknown group: {0}")]
    UnknownGroup(GroupId),

    /// Group is announcement-only and we are not an admin.
    #[error("no permission to send to announcement-only group {0}")]
    NoSendPermission(GroupId),

    /// Loading group or key state failed before anything was sent.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Key age lookup or rotation failed.
    #[error("key lifecycle error: {0}")]
    KeyLifecycle(#[from] KeyLifecycleError),

    /// The transport failed as a whole, not per recipient.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl DispatchError {
    /// Returns true if the send was refused before any side effect.
    ///
    /// Precondition failures are deterministic: retrying without changing
    /// group state fails the same way.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::UnknownGroup(_) | Self::NoSendPermission(_))
    }
}
