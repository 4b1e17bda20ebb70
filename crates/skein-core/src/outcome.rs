//! Per-recipient send results.

use crate::types::{IdentityKey, Recipient};

/// What happened to one recipient's copy of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendStatus {
    /// Accepted by the server for this recipient.
    Delivered {
        /// Whether it went out with anonymous (sealed sender) access.
        sealed_sender: bool,
    },

    /// Network failure while sending to this recipient.
    NetworkFailure,

    /// Recipient is no longer registered.
    Unregistered,

    /// Recipient's identity key changed. The new key must be recorded.
    IdentityMismatch {
        /// The identity key the recipient now presents.
        identity_key: IdentityKey,
    },
}

/// Result for a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    /// Recipient this result is for.
    pub recipient: Recipient,
    /// What happened.
    pub status: SendStatus,
}

impl SendOutcome {
    /// Successful delivery.
    pub fn delivered(recipient: Recipient, sealed_sender: bool) -> Self {
        Self { recipient, status: SendStatus::Delivered { sealed_sender } }
    }

    /// Network failure.
    pub fn network_failure(recipient: Recipient) -> Self {
        Self { recipient, status: SendStatus::NetworkFailure }
    }

    /// Recipient unregistered.
    pub fn unregistered(recipient: Recipient) -> Self {
        Self { recipient, status: SendStatus::Unregistered }
    }

    /// Identity key changed to `identity_key`.
    pub fn identity_mismatch(recipient: Recipient, identity_key: IdentityKey) -> Self {
        Self { recipient, status: SendStatus::IdentityMismatch { identity_key } }
    }

    /// True if the message reached the server for this recipient.
    pub fn is_success(&self) -> bool {
        matches!(self.status, SendStatus::Delivered { .. })
    }

    /// New identity key, if the send failed on an identity mismatch.
    pub fn identity_failure(&self) -> Option<&IdentityKey> {
        match &self.status {
            SendStatus::IdentityMismatch { identity_key } => Some(identity_key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_delivered_counts_as_success() {
        let r = Recipient::new(1);
        assert!(SendOutcome::delivered(r, true).is_success());
        assert!(!SendOutcome::network_failure(r).is_success());
        assert!(!SendOutcome::unregistered(r).is_success());
        assert!(!SendOutcome::identity_mismatch(r, IdentityKey(vec![5])).is_success());
    }

    #[test]
    fn identity_failure_exposes_new_key() {
        let r = Recipient::new(1);
        let outcome = SendOutcome::identity_mismatch(r, IdentityKey(vec![5, 6]));
        assert_eq!(outcome.identity_failure(), Some(&IdentityKey(vec![5, 6])));
        assert_eq!(SendOutcome::delivered(r, false).identity_failure(), None);
    }
}
