//! Outbound message content as seen by the policy layer.
//!
//! The policy never inspects the body. It only decorates the message with the
//! group binding and the disappearing-message timer before handing it to the
//! transport.

use serde::{Deserialize, Serialize};

/// Protocol-level group binding carried inside every group message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupContext {
    /// Group master key, from which recipients derive the group id.
    pub master_key: [u8; 32],
    /// Group state revision the sender is at.
    pub revision: u32,
}

/// Hint to recipients about how to handle a decryption failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentHint {
    /// Show an error placeholder if decryption fails.
    #[default]
    Default,
    /// Sender can resend; recipient should request a retry.
    Resendable,
    /// Nothing user-visible; failure can be ignored.
    Implicit,
}

/// A data message about to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMessage {
    /// Sender timestamp (milliseconds), doubles as the message id.
    pub timestamp: u64,
    /// Text body.
    pub body: Option<String>,
    /// Disappearing-message timer in seconds.
    pub expire_timer_secs: Option<u32>,
    /// Group binding. `None` for one-to-one messages.
    pub group: Option<GroupContext>,
}

impl DataMessage {
    /// Empty message stamped with `timestamp`.
    pub fn new(timestamp: u64) -> Self {
        Self { timestamp, body: None, expire_timer_secs: None, group: None }
    }

    /// Set the text body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the disappearing-message timer.
    #[must_use]
    pub fn with_expiration(mut self, secs: u32) -> Self {
        self.expire_timer_secs = Some(secs);
        self
    }

    /// Bind the message to a group.
    #[must_use]
    pub fn as_group_message(mut self, context: GroupContext) -> Self {
        self.group = Some(context);
        self
    }
}
