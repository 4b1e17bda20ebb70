//! Transport seam: the encrypted send primitives the policy drives.
//!
//! The transport owns sessions, ratchets and sender-key encryption. The
//! policy only decides which primitive to call and interprets the typed
//! failure it gets back.

use std::future::Future;

use thiserror::Error;

use crate::{
    message::{ContentHint, DataMessage},
    outcome::SendOutcome,
    types::{AccessToken, DistributionId, IdentityKey, Recipient},
};

/// One recipient of a sender-key multicast, with its anonymous-access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastTarget {
    /// Recipient to deliver to.
    pub recipient: Recipient,
    /// Token for unidentified delivery to that recipient.
    pub access: AccessToken,
}

/// Failure of a whole sender-key multicast.
///
/// Per-recipient failures that do not abort the multicast come back as
/// [`SendOutcome`]s instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MulticastError {
    /// A recipient presented an identity key we have not recorded.
    #[error("untrusted identity for {}", recipient.redacted())]
    UntrustedIdentity {
        /// Recipient whose key changed
        recipient: Recipient,
        /// The key it now presents
        identity_key: IdentityKey,
    },

    /// No pairwise session exists to distribute the sender key.
    #[error("no session available for sender key distribution")]
    NoSession,

    /// Key material for the distribution is invalid.
    #[error("invalid sender key material")]
    InvalidKey,

    /// Server rejected an unidentified-access header.
    #[error("invalid unidentified access header")]
    BadAccessHeader,

    /// A recipient is not registered.
    #[error("recipient not found")]
    NotFound,

    /// Sender-key state is inconsistent.
    #[error("illegal sender key state: {0}")]
    IllegalState(String),

    /// Network failure unrelated to the distribution mechanism.
    #[error("network error: {0}")]
    Network(String),
}

/// How the dispatch policy reacts to a [`MulticastError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulticastDisposition {
    /// Record the new identity for the affected recipient and send everyone
    /// else through legacy.
    RecordIdentity,
    /// Key-related failure: rotate our distribution key, then send every
    /// target through legacy.
    RotateAndFallback,
    /// Recipient-related failure: send every target through legacy without
    /// touching keys.
    Fallback,
    /// Not a mechanism failure. Abort the dispatch.
    Abort,
}

impl MulticastError {
    /// Reaction required for this failure.
    ///
    /// Session and key failures point at our distribution key, so it is
    /// replaced. Header and registration failures point at a recipient, and
    /// rotating would only cost a redistribution.
    pub fn disposition(&self) -> MulticastDisposition {
        match self {
            Self::UntrustedIdentity { .. } => MulticastDisposition::RecordIdentity,
            Self::NoSession | Self::InvalidKey | Self::IllegalState(_) => {
                MulticastDisposition::RotateAndFallback
            },
            Self::BadAccessHeader | Self::NotFound => MulticastDisposition::Fallback,
            Self::Network(_) => MulticastDisposition::Abort,
        }
    }
}

/// Failure of a whole legacy fan-out call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Network failure before per-recipient results were available.
    #[error("network error: {0}")]
    Network(String),
}

/// Encrypted send primitives.
///
/// Both calls block the dispatch until the transport returns (its own
/// timeouts are the effective deadline). The legacy call owns its fan-out
/// concurrency.
pub trait Transport: Send + Sync {
    /// Send `message` once, encrypted with our sender key for
    /// `distribution_id`, to every target.
    ///
    /// Distributes the sender key to targets that have not received it yet
    /// and creates it on first use.
    fn send_multicast(
        &self,
        distribution_id: DistributionId,
        targets: &[MulticastTarget],
        content_hint: ContentHint,
        message: &DataMessage,
    ) -> impl Future<Output = Result<Vec<SendOutcome>, MulticastError>> + Send;

    /// Send `message` to each recipient with pairwise encryption.
    fn send_legacy(
        &self,
        message: &DataMessage,
        recipients: &[Recipient],
    ) -> impl Future<Output = Result<Vec<SendOutcome>, TransportError>> + Send;
}
