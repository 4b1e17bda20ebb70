//! Eligibility classification.
//!
//! Splits the recipients of one send into sender-key targets and legacy
//! targets. The per-recipient rule is the pure function
//! [`classify_recipient`]; [`EligibilityClassifier`] feeds it from the
//! profile store and queues profile refreshes along the way.
//!
//! Classification never fails. A store error degrades the affected recipient
//! (or, for our own profile, the whole send) to legacy.

use tracing::{debug, warn};

use crate::{
    refresh::RefreshQueue,
    store::{ProfileEntry, ProfileStore},
    transport::MulticastTarget,
    types::{AccessToken, Recipient},
};

/// Why a recipient cannot be reached through sender keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyReason {
    /// One of our own linked devices lacks sender-key support.
    SelfUnsupported,
    /// No profile is cached for the recipient.
    NoProfile,
    /// The recipient's profile does not advertise sender-key support.
    NoSenderKeyCapability,
    /// No anonymous-access token can be derived for the recipient.
    NoAccessCredential,
    /// Looking up the recipient failed.
    LookupFailed,
}

/// Transport mechanism chosen for one recipient in one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendTarget {
    /// Reachable through the multicast, with this access token.
    SenderKey(AccessToken),
    /// Must be sent one-to-one.
    Legacy(LegacyReason),
}

/// Decide the mechanism for one recipient.
///
/// Checks run in order: profile known, sender-key capability, access
/// credential. The first failing check names the reason.
pub fn classify_recipient(entry: Option<&ProfileEntry>, access: Option<AccessToken>) -> SendTarget {
    let Some(profile) = entry.and_then(|entry| entry.profile.as_ref()) else {
        return SendTarget::Legacy(LegacyReason::NoProfile);
    };
    if !profile.capabilities.sender_key {
        return SendTarget::Legacy(LegacyReason::NoSenderKeyCapability);
    }
    match access {
        Some(token) => SendTarget::SenderKey(token),
        None => SendTarget::Legacy(LegacyReason::NoAccessCredential),
    }
}

/// Recipients of one send, partitioned by mechanism.
///
/// Order within each list follows the input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Recipients reachable through the multicast.
    pub sender_key: Vec<MulticastTarget>,
    /// Recipients that need one-to-one sends.
    pub legacy: Vec<Recipient>,
}

impl Classification {
    /// Both mechanisms would be needed.
    pub fn is_mixed(&self) -> bool {
        !self.sender_key.is_empty() && !self.legacy.is_empty()
    }
}

/// Classifier backed by the profile store.
pub struct EligibilityClassifier<'a, P, R> {
    profiles: &'a P,
    refresh: &'a R,
}

impl<'a, P: ProfileStore, R: RefreshQueue> EligibilityClassifier<'a, P, R> {
    /// Classifier reading `profiles` and queueing refreshes on `refresh`.
    pub fn new(profiles: &'a P, refresh: &'a R) -> Self {
        Self { profiles, refresh }
    }

    /// Partition `recipients` for a send from `local`.
    ///
    /// If our own devices do not all support sender keys, every recipient is
    /// legacy and no per-recipient lookups happen.
    pub fn classify(&self, local: &Recipient, recipients: &[Recipient]) -> Classification {
        if !self.local_supports_sender_key(local) {
            debug!("not all linked devices support sender keys, using legacy send");
            return Classification { sender_key: Vec::new(), legacy: recipients.to_vec() };
        }

        let mut classification = Classification::default();
        for &recipient in recipients {
            match self.classify_one(recipient) {
                SendTarget::SenderKey(access) => {
                    classification.sender_key.push(MulticastTarget { recipient, access });
                },
                SendTarget::Legacy(reason) => {
                    debug!(
                        recipient = %recipient.redacted(),
                        ?reason,
                        "cannot send using sender keys"
                    );
                    classification.legacy.push(recipient);
                },
            }
        }
        classification
    }

    fn local_supports_sender_key(&self, local: &Recipient) -> bool {
        match self.profiles.profile_entry(local) {
            Ok(entry) => {
                let supported = entry.as_ref().is_some_and(ProfileEntry::supports_sender_key);
                if !supported {
                    self.refresh.queue_if_needed(local, entry.as_ref());
                }
                supported
            },
            Err(e) => {
                warn!(error = %e, "failed to load own profile, using legacy send");
                false
            },
        }
    }

    fn classify_one(&self, recipient: Recipient) -> SendTarget {
        let entry = match self.profiles.profile_entry(&recipient) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(recipient = %recipient.redacted(), error = %e, "profile lookup failed");
                return SendTarget::Legacy(LegacyReason::LookupFailed);
            },
        };
        self.refresh.queue_if_needed(&recipient, entry.as_ref());

        let access = match self.profiles.access_credential(&recipient) {
            Ok(access) => access,
            Err(e) => {
                warn!(recipient = %recipient.redacted(), error = %e, "access lookup failed");
                return SendTarget::Legacy(LegacyReason::LookupFailed);
            },
        };

        classify_recipient(entry.as_ref(), access)
    }
}
