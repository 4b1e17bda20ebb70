//! Storage seams consumed by the policy layer.
//!
//! Trait-based abstraction over groups, profiles, sender-key material and
//! identities. The traits are synchronous (no async) to keep the policy's
//! only suspension points at the transport. Implementations typically share
//! internal state via Arc, so clones access the same underlying storage.

mod error;

use std::collections::HashSet;

pub use error::StoreError;
use serde::{Deserialize, Serialize};

use crate::{
    message::GroupContext,
    types::{
        AccessToken, DistributionId, GroupId, IdentityKey, ProtocolAddress, Recipient, TrustLevel,
    },
};

/// Snapshot of a group as the sender sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Group identifier.
    pub id: GroupId,
    /// Every member, including ourselves.
    pub members: Vec<Recipient>,
    /// Members allowed to post when the group is announcement-only.
    pub admins: HashSet<Recipient>,
    /// Only admins may send.
    pub announcement_only: bool,
    /// Disappearing-message timer in seconds. 0 disables it.
    pub expiration_timer_secs: u32,
    /// Protocol-level group binding for outgoing messages.
    pub context: GroupContext,
}

impl Group {
    /// Check if `recipient` is an admin.
    pub fn is_admin(&self, recipient: &Recipient) -> bool {
        self.admins.contains(recipient)
    }

    /// Every member except `local`.
    pub fn members_excluding(&self, local: &Recipient) -> Vec<Recipient> {
        self.members.iter().filter(|member| *member != local).copied().collect()
    }
}

/// Capability flags advertised by a profile.
///
/// For our own account the flags are the intersection over all linked
/// devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Every device can receive sender-key messages.
    pub sender_key: bool,
}

/// Decrypted profile content relevant to sending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Advertised capabilities.
    pub capabilities: Capabilities,
}

/// Locally cached profile state for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Whose profile this is.
    pub recipient: Recipient,
    /// Decrypted profile. `None` until the first successful fetch.
    pub profile: Option<Profile>,
    /// Wall-clock milliseconds of the last fetch attempt.
    pub last_updated_millis: u64,
}

impl ProfileEntry {
    /// True if a profile was fetched and it advertises sender-key support.
    pub fn supports_sender_key(&self) -> bool {
        self.profile.as_ref().is_some_and(|profile| profile.capabilities.sender_key)
    }
}

/// Creation record of our sender key for one distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionKeyRecord {
    /// Device that owns the key.
    pub address: ProtocolAddress,
    /// Distribution the key belongs to.
    pub distribution_id: DistributionId,
    /// Wall-clock milliseconds when the key was created.
    pub created_at_millis: u64,
}

/// Group state lookups.
pub trait GroupStore: Send + Sync {
    /// Load a group. `None` if we do not know it.
    fn group(&self, id: &GroupId) -> Result<Option<Group>, StoreError>;

    /// Distribution id of a group, creating and persisting one on first use.
    ///
    /// # Invariants
    ///
    /// - Post: repeated calls for the same group return the same id
    fn get_or_create_distribution_id(&self, id: &GroupId) -> Result<DistributionId, StoreError>;
}

/// Cached profiles and anonymous-access credentials.
pub trait ProfileStore: Send + Sync {
    /// Cached profile entry. `None` if the recipient was never fetched.
    fn profile_entry(&self, recipient: &Recipient) -> Result<Option<ProfileEntry>, StoreError>;

    /// Anonymous-access token. `None` if no profile key is known, so no
    /// token can be derived.
    fn access_credential(&self, recipient: &Recipient)
    -> Result<Option<AccessToken>, StoreError>;
}

/// Sender-key material and the ledger of who it was shared with.
pub trait SenderKeyStore: Send + Sync {
    /// Creation time of the sender key owned by `address`.
    ///
    /// Returns `None` if no key exists yet.
    fn key_created_at(
        &self,
        address: &ProtocolAddress,
        distribution_id: DistributionId,
    ) -> Result<Option<u64>, StoreError>;

    /// Delete the sender keys of every device of `owner`.
    fn delete_sender_keys_for(
        &self,
        owner: &Recipient,
        distribution_id: DistributionId,
    ) -> Result<(), StoreError>;

    /// Forget every peer the distribution key was shared with.
    fn delete_shared_records_for(&self, distribution_id: DistributionId)
    -> Result<(), StoreError>;

    /// Remove key material and shared records together.
    ///
    /// The default runs the two deletes in sequence. Backends that can write
    /// both in one transaction should override this.
    ///
    /// # Invariants
    ///
    /// - Post (on `Ok`): no key for `(owner, distribution_id)` and no shared
    ///   record for `distribution_id` remain
    fn purge_distribution(
        &self,
        owner: &Recipient,
        distribution_id: DistributionId,
    ) -> Result<(), StoreError> {
        self.delete_sender_keys_for(owner, distribution_id)?;
        self.delete_shared_records_for(distribution_id)
    }
}

/// Identity key trust records.
pub trait IdentityStore: Send + Sync {
    /// Record `identity_key` for `recipient` at `trust_level`, replacing any
    /// previous key.
    fn save_identity(
        &self,
        recipient: &Recipient,
        identity_key: &IdentityKey,
        trust_level: TrustLevel,
    ) -> Result<(), StoreError>;
}

/// Every store seam at once, for backends that implement them together.
///
/// Must be Clone (shared between the dispatcher and the key lifecycle
/// manager) and `'static`.
pub trait Store:
    GroupStore + ProfileStore + SenderKeyStore + IdentityStore + Clone + 'static
{
}

impl<T> Store for T where
    T: GroupStore + ProfileStore + SenderKeyStore + IdentityStore + Clone + 'static
{
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        Group {
            id: GroupId([1; 32]),
            members: vec![Recipient::new(1), Recipient::new(2), Recipient::new(3)],
            admins: HashSet::from([Recipient::new(1)]),
            announcement_only: false,
            expiration_timer_secs: 0,
            context: GroupContext { master_key: [0; 32], revision: 0 },
        }
    }

    #[test]
    fn members_excluding_drops_only_local() {
        let members = group().members_excluding(&Recipient::new(2));
        assert_eq!(members, vec![Recipient::new(1), Recipient::new(3)]);
    }

    #[test]
    fn admin_lookup() {
        let group = group();
        assert!(group.is_admin(&Recipient::new(1)));
        assert!(!group.is_admin(&Recipient::new(2)));
    }

    #[test]
    fn entry_without_profile_does_not_support_sender_key() {
        let entry =
            ProfileEntry { recipient: Recipient::new(1), profile: None, last_updated_millis: 0 };
        assert!(!entry.supports_sender_key());

        let entry = ProfileEntry {
            profile: Some(Profile { capabilities: Capabilities { sender_key: true } }),
            ..entry
        };
        assert!(entry.supports_sender_key());
    }
}
