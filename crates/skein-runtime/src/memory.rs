//! In-memory store backing every store trait.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use skein_core::{
    AccessToken, DistributionId, Group, GroupId, GroupStore, IdentityKey, IdentityStore,
    ProfileEntry, ProfileStore, ProtocolAddress, Recipient, SenderKeyStore, StoreError, TrustLevel,
};

/// In-memory implementation of every store trait.
///
/// All state sits behind one `Arc<Mutex<>>`, so clones share it and
/// [`SenderKeyStore::purge_distribution`] removes key material and shared
/// records in a single critical section. Uses `lock().expect()`, which
/// panics if the mutex is poisoned.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

struct MemoryStoreInner {
    groups: HashMap<GroupId, Group>,

    /// Distribution id per group, assigned on first sender-key send
    distribution_ids: HashMap<GroupId, DistributionId>,

    profiles: HashMap<Recipient, ProfileEntry>,

    access: HashMap<Recipient, AccessToken>,

    /// Sender key creation time (millis) keyed by owning device
    sender_keys: HashMap<(ProtocolAddress, DistributionId), u64>,

    /// Peer devices each distribution key was handed to
    shared: HashMap<DistributionId, HashSet<ProtocolAddress>>,

    identities: HashMap<Recipient, (IdentityKey, TrustLevel)>,

    /// Source of fresh distribution ids
    rng: ChaCha20Rng,
}

impl MemoryStore {
    /// Create an empty store with randomly seeded distribution ids.
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().r#gen())
    }

    /// Create an empty store whose distribution ids follow `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                groups: HashMap::new(),
                distribution_ids: HashMap::new(),
                profiles: HashMap::new(),
                access: HashMap::new(),
                sender_keys: HashMap::new(),
                shared: HashMap::new(),
                identities: HashMap::new(),
                rng: ChaCha20Rng::seed_from_u64(seed),
            })),
        }
    }

    /// Insert or replace a group.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn insert_group(&self, group: Group) {
        self.inner.lock().expect("Mutex poisoned").groups.insert(group.id, group);
    }

    /// Insert or replace a cached profile entry.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn set_profile(&self, entry: ProfileEntry) {
        self.inner.lock().expect("Mutex poisoned").profiles.insert(entry.recipient, entry);
    }

    /// Set the anonymous-access token for `recipient`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn set_access_credential(&self, recipient: Recipient, token: AccessToken) {
        self.inner.lock().expect("Mutex poisoned").access.insert(recipient, token);
    }

    /// Forget the anonymous-access token for `recipient`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn clear_access_credential(&self, recipient: &Recipient) {
        self.inner.lock().expect("Mutex poisoned").access.remove(recipient);
    }

    /// Record that `address` created its key for `distribution_id` at
    /// `created_at_millis`. Transports call this when they create a key.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn record_sender_key(
        &self,
        address: ProtocolAddress,
        distribution_id: DistributionId,
        created_at_millis: u64,
    ) {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .sender_keys
            .insert((address, distribution_id), created_at_millis);
    }

    /// Record that the key for `distribution_id` was handed to `peer`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn mark_shared(&self, distribution_id: DistributionId, peer: ProtocolAddress) {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .shared
            .entry(distribution_id)
            .or_default()
            .insert(peer);
    }

    /// Check if `address` holds a key for `distribution_id`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn has_sender_key(
        &self,
        address: &ProtocolAddress,
        distribution_id: DistributionId,
    ) -> bool {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .sender_keys
            .contains_key(&(*address, distribution_id))
    }

    /// Peers the key for `distribution_id` was handed to, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn shared_with(&self, distribution_id: DistributionId) -> Vec<ProtocolAddress> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        let mut peers: Vec<_> =
            inner.shared.get(&distribution_id).into_iter().flatten().copied().collect();
        peers.sort_unstable();
        peers
    }

    /// Recorded identity key and trust level for `recipient`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn identity(&self, recipient: &Recipient) -> Option<(IdentityKey, TrustLevel)> {
        self.inner.lock().expect("Mutex poisoned").identities.get(recipient).cloned()
    }

    /// Distribution id assigned to a group, without creating one.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn distribution_id(&self, group_id: &GroupId) -> Option<DistributionId> {
        self.inner.lock().expect("Mutex poisoned").distribution_ids.get(group_id).copied()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn group(&self, id: &GroupId) -> Result<Option<Group>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").groups.get(id).cloned())
    }

    #[allow(clippy::expect_used)]
    fn get_or_create_distribution_id(&self, id: &GroupId) -> Result<DistributionId, StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let inner = &mut *inner;
        let distribution_id = *inner
            .distribution_ids
            .entry(*id)
            .or_insert_with(|| DistributionId(inner.rng.r#gen()));
        Ok(distribution_id)
    }
}

impl ProfileStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn profile_entry(&self, recipient: &Recipient) -> Result<Option<ProfileEntry>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").profiles.get(recipient).cloned())
    }

    #[allow(clippy::expect_used)]
    fn access_credential(
        &self,
        recipient: &Recipient,
    ) -> Result<Option<AccessToken>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").access.get(recipient).cloned())
    }
}

impl SenderKeyStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn key_created_at(
        &self,
        address: &ProtocolAddress,
        distribution_id: DistributionId,
    ) -> Result<Option<u64>, StoreError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.sender_keys.get(&(*address, distribution_id)).copied())
    }

    #[allow(clippy::expect_used)]
    fn delete_sender_keys_for(
        &self,
        owner: &Recipient,
        distribution_id: DistributionId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        remove_owned_keys(&mut inner.sender_keys, owner, distribution_id);
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn delete_shared_records_for(
        &self,
        distribution_id: DistributionId,
    ) -> Result<(), StoreError> {
        self.inner.lock().expect("Mutex poisoned").shared.remove(&distribution_id);
        Ok(())
    }

    /// Both deletes under one lock acquisition.
    #[allow(clippy::expect_used)]
    fn purge_distribution(
        &self,
        owner: &Recipient,
        distribution_id: DistributionId,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        remove_owned_keys(&mut inner.sender_keys, owner, distribution_id);
        inner.shared.remove(&distribution_id);
        Ok(())
    }
}

impl IdentityStore for MemoryStore {
    #[allow(clippy::expect_used)]
    fn save_identity(
        &self,
        recipient: &Recipient,
        identity_key: &IdentityKey,
        trust_level: TrustLevel,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .identities
            .insert(*recipient, (identity_key.clone(), trust_level));
        Ok(())
    }
}

/// Drop the keys of every device of `owner` for `distribution_id`.
fn remove_owned_keys(
    keys: &mut HashMap<(ProtocolAddress, DistributionId), u64>,
    owner: &Recipient,
    distribution_id: DistributionId,
) {
    keys.retain(|(address, id), _| !(address.recipient == *owner && *id == distribution_id));
}

#[cfg(test)]
mod tests {
    use skein_core::{Capabilities, DeviceId, GroupContext, Profile};

    use super::*;

    const ME: Recipient = Recipient::new(1);
    const ALICE: Recipient = Recipient::new(2);

    fn test_group(id: u8) -> Group {
        Group {
            id: GroupId([id; 32]),
            members: vec![ME, ALICE],
            admins: HashSet::new(),
            announcement_only: false,
            expiration_timer_secs: 0,
            context: GroupContext { master_key: [id; 32], revision: 1 },
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = MemoryStore::with_seed(1);
        assert_eq!(store.group(&GroupId([1; 32])).unwrap(), None);
        assert_eq!(store.profile_entry(&ALICE).unwrap(), None);
        assert_eq!(store.access_credential(&ALICE).unwrap(), None);
        assert_eq!(store.distribution_id(&GroupId([1; 32])), None);
    }

    #[test]
    fn test_insert_and_load_group() {
        let store = MemoryStore::with_seed(1);
        store.insert_group(test_group(1));

        assert_eq!(store.group(&GroupId([1; 32])).unwrap(), Some(test_group(1)));
        assert_eq!(store.group(&GroupId([2; 32])).unwrap(), None);
    }

    #[test]
    fn test_distribution_id_is_stable_per_group() {
        let store = MemoryStore::with_seed(1);
        let first = store.get_or_create_distribution_id(&GroupId([1; 32])).unwrap();
        let again = store.get_or_create_distribution_id(&GroupId([1; 32])).unwrap();
        let other = store.get_or_create_distribution_id(&GroupId([2; 32])).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(store.distribution_id(&GroupId([1; 32])), Some(first));
    }

    #[test]
    fn test_distribution_ids_follow_seed() {
        let a = MemoryStore::with_seed(42);
        let b = MemoryStore::with_seed(42);
        assert_eq!(
            a.get_or_create_distribution_id(&GroupId([1; 32])).unwrap(),
            b.get_or_create_distribution_id(&GroupId([1; 32])).unwrap()
        );
    }

    #[test]
    fn test_clones_share_state() {
        let store = MemoryStore::with_seed(1);
        let clone = store.clone();
        clone.set_profile(ProfileEntry {
            recipient: ALICE,
            profile: Some(Profile { capabilities: Capabilities { sender_key: true } }),
            last_updated_millis: 10,
        });

        assert!(store.profile_entry(&ALICE).unwrap().unwrap().supports_sender_key());
    }

    #[test]
    fn test_access_credential_set_and_clear() {
        let store = MemoryStore::with_seed(1);
        store.set_access_credential(ALICE, AccessToken([7; 16]));
        assert_eq!(store.access_credential(&ALICE).unwrap(), Some(AccessToken([7; 16])));

        store.clear_access_credential(&ALICE);
        assert_eq!(store.access_credential(&ALICE).unwrap(), None);
    }

    #[test]
    fn test_purge_removes_every_owned_device_and_shared_records() {
        let store = MemoryStore::with_seed(1);
        let id = DistributionId(9);
        let phone = ProtocolAddress::new(ME, DeviceId(1));
        let laptop = ProtocolAddress::new(ME, DeviceId(2));
        let peer = ProtocolAddress::new(ALICE, DeviceId(1));
        store.record_sender_key(phone, id, 100);
        store.record_sender_key(laptop, id, 100);
        store.record_sender_key(peer, id, 100);
        store.record_sender_key(phone, DistributionId(10), 100);
        store.mark_shared(id, peer);
        store.mark_shared(DistributionId(10), peer);

        store.purge_distribution(&ME, id).unwrap();

        assert!(!store.has_sender_key(&phone, id));
        assert!(!store.has_sender_key(&laptop, id));
        assert!(store.has_sender_key(&peer, id));
        assert!(store.has_sender_key(&phone, DistributionId(10)));
        assert!(store.shared_with(id).is_empty());
        assert_eq!(store.shared_with(DistributionId(10)), vec![peer]);
    }

    #[test]
    fn test_key_created_at() {
        let store = MemoryStore::with_seed(1);
        let phone = ProtocolAddress::new(ME, DeviceId(1));
        store.record_sender_key(phone, DistributionId(9), 1234);

        assert_eq!(store.key_created_at(&phone, DistributionId(9)).unwrap(), Some(1234));
        assert_eq!(store.key_created_at(&phone, DistributionId(8)).unwrap(), None);
    }

    #[test]
    fn test_save_identity_overwrites() {
        let store = MemoryStore::with_seed(1);
        store.save_identity(&ALICE, &IdentityKey(vec![1]), TrustLevel::Untrusted).unwrap();
        store
            .save_identity(&ALICE, &IdentityKey(vec![2]), TrustLevel::TrustedUnverified)
            .unwrap();

        assert_eq!(
            store.identity(&ALICE),
            Some((IdentityKey(vec![2]), TrustLevel::TrustedUnverified))
        );
    }
}
