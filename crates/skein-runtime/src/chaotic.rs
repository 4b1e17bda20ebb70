//! Chaotic store wrapper for fault injection testing
//!
//! Delegates to an underlying store but fails a configurable fraction of
//! operations. Failures can be limited to a set of operations, which is how
//! tests reach a single failure path (for example a half-completed rotation)
//! without disturbing the rest of the dispatch.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use skein_core::{
    AccessToken, DistributionId, Group, GroupId, GroupStore, IdentityKey, IdentityStore,
    ProfileEntry, ProfileStore, ProtocolAddress, Recipient, SenderKeyStore, Store, StoreError,
    TrustLevel,
};

/// Store operations that can be targeted for failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// [`GroupStore::group`]
    Group,
    /// [`GroupStore::get_or_create_distribution_id`]
    DistributionId,
    /// [`ProfileStore::profile_entry`]
    ProfileEntry,
    /// [`ProfileStore::access_credential`]
    AccessCredential,
    /// [`SenderKeyStore::key_created_at`]
    KeyCreatedAt,
    /// [`SenderKeyStore::delete_sender_keys_for`]
    DeleteSenderKeys,
    /// [`SenderKeyStore::delete_shared_records_for`]
    DeleteSharedRecords,
    /// [`IdentityStore::save_identity`]
    SaveIdentity,
}

/// Chaotic store wrapper that randomly injects failures
///
/// Uses `Arc<Mutex<>>` for the RNG state, making it Clone and thread-safe.
/// Rotation goes through the default `purge_distribution`, so the two
/// deletes are separately injectable even when the inner store purges
/// atomically.
#[derive(Clone)]
pub struct ChaoticStore<S: Store> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// Operations eligible for failure. `None` means every operation.
    targets: Option<Arc<HashSet<StoreOp>>>,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<Mutex<usize>>,
}

/// Linear congruential generator, reproducible with the same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: Store> ChaoticStore<S> {
    /// Wrap `inner`, failing operations with probability `failure_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            targets: None,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Restrict failures to `ops`. Other operations always pass through.
    #[must_use]
    pub fn targeting(mut self, ops: impl IntoIterator<Item = StoreOp>) -> Self {
        self.targets = Some(Arc::new(ops.into_iter().collect()));
        self
    }

    /// Underlying store (for checking state after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of store operations attempted.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Count the operation and decide whether it fails.
    fn inject(&self, op: StoreOp) -> Result<(), StoreError> {
        #[allow(clippy::expect_used)]
        {
            *self.operation_count.lock().expect("operation_count mutex poisoned") += 1;
        }

        if self.targets.as_ref().is_some_and(|targets| !targets.contains(&op)) {
            return Ok(());
        }

        #[allow(clippy::expect_used)]
        let fail =
            self.rng.lock().expect("ChaoticRng mutex poisoned").should_fail(self.failure_rate);
        if fail {
            return Err(StoreError::Io(format!("chaotic failure injection ({op:?})")));
        }
        Ok(())
    }
}

impl<S: Store> GroupStore for ChaoticStore<S> {
    fn group(&self, id: &GroupId) -> Result<Option<Group>, StoreError> {
        self.inject(StoreOp::Group)?;
        self.inner.group(id)
    }

    fn get_or_create_distribution_id(&self, id: &GroupId) -> Result<DistributionId, StoreError> {
        self.inject(StoreOp::DistributionId)?;
        self.inner.get_or_create_distribution_id(id)
    }
}

impl<S: Store> ProfileStore for ChaoticStore<S> {
    fn profile_entry(&self, recipient: &Recipient) -> Result<Option<ProfileEntry>, StoreError> {
        self.inject(StoreOp::ProfileEntry)?;
        self.inner.profile_entry(recipient)
    }

    fn access_credential(
        &self,
        recipient: &Recipient,
    ) -> Result<Option<AccessToken>, StoreError> {
        self.inject(StoreOp::AccessCredential)?;
        self.inner.access_credential(recipient)
    }
}

impl<S: Store> SenderKeyStore for ChaoticStore<S> {
    fn key_created_at(
        &self,
        address: &ProtocolAddress,
        distribution_id: DistributionId,
    ) -> Result<Option<u64>, StoreError> {
        self.inject(StoreOp::KeyCreatedAt)?;
        self.inner.key_created_at(address, distribution_id)
    }

    fn delete_sender_keys_for(
        &self,
        owner: &Recipient,
        distribution_id: DistributionId,
    ) -> Result<(), StoreError> {
        self.inject(StoreOp::DeleteSenderKeys)?;
        self.inner.delete_sender_keys_for(owner, distribution_id)
    }

    fn delete_shared_records_for(
        &self,
        distribution_id: DistributionId,
    ) -> Result<(), StoreError> {
        self.inject(StoreOp::DeleteSharedRecords)?;
        self.inner.delete_shared_records_for(distribution_id)
    }
}

impl<S: Store> IdentityStore for ChaoticStore<S> {
    fn save_identity(
        &self,
        recipient: &Recipient,
        identity_key: &IdentityKey,
        trust_level: TrustLevel,
    ) -> Result<(), StoreError> {
        self.inject(StoreOp::SaveIdentity)?;
        self.inner.save_identity(recipient, identity_key, trust_level)
    }
}
