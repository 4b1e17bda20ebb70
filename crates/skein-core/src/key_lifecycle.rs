//! Distribution key lifecycle.
//!
//! Our sender key for a distribution is created by the transport on first
//! use. This module decides when it has grown too old and replaces it by
//! purging both the key material and the record of which peers received it.
//! The transport then creates and redistributes a fresh key on the next
//! multicast.
//!
//! Purging only one half is unsafe: stale shared records make the transport
//! skip redistribution (recipients cannot decrypt), and stale keys with no
//! shared records cause redundant redistribution. Rotation therefore runs
//! entirely under the session lock and any store failure is fatal to the
//! current dispatch.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::{
    env::Environment,
    lock::SessionLock,
    store::{SenderKeyStore, StoreError},
    types::{DistributionId, ProtocolAddress},
};

/// Errors from key lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyLifecycleError {
    /// Reading the key creation time failed.
    #[error("failed to read sender key age: {0}")]
    Store(#[from] StoreError),

    /// Rotation did not complete. Key state may be half purged.
    #[error("sender key rotation failed for {distribution_id}: {source}")]
    Rotation {
        /// Distribution that was being rotated
        distribution_id: DistributionId,
        /// Underlying store failure
        source: StoreError,
    },
}

/// Age tracking and rotation of our own sender key.
pub struct KeyLifecycle<K, L, E> {
    keys: K,
    lock: L,
    env: E,
    /// Our sending device; keys are looked up under this address.
    address: ProtocolAddress,
    max_age: Duration,
}

impl<K: SenderKeyStore, L: SessionLock, E: Environment> KeyLifecycle<K, L, E> {
    /// Manager for the key owned by `address`, rotated once older than
    /// `max_age`.
    pub fn new(keys: K, lock: L, env: E, address: ProtocolAddress, max_age: Duration) -> Self {
        Self { keys, lock, env, address, max_age }
    }

    /// Maximum age before rotation.
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Age of our key for `distribution_id`. `None` if no key exists.
    ///
    /// A creation time in the future (clock skew) counts as age zero.
    pub fn key_age(
        &self,
        distribution_id: DistributionId,
    ) -> Result<Option<Duration>, KeyLifecycleError> {
        let created_at = self.keys.key_created_at(&self.address, distribution_id)?;
        let now = self.env.wall_clock_millis();
        Ok(created_at.map(|created_at| Duration::from_millis(now.saturating_sub(created_at))))
    }

    /// True if our key exists and is strictly older than the maximum age.
    ///
    /// A missing key is never due: the transport creates one on first use.
    pub fn is_rotation_due(
        &self,
        distribution_id: DistributionId,
    ) -> Result<bool, KeyLifecycleError> {
        Ok(self.key_age(distribution_id)?.is_some_and(|age| age > self.max_age))
    }

    /// Purge our key material and its shared records for
    /// `distribution_id`.
    ///
    /// # Invariants
    ///
    /// - The session lock is held for the whole purge and released on every
    ///   exit path
    /// - Post (on `Ok`): neither key material nor shared records remain
    pub fn rotate(&self, distribution_id: DistributionId) -> Result<(), KeyLifecycleError> {
        let _guard = self.lock.acquire();
        self.purge(distribution_id)
    }

    /// Rotate if the key is older than the maximum age.
    ///
    /// The age is checked again once the session lock is held. A concurrent
    /// send may have rotated and recreated the key while we waited, and that
    /// fresh key must survive.
    ///
    /// Returns whether a rotation happened.
    pub fn rotate_if_due(
        &self,
        distribution_id: DistributionId,
    ) -> Result<bool, KeyLifecycleError> {
        if !self.is_rotation_due(distribution_id)? {
            return Ok(false);
        }

        let _guard = self.lock.acquire();
        let Some(age) = self.key_age(distribution_id)?.filter(|age| *age > self.max_age) else {
            debug!(distribution_id = %distribution_id, "sender key already rotated");
            return Ok(false);
        };

        debug!(
            distribution_id = %distribution_id,
            age_ms = age.as_millis() as u64,
            age_days = age.as_secs() / 86_400,
            "sender key exceeded max age, rotating"
        );
        self.purge(distribution_id)?;
        Ok(true)
    }

    /// Delete both halves of the key state. Caller holds the session lock.
    fn purge(&self, distribution_id: DistributionId) -> Result<(), KeyLifecycleError> {
        self.keys
            .purge_distribution(&self.address.recipient, distribution_id)
            .map_err(|source| KeyLifecycleError::Rotation { distribution_id, source })?;

        debug!(distribution_id = %distribution_id, "rotated sender key");
        Ok(())
    }
}
