//! Fixture wiring a complete sender over in-memory collaborators.

use std::collections::HashSet;

use skein_core::{
    AccessToken, Capabilities, ConfigError, DeviceId, DispatchConfig, Environment, Group,
    GroupContext, GroupId, GroupSender, LocalIdentity, Profile, ProfileEntry, Recipient, Store,
};
use skein_runtime::MemoryStore;

use crate::{CountingSessionLock, RecordingRefreshQueue, ScriptedTransport, SimEnv};

/// Wall-clock start of every world (2024-01-01T00:00:00Z).
pub const WORLD_START_MILLIS: u64 = 1_704_067_200_000;

/// Sender type built by [`World`].
pub type WorldSender<S = MemoryStore> =
    GroupSender<S, ScriptedTransport, CountingSessionLock, RecordingRefreshQueue, SimEnv>;

/// Deterministic access token for `recipient`.
pub fn access_token_for(recipient: Recipient) -> AccessToken {
    let mut token = [0u8; 16];
    token.copy_from_slice(&recipient.as_u128().to_be_bytes());
    AccessToken(token)
}

/// One local account and its collaborators.
///
/// All handles are shared: the sender built by [`World::sender`] sees every
/// change made through the world afterwards.
#[derive(Clone)]
pub struct World {
    /// Virtual clock
    pub env: SimEnv,
    /// Backing store
    pub store: MemoryStore,
    /// Transport spy, recording keys into `store`
    pub transport: ScriptedTransport,
    /// Session lock, also probed by the transport
    pub lock: CountingSessionLock,
    /// Refresh recorder
    pub refresh: RecordingRefreshQueue,
    /// Our account on its primary device
    pub local: LocalIdentity,
    /// Configuration for built senders
    pub config: DispatchConfig,
}

impl World {
    /// World for `local` with seed 0, where our own devices support sender
    /// keys.
    pub fn new(local: Recipient) -> Self {
        Self::with_seed(local, 0)
    }

    /// World whose distribution ids follow `seed`.
    pub fn with_seed(local: Recipient, seed: u64) -> Self {
        let env = SimEnv::at(WORLD_START_MILLIS);
        let store = MemoryStore::with_seed(seed);
        let local = LocalIdentity::new(local, DeviceId::PRIMARY);
        let lock = CountingSessionLock::new();
        let transport = ScriptedTransport::new()
            .with_key_ledger(store.clone(), local.address(), env.clone())
            .with_lock_probe(lock.clone());

        let world = Self {
            env,
            store,
            transport,
            lock,
            refresh: RecordingRefreshQueue::new(),
            local,
            config: DispatchConfig::default(),
        };
        world.set_profile(local.recipient, true);
        world
    }

    /// Add a group with us and `members`, where we are the only admin.
    pub fn add_group(&self, id: GroupId, members: &[Recipient]) -> Group {
        let mut all = vec![self.local.recipient];
        all.extend(members.iter().filter(|member| **member != self.local.recipient));
        let group = Group {
            id,
            members: all,
            admins: HashSet::from([self.local.recipient]),
            announcement_only: false,
            expiration_timer_secs: 0,
            context: GroupContext { master_key: id.0, revision: 1 },
        };
        self.store.insert_group(group.clone());
        group
    }

    /// Cache a fetched profile for `recipient`, updated now.
    pub fn set_profile(&self, recipient: Recipient, sender_key: bool) {
        self.store.set_profile(ProfileEntry {
            recipient,
            profile: Some(Profile { capabilities: Capabilities { sender_key } }),
            last_updated_millis: self.env.wall_clock_millis(),
        });
    }

    /// Give `recipient` an anonymous-access token.
    pub fn grant_access(&self, recipient: Recipient) {
        self.store.set_access_credential(recipient, access_token_for(recipient));
    }

    /// Make `recipient` reachable through sender keys.
    pub fn make_eligible(&self, recipient: Recipient) {
        self.set_profile(recipient, true);
        self.grant_access(recipient);
    }

    /// Build a sender over this world's store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `self.config` is invalid.
    pub fn sender(&self) -> Result<WorldSender, ConfigError> {
        self.sender_with_store(self.store.clone())
    }

    /// Build a sender over `store`, typically a wrapper around this world's
    /// store.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `self.config` is invalid.
    pub fn sender_with_store<S: Store>(&self, store: S) -> Result<WorldSender<S>, ConfigError> {
        GroupSender::new(
            self.local,
            store,
            self.transport.clone(),
            self.lock.clone(),
            self.refresh.clone(),
            self.env.clone(),
            self.config.clone(),
        )
    }
}
