//! Group send dispatch.
//!
//! [`GroupSender`] turns one group message into at most two transport calls:
//! a sender-key multicast and a legacy one-to-one fan-out. Classification
//! decides which of the two is used. A recipient set that needs both is
//! collapsed to legacy for everyone, and a failed multicast falls back to
//! legacy for the targets it could not reach.
//!
//! ```text
//! Classifying ─┬─> AllSenderKey ──> Multicast ─┬─> Reconciled
//!              │                               └─> Fallback ─┐
//!              ├─> Mixed ─┐                                  │
//!              └─> AllLegacy <───────────────────────────────┘
//!                     └─> Legacy ──> Reconciled
//! ```
//!
//! There is exactly one fallback step and no retries.

use std::collections::HashSet;

use tracing::{debug, error, warn};

use crate::{
    config::{ConfigError, DispatchConfig},
    eligibility::{Classification, EligibilityClassifier},
    env::Environment,
    error::DispatchError,
    key_lifecycle::KeyLifecycle,
    lock::SessionLock,
    message::DataMessage,
    outcome::SendOutcome,
    refresh::RefreshQueue,
    store::Store,
    transport::{MulticastDisposition, MulticastError, MulticastTarget, Transport, TransportError},
    types::{GroupId, IdentityKey, LocalIdentity, Recipient},
};

/// What the sender-key attempt produced.
struct MulticastAttempt {
    /// Outcomes to report from the sender-key path.
    outcomes: Vec<SendOutcome>,
    /// Targets that still need a legacy send.
    fallback: Vec<Recipient>,
}

/// Sends group messages for one local account.
pub struct GroupSender<S, T, L, R, E>
where
    S: Store,
    T: Transport,
    L: SessionLock,
    R: RefreshQueue,
    E: Environment,
{
    /// Our account and sending device
    local: LocalIdentity,
    /// Groups, profiles, identities
    store: S,
    /// Age checks and rotation of our distribution keys
    keys: KeyLifecycle<S, L, E>,
    /// Encrypted send primitives
    transport: T,
    /// Background profile refreshes
    refresh: R,
    config: DispatchConfig,
}

impl<S, T, L, R, E> GroupSender<S, T, L, R, E>
where
    S: Store,
    T: Transport,
    L: SessionLock,
    R: RefreshQueue,
    E: Environment,
{
    /// Create a sender for `local`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `config` fails validation.
    pub fn new(
        local: LocalIdentity,
        store: S,
        transport: T,
        lock: L,
        refresh: R,
        env: E,
        config: DispatchConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let keys =
            KeyLifecycle::new(store.clone(), lock, env, local.address(), config.max_key_age());
        Ok(Self { local, store, keys, transport, refresh, config })
    }

    /// Our account.
    pub fn local(&self) -> &LocalIdentity {
        &self.local
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Key lifecycle manager for our distribution keys.
    pub fn key_lifecycle(&self) -> &KeyLifecycle<S, L, E> {
        &self.keys
    }

    /// Send `message` to a group.
    ///
    /// `recipients` restricts the send to a subset of members. `None` sends
    /// to every member except ourselves.
    ///
    /// Returns sender-key outcomes followed by legacy outcomes. Identity
    /// changes reported in any outcome are recorded before returning. An
    /// untrusted identity from the multicast is recorded immediately, so it
    /// survives a failing legacy call.
    ///
    /// # Errors
    ///
    /// - `UnknownGroup` / `NoSendPermission` before anything is looked up or
    ///   sent
    /// - `Store` if the group, distribution id or key age cannot be read
    /// - `KeyLifecycle` if a rotation fails (no legacy send follows)
    /// - `Transport` if the multicast hits a network error or the legacy
    ///   call fails as a whole
    pub async fn send_group_message(
        &self,
        message: DataMessage,
        group_id: &GroupId,
        recipients: Option<Vec<Recipient>>,
    ) -> Result<Vec<SendOutcome>, DispatchError> {
        let group = self.store.group(group_id)?.ok_or(DispatchError::UnknownGroup(*group_id))?;
        let recipients =
            recipients.unwrap_or_else(|| group.members_excluding(&self.local.recipient));

        if group.announcement_only && !group.is_admin(&self.local.recipient) {
            warn!(group_id = %group_id, "refusing to send to announcement-only group as non-admin");
            return Err(DispatchError::NoSendPermission(*group_id));
        }

        let mut message = message;
        if group.expiration_timer_secs != 0 {
            message = message.with_expiration(group.expiration_timer_secs);
        }
        let message = message.as_group_message(group.context);

        let Classification { sender_key, mut legacy } =
            EligibilityClassifier::new(&self.store, &self.refresh)
                .classify(&self.local.recipient, &recipients);

        let mut results = Vec::with_capacity(recipients.len());
        let mut recorded = HashSet::new();
        if !sender_key.is_empty() && !legacy.is_empty() {
            debug!(
                sender_key = sender_key.len(),
                legacy = legacy.len(),
                "mixed eligibility, sending to everyone with legacy"
            );
            legacy.extend(sender_key.into_iter().map(|target| target.recipient));
        } else if !sender_key.is_empty() {
            let attempt =
                self.send_with_sender_key(group_id, &sender_key, &message, &mut recorded).await?;
            results.extend(attempt.outcomes);
            legacy = attempt.fallback;
        }

        if !legacy.is_empty() {
            debug!(recipients = legacy.len(), "sending with legacy");
            results.extend(self.transport.send_legacy(&message, &legacy).await?);
        }

        self.record_identity_changes(&results, &mut recorded);
        Ok(results)
    }

    /// Multicast to `targets`, turning mechanism failures into a fallback
    /// list.
    async fn send_with_sender_key(
        &self,
        group_id: &GroupId,
        targets: &[MulticastTarget],
        message: &DataMessage,
        recorded: &mut HashSet<Recipient>,
    ) -> Result<MulticastAttempt, DispatchError> {
        let distribution_id = self.store.get_or_create_distribution_id(group_id)?;
        self.keys.rotate_if_due(distribution_id)?;

        debug!(
            distribution_id = %distribution_id,
            recipients = targets.len(),
            "sending with sender key"
        );
        let err = match self
            .transport
            .send_multicast(distribution_id, targets, self.config.content_hint, message)
            .await
        {
            Ok(outcomes) => return Ok(MulticastAttempt { outcomes, fallback: Vec::new() }),
            Err(err) => err,
        };

        let mut fallback: Vec<Recipient> = targets.iter().map(|target| target.recipient).collect();
        let mut outcomes = Vec::new();

        match err.disposition() {
            MulticastDisposition::RecordIdentity => {
                if let MulticastError::UntrustedIdentity { recipient, identity_key } = err {
                    debug!(
                        recipient = %recipient.redacted(),
                        "untrusted identity during sender key send, falling back"
                    );
                    fallback.retain(|r| *r != recipient);
                    self.record_identity(recipient, &identity_key, recorded);
                    outcomes.push(SendOutcome::identity_mismatch(recipient, identity_key));
                }
            },
            MulticastDisposition::RotateAndFallback => {
                debug!(error = %err, "sender key state invalid, rotating and falling back");
                self.keys.rotate(distribution_id)?;
            },
            MulticastDisposition::Fallback => {
                debug!(error = %err, "sender key send rejected, falling back");
            },
            MulticastDisposition::Abort => {
                let reason = match err {
                    MulticastError::Network(reason) => reason,
                    other => other.to_string(),
                };
                return Err(TransportError::Network(reason).into());
            },
        }

        Ok(MulticastAttempt { outcomes, fallback })
    }

    /// Persist the new identity key of every mismatched recipient not yet in
    /// `recorded`.
    ///
    /// Failures are logged. The send already happened, so they do not change
    /// the returned outcomes.
    fn record_identity_changes(&self, results: &[SendOutcome], recorded: &mut HashSet<Recipient>) {
        for outcome in results {
            if let Some(identity_key) = outcome.identity_failure() {
                self.record_identity(outcome.recipient, identity_key, recorded);
            }
        }
    }

    /// Save `identity_key` for `recipient` unless already done in this send.
    fn record_identity(
        &self,
        recipient: Recipient,
        identity_key: &IdentityKey,
        recorded: &mut HashSet<Recipient>,
    ) {
        if !recorded.insert(recipient) {
            return;
        }
        if let Err(e) =
            self.store.save_identity(&recipient, identity_key, self.config.new_key_trust_level)
        {
            error!(
                recipient = %recipient.redacted(),
                error = %e,
                "failed to record identity change"
            );
        }
    }
}
