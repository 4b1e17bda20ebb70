//! Scripted transport spy.
//!
//! Records every call the policy makes and answers from a script. Unscripted
//! multicasts deliver to every target with sealed sender. Unscripted legacy
//! sends deliver to every recipient without sealed sender unless a
//! per-recipient status is set.
//!
//! When attached to a [`MemoryStore`], a successful multicast behaves like a
//! real sender-key transport: it creates our key on first use and records
//! every target as having received it.

#![allow(clippy::disallowed_types, reason = "Synchronous script state only")]

use std::{
    collections::{HashMap, VecDeque},
    future::{Future, ready},
    sync::{Arc, Mutex, PoisonError},
};

use skein_core::{
    ContentHint, DataMessage, DeviceId, DistributionId, Environment, MulticastError,
    MulticastTarget, ProtocolAddress, Recipient, SendOutcome, SendStatus, Transport,
    TransportError,
};
use skein_runtime::MemoryStore;
use tracing::trace;

use crate::{CountingSessionLock, SimEnv};

/// One call into the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `send_multicast`
    Multicast {
        /// Distribution the message was encrypted for
        distribution_id: DistributionId,
        /// Targets in call order
        recipients: Vec<Recipient>,
        /// Hint passed through
        content_hint: ContentHint,
        /// Message as handed to the transport
        message: DataMessage,
        /// Whether the session lock was held during the call
        lock_held: bool,
    },
    /// `send_legacy`
    Legacy {
        /// Recipients in call order
        recipients: Vec<Recipient>,
        /// Message as handed to the transport
        message: DataMessage,
        /// Whether the session lock was held during the call
        lock_held: bool,
    },
}

impl TransportCall {
    /// Recipients of this call.
    pub fn recipients(&self) -> &[Recipient] {
        match self {
            Self::Multicast { recipients, .. } | Self::Legacy { recipients, .. } => recipients,
        }
    }

    /// Message of this call.
    pub fn message(&self) -> &DataMessage {
        match self {
            Self::Multicast { message, .. } | Self::Legacy { message, .. } => message,
        }
    }

    /// Check if this is a multicast.
    pub fn is_multicast(&self) -> bool {
        matches!(self, Self::Multicast { .. })
    }
}

/// Key bookkeeping a real transport would do on a successful multicast.
#[derive(Clone)]
struct KeyLedger {
    store: MemoryStore,
    owner: ProtocolAddress,
    env: SimEnv,
}

#[derive(Default)]
struct Script {
    calls: Vec<TransportCall>,
    multicast_failures: VecDeque<MulticastError>,
    legacy_failures: VecDeque<TransportError>,
    legacy_statuses: HashMap<Recipient, SendStatus>,
}

/// Transport that records calls and replays scripted results.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
    ledger: Option<KeyLedger>,
    lock_probe: Option<CountingSessionLock>,
}

impl ScriptedTransport {
    /// Transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and share our key in `store` on successful multicasts, as
    /// `owner`, stamped with `env`'s clock.
    #[must_use]
    pub fn with_key_ledger(
        mut self,
        store: MemoryStore,
        owner: ProtocolAddress,
        env: SimEnv,
    ) -> Self {
        self.ledger = Some(KeyLedger { store, owner, env });
        self
    }

    /// Record whether `lock` is held during each call.
    #[must_use]
    pub fn with_lock_probe(mut self, lock: CountingSessionLock) -> Self {
        self.lock_probe = Some(lock);
        self
    }

    /// Fail the next multicast with `err`. Failures queue in order.
    pub fn fail_next_multicast(&self, err: MulticastError) {
        self.script().multicast_failures.push_back(err);
    }

    /// Fail the next legacy call as a whole with `err`.
    pub fn fail_next_legacy(&self, err: TransportError) {
        self.script().legacy_failures.push_back(err);
    }

    /// Answer every later legacy send to `recipient` with `status`.
    pub fn set_legacy_status(&self, recipient: Recipient, status: SendStatus) {
        self.script().legacy_statuses.insert(recipient, status);
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.script().calls.clone()
    }

    /// Multicast calls so far.
    pub fn multicast_calls(&self) -> Vec<TransportCall> {
        self.calls().into_iter().filter(TransportCall::is_multicast).collect()
    }

    /// Legacy calls so far.
    pub fn legacy_calls(&self) -> Vec<TransportCall> {
        self.calls().into_iter().filter(|call| !call.is_multicast()).collect()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_held(&self) -> bool {
        self.lock_probe.as_ref().is_some_and(CountingSessionLock::is_locked)
    }

    fn multicast(
        &self,
        distribution_id: DistributionId,
        targets: &[MulticastTarget],
        content_hint: ContentHint,
        message: &DataMessage,
    ) -> Result<Vec<SendOutcome>, MulticastError> {
        let recipients: Vec<Recipient> = targets.iter().map(|target| target.recipient).collect();
        let lock_held = self.lock_held();
        let mut script = self.script();
        script.calls.push(TransportCall::Multicast {
            distribution_id,
            recipients: recipients.clone(),
            content_hint,
            message: message.clone(),
            lock_held,
        });

        if let Some(err) = script.multicast_failures.pop_front() {
            trace!(error = %err, "scripted multicast failure");
            return Err(err);
        }
        drop(script);

        if let Some(ledger) = &self.ledger {
            if !ledger.store.has_sender_key(&ledger.owner, distribution_id) {
                ledger.store.record_sender_key(
                    ledger.owner,
                    distribution_id,
                    ledger.env.wall_clock_millis(),
                );
            }
            for recipient in &recipients {
                let peer = ProtocolAddress::new(*recipient, DeviceId::PRIMARY);
                ledger.store.mark_shared(distribution_id, peer);
            }
        }

        Ok(recipients
            .into_iter()
            .map(|recipient| SendOutcome::delivered(recipient, true))
            .collect())
    }

    fn legacy(
        &self,
        message: &DataMessage,
        recipients: &[Recipient],
    ) -> Result<Vec<SendOutcome>, TransportError> {
        let lock_held = self.lock_held();
        let mut script = self.script();
        script.calls.push(TransportCall::Legacy {
            recipients: recipients.to_vec(),
            message: message.clone(),
            lock_held,
        });

        if let Some(err) = script.legacy_failures.pop_front() {
            trace!(error = %err, "scripted legacy failure");
            return Err(err);
        }

        Ok(recipients
            .iter()
            .map(|recipient| {
                let status = script
                    .legacy_statuses
                    .get(recipient)
                    .cloned()
                    .unwrap_or(SendStatus::Delivered { sealed_sender: false });
                SendOutcome { recipient: *recipient, status }
            })
            .collect())
    }
}

impl Transport for ScriptedTransport {
    fn send_multicast(
        &self,
        distribution_id: DistributionId,
        targets: &[MulticastTarget],
        content_hint: ContentHint,
        message: &DataMessage,
    ) -> impl Future<Output = Result<Vec<SendOutcome>, MulticastError>> + Send {
        ready(self.multicast(distribution_id, targets, content_hint, message))
    }

    fn send_legacy(
        &self,
        message: &DataMessage,
        recipients: &[Recipient],
    ) -> impl Future<Output = Result<Vec<SendOutcome>, TransportError>> + Send {
        ready(self.legacy(message, recipients))
    }
}

#[cfg(test)]
mod tests {
    use skein_core::{AccessToken, SenderKeyStore};

    use super::*;

    const ALICE: Recipient = Recipient::new(2);
    const BOB: Recipient = Recipient::new(3);

    fn targets() -> Vec<MulticastTarget> {
        vec![
            MulticastTarget { recipient: ALICE, access: AccessToken([2; 16]) },
            MulticastTarget { recipient: BOB, access: AccessToken([3; 16]) },
        ]
    }

    async fn multicast(
        transport: &ScriptedTransport,
        id: u128,
        timestamp: u64,
    ) -> Result<Vec<SendOutcome>, MulticastError> {
        transport
            .send_multicast(
                DistributionId(id),
                &targets(),
                ContentHint::Default,
                &DataMessage::new(timestamp),
            )
            .await
    }

    #[tokio::test]
    async fn unscripted_multicast_delivers_sealed() {
        let transport = ScriptedTransport::new();
        let outcomes = multicast(&transport, 1, 1).await.unwrap();

        assert_eq!(
            outcomes,
            vec![SendOutcome::delivered(ALICE, true), SendOutcome::delivered(BOB, true)]
        );
        assert_eq!(transport.multicast_calls().len(), 1);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let transport = ScriptedTransport::new();
        transport.fail_next_multicast(MulticastError::NoSession);

        let first = multicast(&transport, 1, 1).await;
        let second = multicast(&transport, 1, 2).await;

        assert_eq!(first, Err(MulticastError::NoSession));
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn legacy_uses_per_recipient_statuses() {
        let transport = ScriptedTransport::new();
        transport.set_legacy_status(BOB, SendStatus::Unregistered);

        let outcomes = transport.send_legacy(&DataMessage::new(1), &[ALICE, BOB]).await.unwrap();

        assert_eq!(
            outcomes,
            vec![SendOutcome::delivered(ALICE, false), SendOutcome::unregistered(BOB)]
        );
    }

    #[tokio::test]
    async fn ledger_creates_key_once_and_shares_with_targets() {
        let store = MemoryStore::with_seed(1);
        let env = SimEnv::at(500);
        let owner = ProtocolAddress::new(Recipient::new(1), DeviceId::PRIMARY);
        let transport =
            ScriptedTransport::new().with_key_ledger(store.clone(), owner, env.clone());

        multicast(&transport, 4, 1).await.unwrap();
        env.set(900);
        multicast(&transport, 4, 2).await.unwrap();

        assert_eq!(store.key_created_at(&owner, DistributionId(4)).unwrap(), Some(500));
        assert_eq!(store.shared_with(DistributionId(4)).len(), 2);
    }
}
