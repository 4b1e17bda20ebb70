//! Property tests for the dispatch policy.
//!
//! Random recipient populations (profile known or not, capability, access
//! token) and random mechanism failures. Invariants checked on every run:
//! one group send never mixes mechanisms, the multicast precedes the legacy
//! call, and every recipient gets exactly one outcome.

use proptest::prelude::*;
use skein_core::{DataMessage, GroupId, MulticastError, Recipient};
use skein_harness::World;

const ME: Recipient = Recipient::new(1);
const GROUP: GroupId = GroupId([5; 32]);

#[derive(Debug, Clone)]
struct Peer {
    /// `None`: no profile cached. `Some(flag)`: sender-key capability.
    profile: Option<bool>,
    access: bool,
}

fn peer_strategy() -> impl Strategy<Value = Peer> {
    (prop::option::of(any::<bool>()), any::<bool>())
        .prop_map(|(profile, access)| Peer { profile, access })
}

fn population_strategy() -> impl Strategy<Value = Vec<Peer>> {
    prop_oneof![
        // Mostly eligible populations, so the multicast path is exercised.
        3 => prop::collection::vec(Just(Peer { profile: Some(true), access: true }), 0..8),
        2 => prop::collection::vec(peer_strategy(), 0..8),
    ]
}

fn failure_strategy() -> impl Strategy<Value = Option<MulticastError>> {
    prop_oneof![
        4 => Just(None),
        1 => Just(Some(MulticastError::NoSession)),
        1 => Just(Some(MulticastError::InvalidKey)),
        1 => Just(Some(MulticastError::IllegalState("state".to_string()))),
        1 => Just(Some(MulticastError::BadAccessHeader)),
        1 => Just(Some(MulticastError::NotFound)),
    ]
}

fn build_world(self_supported: bool, peers: &[Peer]) -> (World, Vec<Recipient>) {
    let world = World::new(ME);
    let recipients: Vec<Recipient> =
        (0..peers.len()).map(|i| Recipient::new(10 + i as u128)).collect();
    world.add_group(GROUP, &recipients);
    world.set_profile(ME, self_supported);
    for (recipient, peer) in recipients.iter().zip(peers) {
        if let Some(sender_key) = peer.profile {
            world.set_profile(*recipient, sender_key);
        }
        if peer.access {
            world.grant_access(*recipient);
        }
    }
    (world, recipients)
}

fn sorted(mut recipients: Vec<Recipient>) -> Vec<Recipient> {
    recipients.sort_unstable();
    recipients
}

proptest! {
    #[test]
    fn group_send_never_mixes_mechanisms(
        self_supported in prop::bool::weighted(0.8),
        peers in population_strategy(),
        failure in failure_strategy(),
    ) {
        let (world, recipients) = build_world(self_supported, &peers);
        let failed = failure.is_some();
        if let Some(err) = failure {
            world.transport.fail_next_multicast(err);
        }
        let sender = world.sender().unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

        let outcomes =
            rt.block_on(sender.send_group_message(DataMessage::new(1), &GROUP, None)).unwrap();

        let calls = world.transport.calls();
        let multicasts = calls.iter().filter(|call| call.is_multicast()).count();
        let eligible = self_supported
            && peers.iter().all(|peer| peer.profile == Some(true) && peer.access);

        prop_assert!(calls.len() <= 2);
        prop_assert_eq!(multicasts == 1, eligible && !recipients.is_empty());
        if calls.len() == 2 {
            prop_assert!(calls[0].is_multicast());
            prop_assert!(!calls[1].is_multicast());
            prop_assert!(failed);
        }

        // Every call targets the whole recipient set: mechanisms never split it.
        for call in &calls {
            prop_assert_eq!(sorted(call.recipients().to_vec()), sorted(recipients.clone()));
        }

        let outcome_recipients = outcomes.iter().map(|outcome| outcome.recipient).collect();
        prop_assert_eq!(sorted(outcome_recipients), sorted(recipients.clone()));
    }

    #[test]
    fn session_lock_is_only_taken_for_key_failures(
        failure in failure_strategy(),
        count in 1usize..6,
    ) {
        let peers = vec![Peer { profile: Some(true), access: true }; count];
        let (world, _) = build_world(true, &peers);
        let rotates = matches!(
            failure,
            Some(
                MulticastError::NoSession
                    | MulticastError::InvalidKey
                    | MulticastError::IllegalState(_)
            )
        );
        if let Some(err) = failure {
            world.transport.fail_next_multicast(err);
        }
        let sender = world.sender().unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();

        rt.block_on(sender.send_group_message(DataMessage::new(1), &GROUP, None)).unwrap();

        prop_assert_eq!(world.lock.acquisitions(), usize::from(rotates));
        prop_assert!(!world.lock.is_locked());
    }
}
