//! Skein Core
//!
//! Distribution policy for sending one group message over an end-to-end
//! encrypted transport. Decides per recipient whether the multicast
//! sender-key mechanism is usable, falls back to one-to-one legacy sends when
//! it is not, rotates distribution keys on age or on key-related transport
//! failures, and records identity-key changes discovered while sending.
//!
//! # Architecture
//!
//! The core owns no I/O. Every resource it touches is a collaborator trait:
//!
//! - [`store::GroupStore`], [`store::ProfileStore`], [`store::SenderKeyStore`]
//!   and [`store::IdentityStore`]: synchronous storage seams
//! - [`transport::Transport`]: the only async seam (multicast + legacy sends)
//! - [`lock::SessionLock`]: scoped guard serializing key rotation
//! - [`refresh::RefreshQueue`]: fire-and-forget profile refresh requests
//! - [`env::Environment`]: wall clock
//!
//! # Components
//!
//! - [`eligibility`]: pure classification of recipients into sender-key or
//!   legacy targets
//! - [`key_lifecycle`]: age check and rotation of our distribution key
//! - [`dispatch`]: [`GroupSender`], the policy tying everything together
//!
//! # Invariants
//!
//! - One group send never mixes mechanisms: either every recipient goes
//!   through the multicast, or every recipient goes through legacy sends.
//! - The sender-key attempt completes before any legacy send starts.
//! - Key material and the shared-with ledger are purged together, under the
//!   session lock.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod eligibility;
pub mod env;
pub mod error;
pub mod key_lifecycle;
pub mod lock;
pub mod message;
pub mod outcome;
pub mod refresh;
pub mod store;
pub mod transport;
pub mod types;

pub use config::{ConfigError, DispatchConfig};
pub use dispatch::GroupSender;
pub use eligibility::{Classification, EligibilityClassifier, LegacyReason, SendTarget};
pub use env::Environment;
pub use error::DispatchError;
pub use key_lifecycle::{KeyLifecycle, KeyLifecycleError};
pub use lock::SessionLock;
pub use message::{ContentHint, DataMessage, GroupContext};
pub use outcome::{SendOutcome, SendStatus};
pub use refresh::RefreshQueue;
pub use store::{
    Capabilities, DistributionKeyRecord, Group, GroupStore, IdentityStore, Profile, ProfileEntry,
    ProfileStore, SenderKeyStore, Store, StoreError,
};
pub use transport::{
    MulticastDisposition, MulticastError, MulticastTarget, Transport, TransportError,
};
pub use types::{
    AccessToken, DeviceId, DistributionId, GroupId, IdentityKey, LocalIdentity, ProtocolAddress,
    Recipient, TrustLevel,
};
