//! Deterministic test harness for Skein dispatch testing.
//!
//! Implementations of the collaborator traits that record what the policy
//! did and replay scripted transport behavior, plus a [`World`] fixture
//! wiring a complete [`skein_core::GroupSender`] over a
//! [`skein_runtime::MemoryStore`].
//!
//! Time is virtual ([`SimEnv`]), distribution ids are seeded, and the
//! transport answers synchronously, so every run is reproducible.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod lock;
pub mod refresh;
pub mod sim_env;
pub mod transport;
pub mod world;

pub use lock::CountingSessionLock;
pub use refresh::RecordingRefreshQueue;
pub use sim_env::SimEnv;
pub use transport::{ScriptedTransport, TransportCall};
pub use world::{WORLD_START_MILLIS, World, WorldSender, access_token_for};
