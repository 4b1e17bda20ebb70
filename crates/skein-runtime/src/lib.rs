//! Skein Runtime
//!
//! Concrete collaborators for [`skein_core::GroupSender`]:
//!
//! - [`MemoryStore`]: every store trait over one shared in-memory state
//! - [`ChaoticStore`]: fault-injecting wrapper for failure-path tests
//! - [`MutexSessionLock`]: session lock over a std mutex
//! - [`ChannelRefreshQueue`]: deduplicating profile refresh queue feeding a
//!   tokio channel
//! - [`SystemEnv`]: wall clock from the operating system

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chaotic;
pub mod memory;
pub mod refresh;
pub mod session_lock;
pub mod system_env;

pub use chaotic::{ChaoticStore, StoreOp};
pub use memory::MemoryStore;
pub use refresh::{ChannelRefreshQueue, DEFAULT_REFRESH_INTERVAL};
pub use session_lock::MutexSessionLock;
pub use system_env::SystemEnv;
