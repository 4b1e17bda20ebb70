//! Virtual wall clock.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use skein_core::Environment;

/// Simulated environment with a manually advanced clock.
///
/// Clones share the clock, so advancing one handle moves time for every
/// collaborator holding another.
#[derive(Clone, Debug, Default)]
pub struct SimEnv {
    millis: Arc<AtomicU64>,
}

impl SimEnv {
    /// Clock starting at `start_millis`.
    pub fn at(start_millis: u64) -> Self {
        Self { millis: Arc::new(AtomicU64::new(start_millis)) }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.millis.fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    /// Set the clock to `millis`. May move backwards, to simulate skew.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Environment for SimEnv {
    fn wall_clock_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::at(1_000);
        let handle = env.clone();

        env.advance(Duration::from_secs(2));

        assert_eq!(handle.wall_clock_millis(), 3_000);
    }

    #[test]
    fn set_can_move_backwards() {
        let env = SimEnv::at(5_000);
        env.set(10);
        assert_eq!(env.wall_clock_millis(), 10);
    }
}
