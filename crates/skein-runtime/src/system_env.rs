//! Production environment using the operating system clock.

use std::time::{SystemTime, UNIX_EPOCH};

use skein_core::Environment;

/// Wall clock from `SystemTime`.
///
/// Not reproducible. Simulations use a virtual clock instead.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    /// A clock set before the Unix epoch reads as zero.
    #[allow(clippy::disallowed_methods)]
    fn wall_clock_millis(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_reads_current_time() {
        // 2020-01-01T00:00:00Z
        const JAN_2020_MS: u64 = 1_577_836_800_000;
        assert!(SystemEnv::new().wall_clock_millis() > JAN_2020_MS);
    }

    #[test]
    fn system_env_time_does_not_go_backwards() {
        let env = SystemEnv::new();
        let t1 = env.wall_clock_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t2 = env.wall_clock_millis();
        assert!(t2 >= t1);
    }
}
