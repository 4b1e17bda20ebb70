//! Environment abstraction for deterministic testing.
//!
//! Decouples policy logic from the system clock. Key age is measured against
//! wall-clock time, so production reads `SystemTime` while simulation drives a
//! virtual clock forward explicitly.

/// Abstract environment providing wall-clock time.
///
/// # Invariants
///
/// Implementations MUST:
///
/// - Return milliseconds since the Unix epoch
/// - Be infallible (a clock before 1970 is a broken host, not an error path)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Key creation timestamps are recorded in the same unit, so ages are
    /// plain subtraction.
    fn wall_clock_millis(&self) -> u64;
}
