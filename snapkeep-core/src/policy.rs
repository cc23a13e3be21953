//! Retention policy configuration.
//!
//! A policy is supplied once per run and stays immutable for its duration.
//! Both knobs are independent: `expiration_days` decides which snapshots are
//! old enough to go, `min_count` is a floor on survivors that always wins.

use serde::{Deserialize, Serialize};

/// Dual retention policy: age-based expiration gated by a minimum-count floor.
///
/// `expiration_days == 0` does not mean "never delete" — it disables the age
/// filter, making every snapshot an expiration candidate, so the floor becomes
/// the sole gate and the oldest `total - min_count` snapshots are pruned on
/// every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Snapshots whose last-modified time is older than this many days are
    /// expiration candidates. 0 disables the age filter.
    pub expiration_days: u32,

    /// The newest `min_count` snapshots are never deleted, regardless of age.
    pub min_count: u32,
}

impl RetentionPolicy {
    /// Default expiration age when no flag or environment override is given.
    pub const DEFAULT_EXPIRATION_DAYS: u32 = 30;

    /// Default survivor floor when no flag or environment override is given.
    pub const DEFAULT_MIN_COUNT: u32 = 10;

    pub fn new(expiration_days: u32, min_count: u32) -> Self {
        Self {
            expiration_days,
            min_count,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            expiration_days: Self::DEFAULT_EXPIRATION_DAYS,
            min_count: Self::DEFAULT_MIN_COUNT,
        }
    }
}
