//! Retention selection.
//!
//! Pure counting logic deciding which expired snapshots actually get
//! deleted. Kept free of store access so the floor arithmetic can be tested
//! exhaustively, including the property tests in `tests/`.

use tracing::debug;

use crate::snapshot::Snapshot;

/// Select the snapshots to delete from the expired candidates, honoring the
/// minimum-count floor.
///
/// Both `all` and `expired` are newest first; `expired` is the age-filtered
/// subset of `all`. With `E = expired.len()` and `T = all.len()`:
///
/// - when `min_count + E <= T`, deleting every expired snapshot leaves at
///   least `min_count` survivors, so the whole expired list is returned;
/// - otherwise the floor would be breached, and only the **oldest**
///   `max(T - min_count, 0)` expired snapshots are deleted. The spared ones
///   are the less-expired entries at the head of the newest-first list.
///
/// After deletion the surviving count is therefore never below
/// `min(min_count, T)`. The returned list keeps the newest-first order of
/// its input.
pub fn select_deletions(
    all: &[Snapshot],
    mut expired: Vec<Snapshot>,
    min_count: u32,
) -> Vec<Snapshot> {
    let total = all.len();
    let candidates = expired.len();
    let min_count = min_count as usize;

    if min_count + candidates > total {
        let allowed = total.saturating_sub(min_count);
        // Drop from the front of the newest-first list: the tail holds the
        // oldest `allowed` candidates.
        let spared = candidates - allowed;
        debug!(
            total,
            candidates,
            allowed,
            "expiration clamped by retention floor"
        );
        return expired.split_off(spared);
    }

    expired
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    /// Newest-first history with snapshots aged `days_ago` days.
    fn history(days_ago: &[i64]) -> Vec<Snapshot> {
        let mut snaps: Vec<Snapshot> = days_ago
            .iter()
            .map(|&days| {
                let created = now() - Duration::days(days);
                let name = crate::naming::snapshot_name("home", created.naive_utc());
                Snapshot {
                    path: PathBuf::from("/srv/.@snapshots_home").join(&name),
                    name,
                    timestamp: created.naive_utc(),
                    modified: created,
                }
            })
            .collect();
        snaps.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        snaps
    }

    fn expired_subset(all: &[Snapshot], expiration_days: i64) -> Vec<Snapshot> {
        let cutoff = now() - Duration::days(expiration_days);
        all.iter()
            .filter(|s| s.modified < cutoff)
            .cloned()
            .collect()
    }

    #[test]
    fn test_no_truncation_when_floor_holds() {
        // min_count=3, 10-day expiry, ages 20,15,8,4,1: both expired go.
        let all = history(&[20, 15, 8, 4, 1]);
        let expired = expired_subset(&all, 10);
        assert_eq!(expired.len(), 2);

        let deleted = select_deletions(&all, expired, 3);
        let ages: Vec<i64> = deleted
            .iter()
            .map(|s| (now() - s.modified).num_days())
            .collect();
        assert_eq!(ages, vec![15, 20]);
    }

    #[test]
    fn test_truncation_spares_less_expired() {
        // Same history, min_count=4 -> only the 20-day snapshot goes; the
        // 15-day one is spared as the less-expired.
        let all = history(&[20, 15, 8, 4, 1]);
        let expired = expired_subset(&all, 10);

        let deleted = select_deletions(&all, expired, 4);
        assert_eq!(deleted.len(), 1);
        assert_eq!((now() - deleted[0].modified).num_days(), 20);
    }

    #[test]
    fn test_zero_expiration_days_degenerates_to_floor_only() {
        // expired == all: the oldest T - min_count snapshots go every run.
        let all = history(&[20, 15, 8, 4, 1]);
        let deleted = select_deletions(&all, all.clone(), 3);

        let ages: Vec<i64> = deleted
            .iter()
            .map(|s| (now() - s.modified).num_days())
            .collect();
        assert_eq!(ages, vec![15, 20]);
    }

    #[test]
    fn test_floor_at_or_above_total_deletes_nothing() {
        let all = history(&[20, 15, 8]);
        assert!(select_deletions(&all, all.clone(), 3).is_empty());
        assert!(select_deletions(&all, all.clone(), 7).is_empty());
    }

    #[test]
    fn test_empty_history() {
        let deleted = select_deletions(&[], Vec::new(), 5);
        assert!(deleted.is_empty());
    }

    #[test]
    fn test_zero_min_count_deletes_all_expired() {
        let all = history(&[20, 15, 8, 4, 1]);
        let expired = expired_subset(&all, 10);
        let deleted = select_deletions(&all, expired, 0);
        assert_eq!(deleted.len(), 2);
    }

    #[test]
    fn test_result_keeps_newest_first_order() {
        let all = history(&[30, 25, 20, 15, 1]);
        let expired = expired_subset(&all, 10);
        let deleted = select_deletions(&all, expired, 2);
        for pair in deleted.windows(2) {
            assert!(pair[0].timestamp > pair[1].timestamp);
        }
    }
}
