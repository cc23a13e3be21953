//! Snapshot directory index.
//!
//! Read-only, restartable views over a subvolume's snapshot directory. All
//! enumeration goes through the store port; ordering is computed on parsed
//! timestamps so it can never depend on locale or byte collation.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::Result;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Ordered views over the snapshots of one subvolume.
pub struct SnapshotIndex<'a, S: SnapshotStore> {
    store: &'a S,
}

impl<'a, S: SnapshotStore> SnapshotIndex<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// All snapshots of `subvolume_name` under `snap_dir`, newest first.
    ///
    /// Entries that fail the naming contract or are not store-native
    /// snapshot objects are skipped silently. Empty when the directory does
    /// not exist. The sort is stable, so (theoretical) timestamp ties keep
    /// their enumeration order.
    pub fn list(&self, snap_dir: &Path, subvolume_name: &str) -> Result<Vec<Snapshot>> {
        let entries = self.store.list_directory(snap_dir)?;
        let mut snapshots: Vec<Snapshot> = entries
            .iter()
            .filter_map(|entry| Snapshot::from_entry(snap_dir, subvolume_name, entry))
            .collect();
        snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        debug!(
            subvolume = subvolume_name,
            count = snapshots.len(),
            "indexed snapshot directory"
        );
        Ok(snapshots)
    }

    /// The newest snapshot, or `None` when there is none yet.
    pub fn latest(&self, snap_dir: &Path, subvolume_name: &str) -> Result<Option<Snapshot>> {
        Ok(self.list(snap_dir, subvolume_name)?.into_iter().next())
    }

    /// Snapshots old enough to expire, newest first.
    ///
    /// A snapshot qualifies when its last-modified time is older than
    /// `expiration_days` days before `now`. With `expiration_days == 0` the
    /// age filter is disabled and the full list is returned — every snapshot
    /// is nominally a candidate and only the retention floor gates deletion.
    pub fn expired_candidates(
        &self,
        snap_dir: &Path,
        subvolume_name: &str,
        expiration_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        let snapshots = self.list(snap_dir, subvolume_name)?;
        if expiration_days == 0 {
            return Ok(snapshots);
        }
        let cutoff = now - Duration::days(i64::from(expiration_days));
        Ok(snapshots
            .into_iter()
            .filter(|snap| snap.modified < cutoff)
            .collect())
    }
}
