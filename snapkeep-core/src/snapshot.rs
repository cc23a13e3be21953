//! Snapshot records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::naming;
use crate::store::{DirEntry, SUBVOLUME_OBJECT_ID};

/// An existing read-only snapshot of a subvolume.
///
/// Instances are only built from directory entries that match the full
/// naming contract and are store-native subvolume objects; everything else
/// in a snapshot directory is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Full entry name, `@<subvolume>_<timestamp>`.
    pub name: String,

    /// Absolute path of the snapshot object.
    pub path: PathBuf,

    /// Creation instant parsed from the name; the ordering key.
    pub timestamp: NaiveDateTime,

    /// Last-modified time as reported by the store; drives age expiry.
    pub modified: DateTime<Utc>,
}

impl Snapshot {
    /// Build a snapshot record from a directory entry of `snap_dir`.
    ///
    /// Returns `None` when the entry name does not match
    /// `@<subvolume_name>_<timestamp>` exactly, or when the entry is not a
    /// store-native subvolume object (a plain directory someone created in
    /// the snapshot dir must never become a deletion candidate).
    pub fn from_entry(snap_dir: &Path, subvolume_name: &str, entry: &DirEntry) -> Option<Self> {
        if entry.object_id != SUBVOLUME_OBJECT_ID {
            return None;
        }
        let timestamp = naming::parse_snapshot_name(&entry.name, subvolume_name)?;
        Some(Self {
            name: entry.name.clone(),
            path: snap_dir.join(&entry.name),
            timestamp,
            modified: entry.modified,
        })
    }
}
