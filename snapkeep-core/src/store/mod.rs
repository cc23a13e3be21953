/*!
Snapshot store port and adapters.

This module defines the store abstraction (port) and concrete implementations
(adapters). The retention engine and snapshot index never talk to a filesystem
driver directly; everything goes through [`SnapshotStore`], so the core logic
is independent of the actual copy-on-write backend.
*/

#[cfg(feature = "btrfs")]
pub mod btrfs;
pub mod memory;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::Result;

/// Inode/object number a store-native subvolume root carries.
///
/// On btrfs every subvolume root is inode 256, which is how a real snapshot
/// is told apart from an ordinary directory that merely matches the naming
/// pattern.
pub const SUBVOLUME_OBJECT_ID: u64 = 256;

/// A direct child of a snapshot directory as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (last path component).
    pub name: String,
    /// Inode/object id; [`SUBVOLUME_OBJECT_ID`] for store-native subvolumes.
    pub object_id: u64,
    /// Last-modified time of the entry.
    pub modified: DateTime<Utc>,
}

/// Store abstraction for snapshot-capable filesystems.
///
/// All operations are synchronous blocking calls. The generation counter is
/// an opaque monotonically increasing integer the store bumps whenever a
/// subvolume's content changes; it is only ever compared for equality.
pub trait SnapshotStore {
    /// True iff `path` resolves to a store-recognized subvolume object.
    fn is_subvolume(&self, path: &Path) -> Result<bool>;

    /// The subvolume's change-generation counter.
    ///
    /// Returns the sentinel `0` when the path does not currently resolve,
    /// so it compares cleanly against the generation of a nonexistent prior
    /// snapshot.
    fn generation(&self, path: &Path) -> Result<u64>;

    /// Create an empty writable container subvolume.
    fn create_subvolume(&self, path: &Path) -> Result<()>;

    /// Atomically capture `source` into a read-only snapshot at `dest`.
    fn create_snapshot(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Remove the given snapshot objects. Must tolerate an empty input by
    /// doing nothing (the engine additionally never passes one).
    fn delete_snapshots(&self, paths: &[PathBuf]) -> Result<()>;

    /// Update `path`'s modification metadata.
    ///
    /// Store-interaction contract: a metadata refresh forces a generation
    /// bump, so a snapshot taken right after reflects a settled counter.
    fn touch(&self, path: &Path) -> Result<()>;

    /// Direct children of `path`. Empty when the path does not exist.
    fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>>;
}

#[cfg(feature = "btrfs")]
pub use btrfs::BtrfsStore;
pub use memory::MemoryStore;
