/*!
In-memory store adapter used by the test-suite.

Deterministic stand-in for a copy-on-write filesystem: paths map to nodes
carrying an object id, a generation counter, and a last-modified time. The
clock is settable so age-based expiry can be exercised without sleeping.
*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{DirEntry, SnapshotStore, SUBVOLUME_OBJECT_ID};
use crate::error::{Result, SnapkeepError};

#[derive(Debug, Clone)]
struct Node {
    object_id: u64,
    generation: u64,
    modified: DateTime<Utc>,
}

#[derive(Debug)]
struct State {
    now: DateTime<Utc>,
    entries: BTreeMap<PathBuf, Node>,
    next_plain_id: u64,
}

/// In-memory [`SnapshotStore`] with a settable clock.
///
/// `touch` bumps the generation counter, mirroring the store quirk the
/// engine's touch-before-snapshot step exists for.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                now: Utc::now(),
                entries: BTreeMap::new(),
                next_plain_id: 1000,
            }),
        }
    }

    /// Set the store clock; stamps subsequent creations and touches.
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state.lock().unwrap().now = now;
    }

    /// Register a subvolume with an initial generation (test setup).
    pub fn add_subvolume<P: AsRef<Path>>(&self, path: P, generation: u64) {
        let mut state = self.state.lock().unwrap();
        let modified = state.now;
        state.entries.insert(
            path.as_ref().to_path_buf(),
            Node {
                object_id: SUBVOLUME_OBJECT_ID,
                generation,
                modified,
            },
        );
    }

    /// Register a snapshot entry with an explicit mtime (test setup).
    pub fn add_snapshot<P: AsRef<Path>>(&self, path: P, generation: u64, modified: DateTime<Utc>) {
        self.state.lock().unwrap().entries.insert(
            path.as_ref().to_path_buf(),
            Node {
                object_id: SUBVOLUME_OBJECT_ID,
                generation,
                modified,
            },
        );
    }

    /// Register a plain directory that must never be treated as a snapshot.
    pub fn add_plain_directory<P: AsRef<Path>>(&self, path: P) {
        let mut state = self.state.lock().unwrap();
        let object_id = state.next_plain_id;
        state.next_plain_id += 1;
        let modified = state.now;
        state.entries.insert(
            path.as_ref().to_path_buf(),
            Node {
                object_id,
                generation: 0,
                modified,
            },
        );
    }

    /// Simulate content changes on a subvolume.
    pub fn bump_generation<P: AsRef<Path>>(&self, path: P) {
        let mut state = self.state.lock().unwrap();
        if let Some(node) = state.entries.get_mut(path.as_ref()) {
            node.generation += 1;
        }
    }

    /// True iff the path currently exists in the store.
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.state.lock().unwrap().entries.contains_key(path.as_ref())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemoryStore {
    fn is_subvolume(&self, path: &Path) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .get(path)
            .is_some_and(|node| node.object_id == SUBVOLUME_OBJECT_ID))
    }

    fn generation(&self, path: &Path) -> Result<u64> {
        let state = self.state.lock().unwrap();
        Ok(state.entries.get(path).map_or(0, |node| node.generation))
    }

    fn create_subvolume(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.entries.contains_key(path) {
            return Err(SnapkeepError::store(
                "subvolume create",
                path,
                "already exists",
            ));
        }
        let modified = state.now;
        state.entries.insert(
            path.to_path_buf(),
            Node {
                object_id: SUBVOLUME_OBJECT_ID,
                generation: 1,
                modified,
            },
        );
        Ok(())
    }

    fn create_snapshot(&self, source: &Path, dest: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let generation = state
            .entries
            .get(source)
            .ok_or_else(|| SnapkeepError::store("snapshot create", source, "source missing"))?
            .generation;
        if state.entries.contains_key(dest) {
            return Err(SnapkeepError::store(
                "snapshot create",
                dest,
                "already exists",
            ));
        }
        let modified = state.now;
        state.entries.insert(
            dest.to_path_buf(),
            Node {
                object_id: SUBVOLUME_OBJECT_ID,
                generation,
                modified,
            },
        );
        Ok(())
    }

    fn delete_snapshots(&self, paths: &[PathBuf]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for path in paths {
            if state.entries.remove(path).is_none() {
                return Err(SnapkeepError::store("snapshot delete", path, "not found"));
            }
        }
        Ok(())
    }

    fn touch(&self, path: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let now = state.now;
        let node = state
            .entries
            .get_mut(path)
            .ok_or_else(|| SnapkeepError::store("touch", path, "not found"))?;
        node.generation += 1;
        node.modified = now;
        Ok(())
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let state = self.state.lock().unwrap();
        let mut entries = Vec::new();
        for (entry_path, node) in &state.entries {
            if entry_path.parent() == Some(path) {
                let name = match entry_path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name.to_string(),
                    None => continue,
                };
                entries.push(DirEntry {
                    name,
                    object_id: node.object_id,
                    modified: node.modified,
                });
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_bumps_generation() {
        let store = MemoryStore::new();
        store.add_subvolume("/srv/home", 5);

        store.touch(Path::new("/srv/home")).unwrap();
        assert_eq!(store.generation(Path::new("/srv/home")).unwrap(), 6);
    }

    #[test]
    fn test_snapshot_captures_source_generation() {
        let store = MemoryStore::new();
        store.add_subvolume("/srv/home", 7);
        store
            .create_snapshot(Path::new("/srv/home"), Path::new("/srv/snap"))
            .unwrap();
        assert_eq!(store.generation(Path::new("/srv/snap")).unwrap(), 7);
    }

    #[test]
    fn test_generation_sentinel_for_missing_path() {
        let store = MemoryStore::new();
        assert_eq!(store.generation(Path::new("/missing")).unwrap(), 0);
    }

    #[test]
    fn test_list_directory_only_direct_children() {
        let store = MemoryStore::new();
        store.add_subvolume("/srv/dir/a", 1);
        store.add_subvolume("/srv/dir/b", 1);
        store.add_subvolume("/srv/other", 1);

        let entries = store.list_directory(Path::new("/srv/dir")).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_plain_directory_is_not_a_subvolume() {
        let store = MemoryStore::new();
        store.add_plain_directory("/srv/plain");
        assert!(!store.is_subvolume(Path::new("/srv/plain")).unwrap());
    }
}
