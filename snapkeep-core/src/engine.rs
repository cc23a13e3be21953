/*!
Retention engine.

Orchestrates the per-subvolume sequence: validate the target, ensure the
snapshot directory exists, take a new read-only snapshot when the subvolume
changed since the last one, then prune expired snapshots without ever
breaching the retention floor.

The engine is generic over the store port and holds no state of its own
beyond the policy; everything else is re-derived fresh per subvolume.
*/

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info};

use crate::error::{Result, SnapkeepError};
use crate::index::SnapshotIndex;
use crate::naming;
use crate::policy::RetentionPolicy;
use crate::retention;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;

/// Side-effect-free plan for one subvolume, as of its current state.
///
/// Used by dry runs. Note that `to_delete` is computed against the state
/// *before* any creation: on a real run the freshly created snapshot also
/// counts toward the floor.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Target path of the snapshot that would be created, if any.
    pub create: Option<PathBuf>,

    /// Snapshots that would be deleted, newest first.
    pub to_delete: Vec<Snapshot>,
}

/// What actually happened to one subvolume.
#[derive(Debug, Clone)]
pub struct SubvolumeReport {
    pub subvolume: PathBuf,
    pub created: Option<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

/// Creation and pruning over a [`SnapshotStore`], driven by one immutable
/// [`RetentionPolicy`].
pub struct RetentionEngine<'a, S: SnapshotStore> {
    store: &'a S,
    policy: RetentionPolicy,
}

impl<'a, S: SnapshotStore> RetentionEngine<'a, S> {
    pub fn new(store: &'a S, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    /// Plan creation and deletion for `subvolume` without side effects.
    pub fn decide(&self, subvolume: &Path, now: DateTime<Utc>) -> Result<Decision> {
        if !self.store.is_subvolume(subvolume)? {
            return Err(SnapkeepError::NotASubvolume(subvolume.to_path_buf()));
        }
        let name = naming::subvolume_name(subvolume)?;
        let snap_dir = naming::snapshot_dir(subvolume)?;
        let index = SnapshotIndex::new(self.store);

        let snapshots = index.list(&snap_dir, name)?;
        let create = self.creation_target(subvolume, name, &snap_dir, &snapshots, now)?;
        let expired =
            index.expired_candidates(&snap_dir, name, self.policy.expiration_days, now)?;
        let to_delete = retention::select_deletions(&snapshots, expired, self.policy.min_count);

        Ok(Decision { create, to_delete })
    }

    /// Run the full create-then-prune sequence for `subvolume`.
    ///
    /// Deletions are recomputed after the creation step, so a snapshot taken
    /// in this run counts toward the floor. The store's delete operation is
    /// only invoked when the deletion set is non-empty.
    pub fn process(&self, subvolume: &Path, now: DateTime<Utc>) -> Result<SubvolumeReport> {
        if !self.store.is_subvolume(subvolume)? {
            return Err(SnapkeepError::NotASubvolume(subvolume.to_path_buf()));
        }
        let name = naming::subvolume_name(subvolume)?;
        let snap_dir = naming::snapshot_dir(subvolume)?;
        let index = SnapshotIndex::new(self.store);

        // Container subvolume is created on first use.
        if !self.store.is_subvolume(&snap_dir)? {
            info!(snap_dir = %snap_dir.display(), "creating snapshot directory");
            self.store.create_subvolume(&snap_dir)?;
        }

        let snapshots = index.list(&snap_dir, name)?;
        let created = match self.creation_target(subvolume, name, &snap_dir, &snapshots, now)? {
            Some(target) => {
                // Metadata refresh first, so the captured generation
                // reflects a settled counter (store contract).
                self.store.touch(subvolume)?;
                self.store.create_snapshot(subvolume, &target)?;
                info!(snapshot = %target.display(), "created snapshot");
                Some(target)
            }
            None => {
                debug!(subvolume = %subvolume.display(), "unchanged since last snapshot");
                None
            }
        };

        let all = index.list(&snap_dir, name)?;
        let expired =
            index.expired_candidates(&snap_dir, name, self.policy.expiration_days, now)?;
        let to_delete = retention::select_deletions(&all, expired, self.policy.min_count);

        let deleted: Vec<PathBuf> = to_delete.into_iter().map(|snap| snap.path).collect();
        if !deleted.is_empty() {
            self.store.delete_snapshots(&deleted)?;
            info!(
                subvolume = %subvolume.display(),
                count = deleted.len(),
                "pruned expired snapshots"
            );
        }

        Ok(SubvolumeReport {
            subvolume: subvolume.to_path_buf(),
            created,
            deleted,
        })
    }

    /// Target path for a new snapshot, or `None` when nothing changed since
    /// the latest snapshot or the target name already exists (same-second
    /// re-run).
    fn creation_target(
        &self,
        subvolume: &Path,
        name: &str,
        snap_dir: &Path,
        snapshots: &[Snapshot],
        now: DateTime<Utc>,
    ) -> Result<Option<PathBuf>> {
        let current = self.store.generation(subvolume)?;
        let latest_gen = match snapshots.first() {
            Some(latest) => self.store.generation(&latest.path)?,
            None => 0,
        };

        if current == latest_gen {
            return Ok(None);
        }

        // Names are stamped in local time; ordering and expiry stay zone-free.
        let stamp = now.with_timezone(&Local).naive_local();
        let target_name = naming::snapshot_name(name, stamp);
        // Same-second re-run guard: any existing entry at the target name
        // blocks creation, conforming or not.
        let entries = self.store.list_directory(snap_dir)?;
        if entries.iter().any(|entry| entry.name == target_name) {
            debug!(snapshot = %target_name, "target name already exists, skipping");
            return Ok(None);
        }

        Ok(Some(snap_dir.join(target_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DirEntry, SUBVOLUME_OBJECT_ID};
    use chrono::{Duration, TimeZone};
    use mockall::Sequence;

    mockall::mock! {
        Store {}

        impl SnapshotStore for Store {
            fn is_subvolume(&self, path: &Path) -> Result<bool>;
            fn generation(&self, path: &Path) -> Result<u64>;
            fn create_subvolume(&self, path: &Path) -> Result<()>;
            fn create_snapshot(&self, source: &Path, dest: &Path) -> Result<()>;
            fn delete_snapshots(&self, paths: &[PathBuf]) -> Result<()>;
            fn touch(&self, path: &Path) -> Result<()>;
            fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>>;
        }
    }

    const SUBVOL: &str = "/srv/home";
    const SNAP_DIR: &str = "/srv/.@snapshots_home";

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap()
    }

    fn snapshot_entry(days_ago: i64) -> DirEntry {
        let created = fixed_now() - Duration::days(days_ago);
        DirEntry {
            name: naming::snapshot_name("home", created.naive_utc()),
            object_id: SUBVOLUME_OBJECT_ID,
            modified: created,
        }
    }

    /// Mock with the subvolume and snapshot dir present and the given
    /// directory contents.
    fn store_with_entries(entries: Vec<DirEntry>) -> MockStore {
        let mut store = MockStore::new();
        store.expect_is_subvolume().returning(|_| Ok(true));
        store
            .expect_list_directory()
            .withf(|path| path == Path::new(SNAP_DIR))
            .returning(move |_| Ok(entries.clone()));
        store
    }

    /// Generation answers: `sub_gen` for the subvolume, `snap_gen` for
    /// everything under the snapshot dir.
    fn expect_generations(store: &mut MockStore, sub_gen: u64, snap_gen: u64) {
        store.expect_generation().returning(move |path| {
            if path == Path::new(SUBVOL) {
                Ok(sub_gen)
            } else {
                Ok(snap_gen)
            }
        });
    }

    fn policy(days: u32, min: u32) -> RetentionPolicy {
        RetentionPolicy::new(days, min)
    }

    #[test]
    fn test_unchanged_subvolume_triggers_nothing() {
        let mut store = store_with_entries(vec![snapshot_entry(1)]);
        expect_generations(&mut store, 7, 7);
        store.expect_touch().never();
        store.expect_create_snapshot().never();
        store.expect_delete_snapshots().never();

        let engine = RetentionEngine::new(&store, policy(30, 10));
        let report = engine.process(Path::new(SUBVOL), fixed_now()).unwrap();

        assert!(report.created.is_none());
        assert!(report.deleted.is_empty());
    }

    #[test]
    fn test_changed_subvolume_touches_then_snapshots() {
        let mut store = store_with_entries(vec![snapshot_entry(1)]);
        expect_generations(&mut store, 9, 7);

        let mut seq = Sequence::new();
        store
            .expect_touch()
            .withf(|path| path == Path::new(SUBVOL))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        store
            .expect_create_snapshot()
            .withf(|source, dest| source == Path::new(SUBVOL) && dest.starts_with(SNAP_DIR))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        store.expect_delete_snapshots().never();

        let engine = RetentionEngine::new(&store, policy(30, 10));
        let report = engine.process(Path::new(SUBVOL), fixed_now()).unwrap();

        assert!(report.created.is_some());
    }

    #[test]
    fn test_same_second_collision_skips_creation() {
        // A snapshot whose name equals the would-be target blocks creation
        // even though generations differ.
        let stamp = fixed_now().with_timezone(&Local).naive_local();
        let colliding = DirEntry {
            name: naming::snapshot_name("home", stamp),
            object_id: SUBVOLUME_OBJECT_ID,
            modified: fixed_now(),
        };
        let mut store = store_with_entries(vec![colliding]);
        expect_generations(&mut store, 9, 7);
        store.expect_touch().never();
        store.expect_create_snapshot().never();
        store.expect_delete_snapshots().never();

        let engine = RetentionEngine::new(&store, policy(30, 10));
        let report = engine.process(Path::new(SUBVOL), fixed_now()).unwrap();

        assert!(report.created.is_none());
    }

    #[test]
    fn test_prune_issues_single_batched_delete() {
        let entries = vec![snapshot_entry(1), snapshot_entry(15), snapshot_entry(20)];
        let expected: Vec<PathBuf> = vec![
            PathBuf::from(SNAP_DIR).join(&entries[1].name),
            PathBuf::from(SNAP_DIR).join(&entries[2].name),
        ];
        let mut store = store_with_entries(entries);
        expect_generations(&mut store, 7, 7);
        store.expect_touch().never();
        store.expect_create_snapshot().never();

        let check = expected.clone();
        store
            .expect_delete_snapshots()
            .withf(move |paths| paths == check.as_slice())
            .times(1)
            .returning(|_| Ok(()));

        let engine = RetentionEngine::new(&store, policy(10, 1));
        let report = engine.process(Path::new(SUBVOL), fixed_now()).unwrap();

        assert_eq!(report.deleted, expected);
    }

    #[test]
    fn test_invalid_target_is_rejected_without_side_effects() {
        let mut store = MockStore::new();
        store.expect_is_subvolume().returning(|_| Ok(false));

        let engine = RetentionEngine::new(&store, policy(30, 10));
        let err = engine.process(Path::new("/etc"), fixed_now()).unwrap_err();

        assert!(matches!(err, SnapkeepError::NotASubvolume(_)));
    }

    #[test]
    fn test_store_failure_during_creation_is_fatal() {
        let mut store = store_with_entries(vec![]);
        expect_generations(&mut store, 3, 0);
        store.expect_touch().returning(|_| Ok(()));
        store
            .expect_create_snapshot()
            .returning(|_, dest| Err(SnapkeepError::store("snapshot create", dest, "no space")));

        let engine = RetentionEngine::new(&store, policy(30, 10));
        let err = engine.process(Path::new(SUBVOL), fixed_now()).unwrap_err();

        assert!(matches!(err, SnapkeepError::Store { .. }));
    }

    #[test]
    fn test_decide_reports_plan_without_mutations() {
        let mut store = store_with_entries(vec![snapshot_entry(1), snapshot_entry(20)]);
        expect_generations(&mut store, 9, 7);
        store.expect_touch().never();
        store.expect_create_snapshot().never();
        store.expect_delete_snapshots().never();
        store.expect_create_subvolume().never();

        let engine = RetentionEngine::new(&store, policy(10, 1));
        let decision = engine.decide(Path::new(SUBVOL), fixed_now()).unwrap();

        assert!(decision.create.is_some());
        assert_eq!(decision.to_delete.len(), 1);
    }
}
