/*!
# snapkeep Core Engine

Retention engine for copy-on-write filesystem snapshots.

This crate decides, per subvolume, whether a new read-only snapshot should be
taken (only when the subvolume's change-generation moved since the last
snapshot) and exactly which old snapshots to prune under a dual policy:
age-based expiration gated by a minimum-count floor that always wins.

## Architecture

The core never talks to a filesystem driver directly:

- [`store::SnapshotStore`] is the port to the snapshot-capable backend;
  [`store::BtrfsStore`] is the production adapter and
  [`store::MemoryStore`] the deterministic test adapter.
- [`SnapshotIndex`] turns a snapshot directory into ordered, typed views.
- [`RetentionEngine`] orchestrates create-then-prune per subvolume;
  the selection arithmetic itself lives in [`retention`].

## Usage

```no_run
use std::path::Path;
use snapkeep_core::{BtrfsStore, RetentionEngine, RetentionPolicy};

let store = BtrfsStore::new();
let policy = RetentionPolicy::new(30, 10);
let engine = RetentionEngine::new(&store, policy);

let report = engine.process(Path::new("/srv/home"), chrono::Utc::now())?;
println!("created: {:?}, deleted: {}", report.created, report.deleted.len());
# Ok::<(), snapkeep_core::SnapkeepError>(())
```
*/

pub mod engine;
pub mod error;
pub mod index;
pub mod naming;
pub mod policy;
pub mod retention;
pub mod snapshot;
pub mod store;

pub use engine::{Decision, RetentionEngine, SubvolumeReport};
pub use error::{Result, SnapkeepError};
pub use index::SnapshotIndex;
pub use policy::RetentionPolicy;
pub use snapshot::Snapshot;
#[cfg(feature = "btrfs")]
pub use store::BtrfsStore;
pub use store::{MemoryStore, SnapshotStore};
