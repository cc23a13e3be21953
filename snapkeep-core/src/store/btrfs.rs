/*!
Btrfs store adapter.

Mutations go through the `btrfs` command-line tool; inspection uses plain
filesystem metadata. A subvolume root is recognized by its inode number
([`SUBVOLUME_OBJECT_ID`]), and the generation counter is read from
`btrfs subvolume find-new`, whose output ends in `transid marker was <N>`.
*/

use std::fs::{self, File};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{DirEntry, SnapshotStore, SUBVOLUME_OBJECT_ID};
use crate::error::{Result, SnapkeepError};

/// Search id passed to `find-new` that is guaranteed to be past the last
/// transaction, so the command reports the current transid marker only.
const FIND_NEW_BEYOND_LAST: &str = "99999999";

/// Snapshot store backed by a btrfs filesystem.
///
/// Requires the `btrfs` binary on `PATH` (or an explicit path via
/// [`BtrfsStore::with_command`]) and, for mutations, a privileged caller.
#[derive(Debug, Clone)]
pub struct BtrfsStore {
    command: PathBuf,
}

impl BtrfsStore {
    /// Create a store adapter using `btrfs` from `PATH`.
    pub fn new() -> Self {
        Self {
            command: PathBuf::from("btrfs"),
        }
    }

    /// Create a store adapter with an explicit path to the `btrfs` binary.
    pub fn with_command<P: AsRef<Path>>(command: P) -> Self {
        Self {
            command: command.as_ref().to_path_buf(),
        }
    }

    /// Run a `btrfs` subcommand, returning stdout on success.
    fn run(&self, operation: &'static str, context: &Path, args: &[&str]) -> Result<String> {
        debug!(?args, "invoking {}", self.command.display());
        let output = Command::new(&self.command).args(args).output().map_err(|e| {
            SnapkeepError::store(
                operation,
                context,
                format!("failed to invoke {}: {e}", self.command.display()),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SnapkeepError::store(
                operation,
                context,
                format!("{} ({})", stderr.trim(), output.status),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for BtrfsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for BtrfsStore {
    fn is_subvolume(&self, path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_dir() && meta.ino() == SUBVOLUME_OBJECT_ID),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn generation(&self, path: &Path) -> Result<u64> {
        if !path.exists() {
            return Ok(0);
        }

        let path_str = path.to_str().ok_or_else(|| {
            SnapkeepError::invalid_path(format!("{} is not valid UTF-8", path.display()))
        })?;
        let stdout = self.run(
            "generation query",
            path,
            &["subvolume", "find-new", path_str, FIND_NEW_BEYOND_LAST],
        )?;

        // Output: "transid marker was <N>"
        stdout
            .split_whitespace()
            .last()
            .and_then(|tok| tok.parse::<u64>().ok())
            .ok_or_else(|| {
                SnapkeepError::store(
                    "generation query",
                    path,
                    format!("unexpected find-new output: {}", stdout.trim()),
                )
            })
    }

    fn create_subvolume(&self, path: &Path) -> Result<()> {
        let path_str = path.to_str().ok_or_else(|| {
            SnapkeepError::invalid_path(format!("{} is not valid UTF-8", path.display()))
        })?;
        self.run("subvolume create", path, &["subvolume", "create", path_str])?;
        Ok(())
    }

    fn create_snapshot(&self, source: &Path, dest: &Path) -> Result<()> {
        let source_str = source.to_str().ok_or_else(|| {
            SnapkeepError::invalid_path(format!("{} is not valid UTF-8", source.display()))
        })?;
        let dest_str = dest.to_str().ok_or_else(|| {
            SnapkeepError::invalid_path(format!("{} is not valid UTF-8", dest.display()))
        })?;
        self.run(
            "snapshot create",
            dest,
            &["subvolume", "snapshot", "-r", source_str, dest_str],
        )?;
        Ok(())
    }

    fn delete_snapshots(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let mut args = vec!["subvolume", "delete"];
        for path in paths {
            let path_str = path.to_str().ok_or_else(|| {
                SnapkeepError::invalid_path(format!("{} is not valid UTF-8", path.display()))
            })?;
            args.push(path_str);
        }
        self.run("snapshot delete", &paths[0], &args)?;
        Ok(())
    }

    fn touch(&self, path: &Path) -> Result<()> {
        let file = File::open(path)
            .map_err(|e| SnapkeepError::store("touch", path, e.to_string()))?;
        file.set_modified(SystemTime::now())
            .map_err(|e| SnapkeepError::store("touch", path, e.to_string()))
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let read_dir = match fs::read_dir(path) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            // Entries with non-UTF-8 names cannot conform to the naming
            // contract anyway.
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let meta = entry.metadata()?;
            let modified: DateTime<Utc> = meta.modified()?.into();
            entries.push(DirEntry {
                name,
                object_id: meta.ino(),
                modified,
            });
        }
        Ok(entries)
    }
}
