//! Snapshot naming contract.
//!
//! External tooling (file-server "previous versions" integration) depends on
//! these forms bit-exactly:
//!
//! - snapshot directory: `<parentDir>/.@snapshots_<subvolDirName>/`
//! - snapshot name: `@<subvolDirName>_<YYYY.MM.DD-HH:MM:SS>`
//!
//! The timestamp is fixed-width and zero-padded, so its lexicographic order
//! equals chronological order. Ordering elsewhere in the crate is still done
//! on the parsed [`NaiveDateTime`], never on string collation.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Result, SnapkeepError};

/// Timestamp format embedded in snapshot names: `2026.08.06-14:03:59`.
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H:%M:%S";

/// Prefix of the per-subvolume snapshot container directory.
pub const SNAPSHOT_DIR_PREFIX: &str = ".@snapshots_";

/// Prefix of every snapshot entry name.
pub const SNAPSHOT_NAME_PREFIX: &str = "@";

/// Extract the directory name of a subvolume path.
///
/// The name is the last path component and must be valid UTF-8 since it is
/// embedded in snapshot names.
pub fn subvolume_name(subvolume: &Path) -> Result<&str> {
    subvolume
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SnapkeepError::invalid_path(format!(
                "{} has no usable directory name",
                subvolume.display()
            ))
        })
}

/// Compute the snapshot container directory for a subvolume:
/// `<parent>/.@snapshots_<name>`.
pub fn snapshot_dir(subvolume: &Path) -> Result<PathBuf> {
    let name = subvolume_name(subvolume)?;
    let parent = subvolume.parent().ok_or_else(|| {
        SnapkeepError::invalid_path(format!("{} has no parent directory", subvolume.display()))
    })?;
    Ok(parent.join(format!("{SNAPSHOT_DIR_PREFIX}{name}")))
}

/// Format a snapshot entry name for a subvolume at the given instant.
pub fn snapshot_name(subvolume_name: &str, timestamp: NaiveDateTime) -> String {
    format!(
        "{SNAPSHOT_NAME_PREFIX}{subvolume_name}_{}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Parse a directory entry name as a snapshot of the given subvolume.
///
/// Returns the embedded timestamp, or `None` when the entry does not match
/// the full pattern `@<subvolume_name>_<timestamp>`. The timestamp is never
/// partially parsed: trailing or malformed input rejects the whole entry.
pub fn parse_snapshot_name(entry_name: &str, subvolume_name: &str) -> Option<NaiveDateTime> {
    let rest = entry_name.strip_prefix(SNAPSHOT_NAME_PREFIX)?;
    let rest = rest.strip_prefix(subvolume_name)?;
    let stamp = rest.strip_prefix('_')?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_snapshot_name_format() {
        let name = snapshot_name("home", ts(2026, 8, 6, 4, 3, 9));
        assert_eq!(name, "@home_2026.08.06-04:03:09");
    }

    #[test]
    fn test_name_round_trip() {
        let stamp = ts(2026, 1, 31, 23, 59, 58);
        let name = snapshot_name("data", stamp);
        let parsed = parse_snapshot_name(&name, "data").unwrap();
        assert_eq!(parsed, stamp);
        // Re-formatting yields the identical string.
        assert_eq!(snapshot_name("data", parsed), name);
    }

    #[test]
    fn test_parse_rejects_non_conforming_entries() {
        // wrong prefix
        assert!(parse_snapshot_name("home_2026.08.06-04:03:09", "home").is_none());
        // wrong subvolume
        assert!(parse_snapshot_name("@home_2026.08.06-04:03:09", "data").is_none());
        // missing separator
        assert!(parse_snapshot_name("@home2026.08.06-04:03:09", "home").is_none());
        // malformed timestamp
        assert!(parse_snapshot_name("@home_2026.08.06", "home").is_none());
        assert!(parse_snapshot_name("@home_2026.13.06-04:03:09", "home").is_none());
        // trailing junk is not partially parsed
        assert!(parse_snapshot_name("@home_2026.08.06-04:03:09.bak", "home").is_none());
    }

    #[test]
    fn test_lexicographic_order_is_chronological() {
        let older = snapshot_name("v", ts(2025, 12, 31, 23, 59, 59));
        let newer = snapshot_name("v", ts(2026, 1, 1, 0, 0, 0));
        assert!(older < newer);
    }

    #[test]
    fn test_snapshot_dir_convention() {
        let dir = snapshot_dir(Path::new("/srv/home")).unwrap();
        assert_eq!(dir, PathBuf::from("/srv/.@snapshots_home"));
    }

    #[test]
    fn test_snapshot_dir_rejects_root() {
        assert!(snapshot_dir(Path::new("/")).is_err());
    }
}
