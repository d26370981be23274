//! Local image cache prune.
//!
//! Stateless cleanup of a worker-local blob cache, entirely separate from
//! the policy-driven registry sweep: no tiers, no retention windows. A
//! cache root holds a `blobs/` directory of digest-named entries and a
//! `refs.json` index naming the digests still referenced; anything in
//! `blobs/` absent from the index is unreferenced and removed. The index
//! is required: pruning refuses to run without it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

/// Index file naming the digests still referenced by local state.
pub const REFS_INDEX_FILENAME: &str = "refs.json";

/// Subdirectory holding digest-named blob entries.
pub const BLOBS_DIRNAME: &str = "blobs";

/// Errors for cache pruning.
#[derive(Debug, thiserror::Error)]
pub enum CachePruneError {
    #[error("cache root has no {REFS_INDEX_FILENAME} index: {0}")]
    MissingIndex(PathBuf),

    #[error("failed to read refs index: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse refs index: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The refs index schema.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RefsIndex {
    /// Digests still referenced by local state
    #[serde(default)]
    pub referenced: Vec<String>,
}

impl RefsIndex {
    /// Load the index from a cache root.
    pub fn load(cache_root: &Path) -> Result<Self, CachePruneError> {
        let path = cache_root.join(REFS_INDEX_FILENAME);
        if !path.exists() {
            return Err(CachePruneError::MissingIndex(cache_root.to_path_buf()));
        }
        let json = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Result of a prune pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneOutcome {
    /// Blob entries scanned
    pub scanned: usize,

    /// Entries removed (or counted as removed in dry-run)
    pub removed: usize,

    /// Bytes reclaimed
    pub bytes_reclaimed: u64,

    /// Non-fatal per-entry errors
    pub errors: Vec<String>,
}

/// Remove unreferenced blob entries under `cache_root`.
///
/// With `dry_run` set, entries are counted but nothing is removed.
pub fn prune(cache_root: &Path, dry_run: bool) -> Result<PruneOutcome, CachePruneError> {
    let index = RefsIndex::load(cache_root)?;
    let referenced: HashSet<&str> = index.referenced.iter().map(String::as_str).collect();

    let mut outcome = PruneOutcome::default();
    let blobs = cache_root.join(BLOBS_DIRNAME);
    if !blobs.is_dir() {
        return Ok(outcome);
    }

    for entry in fs::read_dir(&blobs)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                outcome.errors.push(format!("failed to read entry: {err}"));
                continue;
            }
        };
        let path = entry.path();
        let digest = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => {
                outcome
                    .errors
                    .push(format!("non-utf8 entry name: {}", path.display()));
                continue;
            }
        };

        outcome.scanned += 1;
        if referenced.contains(digest.as_str()) {
            continue;
        }

        let size = entry_size(&path);
        if dry_run {
            eprintln!("[gc] DRY-RUN: would remove {digest} ({size} bytes)");
        } else {
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(err) = result {
                outcome
                    .errors
                    .push(format!("failed to remove {digest}: {err}"));
                continue;
            }
        }

        outcome.removed += 1;
        outcome.bytes_reclaimed += size;
    }

    Ok(outcome)
}

/// Total size of a blob entry (file or directory).
fn entry_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_index(root: &Path, referenced: &[&str]) {
        let index = RefsIndex {
            referenced: referenced.iter().map(|d| d.to_string()).collect(),
        };
        fs::write(
            root.join(REFS_INDEX_FILENAME),
            serde_json::to_string(&index).unwrap(),
        )
        .unwrap();
    }

    fn write_blob(root: &Path, digest: &str, size: usize) {
        let blobs = root.join(BLOBS_DIRNAME);
        fs::create_dir_all(&blobs).unwrap();
        fs::write(blobs.join(digest), vec![0u8; size]).unwrap();
    }

    #[test]
    fn test_unreferenced_blobs_removed() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path(), &["sha256:keep"]);
        write_blob(dir.path(), "sha256:keep", 100);
        write_blob(dir.path(), "sha256:drop", 200);

        let outcome = prune(dir.path(), false).unwrap();

        assert_eq!(outcome.scanned, 2);
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.bytes_reclaimed, 200);
        assert!(dir.path().join(BLOBS_DIRNAME).join("sha256:keep").exists());
        assert!(!dir.path().join(BLOBS_DIRNAME).join("sha256:drop").exists());
    }

    #[test]
    fn test_dry_run_removes_nothing() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path(), &[]);
        write_blob(dir.path(), "sha256:drop", 64);

        let outcome = prune(dir.path(), true).unwrap();

        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.bytes_reclaimed, 64);
        assert!(dir.path().join(BLOBS_DIRNAME).join("sha256:drop").exists());
    }

    #[test]
    fn test_missing_index_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_blob(dir.path(), "sha256:orphan", 10);

        let err = prune(dir.path(), false).unwrap_err();
        assert!(matches!(err, CachePruneError::MissingIndex(_)));
        assert!(dir.path().join(BLOBS_DIRNAME).join("sha256:orphan").exists());
    }

    #[test]
    fn test_empty_blobs_dir_is_fine() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path(), &[]);

        let outcome = prune(dir.path(), false).unwrap();
        assert_eq!(outcome, PruneOutcome::default());
    }

    #[test]
    fn test_directory_entries_sized_recursively() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path(), &[]);
        let entry = dir.path().join(BLOBS_DIRNAME).join("sha256:layered");
        fs::create_dir_all(entry.join("layers")).unwrap();
        fs::write(entry.join("manifest.json"), vec![0u8; 50]).unwrap();
        fs::write(entry.join("layers").join("layer0"), vec![0u8; 150]).unwrap();

        let outcome = prune(dir.path(), false).unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.bytes_reclaimed, 200);
        assert!(!entry.exists());
    }

    #[test]
    fn test_idempotent_second_pass() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path(), &["sha256:keep"]);
        write_blob(dir.path(), "sha256:keep", 10);
        write_blob(dir.path(), "sha256:drop", 20);

        prune(dir.path(), false).unwrap();
        let second = prune(dir.path(), false).unwrap();

        assert_eq!(second.scanned, 1);
        assert_eq!(second.removed, 0);
        assert_eq!(second.bytes_reclaimed, 0);
    }
}
