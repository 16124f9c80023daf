//! Blob Store
//!
//! Manages the content-addressed blob tree of one table.
//!
//! ## Responsibilities
//! - Derive the blob directory from the table path
//! - Create the tree lazily, on the first writer only
//! - Map references to sharded file paths
//! - Sweep orphaned, staged and unknown files

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::Result;

use super::{BlobRef, BlobWriter, BLOB_REF_PREFIX};

/// Suffix replacing the table file's extension
pub const BLOB_DIR_SUFFIX: &str = "blobs";

/// Staging subdirectory for blobs being written
pub const STAGING_DIR: &str = "tmp";

const STAGING_SUFFIX: &str = ".tmp";

/// Blob directory for a table file: `users.jsonl` → `users.blobs`
pub fn derive_blob_dir(table_path: &Path) -> PathBuf {
    table_path.with_extension(BLOB_DIR_SUFFIX)
}

/// Outcome of a [`BlobStore::sweep`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Published blobs no row referenced
    pub removed_blobs: usize,

    /// Leftover staging files
    pub removed_staging: usize,

    /// Entries that do not belong in the tree
    pub removed_unknown: usize,

    /// Removals that failed (logged, not returned)
    pub failures: usize,
}

impl SweepReport {
    pub fn removed_total(&self) -> usize {
        self.removed_blobs + self.removed_staging + self.removed_unknown
    }
}

/// Content-addressed file tree
///
/// ## Concurrency:
/// - Published files are immutable, so reads never need a lock
/// - Publishing is a rename, so readers see either nothing or the full file
#[derive(Debug)]
pub struct BlobStore {
    /// Root of the tree
    dir: PathBuf,
}

impl BlobStore {
    /// Store rooted at `dir`. Nothing is created on disk.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store for the given table file
    pub fn for_table(table_path: &Path) -> Self {
        Self::new(derive_blob_dir(table_path))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.dir.join(STAGING_DIR)
    }

    /// Start streaming a new blob
    ///
    /// Creates the tree (including the staging directory) on first use.
    pub fn writer(self: &Arc<Self>) -> Result<BlobWriter> {
        let staging = self.staging_dir();
        fs::create_dir_all(&staging)?;

        let file = tempfile::Builder::new()
            .prefix("blob-")
            .suffix(STAGING_SUFFIX)
            .tempfile_in(&staging)?;

        Ok(BlobWriter::new(Arc::clone(self), file))
    }

    /// Sharded path of a published blob: `<dir>/<hex[..2]>/<hex[2..]>`
    pub fn path_for(&self, reference: &BlobRef) -> PathBuf {
        let hash = reference.hash_hex();
        self.dir.join(&hash[..2]).join(&hash[2..])
    }

    pub fn contains(&self, reference: &BlobRef) -> bool {
        self.path_for(reference).is_file()
    }

    /// Open a published blob for reading
    pub fn open(&self, reference: &BlobRef) -> Result<File> {
        Ok(File::open(self.path_for(reference))?)
    }

    /// Delete a published blob
    ///
    /// Returns `false` when there was nothing to delete.
    pub fn remove(&self, reference: &BlobRef) -> Result<bool> {
        match fs::remove_file(self.path_for(reference)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All published references, sorted
    pub fn list(&self) -> Result<Vec<BlobRef>> {
        let mut refs = Vec::new();

        let shards = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(refs),
            Err(e) => return Err(e.into()),
        };

        for shard in shards {
            let shard = shard?;
            let shard_name = shard.file_name().to_string_lossy().into_owned();
            if !shard.file_type()?.is_dir() || !is_shard_name(&shard_name) {
                continue;
            }
            for file in fs::read_dir(shard.path())? {
                let file = file?;
                let name = file.file_name().to_string_lossy().into_owned();
                if let Some(reference) = ref_from_parts(&shard_name, &name) {
                    refs.push(reference);
                }
            }
        }

        refs.sort();
        Ok(refs)
    }

    /// Remove everything in the tree that `is_live` does not claim
    ///
    /// Best effort: failures are logged and counted, never returned, so a
    /// sweep can not fail the caller. Deletes orphaned published blobs,
    /// leftover staging files and entries that do not belong in the tree.
    pub fn sweep<F>(&self, is_live: F) -> SweepReport
    where
        F: Fn(&BlobRef) -> bool,
    {
        let mut report = SweepReport::default();

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return report,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "failed to read blob directory");
                report.failures += 1;
                return report;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "failed to read blob directory entry");
                    report.failures += 1;
                    continue;
                }
            };
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

            if name == STAGING_DIR && is_dir {
                self.sweep_staging(&path, &mut report);
            } else if is_dir && is_shard_name(&name) {
                self.sweep_shard(&path, &name, &is_live, &mut report);
            } else {
                remove_entry(&path, is_dir, &mut report.removed_unknown, &mut report.failures);
            }
        }

        if report.removed_total() > 0 {
            info!(
                dir = %self.dir.display(),
                orphans = report.removed_blobs,
                staging = report.removed_staging,
                unknown = report.removed_unknown,
                "blob sweep removed files"
            );
        }

        report
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn sweep_staging(&self, dir: &Path, report: &mut SweepReport) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read staging directory");
                report.failures += 1;
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file && name.ends_with(STAGING_SUFFIX) {
                remove_entry(&entry.path(), false, &mut report.removed_staging, &mut report.failures);
            }
        }
    }

    fn sweep_shard<F>(&self, dir: &Path, shard: &str, is_live: &F, report: &mut SweepReport)
    where
        F: Fn(&BlobRef) -> bool,
    {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "failed to read blob shard");
                report.failures += 1;
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);

            match ref_from_parts(shard, &name) {
                Some(reference) if !is_dir => {
                    if !is_live(&reference) {
                        remove_entry(&path, false, &mut report.removed_blobs, &mut report.failures);
                    }
                }
                _ => remove_entry(&path, is_dir, &mut report.removed_unknown, &mut report.failures),
            }
        }
    }
}

fn remove_entry(path: &Path, is_dir: bool, removed: &mut usize, failures: &mut usize) {
    let result = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => *removed += 1,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove blob entry");
            *failures += 1;
        }
    }
}

fn is_shard_name(name: &str) -> bool {
    name.len() == 2 && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn ref_from_parts(shard: &str, file: &str) -> Option<BlobRef> {
    BlobRef::parse(&format!("{}{}{}", BLOB_REF_PREFIX, shard, file)).ok()
}
