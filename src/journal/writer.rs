//! Journal Writer
//!
//! Appends rows to the journal and rewrites it atomically.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{trace, warn};

use crate::config::SyncStrategy;
use crate::error::Result;
use crate::schema::SchemaHeader;

/// Writes to one journal file
///
/// Not synchronized: the owning table serializes all calls under its
/// write lock.
pub struct JournalWriter {
    path: PathBuf,
    sync_strategy: SyncStrategy,
    /// Appends written since the last fsync
    unsynced: usize,
}

impl JournalWriter {
    pub fn new(path: &Path, sync_strategy: SyncStrategy) -> Self {
        Self {
            path: path.to_path_buf(),
            sync_strategy,
            unsynced: 0,
        }
    }

    /// Append one row, preceded by the header when it is not on disk yet
    ///
    /// The lines are encoded up front and written with a single `write_all`,
    /// so an encoding failure writes nothing. A failed write or a failed
    /// fsync is truncated back to the previous length, so an `Err` always
    /// leaves the file as it was and the caller may retry.
    pub fn append<R: Serialize>(&mut self, header: Option<&SchemaHeader>, row: &R) -> Result<()> {
        let mut data = Vec::new();
        if let Some(header) = header {
            serde_json::to_writer(&mut data, header)?;
            data.push(b'\n');
        }
        serde_json::to_writer(&mut data, row)?;
        data.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNAppends { count } => self.unsynced + 1 >= count.max(1),
        };
        append_line(&mut file, &data, due)?;

        self.unsynced = if due { 0 } else { self.unsynced + 1 };
        trace!(path = %self.path.display(), bytes = data.len(), synced = due, "journal append");
        Ok(())
    }

    /// Replace the whole file with `header` followed by `rows`
    ///
    /// Writes a temp file next to the journal, fsyncs it and renames it over
    /// the journal, so readers only ever see the old or the new contents.
    pub fn rewrite<'a, R, I>(&mut self, header: &SchemaHeader, rows: I) -> Result<()>
    where
        R: Serialize + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let tmp = NamedTempFile::new_in(&dir)?;
        if let Ok(meta) = fs::metadata(&self.path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }

        let mut out = BufWriter::new(tmp);
        serde_json::to_writer(&mut out, header)?;
        out.write_all(b"\n")?;

        let mut count = 0usize;
        for row in rows {
            serde_json::to_writer(&mut out, row)?;
            out.write_all(b"\n")?;
            count += 1;
        }

        let tmp = out.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        self.unsynced = 0;

        trace!(path = %self.path.display(), rows = count, "journal rewritten");
        Ok(())
    }

    /// Force outstanding appends to disk
    pub fn sync(&mut self) -> Result<()> {
        if self.unsynced == 0 {
            return Ok(());
        }
        match OpenOptions::new().append(true).open(&self.path) {
            Ok(file) => file.sync_data()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.unsynced = 0;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends not yet fsynced
    pub fn unsynced(&self) -> usize {
        self.unsynced
    }
}

/// A file the journal appends to
trait AppendTarget: Write {
    fn len(&self) -> io::Result<u64>;
    fn set_len(&self, len: u64) -> io::Result<()>;
    fn sync_data(&self) -> io::Result<()>;
}

impl AppendTarget for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_len(&self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Write `data` and optionally fsync it; on any failure cut the file back
fn append_line<F: AppendTarget>(file: &mut F, data: &[u8], sync: bool) -> io::Result<()> {
    let len_before = file.len()?;

    let result = file
        .write_all(data)
        .and_then(|_| file.flush())
        .and_then(|_| if sync { file.sync_data() } else { Ok(()) });

    if let Err(e) = result {
        // Leave no line behind that memory does not hold
        if let Err(trunc) = file.set_len(len_before) {
            warn!(error = %trunc, "failed to truncate journal after a failed append");
        }
        return Err(e);
    }
    Ok(())
}
