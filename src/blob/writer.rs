//! Blob Writer
//!
//! Streams a payload into a staging file while hashing it, then publishes it
//! under its content hash.

use std::fs;
use std::io::{self, Write};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::trace;

use crate::error::Result;

use super::{Blob, BlobRef, BlobStore};

/// Streaming writer for a new blob
///
/// Obtained from [`BlobStore::writer`] or [`Table::new_blob`](crate::Table::new_blob).
/// Write the payload, then call [`close`](BlobWriter::close) to publish it.
/// [`abort`](BlobWriter::abort) or simply dropping the writer discards the
/// staging file.
pub struct BlobWriter {
    /// Store the blob will be published into
    store: Arc<BlobStore>,
    /// Private staging file under `tmp/`
    file: NamedTempFile,
    /// Running content hash
    hasher: blake3::Hasher,
    /// Bytes accepted so far
    size: u64,
}

impl BlobWriter {
    pub(super) fn new(store: Arc<BlobStore>, file: NamedTempFile) -> Self {
        Self {
            store,
            file,
            hasher: blake3::Hasher::new(),
            size: 0,
        }
    }

    /// Number of bytes written so far
    pub fn bytes_written(&self) -> u64 {
        self.size
    }

    /// Finalize the hash and publish the payload
    ///
    /// A deduplicating put: when a blob with the same hash is already
    /// published the staging file is discarded and the existing file reused.
    /// Either way the returned [`Blob`] carries the canonical reference.
    pub fn close(self) -> Result<Blob> {
        let BlobWriter {
            store,
            mut file,
            hasher,
            size,
        } = self;

        file.flush()?;
        file.as_file().sync_all()?;

        let reference = BlobRef::from_hash(&hasher.finalize());
        let target = store.path_for(&reference);
        if let Some(shard) = target.parent() {
            fs::create_dir_all(shard)?;
        }

        if target.is_file() {
            trace!(blob = %reference, size, "blob already published, discarding staged copy");
            file.close()?;
        } else {
            file.persist(&target).map_err(|e| e.error)?;
            trace!(blob = %reference, size, "blob published");
        }

        Ok(Blob::bound(reference, store))
    }

    /// Discard the staged payload without publishing
    pub fn abort(self) -> Result<()> {
        self.file.close()?;
        Ok(())
    }
}

impl Write for BlobWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
