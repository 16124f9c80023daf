//! Table Module
//!
//! The engine: a generic record table backed by a journal file, with an
//! in-memory ordered mirror and a content-addressed blob side-store.
//!
//! ## Responsibilities
//! - Load and validate the journal on open (all-or-nothing)
//! - Serve reads from memory, always as clones
//! - Persist every mutation before it becomes visible
//! - Count blob references and delete blobs nobody references
//! - Fan committed mutations out to observers

mod iter;
mod observer;

pub use iter::Iter;
pub use observer::TableObserver;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::blob::{BlobRef, BlobStore, BlobWriter, SweepReport};
use crate::config::Config;
use crate::error::{Result, TableError, ValidationError};
use crate::id::Id;
use crate::journal::{JournalReader, JournalWriter};
use crate::row::Row;
use crate::schema::SchemaHeader;

/// A file-backed table of `T` rows
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader
///
/// - **Reads** (`len`/`get`/`iter`): shared lock, run concurrently
/// - **Writes** (`append`/`update`/`delete`/`modify`): exclusive lock held
///   for the whole call, including the disk write and observer fan-out
///
/// The file on disk is the source of truth; the in-memory state is a cache
/// rebuilt fully on open. One table instance must be the only writer of its
/// file.
pub struct Table<T: Row> {
    /// Table configuration
    config: Config,

    /// Blob side-store (directory created lazily)
    blobs: Arc<BlobStore>,

    /// What the sweep at open removed
    opened_sweep: SweepReport,

    /// Everything mutable, behind one lock
    state: RwLock<TableState<T>>,
}

/// The arena guarded by the table lock
struct TableState<T: Row> {
    /// Header of the journal (loaded, or pending for a new file)
    schema: SchemaHeader,

    /// Whether the header has been written to disk
    header_on_disk: bool,

    /// Rows ordered by ascending id
    rows: Vec<T>,

    /// id → position in `rows`
    by_id: HashMap<Id, usize>,

    /// Number of row fields referencing each blob
    blob_refs: HashMap<BlobRef, usize>,

    /// Registered listeners, in registration order
    observers: Vec<Arc<dyn TableObserver<T>>>,

    /// Writer for the journal file
    journal: JournalWriter,
}

impl<T: Row> Table<T> {
    /// Open or create a table with the given config
    ///
    /// On startup:
    /// 1. Create the parent directory if needed
    /// 2. Read the header and every row; any bad line fails the open
    /// 3. Sort in memory if the file was not in id order
    /// 4. Sweep blobs no loaded row references
    pub fn open(config: Config) -> Result<Self> {
        let path = config.path.clone();

        // Step 1: Create parent directory
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let blobs = Arc::new(BlobStore::for_table(&path));
        let mut state = TableState {
            schema: SchemaHeader::new(config.schema_version.clone(), T::columns()),
            header_on_disk: false,
            rows: Vec::new(),
            by_id: HashMap::new(),
            blob_refs: HashMap::new(),
            observers: Vec::new(),
            journal: JournalWriter::new(&path, config.sync_strategy),
        };

        // Step 2: Load the journal if it exists
        let mut needs_sort = false;
        if let Some(mut reader) = JournalReader::open(&path)? {
            if let Some(header) = reader.read_header()? {
                state.schema = header;
                state.header_on_disk = true;

                let mut prev = Id::ZERO;
                while let Some((line, mut row)) = reader.next_row::<T>()? {
                    row.validate().map_err(|source| TableError::InvalidRow {
                        path: path.clone(),
                        line,
                        source,
                    })?;

                    let id = row.id();
                    if id.is_zero() {
                        return Err(TableError::ZeroId { line: Some(line) });
                    }
                    if state.by_id.contains_key(&id) {
                        return Err(TableError::DuplicateId(id));
                    }
                    if id < prev {
                        needs_sort = true;
                    }
                    prev = id;

                    for blob in row.blobs_mut() {
                        blob.attach(&blobs);
                    }
                    track_refs(&mut state.blob_refs, &row);
                    state.by_id.insert(id, state.rows.len());
                    state.rows.push(row);
                }
            }
        }

        // A new table writes its header with the first mutation; refuse one
        // that could not be read back
        if !state.header_on_disk {
            state.schema.validate().map_err(|reason| TableError::InvalidHeader {
                path: path.clone(),
                reason,
            })?;
        }

        // Step 3: Correct order once in memory; the file stays as is
        if needs_sort {
            state.rows.sort_by_key(|row| row.id());
            state.reindex_from(0);
        }

        // Step 4: Drop blobs that no loaded row references
        let report = blobs.sweep(|reference| state.blob_refs.contains_key(reference));

        debug!(
            path = %path.display(),
            rows = state.rows.len(),
            resorted = needs_sort,
            swept = report.removed_total(),
            "table opened"
        );

        Ok(Self {
            config,
            blobs,
            opened_sweep: report,
            state: RwLock::new(state),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified journal path
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open(config)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Number of rows
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }

    /// Clone of the row with the given id
    pub fn get(&self, id: Id) -> Option<T> {
        let state = self.state.read();
        state.by_id.get(&id).map(|&idx| state.rows[idx].clone())
    }

    /// Iterate over clones of the rows with an id strictly greater than `start`
    ///
    /// Pass `Id::ZERO` to start from the beginning.
    pub fn iter(&self, start: Id) -> Iter<'_, T> {
        Iter::new(self, start)
    }

    /// First row above `cursor`, used by [`Iter`]
    fn first_after(&self, cursor: Id) -> Option<T> {
        let state = self.state.read();
        let pos = state.rows.partition_point(|row| row.id() <= cursor);
        state.rows.get(pos).cloned()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append a new row
    ///
    /// Rejects a zero id, a duplicate id and a row failing validation; nothing
    /// is written on rejection. On success exactly one line is appended. A row
    /// whose id is below the current maximum is merge-inserted in memory only;
    /// the file stays an append-only journal.
    pub fn append(&self, mut row: T) -> Result<()> {
        let id = row.id();
        if id.is_zero() {
            return Err(TableError::ZeroId { line: None });
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        if state.by_id.contains_key(&id) {
            return Err(TableError::DuplicateId(id));
        }
        row.validate()?;

        let header = (!state.header_on_disk).then_some(&state.schema);
        state.journal.append(header, &row)?;
        state.header_on_disk = true;

        for blob in row.blobs_mut() {
            blob.attach(&self.blobs);
        }
        track_refs(&mut state.blob_refs, &row);
        let idx = state.insert_sorted(row);

        for observer in &state.observers {
            observer.on_append(&state.rows[idx]);
        }
        Ok(())
    }

    /// Replace the row with the same id
    ///
    /// Returns the previous row, or `None` (and does nothing) if no row has
    /// that id. The whole file is rewritten atomically.
    pub fn update(&self, row: T) -> Result<Option<T>> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(&idx) = state.by_id.get(&row.id()) else {
            return Ok(None);
        };
        row.validate()?;

        self.replace_locked(state, idx, row).map(Some)
    }

    /// Delete the row with the given id
    ///
    /// Returns the removed row, or `None` (and does nothing) if absent. The
    /// whole file is rewritten atomically; blobs only the removed row
    /// referenced are deleted right away.
    pub fn delete(&self, id: Id) -> Result<Option<T>> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(&idx) = state.by_id.get(&id) else {
            return Ok(None);
        };

        let removed = state.rows.remove(idx);
        state.by_id.remove(&id);
        state.reindex_from(idx);

        if let Err(e) = state.persist_all() {
            state.rows.insert(idx, removed);
            state.reindex_from(idx);
            return Err(e);
        }

        for observer in &state.observers {
            observer.on_delete(&removed);
        }

        let released = untrack_refs(&mut state.blob_refs, &removed);
        self.prune(&released);

        Ok(Some(removed))
    }

    /// Read-modify-write of one row under a single held lock
    ///
    /// `f` receives a clone of the stored row. If it fails its error is
    /// returned unchanged and the stored row is untouched. A missing id is an
    /// error here, unlike [`Table::update`]. The modified row must keep its id
    /// and pass validation; it is then applied exactly as `update` would.
    /// `f` runs with the write lock held and must not call back into the table.
    pub fn modify<F, E>(&self, id: Id, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut T) -> std::result::Result<(), E>,
        E: From<TableError>,
    {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let idx = *state.by_id.get(&id).ok_or(TableError::NotFound(id))?;

        let mut row = state.rows[idx].clone();
        f(&mut row)?;

        if row.id() != id {
            return Err(TableError::Validation(ValidationError::new(format!(
                "modify changed row id {} to {}",
                id,
                row.id()
            )))
            .into());
        }
        row.validate().map_err(TableError::from)?;

        self.replace_locked(state, idx, row)?;
        Ok(state.rows[idx].clone())
    }

    /// Register an observer
    ///
    /// The observer first receives `on_append` for every current row, in id
    /// order, before this call returns.
    pub fn add_observer(&self, observer: Arc<dyn TableObserver<T>>) {
        let mut state = self.state.write();
        for row in &state.rows {
            observer.on_append(row);
        }
        state.observers.push(observer);
    }

    /// Start streaming a new blob into this table's blob store
    ///
    /// Assign the returned [`Blob`](crate::Blob) to a row field and append or
    /// update the row; blobs never attached to a row are swept on next open.
    pub fn new_blob(&self) -> Result<BlobWriter> {
        self.blobs.writer()
    }

    /// Force appends buffered by [`SyncStrategy::EveryNAppends`](crate::SyncStrategy) to disk
    pub fn sync(&self) -> Result<()> {
        self.state.write().journal.sync()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Journal file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn blob_dir(&self) -> &Path {
        self.blobs.dir()
    }

    pub fn blob_store(&self) -> &Arc<BlobStore> {
        &self.blobs
    }

    /// Clone of the schema header
    pub fn schema(&self) -> SchemaHeader {
        self.state.read().schema.clone()
    }

    /// Number of distinct blobs referenced by the current rows
    pub fn live_blob_count(&self) -> usize {
        self.state.read().blob_refs.len()
    }

    /// Result of the orphan sweep run by [`Table::open`]
    pub fn sweep_report(&self) -> SweepReport {
        self.opened_sweep
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Swap in an already validated row, persist, and fan out
    ///
    /// Called with the write lock held. Returns the previous row.
    fn replace_locked(&self, state: &mut TableState<T>, idx: usize, mut row: T) -> Result<T> {
        for blob in row.blobs_mut() {
            blob.attach(&self.blobs);
        }

        let prev = std::mem::replace(&mut state.rows[idx], row);
        if let Err(e) = state.persist_all() {
            state.rows[idx] = prev;
            return Err(e);
        }

        // Count the new references before releasing the old ones so a
        // blob kept by both is never dropped
        track_refs(&mut state.blob_refs, &state.rows[idx]);
        let released = untrack_refs(&mut state.blob_refs, &prev);

        for observer in &state.observers {
            observer.on_update(&prev, &state.rows[idx]);
        }

        self.prune(&released);
        Ok(prev)
    }

    /// Delete blob files no row references any more
    ///
    /// The mutation is already durable, so failures are only logged; the
    /// sweep on next open retries them.
    fn prune(&self, released: &[BlobRef]) {
        for reference in released {
            match self.blobs.remove(reference) {
                Ok(true) => debug!(blob = %reference, "pruned unreferenced blob"),
                Ok(false) => {}
                Err(e) => warn!(blob = %reference, error = %e, "failed to prune blob"),
            }
        }
    }
}

impl<T: Row> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Table")
            .field("path", &self.config.path)
            .field("rows", &state.rows.len())
            .field("live_blobs", &state.blob_refs.len())
            .field("observers", &state.observers.len())
            .finish()
    }
}

impl<T: Row> TableState<T> {
    /// Insert keeping id order; returns the row's position
    fn insert_sorted(&mut self, row: T) -> usize {
        let id = row.id();
        let out_of_order = self.rows.last().is_some_and(|last| id < last.id());

        if out_of_order {
            let idx = self.rows.partition_point(|r| r.id() < id);
            self.rows.insert(idx, row);
            self.reindex_from(idx);
            idx
        } else {
            let idx = self.rows.len();
            self.by_id.insert(id, idx);
            self.rows.push(row);
            idx
        }
    }

    /// Refresh `by_id` for every row at or after `start`
    fn reindex_from(&mut self, start: usize) {
        for (i, row) in self.rows.iter().enumerate().skip(start) {
            self.by_id.insert(row.id(), i);
        }
    }

    /// Rewrite the whole journal from memory
    fn persist_all(&mut self) -> Result<()> {
        self.journal.rewrite(&self.schema, self.rows.iter())?;
        self.header_on_disk = true;
        Ok(())
    }
}

fn track_refs<T: Row>(counts: &mut HashMap<BlobRef, usize>, row: &T) {
    for blob in row.blobs() {
        if let Some(reference) = blob.reference() {
            *counts.entry(reference.clone()).or_insert(0) += 1;
        }
    }
}

/// Decrement the row's references; returns those that dropped to zero
fn untrack_refs<T: Row>(counts: &mut HashMap<BlobRef, usize>, row: &T) -> Vec<BlobRef> {
    let mut released = Vec::new();
    for blob in row.blobs() {
        let Some(reference) = blob.reference() else {
            continue;
        };
        if let Some(count) = counts.get_mut(reference) {
            *count -= 1;
            if *count == 0 {
                counts.remove(reference);
                released.push(reference.clone());
            }
        }
    }
    released
}
