//! Row contract
//!
//! Every record type stored in a [`Table`](crate::Table) implements [`Row`].

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::blob::Blob;
use crate::error::ValidationError;
use crate::id::Id;
use crate::schema::Column;

/// A record that can be persisted in a table
///
/// `Clone` must produce an independent copy: the table hands out clones and
/// relies on callers never reaching its own copies.
pub trait Row: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique, non-zero identifier. Must not change for the record's lifetime.
    fn id(&self) -> Id;

    /// Check data integrity
    ///
    /// Called for every loaded row and before every write. Must be pure.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Blob fields held by this row
    ///
    /// Drives reference counting and garbage collection, so every blob field
    /// the row stores must be listed. Unset blobs are ignored.
    fn blobs(&self) -> Vec<&Blob> {
        Vec::new()
    }

    /// Mutable access to the same fields as [`Row::blobs`]
    ///
    /// The table uses it to attach its blob store after loading or appending.
    fn blobs_mut(&mut self) -> Vec<&mut Blob> {
        Vec::new()
    }

    /// Column shape written into the header of a new table
    fn columns() -> Vec<Column> {
        Vec::new()
    }
}
