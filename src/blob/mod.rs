//! Blob Module
//!
//! Content-addressed storage for binary payloads referenced from rows.
//!
//! ## Responsibilities
//! - Stream payloads into a staging file while hashing them
//! - Publish atomically under the content hash (deduplicating put)
//! - Open published payloads for reading
//! - Remove payloads no row references any more (sweep and prune)
//!
//! ## Directory Layout
//! ```text
//! users.jsonl
//! users.blobs/
//! ├── tmp/                       (staging, *.tmp)
//! ├── 3f/
//! │   └── 9a0c…                  (remaining 62 hex chars)
//! └── a1/
//!     └── …
//! ```
//!
//! Rows store only the [`BlobRef`] (`"blake3:<64 hex>"`); the payload lives in
//! the tree above.

mod store;
mod writer;

pub use store::{derive_blob_dir, BlobStore, SweepReport, BLOB_DIR_SUFFIX, STAGING_DIR};
pub use writer::BlobWriter;

use std::fmt;
use std::fs::File;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TableError};

/// Prefix naming the hash algorithm of a reference
pub const BLOB_REF_PREFIX: &str = "blake3:";

const HASH_HEX_LEN: usize = 64;

// =============================================================================
// BlobRef
// =============================================================================

/// Content-addressed reference: `"blake3:<64 lowercase hex chars>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobRef(String);

impl BlobRef {
    /// Parse and validate a reference string
    pub fn parse(s: &str) -> Result<Self> {
        let hash = s
            .strip_prefix(BLOB_REF_PREFIX)
            .ok_or_else(|| TableError::InvalidBlobRef(s.to_string()))?;

        let well_formed = hash.len() == HASH_HEX_LEN
            && hash.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !well_formed {
            return Err(TableError::InvalidBlobRef(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub(crate) fn from_hash(hash: &blake3::Hash) -> Self {
        Self(format!("{}{}", BLOB_REF_PREFIX, hex::encode(hash.as_bytes())))
    }

    /// Hex digest without the algorithm prefix
    pub fn hash_hex(&self) -> &str {
        &self.0[BLOB_REF_PREFIX.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for BlobRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BlobRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BlobRef::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Blob
// =============================================================================

/// A blob field of a row
///
/// Holds the reference plus a handle to the store it lives in. Only the
/// reference is serialized; the table attaches its store when rows are
/// loaded or appended. The zero value means "unset", which is different
/// from a blob whose content is empty.
#[derive(Clone, Default)]
pub struct Blob {
    reference: Option<BlobRef>,
    store: Option<Arc<BlobStore>>,
}

impl Blob {
    /// Unset blob
    pub fn new() -> Self {
        Self::default()
    }

    /// Blob pointing at an existing reference, no store attached yet
    pub fn from_ref(reference: BlobRef) -> Self {
        Self {
            reference: Some(reference),
            store: None,
        }
    }

    pub(crate) fn bound(reference: BlobRef, store: Arc<BlobStore>) -> Self {
        Self {
            reference: Some(reference),
            store: Some(store),
        }
    }

    pub(crate) fn attach(&mut self, store: &Arc<BlobStore>) {
        self.store = Some(Arc::clone(store));
    }

    /// True when no reference is assigned
    pub fn is_zero(&self) -> bool {
        self.reference.is_none()
    }

    pub fn reference(&self) -> Option<&BlobRef> {
        self.reference.as_ref()
    }

    /// Open the published payload for sequential reading
    pub fn reader(&self) -> Result<File> {
        let reference = self.reference.as_ref().ok_or(TableError::UnsetBlob)?;
        let store = self.store.as_ref().ok_or(TableError::NoBlobStore)?;
        store.open(reference)
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Blob {}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("reference", &self.reference)
            .field("attached", &self.store.is_some())
            .finish()
    }
}

impl Serialize for Blob {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.reference.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Blob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let reference = match raw.as_deref() {
            None | Some("") => None,
            Some(s) => Some(BlobRef::parse(s).map_err(serde::de::Error::custom)?),
        };
        Ok(Self {
            reference,
            store: None,
        })
    }
}
