//! # tablelog
//!
//! An embedded, file-backed table engine with:
//! - A JSON Lines journal per table (header line + one row per line)
//! - Full in-memory mirror ordered by id, rebuilt on open
//! - Atomic, durable mutations (append, or temp file + rename)
//! - Content-addressed, deduplicated blob side-storage
//! - Reference-counted blob cleanup plus a sweep on open
//! - Synchronous observers for derived views
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Table<T: Row>                         │
//! │            (Single Writer / Multi Reader, RwLock)            │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │                      │                       │
//!        ▼                      ▼                       ▼
//!  ┌─────────────┐      ┌──────────────┐        ┌──────────────┐
//!  │   Journal   │      │ rows + by_id │        │  Observers   │
//!  │  (.jsonl)   │      │   (arena)    │        │  (fan-out)   │
//!  └─────────────┘      └──────┬───────┘        └──────────────┘
//!                              │ blob refs
//!                              ▼
//!                      ┌──────────────┐
//!                      │  BlobStore   │
//!                      │  (.blobs/)   │
//!                      └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use serde::{Deserialize, Serialize};
//! use tablelog::{Id, Row, Table, ValidationError};
//!
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Note {
//!     id: Id,
//!     text: String,
//! }
//!
//! impl Row for Note {
//!     fn id(&self) -> Id {
//!         self.id
//!     }
//!
//!     fn validate(&self) -> Result<(), ValidationError> {
//!         if self.text.is_empty() {
//!             return Err(ValidationError::new("text is required"));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let table: Table<Note> = Table::open_path("data/notes.jsonl")?;
//! table.append(Note { id: Id::generate(), text: "hello".into() })?;
//! for note in table.iter(Id::ZERO) {
//!     println!("{}", note.text);
//! }
//! # Ok::<(), tablelog::TableError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod id;
pub mod row;
pub mod schema;
pub mod blob;
pub mod journal;
pub mod table;
pub mod dynamic;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TableError, ValidationError};
pub use config::{Config, SyncStrategy};
pub use id::Id;
pub use row::Row;
pub use schema::{Column, ColumnType, SchemaHeader};
pub use blob::{Blob, BlobRef, BlobStore, BlobWriter, SweepReport};
pub use table::{Iter, Table, TableObserver};
pub use dynamic::DynamicRow;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tablelog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
