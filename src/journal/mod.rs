//! Journal Module
//!
//! The on-disk log of a table: a JSON Lines file.
//!
//! ## Responsibilities
//! - Read the header and rows back, line by line
//! - Append one flushed line per new row
//! - Rewrite the whole file atomically (temp file + rename)
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ {"version":"1.0","columns":[{"name":..,"type":..}]}     │  line 1: header
//! ├─────────────────────────────────────────────────────────┤
//! │ {"id":"-0Bx3k9Qz-1","name":"Ten",...}                   │  line 2..n: rows
//! │ {"id":"-0Bx3k9R0-1","name":"Five",...}                  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Blank lines are skipped when reading and never written. Rows appear in
//! append order; a rewrite emits them in id order.

mod reader;
mod writer;

pub use reader::JournalReader;
pub use writer::JournalWriter;
