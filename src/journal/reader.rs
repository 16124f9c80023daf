//! Journal Reader
//!
//! Streams the header and rows out of a journal file.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{Result, TableError};
use crate::schema::SchemaHeader;

/// Reads a journal front to back
pub struct JournalReader {
    path: PathBuf,
    reader: BufReader<File>,
    /// Physical line number of the last line read (1-based)
    line: usize,
    buf: String,
}

impl JournalReader {
    /// Open a journal for reading
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            line: 0,
            buf: String::new(),
        }))
    }

    /// Read and validate the header (the first non-blank line)
    ///
    /// Returns `Ok(None)` when the file holds no non-blank line at all.
    pub fn read_header(&mut self) -> Result<Option<SchemaHeader>> {
        if !self.next_line()? {
            return Ok(None);
        }

        let header: SchemaHeader =
            serde_json::from_str(self.buf.trim()).map_err(|e| TableError::InvalidHeader {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        header.validate().map_err(|reason| TableError::InvalidHeader {
            path: self.path.clone(),
            reason,
        })?;

        Ok(Some(header))
    }

    /// Read the next row with its line number
    pub fn next_row<T: DeserializeOwned>(&mut self) -> Result<Option<(usize, T)>> {
        if !self.next_line()? {
            return Ok(None);
        }

        let row = serde_json::from_str(self.buf.trim()).map_err(|source| TableError::MalformedRow {
            path: self.path.clone(),
            line: self.line,
            source,
        })?;

        Ok(Some((self.line, row)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Advance to the next non-blank line, leaving it in `buf`
    fn next_line(&mut self) -> Result<bool> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(false);
            }
            self.line += 1;
            if !self.buf.trim().is_empty() {
                return Ok(true);
            }
        }
    }
}
