//! Tests for JournalReader and JournalWriter
//!
//! These tests verify:
//! - Header-first append and one line per row
//! - Atomic rewrite replaces the file contents
//! - Reading headers and rows with physical line numbers
//! - Error reporting for malformed input

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tablelog::journal::{JournalReader, JournalWriter};
use tablelog::{Column, ColumnType, SchemaHeader, SyncStrategy, TableError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    id: u64,
    body: String,
}

fn entry(id: u64, body: &str) -> Entry {
    Entry {
        id,
        body: body.to_string(),
    }
}

fn header() -> SchemaHeader {
    SchemaHeader::new("1.0", vec![Column::new("body", ColumnType::Text)])
}

fn setup_temp_journal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("journal.jsonl");
    (temp_dir, path)
}

fn read_all(path: &Path) -> (Option<SchemaHeader>, Vec<(usize, Entry)>) {
    let mut reader = JournalReader::open(path).unwrap().unwrap();
    let header = reader.read_header().unwrap();
    let mut rows = Vec::new();
    while let Some(row) = reader.next_row::<Entry>().unwrap() {
        rows.push(row);
    }
    (header, rows)
}

// =============================================================================
// Writer Tests
// =============================================================================

#[test]
fn test_append_with_header() {
    let (_temp, path) = setup_temp_journal();
    let mut writer = JournalWriter::new(&path, SyncStrategy::EveryWrite);

    writer.append(Some(&header()), &entry(1, "first")).unwrap();
    writer.append(None, &entry(2, "second")).unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        r#"{"version":"1.0","columns":[{"name":"body","type":"text"}]}"#
    );
    assert_eq!(lines[1], r#"{"id":1,"body":"first"}"#);
    assert!(contents.ends_with('\n'));
}

#[test]
fn test_append_counts_unsynced() {
    let (_temp, path) = setup_temp_journal();
    let mut writer = JournalWriter::new(&path, SyncStrategy::EveryNAppends { count: 3 });

    writer.append(Some(&header()), &entry(1, "a")).unwrap();
    writer.append(None, &entry(2, "b")).unwrap();
    assert_eq!(writer.unsynced(), 2);

    writer.append(None, &entry(3, "c")).unwrap();
    assert_eq!(writer.unsynced(), 0);

    writer.append(None, &entry(4, "d")).unwrap();
    writer.sync().unwrap();
    assert_eq!(writer.unsynced(), 0);
}

#[test]
fn test_rewrite_replaces_contents() {
    let (temp, path) = setup_temp_journal();
    let mut writer = JournalWriter::new(&path, SyncStrategy::EveryWrite);
    writer.append(Some(&header()), &entry(1, "a")).unwrap();
    writer.append(None, &entry(2, "b")).unwrap();

    let rows = vec![entry(2, "b"), entry(3, "c")];
    writer.rewrite(&header(), rows.iter()).unwrap();

    let (read_header, read_rows) = read_all(&path);
    assert_eq!(read_header, Some(header()));
    let bodies: Vec<Entry> = read_rows.into_iter().map(|(_, e)| e).collect();
    assert_eq!(bodies, rows);
    // The temp file was renamed into place
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn test_rewrite_creates_missing_file() {
    let (_temp, path) = setup_temp_journal();
    let mut writer = JournalWriter::new(&path, SyncStrategy::EveryWrite);

    writer.rewrite::<Entry, _>(&header(), std::iter::empty()).unwrap();

    let (read_header, rows) = read_all(&path);
    assert_eq!(read_header, Some(header()));
    assert!(rows.is_empty());
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_open_missing_file() {
    let (_temp, path) = setup_temp_journal();
    assert!(JournalReader::open(&path).unwrap().is_none());
}

#[test]
fn test_read_blank_file() {
    let (_temp, path) = setup_temp_journal();
    fs::write(&path, "\n \n\t\n").unwrap();

    let (header, rows) = read_all(&path);

    assert!(header.is_none());
    assert!(rows.is_empty());
}

#[test]
fn test_read_reports_physical_lines() {
    let (_temp, path) = setup_temp_journal();
    fs::write(
        &path,
        "\n{\"version\":\"1.0\"}\n{\"id\":1,\"body\":\"a\"}\n\n\n{\"id\":2,\"body\":\"b\"}\n",
    )
    .unwrap();

    let (header, rows) = read_all(&path);

    assert_eq!(header.unwrap().columns.len(), 0);
    assert_eq!(rows, vec![(3, entry(1, "a")), (6, entry(2, "b"))]);
}

#[test]
fn test_read_header_errors() {
    let (_temp, path) = setup_temp_journal();

    fs::write(&path, "[1,2,3]\n").unwrap();
    let mut reader = JournalReader::open(&path).unwrap().unwrap();
    assert!(matches!(reader.read_header(), Err(TableError::InvalidHeader { .. })));

    fs::write(&path, "{\"columns\":[]}\n").unwrap();
    let mut reader = JournalReader::open(&path).unwrap().unwrap();
    assert!(matches!(reader.read_header(), Err(TableError::InvalidHeader { .. })));

    fs::write(&path, "{\"version\":\"1.0\",\"columns\":[{\"name\":\"\",\"type\":\"text\"}]}\n").unwrap();
    let mut reader = JournalReader::open(&path).unwrap().unwrap();
    let err = reader.read_header().unwrap_err();
    assert!(err.to_string().contains("name is required"));
}

#[test]
fn test_read_malformed_row() {
    let (_temp, path) = setup_temp_journal();
    fs::write(&path, "{\"version\":\"1.0\"}\n{\"id\":1,\"body\":\"a\"}\n{\"id\":\"x\"}\n").unwrap();

    let mut reader = JournalReader::open(&path).unwrap().unwrap();
    reader.read_header().unwrap();
    assert!(reader.next_row::<Entry>().unwrap().is_some());

    let err = reader.next_row::<Entry>().unwrap_err();
    match err {
        TableError::MalformedRow { path: p, line, .. } => {
            assert_eq!(p, path);
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}
