//! Schema header
//!
//! The first line of every journal. It describes the format version and the
//! column shape of the rows that follow; the engine never interprets rows
//! through it, it is metadata for readers of the file.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Format version written into new tables
pub const CURRENT_VERSION: &str = "1.0";

/// Type of a column
///
/// Names outside the known set are kept as [`ColumnType::Other`]; the header
/// is metadata and a newer writer may use types this crate does not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    Text,
    Number,
    /// Boolean (also read as `boolean` or `bool`)
    Checkbox,
    /// ISO-8601 timestamp
    Date,
    /// Content-addressed blob reference
    Blob,
    /// External blob reference (`blob_ref`)
    BlobRef,
    /// Nested JSON value
    Jsonb,
    /// Any other type name, preserved verbatim
    Other(String),
}

impl ColumnType {
    pub fn as_str(&self) -> &str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Checkbox => "checkbox",
            ColumnType::Date => "date",
            ColumnType::Blob => "blob",
            ColumnType::BlobRef => "blob_ref",
            ColumnType::Jsonb => "jsonb",
            ColumnType::Other(name) => name,
        }
    }
}

impl From<String> for ColumnType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "text" => ColumnType::Text,
            "number" => ColumnType::Number,
            "checkbox" | "boolean" | "bool" => ColumnType::Checkbox,
            "date" => ColumnType::Date,
            "blob" => ColumnType::Blob,
            "blob_ref" => ColumnType::BlobRef,
            "jsonb" => ColumnType::Jsonb,
            _ => ColumnType::Other(name),
        }
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of the header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            required: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// First line of a journal file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaHeader {
    pub version: String,

    #[serde(default)]
    pub columns: Vec<Column>,
}

impl SchemaHeader {
    pub fn new(version: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            version: version.into(),
            columns,
        }
    }

    /// Check that the header is well-formed
    ///
    /// Returns a human readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.version.is_empty() {
            return Err("schema version is required".to_string());
        }
        for (i, column) in self.columns.iter().enumerate() {
            if column.name.is_empty() {
                return Err(format!("column {}: name is required", i));
            }
            if column.column_type.as_str().is_empty() {
                return Err(format!("column {}: type is required", i));
            }
        }
        Ok(())
    }
}
