//! Schema-less rows
//!
//! [`DynamicRow`] stores any JSON object with an `"id"` field. It lets tools
//! open a table without knowing its row type. Blob references are found by
//! scanning string values, at any depth, that parse as a [`BlobRef`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::blob::{Blob, BlobRef};
use crate::error::ValidationError;
use crate::id::Id;
use crate::row::Row;

/// A row with arbitrary JSON fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDynamicRow", into = "RawDynamicRow")]
pub struct DynamicRow {
    id: Id,
    fields: Map<String, Value>,
    /// Blob references discovered in `fields`
    blobs: Vec<Blob>,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawDynamicRow {
    #[serde(default)]
    id: Id,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl DynamicRow {
    pub fn new(id: Id, fields: Map<String, Value>) -> Self {
        let mut blobs = Vec::new();
        for value in fields.values() {
            collect_blobs(value, &mut blobs);
        }
        Self { id, fields, blobs }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a field, rescanning blob references
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
        *self = Self::new(self.id, std::mem::take(&mut self.fields));
    }
}

fn collect_blobs(value: &Value, out: &mut Vec<Blob>) {
    match value {
        Value::String(s) => {
            if let Ok(reference) = BlobRef::parse(s) {
                out.push(Blob::from_ref(reference));
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_blobs(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_blobs(v, out)),
        _ => {}
    }
}

impl From<RawDynamicRow> for DynamicRow {
    fn from(raw: RawDynamicRow) -> Self {
        Self::new(raw.id, raw.fields)
    }
}

impl From<DynamicRow> for RawDynamicRow {
    fn from(row: DynamicRow) -> Self {
        Self {
            id: row.id,
            fields: row.fields,
        }
    }
}

impl Row for DynamicRow {
    fn id(&self) -> Id {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_zero() {
            return Err(ValidationError::new("id required"));
        }
        Ok(())
    }

    fn blobs(&self) -> Vec<&Blob> {
        self.blobs.iter().collect()
    }

    fn blobs_mut(&mut self) -> Vec<&mut Blob> {
        self.blobs.iter_mut().collect()
    }
}
