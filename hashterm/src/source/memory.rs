//! In-memory segment of JSON documents

use super::{DocId, FieldKind, SegmentSource};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: HashMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

/// Append-only list of documents; the position in the list is the doc id.
#[derive(Debug, Clone)]
pub struct MemorySegment {
    id: String,
    docs: Vec<Document>,
}

impl MemorySegment {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            docs: Vec::new(),
        }
    }

    pub fn from_docs(id: impl Into<String>, docs: Vec<Document>) -> Self {
        Self {
            id: id.into(),
            docs,
        }
    }

    pub fn push(&mut self, doc: Document) -> DocId {
        self.docs.push(doc);
        (self.docs.len() - 1) as DocId
    }

    pub fn document(&self, doc: DocId) -> Option<&Document> {
        self.docs.get(doc as usize)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn kind_of(value: &Value) -> Option<FieldKind> {
    match value {
        Value::Null => None,
        Value::String(_) => Some(FieldKind::Str),
        Value::Array(items) => items.iter().find_map(kind_of),
        Value::Number(_) => Some(FieldKind::Other("number".to_string())),
        Value::Bool(_) => Some(FieldKind::Other("bool".to_string())),
        Value::Object(_) => Some(FieldKind::Other("object".to_string())),
    }
}

fn unsupported(field: &str, value: &Value) -> Error {
    Error::UnsupportedFieldType {
        field: field.to_string(),
        found: kind_of(value)
            .map(|k| k.name().to_string())
            .unwrap_or_else(|| "null".to_string()),
    }
}

impl SegmentSource for MemorySegment {
    fn segment_id(&self) -> &str {
        &self.id
    }

    fn max_doc(&self) -> DocId {
        self.docs.len() as DocId
    }

    fn field_kind(&self, field: &str) -> Result<Option<FieldKind>> {
        Ok(self
            .docs
            .iter()
            .filter_map(|doc| doc.fields.get(field))
            .find_map(kind_of))
    }

    fn field_values(&self, doc: DocId, field: &str) -> Result<Vec<String>> {
        let value = match self.document(doc).and_then(|d| d.fields.get(field)) {
            Some(value) => value,
            None => return Ok(Vec::new()),
        };

        match value {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => Ok(vec![s.clone()]),
            Value::Array(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(unsupported(field, other)),
                })
                .collect(),
            other => Err(unsupported(field, other)),
        }
    }
}
