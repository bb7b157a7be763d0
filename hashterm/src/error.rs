use thiserror::Error;

use crate::source::DocId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Field '{field}' cannot be stored as hashed terms (found {found})")]
    UnsupportedFieldType { field: String, found: String },

    #[error("Document {doc} has no value")]
    ValueAbsent { doc: DocId },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid facet request: {0}")]
    InvalidRequest(String),

    #[error("Unknown output script: {0}")]
    UnknownScript(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "tantivy-adapter")]
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),
}

impl Error {
    /// Storage failures are worth retrying at the shard level; everything
    /// else fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(_) | Error::Io(_) => true,
            #[cfg(feature = "tantivy-adapter")]
            Error::Tantivy(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
