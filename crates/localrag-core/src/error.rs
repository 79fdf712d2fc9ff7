use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Failed to load document {}: {reason}", .path.display())]
    DocumentLoad { path: PathBuf, reason: String },

    #[error("No index found at {}; run `localrag index` to build it before querying", .path.display())]
    IndexMissing { path: PathBuf },

    #[error("Dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Metadata store does not match the vector index: {0}")]
    MetadataInconsistent(String),

    #[error("Corrupt index file {}: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
