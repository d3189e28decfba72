use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("No JSON array found in archive")]
    NoJson,

    #[error("Archive JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive JSON is not an array of posts")]
    NotArray,

    #[error("No valid posts found in archive ({entries} entries checked)")]
    Empty { entries: usize },
}
