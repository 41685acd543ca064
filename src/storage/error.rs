use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode index: {0}")]
    Encode(String),

    #[error("Failed to decode index {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Failed to replace {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

pub type StorageResult<T> = Result<T, StorageError>;
