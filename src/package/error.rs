//! Error types for package attribution and registry loading.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Packages {first} and {second} both claim {path} with equal precedence")]
    AttributionConflict {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Package registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    #[error("Failed to read package cache {path}: {source}")]
    CacheRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse package cache {path}: {reason}")]
    CacheParse { path: PathBuf, reason: String },

    #[error("Failed to write package cache {path}: {reason}")]
    CacheWrite { path: PathBuf, reason: String },

    #[error("Command '{command}' failed: {reason}")]
    Command { command: String, reason: String },
}

pub type PackageResult<T> = Result<T, PackageError>;
