//! Error types for per-file indexing and index assembly.

use std::path::PathBuf;
use thiserror::Error;

use super::analysis::EntityId;
use crate::package::PackageError;
use crate::symbol::SymbolError;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to read analysis {path}: {source}")]
    AnalysisRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse analysis {path}: {reason}")]
    AnalysisParse { path: PathBuf, reason: String },

    #[error("Failed to name entity in {path}: {source}")]
    Symbol {
        path: String,
        #[source]
        source: SymbolError,
    },

    #[error("Failed to attribute {path}: {source}")]
    Package {
        path: String,
        #[source]
        source: PackageError,
    },

    #[error("Unknown entity {entity} referenced in {path}")]
    UnknownEntity { path: String, entity: EntityId },

    #[error("Entity {entity} declared twice in {path}")]
    DuplicateEntity { path: String, entity: EntityId },

    #[error("Invalid range {range:?} for entity {entity} in {path}")]
    InvalidRange {
        path: String,
        entity: EntityId,
        range: Vec<i32>,
    },

    #[error("Index has no metadata record")]
    MissingMetadata,

    #[error("Indexing aborted at {path}: {source}")]
    Aborted {
        path: String,
        #[source]
        source: Box<IndexError>,
    },

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type IndexResult<T> = Result<T, IndexError>;
