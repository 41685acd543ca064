//! Index persistence in SCIP protobuf form.
//!
//! Writes go through a temp file in the target directory and are persisted
//! with a rename, so a reader never observes a half-written index.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use protobuf::Message;
use scip::types::Index;

use super::error::{StorageError, StorageResult};

/// Write `index` to `path`, replacing any previous file.
pub fn save_index(path: &Path, index: &Index) -> StorageResult<()> {
    let bytes = index
        .write_to_bytes()
        .map_err(|e| StorageError::Encode(e.to_string()))?;

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::create_dir_all(parent).map_err(io_err)?;

    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    file.write_all(&bytes).and_then(|_| file.flush()).map_err(io_err)?;
    file.persist(path).map_err(|e| StorageError::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;

    tracing::debug!(
        "[storage] wrote {} documents ({} bytes) to {}",
        index.documents.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

pub fn load_index(path: &Path) -> StorageResult<Index> {
    let bytes = fs::read(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Index::parse_from_bytes(&bytes).map_err(|e| StorageError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Manages the index file of one project
#[derive(Debug, Clone)]
pub struct IndexPersistence {
    path: PathBuf,
}

impl IndexPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(&self, index: &Index) -> StorageResult<()> {
        save_index(&self.path, index)
    }

    #[must_use = "Load errors should be handled appropriately"]
    pub fn load(&self) -> StorageResult<Index> {
        load_index(&self.path)
    }
}
