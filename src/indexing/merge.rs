//! Folding per-file results into one index.
//!
//! Metadata is single-assignment from the caller's point of view but the
//! accumulator applies last-write-wins, so a later metadata partial replaces an
//! earlier one. Documents are appended in arrival order; nothing is sorted or
//! deduplicated here. Ordering is the pipeline's job.

use scip::types::{Document, Index, Metadata};

use super::error::{IndexError, IndexResult};

/// What one unit of work contributes to the index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialIndex {
    pub metadata: Option<Metadata>,
    pub documents: Vec<Document>,
}

impl PartialIndex {
    pub fn metadata(metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            documents: Vec::new(),
        }
    }

    pub fn document(document: Document) -> Self {
        Self {
            metadata: None,
            documents: vec![document],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_none() && self.documents.is_empty()
    }
}

/// Owns the index under construction. Exactly one writer.
#[derive(Debug, Default)]
pub struct IndexAccumulator {
    metadata: Option<Metadata>,
    documents: Vec<Document>,
}

impl IndexAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, partial: PartialIndex) {
        if let Some(metadata) = partial.metadata {
            self.metadata = Some(metadata);
        }
        self.documents.extend(partial.documents);
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Finish the index. Fails if no metadata was ever merged.
    pub fn finish(self) -> IndexResult<Index> {
        let metadata = self.metadata.ok_or(IndexError::MissingMetadata)?;
        Ok(Index {
            metadata: Some(metadata).into(),
            documents: self.documents,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(root: &str) -> Metadata {
        Metadata {
            project_root: root.to_string(),
            ..Default::default()
        }
    }

    fn document(path: &str) -> Document {
        Document {
            relative_path: path.to_string(),
            ..Default::default()
        }
    }

    fn paths(accumulator: &IndexAccumulator) -> Vec<&str> {
        accumulator
            .documents()
            .iter()
            .map(|d| d.relative_path.as_str())
            .collect()
    }

    #[test]
    fn test_documents_append_in_order() {
        let mut accumulator = IndexAccumulator::new();
        accumulator.merge(PartialIndex::document(document("a.py")));
        accumulator.merge(PartialIndex {
            metadata: None,
            documents: vec![document("b.py"), document("c.py")],
        });
        accumulator.merge(PartialIndex::document(document("a.py")));

        assert_eq!(paths(&accumulator), vec!["a.py", "b.py", "c.py", "a.py"]);
    }

    #[test]
    fn test_metadata_last_write_wins() {
        let mut accumulator = IndexAccumulator::new();
        accumulator.merge(PartialIndex::metadata(metadata("file:///first")));
        accumulator.merge(PartialIndex::document(document("a.py")));
        assert_eq!(accumulator.metadata().unwrap().project_root, "file:///first");

        accumulator.merge(PartialIndex::metadata(metadata("file:///second")));
        assert_eq!(accumulator.metadata().unwrap().project_root, "file:///second");
    }

    #[test]
    fn test_absent_metadata_does_not_clear() {
        let mut accumulator = IndexAccumulator::new();
        accumulator.merge(PartialIndex::metadata(metadata("file:///root")));
        accumulator.merge(PartialIndex::default());
        assert!(accumulator.metadata().is_some());
    }

    #[test]
    fn test_empty_partial_is_identity() {
        let mut accumulator = IndexAccumulator::new();
        accumulator.merge(PartialIndex::metadata(metadata("file:///root")));
        accumulator.merge(PartialIndex::document(document("a.py")));
        let before = (accumulator.metadata().cloned(), accumulator.documents().to_vec());

        accumulator.merge(PartialIndex::default());
        assert_eq!(accumulator.metadata().cloned(), before.0);
        assert_eq!(accumulator.documents(), before.1.as_slice());
    }

    #[test]
    fn test_finish_requires_metadata() {
        let mut accumulator = IndexAccumulator::new();
        accumulator.merge(PartialIndex::document(document("a.py")));
        assert!(matches!(
            accumulator.finish(),
            Err(IndexError::MissingMetadata)
        ));
    }

    #[test]
    fn test_finish_builds_index() {
        let mut accumulator = IndexAccumulator::new();
        accumulator.merge(PartialIndex::metadata(metadata("file:///root")));
        accumulator.merge(PartialIndex::document(document("a.py")));

        let index = accumulator.finish().unwrap();
        assert_eq!(index.metadata.project_root, "file:///root");
        assert_eq!(index.documents.len(), 1);
    }
}
