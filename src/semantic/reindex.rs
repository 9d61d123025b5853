//! Full rebuild of the index from an authoritative document list.
//!
//! Reindex is the only way tombstoned slots are reclaimed. The new state is
//! built off to the side while searches keep using the old one; the write
//! lock is held only to persist and swap. Any failure, including
//! cancellation, leaves the live state untouched.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};
use crate::semantic::engine::{DocumentIndex, validate_document_id};
use crate::semantic::metadata::DocumentMetadata;
use crate::semantic::state::IndexState;
use crate::vector::normalize;

/// Documents encoded per model call during a rebuild.
const REINDEX_BATCH_SIZE: usize = 64;

/// One document of a batch add or a reindex.
///
/// Metadata fields sit next to `id` and `content` in JSON:
/// `{"id": "...", "content": "...", "title": "...", "type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub content: String,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReindexReport {
    /// Documents in the rebuilt index
    pub documents: usize,
    /// Slots in the index before the rebuild
    pub previous_count: usize,
    /// Tombstoned slots dropped by the rebuild
    pub reclaimed: usize,
    /// Whether the rebuilt index was written to disk
    pub persisted: bool,
}

impl DocumentIndex {
    /// Replace the whole index with `documents`.
    pub fn reindex_all(&self, documents: &[SourceDocument]) -> IndexResult<ReindexReport> {
        self.reindex_all_with_cancel(documents, &CancellationToken::new())
    }

    /// Replace the whole index with `documents`, checking `cancel` between
    /// batches and once more before the swap.
    ///
    /// All-or-nothing: an invalid document, an encoder failure, a duplicate
    /// id, a failed save, or cancellation returns an error and the live
    /// index is unchanged.
    pub fn reindex_all_with_cancel(
        &self,
        documents: &[SourceDocument],
        cancel: &CancellationToken,
    ) -> IndexResult<ReindexReport> {
        let mut fresh = IndexState::new(self.dimension);

        for (batch_no, batch) in documents.chunks(REINDEX_BATCH_SIZE).enumerate() {
            check_cancelled(cancel)?;

            for doc in batch {
                validate_document_id(&doc.id)?;
                doc.metadata.validate()?;
            }

            let texts: Vec<&str> = batch.iter().map(|d| d.content.as_str()).collect();
            let embeddings = self.generator.generate_embeddings(&texts)?;
            if embeddings.len() != batch.len() {
                return Err(IndexError::Encoding {
                    reason: format!(
                        "model returned {} embeddings for {} texts",
                        embeddings.len(),
                        batch.len()
                    ),
                });
            }

            for (doc, embedding) in batch.iter().zip(embeddings) {
                let vector = normalize(embedding)?;
                fresh.insert(&doc.id, &vector, doc.metadata.clone())?;
            }

            debug!(
                batch = batch_no,
                indexed = fresh.metadata().len(),
                total = documents.len(),
                "reindex progress"
            );
        }

        let mut live = self.live.write();
        check_cancelled(cancel)?;

        fresh.generation = live.generation;
        let persisted = match &self.persistence {
            Some(persistence) => {
                if let Err(err) = persistence.save(&mut fresh, self.model_name()) {
                    self.mark_saved(false);
                    return Err(err);
                }
                true
            }
            None => false,
        };

        let report = ReindexReport {
            documents: fresh.metadata().len(),
            previous_count: live.index().count(),
            reclaimed: live.tombstone_count(),
            persisted,
        };
        *live = fresh;
        self.mark_saved(persisted);

        info!(
            documents = report.documents,
            reclaimed = report.reclaimed,
            "reindex complete"
        );
        Ok(report)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> IndexResult<()> {
    if cancel.is_cancelled() {
        return Err(IndexError::Cancelled {
            operation: "reindex".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::vector::HashingEmbeddingGenerator;
    use std::sync::Arc;

    fn test_index() -> DocumentIndex {
        DocumentIndex::in_memory(
            Arc::new(HashingEmbeddingGenerator::default()),
            SearchConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_reindex_reclaims_tombstones() {
        let index = test_index();
        for (id, text) in [("a", "one"), ("b", "two"), ("c", "three")] {
            index
                .add_document(id, text, DocumentMetadata::default())
                .unwrap();
        }
        index.remove_document("b").unwrap();

        let report = index
            .reindex_all(&[SourceDocument::new("a", "one"), SourceDocument::new("c", "three")])
            .unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.previous_count, 3);
        assert_eq!(report.reclaimed, 1);
        assert!(!report.persisted);

        let stats = index.stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.tombstone_count, 0);
    }

    #[test]
    fn test_duplicate_id_aborts_reindex() {
        let index = test_index();
        index
            .add_document("keep", "original", DocumentMetadata::default())
            .unwrap();

        let err = index
            .reindex_all(&[SourceDocument::new("x", "one"), SourceDocument::new("x", "two")])
            .unwrap_err();
        assert!(matches!(err, IndexError::DuplicateDocument { .. }));
        assert!(index.contains("keep"));
        assert_eq!(index.stats().count, 1);
    }

    #[test]
    fn test_empty_content_aborts_reindex() {
        let index = test_index();
        index
            .add_document("keep", "original", DocumentMetadata::default())
            .unwrap();

        assert!(index
            .reindex_all(&[SourceDocument::new("x", "fine"), SourceDocument::new("y", " ")])
            .is_err());
        assert!(index.contains("keep"));
        assert!(!index.contains("x"));
    }

    #[test]
    fn test_cancelled_reindex_leaves_live_state() {
        let index = test_index();
        index
            .add_document("keep", "original", DocumentMetadata::default())
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = index
            .reindex_all_with_cancel(&[SourceDocument::new("x", "new")], &cancel)
            .unwrap_err();
        assert!(matches!(err, IndexError::Cancelled { .. }));
        assert!(index.contains("keep"));
    }

    #[test]
    fn test_reindex_with_empty_list_clears_index() {
        let index = test_index();
        index
            .add_document("a", "text", DocumentMetadata::default())
            .unwrap();

        let report = index.reindex_all(&[]).unwrap();
        assert_eq!(report.documents, 0);
        assert_eq!(index.stats().count, 0);
    }

    #[test]
    fn test_source_document_json() {
        let json = r#"{"id": "d1", "content": "text", "title": "T", "type": "statute", "date": ""}"#;
        let doc: SourceDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.id, "d1");
        assert_eq!(doc.metadata.title, "T");
        assert_eq!(doc.metadata.doc_type, "statute");
        assert!(doc.metadata.date.is_none());
    }
}
