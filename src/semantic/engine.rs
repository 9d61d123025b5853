//! The document index: encoder, live state, and snapshot persistence.
//!
//! Locking: one `RwLock` guards the live `IndexState`. Text is always
//! encoded before the lock is taken. Searches share the read lock;
//! mutations and saves take the write lock, and a save holds it until all
//! three artifacts are written. Reindex builds its state without the lock
//! and only takes it for the final persist-and-swap.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{SearchConfig, Settings};
use crate::error::{IndexError, IndexResult};
use crate::semantic::metadata::{DocumentMetadata, MetadataEntry};
use crate::semantic::persistence::IndexPersistence;
use crate::semantic::reindex::SourceDocument;
use crate::semantic::state::{IndexState, IndexStats};
use crate::vector::{EmbeddingGenerator, SlotId, VectorDimension, normalize};

/// Outcome of a batch add. Failed documents do not stop the batch.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub added: Vec<AddedDocument>,
    pub failed: Vec<FailedDocument>,
}

#[derive(Debug, Serialize)]
pub struct AddedDocument {
    pub document_id: String,
    pub slot: SlotId,
}

#[derive(Debug, Serialize)]
pub struct FailedDocument {
    pub document_id: String,
    pub status_code: String,
    pub reason: String,
}

impl FailedDocument {
    fn new(document_id: &str, err: &IndexError) -> Self {
        Self {
            document_id: document_id.to_string(),
            status_code: err.status_code(),
            reason: err.to_string(),
        }
    }
}

pub struct DocumentIndex {
    pub(crate) live: RwLock<IndexState>,
    pub(crate) generator: Arc<dyn EmbeddingGenerator>,
    pub(crate) dimension: VectorDimension,
    pub(crate) persistence: Option<IndexPersistence>,
    pub(crate) search: SearchConfig,
    auto_save: bool,
    dirty: AtomicBool,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("model", &self.generator.model_name())
            .field("dimension", &self.dimension.get())
            .field("persistence", &self.persistence)
            .field("auto_save", &self.auto_save)
            .finish_non_exhaustive()
    }
}

impl DocumentIndex {
    /// An index that lives only in memory.
    pub fn in_memory(
        generator: Arc<dyn EmbeddingGenerator>,
        search: SearchConfig,
    ) -> IndexResult<Self> {
        let dimension = generator.dimension();
        Ok(Self {
            live: RwLock::new(IndexState::new(dimension)),
            generator,
            dimension,
            persistence: None,
            search,
            auto_save: false,
            dirty: AtomicBool::new(false),
        })
    }

    /// Open the index stored under `settings.index_path`.
    ///
    /// A missing snapshot gives an empty index. A corrupted snapshot, or one
    /// built by a different model or dimension, is logged and also gives an
    /// empty index; the files stay on disk until the next save.
    pub fn open(generator: Arc<dyn EmbeddingGenerator>, settings: &Settings) -> IndexResult<Self> {
        Self::open_at(generator, &settings.index_path, settings)
    }

    pub fn open_at(
        generator: Arc<dyn EmbeddingGenerator>,
        path: &Path,
        settings: &Settings,
    ) -> IndexResult<Self> {
        settings
            .validate()
            .map_err(|reason| IndexError::Config { reason })?;

        let mut index = Self::in_memory(generator, settings.search.clone())?;
        let persistence = IndexPersistence::new(path);

        match persistence.load() {
            Ok(Some(snapshot)) => {
                let loaded_dim = snapshot.state.dimension().get();
                let loaded_model = snapshot.manifest.as_ref().map(|m| m.model_name.as_str());
                let model = index.generator.model_name();

                if loaded_dim != index.dimension.get() {
                    warn!(
                        path = %path.display(),
                        snapshot_dimension = loaded_dim,
                        model_dimension = index.dimension.get(),
                        "snapshot dimension does not match the embedding model, starting with an empty index"
                    );
                } else if loaded_model.is_some_and(|m| m != model) {
                    warn!(
                        path = %path.display(),
                        snapshot_model = loaded_model.unwrap_or_default(),
                        model,
                        "snapshot was built by a different model, starting with an empty index"
                    );
                } else {
                    info!(
                        path = %path.display(),
                        documents = snapshot.state.metadata().len(),
                        vectors = snapshot.state.index().count(),
                        "loaded index snapshot"
                    );
                    index.live = RwLock::new(snapshot.state);
                }
            }
            Ok(None) => {
                debug!(path = %path.display(), "no snapshot found, starting with an empty index");
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load index snapshot, starting with an empty index; run reindex to rebuild"
                );
            }
        }

        index.persistence = Some(persistence);
        index.auto_save = settings.persistence.auto_save;
        Ok(index)
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    pub fn persistence(&self) -> Option<&IndexPersistence> {
        self.persistence.as_ref()
    }

    /// True when the live state has changes no snapshot holds yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Encode and normalize `text`. Never called with the lock held.
    pub(crate) fn encode(&self, text: &str) -> IndexResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(IndexError::Encoding {
                reason: "text is empty".to_string(),
            });
        }
        let raw = self.generator.encode(text)?;
        Ok(normalize(raw)?)
    }

    /// Add a new document and return its slot.
    pub fn add_document(
        &self,
        document_id: &str,
        content: &str,
        metadata: DocumentMetadata,
    ) -> IndexResult<SlotId> {
        validate_document_id(document_id)?;
        metadata.validate()?;
        let vector = self.encode(content)?;

        let mut live = self.live.write();
        let slot = live
            .insert(document_id, &vector, metadata)
            .inspect_err(|err| log_dimension_mismatch(document_id, err))?;
        self.after_mutation(&mut live);

        debug!(document_id, slot = slot.get(), "document added");
        Ok(slot)
    }

    /// Add many documents under one lock and one save.
    ///
    /// Each document succeeds or fails on its own; failures are reported,
    /// not returned as an error.
    pub fn add_documents(&self, documents: &[SourceDocument]) -> BatchReport {
        let mut report = BatchReport::default();

        let mut prepared = Vec::with_capacity(documents.len());
        for doc in documents {
            let checked = validate_document_id(&doc.id)
                .and_then(|()| doc.metadata.validate())
                .and_then(|()| self.encode(&doc.content));
            match checked {
                Ok(vector) => prepared.push((doc, vector)),
                Err(err) => report.failed.push(FailedDocument::new(&doc.id, &err)),
            }
        }

        if !prepared.is_empty() {
            let mut live = self.live.write();
            for (doc, vector) in prepared {
                match live.insert(&doc.id, &vector, doc.metadata.clone()) {
                    Ok(slot) => report.added.push(AddedDocument {
                        document_id: doc.id.clone(),
                        slot,
                    }),
                    Err(err) => {
                        log_dimension_mismatch(&doc.id, &err);
                        report.failed.push(FailedDocument::new(&doc.id, &err));
                    }
                }
            }
            if !report.added.is_empty() {
                self.after_mutation(&mut live);
            }
        }

        info!(
            added = report.added.len(),
            failed = report.failed.len(),
            "batch add finished"
        );
        report
    }

    /// Replace a document's vector and metadata.
    ///
    /// The old slot becomes a tombstone and the document moves to a new
    /// slot. An unknown id is simply added.
    pub fn update_document(
        &self,
        document_id: &str,
        content: &str,
        metadata: DocumentMetadata,
    ) -> IndexResult<SlotId> {
        validate_document_id(document_id)?;
        metadata.validate()?;
        let vector = self.encode(content)?;

        let mut live = self.live.write();
        let (previous, slot) = live
            .replace(document_id, &vector, metadata)
            .inspect_err(|err| log_dimension_mismatch(document_id, err))?;
        self.after_mutation(&mut live);

        match previous {
            Some(old) => debug!(document_id, old = old.get(), new = slot.get(), "document updated"),
            None => debug!(document_id, slot = slot.get(), "document not indexed yet, added"),
        }
        Ok(slot)
    }

    /// Tombstone a document. Its vector stays until the next reindex.
    pub fn remove_document(&self, document_id: &str) -> IndexResult<()> {
        let mut live = self.live.write();
        let slot = live.tombstone(document_id)?;
        self.after_mutation(&mut live);

        debug!(document_id, slot = slot.get(), "document removed");
        Ok(())
    }

    /// Metadata of an active document.
    pub fn document(&self, document_id: &str) -> IndexResult<MetadataEntry> {
        let live = self.live.read();
        live.metadata()
            .find_slot_by_document_id(document_id)
            .and_then(|slot| live.metadata().get(slot))
            .cloned()
            .ok_or_else(|| IndexError::DocumentNotFound {
                document_id: document_id.to_string(),
            })
    }

    /// Copy of the vector stored at `slot`, tombstoned or not.
    pub fn reconstruct(&self, slot: SlotId) -> IndexResult<Vec<f32>> {
        Ok(self.live.read().index().reconstruct(slot)?)
    }

    /// Current slot of an active document.
    pub fn slot_of(&self, document_id: &str) -> IndexResult<SlotId> {
        self.live
            .read()
            .metadata()
            .find_slot_by_document_id(document_id)
            .ok_or_else(|| IndexError::DocumentNotFound {
                document_id: document_id.to_string(),
            })
    }

    /// Active document ids in slot order.
    pub fn document_ids(&self) -> Vec<String> {
        self.live
            .read()
            .metadata()
            .iter()
            .map(|(_, entry)| entry.document_id.clone())
            .collect()
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.live
            .read()
            .metadata()
            .find_slot_by_document_id(document_id)
            .is_some()
    }

    pub fn stats(&self) -> IndexStats {
        self.live.read().stats(self.model_name())
    }

    /// Write a snapshot of the live state.
    pub fn save(&self) -> IndexResult<()> {
        let persistence = self.persistence.as_ref().ok_or_else(|| IndexError::Config {
            reason: "index has no snapshot directory".to_string(),
        })?;

        let mut live = self.live.write();
        match persistence.save(&mut live, self.model_name()) {
            Ok(()) => {
                self.dirty.store(false, Ordering::Release);
                Ok(())
            }
            Err(err) => {
                self.dirty.store(true, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Save only if there are unsaved changes. Returns whether it saved.
    pub fn flush(&self) -> IndexResult<bool> {
        if self.persistence.is_none() || !self.is_dirty() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Auto-save after a committed mutation, with the write lock held.
    ///
    /// A failed save does not undo the mutation; the index stays dirty and
    /// the next save or teardown retries.
    fn after_mutation(&self, live: &mut IndexState) {
        match (&self.persistence, self.auto_save) {
            (Some(persistence), true) => match persistence.save(live, self.model_name()) {
                Ok(()) => self.dirty.store(false, Ordering::Release),
                Err(err) => {
                    error!(error = %err, "auto-save failed, changes are kept in memory");
                    self.dirty.store(true, Ordering::Release);
                }
            },
            (Some(_), false) => self.dirty.store(true, Ordering::Release),
            (None, _) => {}
        }
    }

    /// Record the outcome of persisting a swapped-in state.
    pub(crate) fn mark_saved(&self, saved: bool) {
        if self.persistence.is_some() {
            self.dirty.store(!saved, Ordering::Release);
        }
    }
}

/// Log a dimension mismatch with both sizes.
fn log_dimension_mismatch(document_id: &str, err: &IndexError) {
    if let IndexError::Dimension { expected, actual } = err {
        error!(
            document_id,
            expected = *expected,
            actual = *actual,
            "embedding dimension does not match the index, check the configured model"
        );
    }
}

pub(crate) fn validate_document_id(document_id: &str) -> IndexResult<()> {
    if document_id.trim().is_empty() {
        return Err(IndexError::Validation {
            field: "document_id",
            reason: "cannot be empty".to_string(),
        });
    }
    Ok(())
}
