//! The live (index, metadata) pair.
//!
//! `IndexState` owns both halves and is the only place that mutates them,
//! so every mutation keeps them consistent: a metadata entry always points
//! at an existing slot, and a document id is active in at most one slot.

use serde::Serialize;

use crate::error::{IndexError, IndexResult};
use crate::semantic::metadata::{DocumentMetadata, MetadataEntry, MetadataStore};
use crate::vector::{SlotId, VectorDimension, VectorIndex};

/// Counters reported by `stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    /// Vectors stored, tombstones included
    pub count: usize,
    /// Documents currently retrievable
    pub active_count: usize,
    /// Slots whose document was removed or replaced
    pub tombstone_count: usize,
    pub dimension: usize,
    pub model_name: String,
}

#[derive(Debug, Clone)]
pub struct IndexState {
    pub(crate) index: VectorIndex,
    pub(crate) metadata: MetadataStore,
    /// Generation of the snapshot this state was last saved as or loaded from
    pub(crate) generation: u64,
}

impl IndexState {
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            index: VectorIndex::new(dimension),
            metadata: MetadataStore::new(),
            generation: 0,
        }
    }

    /// Pair a loaded index with its metadata, checking the slot bound.
    pub(crate) fn from_parts(
        index: VectorIndex,
        metadata: MetadataStore,
        generation: u64,
    ) -> Result<Self, String> {
        if let Some(max) = metadata.max_slot() {
            if max.index() >= index.count() {
                return Err(format!(
                    "metadata references slot {max} but the index holds {} vectors",
                    index.count()
                ));
            }
        }
        Ok(Self {
            index,
            metadata,
            generation,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn dimension(&self) -> VectorDimension {
        self.index.dimension()
    }

    pub fn tombstone_count(&self) -> usize {
        self.index.count() - self.metadata.len()
    }

    /// Append a new document. `vector` must already be normalized.
    ///
    /// The duplicate check runs before the vector is appended so a rejected
    /// insert leaves no orphan slot behind.
    pub fn insert(
        &mut self,
        document_id: &str,
        vector: &[f32],
        metadata: DocumentMetadata,
    ) -> IndexResult<SlotId> {
        if let Some(existing) = self.metadata.find_slot_by_document_id(document_id) {
            return Err(IndexError::DuplicateDocument {
                document_id: document_id.to_string(),
                slot: existing.get(),
            });
        }

        let slot = self.index.add(vector)?;
        self.metadata.put(
            slot,
            MetadataEntry {
                document_id: document_id.to_string(),
                metadata,
            },
        )?;
        Ok(slot)
    }

    /// Tombstone the slot holding `document_id`.
    pub fn tombstone(&mut self, document_id: &str) -> IndexResult<SlotId> {
        let slot = self.metadata.find_slot_by_document_id(document_id).ok_or_else(|| {
            IndexError::DocumentNotFound {
                document_id: document_id.to_string(),
            }
        })?;
        self.metadata.remove(slot);
        Ok(slot)
    }

    /// Tombstone the current slot of `document_id` (if any) and append the
    /// new vector. Returns the previous slot and the new one.
    ///
    /// The vector is validated first so a bad vector leaves the old version
    /// in place.
    pub fn replace(
        &mut self,
        document_id: &str,
        vector: &[f32],
        metadata: DocumentMetadata,
    ) -> IndexResult<(Option<SlotId>, SlotId)> {
        self.index.dimension().validate_vector(vector)?;
        if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
            return Err(IndexError::Encoding {
                reason: format!("embedding has a non-finite value at position {position}"),
            });
        }

        let previous = self.metadata.find_slot_by_document_id(document_id);
        if let Some(slot) = previous {
            self.metadata.remove(slot);
        }
        let slot = self.insert(document_id, vector, metadata)?;
        Ok((previous, slot))
    }

    pub fn stats(&self, model_name: &str) -> IndexStats {
        IndexStats {
            count: self.index.count(),
            active_count: self.metadata.len(),
            tombstone_count: self.tombstone_count(),
            dimension: self.index.dimension().get(),
            model_name: model_name.to_string(),
        }
    }
}
