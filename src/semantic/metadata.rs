//! Document metadata and the slot-keyed metadata store.
//!
//! The store is the "live entry" view over the vector arena: a slot with an
//! entry is active, a slot without one is a tombstone. Removing a document
//! deletes its entry and leaves the vector in place.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{IndexError, IndexResult};
use crate::vector::SlotId;

/// Longest accepted document title, in characters.
pub const MAX_TITLE_LENGTH: usize = 1024;

/// Typed attributes stored alongside each document vector.
///
/// The fixed fields cover what the retrieval layer filters and displays;
/// `tags` is an open map for attributes the index does not interpret.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub title: String,

    #[serde(default, rename = "type")]
    pub doc_type: String,

    #[serde(default)]
    pub jurisdiction: String,

    /// Decision or publication date. Empty strings deserialize to `None`.
    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<NaiveDate>,

    #[serde(default)]
    pub citations: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, serde_json::Value>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl DocumentMetadata {
    /// Metadata with only a title set.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Validate at the storage boundary.
    pub fn validate(&self) -> IndexResult<()> {
        if self.title.chars().count() > MAX_TITLE_LENGTH {
            return Err(IndexError::Validation {
                field: "title",
                reason: format!("longer than {MAX_TITLE_LENGTH} characters"),
            });
        }
        if self.citations.iter().any(|c| c.trim().is_empty()) {
            return Err(IndexError::Validation {
                field: "citations",
                reason: "citation entries cannot be empty".to_string(),
            });
        }
        if self.tags.keys().any(|k| k.trim().is_empty()) {
            return Err(IndexError::Validation {
                field: "tags",
                reason: "tag names cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// What the store keeps for one active slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub document_id: String,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

/// Slot → document map with a reverse index on document id.
///
/// Invariant: `by_document` and `entries` describe the same set of active
/// slots, and each document id appears at most once.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    entries: BTreeMap<SlotId, MetadataEntry>,
    by_document: HashMap<String, SlotId>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted entries, rejecting duplicate ids.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (SlotId, MetadataEntry)>,
    ) -> IndexResult<Self> {
        let mut store = Self::new();
        for (slot, entry) in entries {
            store.put(slot, entry)?;
        }
        Ok(store)
    }

    /// Attach an entry to `slot`.
    ///
    /// Fails with `DuplicateDocument` if the document id is already active;
    /// updates must tombstone the old slot first.
    pub fn put(&mut self, slot: SlotId, entry: MetadataEntry) -> IndexResult<()> {
        if let Some(existing) = self.by_document.get(&entry.document_id) {
            return Err(IndexError::DuplicateDocument {
                document_id: entry.document_id,
                slot: existing.get(),
            });
        }
        if self.entries.contains_key(&slot) {
            return Err(IndexError::General(format!(
                "slot {slot} already holds an active document"
            )));
        }
        self.by_document.insert(entry.document_id.clone(), slot);
        self.entries.insert(slot, entry);
        Ok(())
    }

    pub fn get(&self, slot: SlotId) -> Option<&MetadataEntry> {
        self.entries.get(&slot)
    }

    /// Tombstone `slot`, returning the entry that was removed.
    pub fn remove(&mut self, slot: SlotId) -> Option<MetadataEntry> {
        let entry = self.entries.remove(&slot)?;
        self.by_document.remove(&entry.document_id);
        Some(entry)
    }

    pub fn find_slot_by_document_id(&self, document_id: &str) -> Option<SlotId> {
        self.by_document.get(document_id).copied()
    }

    /// Number of active entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest active slot, if any.
    pub fn max_slot(&self) -> Option<SlotId> {
        self.entries.keys().next_back().copied()
    }

    /// Active entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &MetadataEntry)> {
        self.entries.iter().map(|(slot, entry)| (*slot, entry))
    }

    /// Entries keyed by slot, in the shape written to `metadata.json`.
    pub fn as_map(&self) -> &BTreeMap<SlotId, MetadataEntry> {
        &self.entries
    }
}
