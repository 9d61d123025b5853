//! Document-level semantic index
//!
//! Builds document identity, tombstones, and snapshots on top of the flat
//! vector index in `crate::vector`.

mod engine;
mod manifest;
mod metadata;
mod persistence;
mod reindex;
mod search;
mod state;

pub use engine::{AddedDocument, BatchReport, DocumentIndex, FailedDocument};
pub use manifest::{MANIFEST_FILE_NAME, SnapshotManifest};
pub use metadata::{DocumentMetadata, MAX_TITLE_LENGTH, MetadataEntry, MetadataStore};
pub use persistence::{IndexPersistence, LoadedSnapshot, METADATA_FILE_NAME};
pub use reindex::{ReindexReport, SourceDocument};
pub use search::SearchResult;
pub use state::{IndexState, IndexStats};

/// Similarity threshold recommendations for normalized embeddings
pub mod thresholds {
    /// Near-duplicates and restatements of the same holding
    pub const VERY_SIMILAR: f32 = 0.75;

    /// Same legal issue, different wording
    pub const SIMILAR: f32 = 0.60;

    /// Default threshold for `similarity_search`
    pub const DEFAULT: f32 = 0.5;

    /// Loosely related documents
    pub const RELATED: f32 = 0.40;
}
