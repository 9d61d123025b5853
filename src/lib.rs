//! Semantic document index for legal retrieval.
//!
//! Documents are embedded into a flat, append-only vector index and
//! searched by exact inner product over L2-normalized vectors. Removal
//! tombstones a slot; a full reindex reclaims the space. Snapshots are
//! written atomically and validated on load.

pub mod config;
pub mod display;
pub mod error;
pub mod io;
pub mod logging;
pub mod semantic;
pub mod service;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use error::{IndexError, IndexResult};
pub use semantic::{
    BatchReport, DocumentIndex, DocumentMetadata, IndexPersistence, IndexStats, MetadataEntry,
    ReindexReport, SearchResult, SourceDocument,
};
pub use service::VectorService;
pub use vector::{EmbeddingGenerator, HashingEmbeddingGenerator, SlotId, VectorDimension};
