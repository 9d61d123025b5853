//! Vector storage and exact similarity search.
//!
//! This module holds the lowest layer of the retrieval stack:
//! - `embedding`: text to vector encoders (fastembed and offline hashing)
//! - `index`: the append-only flat index and its brute-force search
//! - `storage`: the binary on-disk format for an index
//!
//! Nothing here knows about documents. Document identity and tombstones
//! live in `crate::semantic`.

mod embedding;
mod index;
mod storage;
mod types;

pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, HASHING_MODEL_PREFIX, HashingEmbeddingGenerator,
    create_generator, model_to_string, models_dir, parse_embedding_model,
};
pub use index::VectorIndex;
pub use storage::{
    MmapVectorStorage, VECTOR_FILE_NAME, VectorFileHeader, VectorStorageError, atomic_write,
};
pub use types::{
    MAX_VECTOR_DIMENSION, Score, SlotId, VECTOR_DIMENSION_384, VectorDimension, VectorError,
    inner_product, normalize,
};
