#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lexvec::vector::{EmbeddingGenerator, VectorDimension, VectorError};
use lexvec::{DocumentIndex, HashingEmbeddingGenerator, Settings, SourceDocument};
use tempfile::TempDir;

/// Settings for an index under `dir` using the offline hashing encoder.
///
/// Threshold 0.0 so documents sharing no words with the query still come
/// back, ranked by slot.
pub fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.index_path = dir.join("index");
    settings.embedding.model = "hashing".to_string();
    settings.search.threshold = 0.0;
    settings
}

pub fn hashing() -> Arc<dyn EmbeddingGenerator> {
    Arc::new(HashingEmbeddingGenerator::default())
}

/// A persistent index in a fresh temp directory.
pub fn create_test_index() -> (DocumentIndex, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let index = DocumentIndex::open(hashing(), &test_settings(temp_dir.path()))
        .expect("Failed to open index");
    (index, temp_dir)
}

pub fn reopen(temp_dir: &TempDir) -> DocumentIndex {
    DocumentIndex::open(hashing(), &test_settings(temp_dir.path())).expect("Failed to reopen index")
}

/// Hashing encoder that fails on any text containing `poison`, and counts
/// how many texts it was asked to encode.
pub struct FlakyEncoder {
    inner: HashingEmbeddingGenerator,
    poison: &'static str,
    pub calls: AtomicUsize,
}

impl FlakyEncoder {
    pub fn new(poison: &'static str) -> Self {
        Self {
            inner: HashingEmbeddingGenerator::default(),
            poison,
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingGenerator for FlakyEncoder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        if texts.iter().any(|t| t.contains(self.poison)) {
            return Err(VectorError::EmbeddingFailed("model unavailable".to_string()));
        }
        self.inner.generate_embeddings(texts)
    }

    fn dimension(&self) -> VectorDimension {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        // Same name as the wrapped encoder so snapshots stay compatible
        self.inner.model_name()
    }
}

pub mod sample_documents {
    use super::*;
    use lexvec::DocumentMetadata;

    pub fn doc(id: &str, content: &str, title: &str) -> SourceDocument {
        SourceDocument::new(id, content).with_metadata(DocumentMetadata::titled(title))
    }

    /// The three documents of the remove-then-search scenario.
    pub fn recipes_and_contracts() -> Vec<SourceDocument> {
        vec![
            doc("a", "apple pie recipe", "Apple Pie"),
            doc("b", "contract law basics", "Contracts 101"),
            doc("c", "banana bread recipe", "Banana Bread"),
        ]
    }

    pub fn legal_corpus() -> Vec<SourceDocument> {
        vec![
            doc(
                "case-001",
                "The court held that the breach of contract entitled the plaintiff to expectation damages",
                "Hadley v. Baxendale",
            ),
            doc(
                "case-002",
                "Negligence requires a duty of care, breach of that duty, causation, and damages",
                "Palsgraf v. Long Island Railroad",
            ),
            doc(
                "statute-001",
                "A contract for the sale of goods for the price of five hundred dollars or more is not enforceable unless in writing",
                "UCC 2-201 Statute of Frauds",
            ),
            doc(
                "case-003",
                "Adverse possession requires open, notorious, continuous, and hostile possession for the statutory period",
                "Van Valkenburgh v. Lutz",
            ),
            doc(
                "case-004",
                "The Miranda warning must be given before custodial interrogation",
                "Miranda v. Arizona",
            ),
        ]
    }
}
