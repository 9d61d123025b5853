//! Async facade over [`DocumentIndex`].
//!
//! Encoding and brute-force search are CPU-bound, and saves do blocking
//! file IO, so every call runs on tokio's blocking pool. The service is
//! cheap to clone; clones share one index.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::semantic::{
    BatchReport, DocumentIndex, DocumentMetadata, IndexStats, MetadataEntry, ReindexReport,
    SearchResult, SourceDocument,
};
use crate::vector::{EmbeddingGenerator, SlotId, create_generator};

#[derive(Debug, Clone)]
pub struct VectorService {
    index: Arc<DocumentIndex>,
    settings: Arc<Settings>,
}

impl VectorService {
    /// Load the configured encoder and open the snapshot.
    ///
    /// Model loading can download weights on first use, so it runs on the
    /// blocking pool as well.
    pub async fn init(settings: Settings) -> IndexResult<Self> {
        settings
            .validate()
            .map_err(|reason| IndexError::Config { reason })?;

        let embedding = settings.embedding.clone();
        let generator = run_blocking(move || Ok(create_generator(&embedding)?)).await?;
        Self::with_generator(settings, generator).await
    }

    /// Open the snapshot with an encoder supplied by the caller.
    pub async fn with_generator(
        settings: Settings,
        generator: Arc<dyn EmbeddingGenerator>,
    ) -> IndexResult<Self> {
        let settings = Arc::new(settings);
        let open_settings = Arc::clone(&settings);
        let index =
            run_blocking(move || DocumentIndex::open(generator, &open_settings)).await?;

        debug!(
            model = index.model_name(),
            dimension = index.dimension().get(),
            documents = index.stats().active_count,
            "vector service ready"
        );
        Ok(Self {
            index: Arc::new(index),
            settings,
        })
    }

    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub async fn add_document(
        &self,
        document_id: impl Into<String>,
        content: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> IndexResult<SlotId> {
        let (document_id, content) = (document_id.into(), content.into());
        self.with_index(move |index| index.add_document(&document_id, &content, metadata))
            .await
    }

    pub async fn add_documents(&self, documents: Vec<SourceDocument>) -> IndexResult<BatchReport> {
        self.with_index(move |index| Ok(index.add_documents(&documents)))
            .await
    }

    pub async fn update_document(
        &self,
        document_id: impl Into<String>,
        content: impl Into<String>,
        metadata: DocumentMetadata,
    ) -> IndexResult<SlotId> {
        let (document_id, content) = (document_id.into(), content.into());
        self.with_index(move |index| index.update_document(&document_id, &content, metadata))
            .await
    }

    pub async fn remove_document(&self, document_id: impl Into<String>) -> IndexResult<()> {
        let document_id = document_id.into();
        self.with_index(move |index| index.remove_document(&document_id))
            .await
    }

    pub async fn document(&self, document_id: impl Into<String>) -> IndexResult<MetadataEntry> {
        let document_id = document_id.into();
        self.with_index(move |index| index.document(&document_id))
            .await
    }

    /// `k` defaults to `search.default_limit`, `threshold` to `search.threshold`.
    pub async fn similarity_search(
        &self,
        query: impl Into<String>,
        k: Option<usize>,
        threshold: Option<f32>,
    ) -> IndexResult<Vec<SearchResult>> {
        let query = query.into();
        let k = k.unwrap_or(self.settings.search.default_limit);
        self.with_index(move |index| index.similarity_search(&query, k, threshold))
            .await
    }

    pub async fn find_similar_to_document(
        &self,
        document_id: impl Into<String>,
        k: Option<usize>,
    ) -> IndexResult<Vec<SearchResult>> {
        let document_id = document_id.into();
        let k = k.unwrap_or(self.settings.search.default_limit);
        self.with_index(move |index| index.find_similar_to_document(&document_id, k))
            .await
    }

    pub async fn reindex_all(&self, documents: Vec<SourceDocument>) -> IndexResult<ReindexReport> {
        self.reindex_all_with_cancel(documents, CancellationToken::new())
            .await
    }

    /// Rebuild the index; cancelling `cancel` aborts before the swap.
    pub async fn reindex_all_with_cancel(
        &self,
        documents: Vec<SourceDocument>,
        cancel: CancellationToken,
    ) -> IndexResult<ReindexReport> {
        self.with_index(move |index| index.reindex_all_with_cancel(&documents, &cancel))
            .await
    }

    pub async fn stats(&self) -> IndexResult<IndexStats> {
        self.with_index(|index| Ok(index.stats())).await
    }

    pub async fn save(&self) -> IndexResult<()> {
        self.with_index(|index| index.save()).await
    }

    /// Flush unsaved changes. Safe to call more than once.
    pub async fn teardown(self) -> IndexResult<()> {
        let saved = self.with_index(|index| index.flush()).await?;
        if saved {
            info!("saved pending index changes on shutdown");
        }
        if Arc::strong_count(&self.index) > 1 {
            warn!("vector service torn down while other handles are still alive");
        }
        Ok(())
    }

    async fn with_index<T, F>(&self, f: F) -> IndexResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&DocumentIndex) -> IndexResult<T> + Send + 'static,
    {
        let index = Arc::clone(&self.index);
        run_blocking(move || f(&index)).await
    }
}

async fn run_blocking<T, F>(f: F) -> IndexResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> IndexResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| IndexError::General(format!("blocking task failed: {e}")))?
}
