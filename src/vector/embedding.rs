//! Embedding generation for documents and queries.
//!
//! This module provides the trait and implementations for turning text into
//! fixed-dimension vectors. `FastEmbedGenerator` wraps a fastembed ONNX model
//! (AllMiniLML6V2 by default); `HashingEmbeddingGenerator` is a deterministic
//! offline encoder that needs no model download.
//!
//! Encoders make no normalization guarantee. Callers that need cosine
//! similarity run the output through [`normalize`](crate::vector::normalize).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::vector::{VECTOR_DIMENSION_384, VectorDimension, VectorError};

/// Model name prefix that selects the offline hashing encoder.
pub const HASHING_MODEL_PREFIX: &str = "hashing";

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe and deterministic for a fixed model
/// version and input.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts, one per input.
    ///
    /// Fails if any text is empty or the model is unavailable.
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Get the dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;

    /// Stable name of the model, recorded in snapshots.
    #[must_use]
    fn model_name(&self) -> &str;

    /// Encode a single text.
    fn encode(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        self.generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("model returned no embedding".to_string()))
    }
}

fn reject_empty(texts: &[&str]) -> Result<(), VectorError> {
    if let Some(i) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(VectorError::EmbeddingFailed(format!(
            "text at position {i} is empty"
        )));
    }
    Ok(())
}

/// FastEmbed implementation backed by an ONNX sentence-embedding model.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
    model_name: String,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &"<TextEmbedding>")
            .field("dimension", &self.dimension)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Create a generator with the default AllMiniLML6V2 model.
    ///
    /// # Errors
    /// Returns an error if the model fails to initialize or download.
    pub fn new() -> Result<Self, VectorError> {
        Self::with_model(EmbeddingModel::AllMiniLML6V2, models_dir(None), false)
    }

    /// Create a generator for a specific model.
    ///
    /// The output dimension is probed with a test embedding rather than
    /// hard-coded, so any fastembed text model works.
    pub fn with_model(
        model: EmbeddingModel,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, VectorError> {
        let model_name = model_to_string(&model);
        tracing::info!(model = %model_name, cache_dir = %cache_dir.display(), "loading embedding model");

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_show_download_progress(show_download_progress),
        )
        .map_err(|e| VectorError::EmbeddingFailed(
            format!("Failed to initialize embedding model: {e}. Ensure you have internet connection for first-time model download")
        ))?;

        let probe = text_model
            .embed(vec!["dimension probe"], None)
            .map_err(|e| VectorError::EmbeddingFailed(format!("Failed to probe model: {e}")))?;
        let dimension = probe
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| VectorError::EmbeddingFailed("model returned no embedding".to_string()))?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimension: VectorDimension::new(dimension)?,
            model_name,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        reject_empty(texts)?;

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, None)
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic feature-hashing encoder.
///
/// Each lowercased alphanumeric token is hashed with SHA-256 into one of
/// `dimension` buckets and counted. Texts sharing words land close together,
/// which is enough for keyword-level similarity without a neural model.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingGenerator {
    dimension: VectorDimension,
    model_name: String,
}

impl Default for HashingEmbeddingGenerator {
    fn default() -> Self {
        Self::new(VectorDimension::dimension_384())
    }
}

impl HashingEmbeddingGenerator {
    /// Create a hashing encoder with the given output dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            dimension,
            model_name: format!("{HASHING_MODEL_PREFIX}-{}", dimension.get()),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(bytes) % self.dimension.get() as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimension.get()];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            embedding[self.bucket(&token.to_lowercase())] += 1.0;
        }
        embedding
    }
}

impl EmbeddingGenerator for HashingEmbeddingGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        reject_empty(texts)?;
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Parse a configured model name into a fastembed model.
///
/// Accepts the enum-style names used in settings files as well as the
/// sentence-transformers style names (`all-MiniLM-L6-v2`).
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    let normalized = name
        .trim()
        .trim_start_matches("sentence-transformers/")
        .trim_start_matches("BAAI/")
        .to_ascii_lowercase()
        .replace(['-', '_', '.'], "");

    let model = match normalized.as_str() {
        "allminilml6v2" => EmbeddingModel::AllMiniLML6V2,
        "allminilml12v2" => EmbeddingModel::AllMiniLML12V2,
        "bgesmallenv15" => EmbeddingModel::BGESmallENV15,
        "bgebaseenv15" => EmbeddingModel::BGEBaseENV15,
        "bgelargeenv15" => EmbeddingModel::BGELargeENV15,
        "paraphrasemlminilml12v2" | "paraphrasemultilingualminilml12v2" => {
            EmbeddingModel::ParaphraseMLMiniLML12V2
        }
        "multilinguale5small" => EmbeddingModel::MultilingualE5Small,
        "multilinguale5base" => EmbeddingModel::MultilingualE5Base,
        "nomicembedtextv15" => EmbeddingModel::NomicEmbedTextV15,
        _ => {
            return Err(VectorError::EmbeddingFailed(format!(
                "Unknown embedding model '{name}'. Supported: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15, BGELargeENV15, ParaphraseMLMiniLML12V2, MultilingualE5Small, MultilingualE5Base, NomicEmbedTextV15, hashing"
            )));
        }
    };
    Ok(model)
}

/// Canonical settings name for a fastembed model.
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2",
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2",
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15",
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15",
        EmbeddingModel::BGELargeENV15 => "BGELargeENV15",
        EmbeddingModel::ParaphraseMLMiniLML12V2 => "ParaphraseMLMiniLML12V2",
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small",
        EmbeddingModel::MultilingualE5Base => "MultilingualE5Base",
        EmbeddingModel::NomicEmbedTextV15 => "NomicEmbedTextV15",
        other => return format!("{other:?}"),
    }
    .to_string()
}

/// Directory where downloaded models are cached.
#[must_use]
pub fn models_dir(configured: Option<&PathBuf>) -> PathBuf {
    if let Some(dir) = configured {
        return dir.clone();
    }
    dirs::cache_dir()
        .map(|dir| dir.join("lexvec").join("models"))
        .unwrap_or_else(|| PathBuf::from(".lexvec/models"))
}

/// Build the encoder named in the configuration.
///
/// `hashing` or `hashing-<dim>` selects the offline encoder; anything else
/// is resolved as a fastembed model.
pub fn create_generator(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingGenerator>, VectorError> {
    if let Some(rest) = config.model.strip_prefix(HASHING_MODEL_PREFIX) {
        let dimension = match rest.strip_prefix('-') {
            Some(dim) => {
                let value = dim.parse::<usize>().map_err(|_| {
                    VectorError::EmbeddingFailed(format!(
                        "Invalid hashing model dimension in '{}'",
                        config.model
                    ))
                })?;
                VectorDimension::new(value)?
            }
            None if rest.is_empty() => VectorDimension::new(VECTOR_DIMENSION_384)?,
            None => {
                return Err(VectorError::EmbeddingFailed(format!(
                    "Unknown embedding model '{}'",
                    config.model
                )));
            }
        };
        return Ok(Arc::new(HashingEmbeddingGenerator::new(dimension)));
    }

    let model = parse_embedding_model(&config.model)?;
    let generator = FastEmbedGenerator::with_model(
        model,
        models_dir(config.cache_dir.as_ref()),
        config.show_download_progress,
    )?;
    Ok(Arc::new(generator))
}
