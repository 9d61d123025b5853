//! Type-safe wrappers and core types for the vector layer.
//!
//! Newtypes here keep slot positions, dimensions and scores from being
//! confused with plain integers and floats at API boundaries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard vector dimension for document embeddings (all-MiniLM-L6-v2 model).
pub const VECTOR_DIMENSION_384: usize = 384;

/// Upper bound accepted for a vector dimension.
pub const MAX_VECTOR_DIMENSION: usize = 4096;

/// Stable position of a vector inside one `VectorIndex` instance.
///
/// Slots are assigned in insertion order starting at zero and are never
/// reused. They are not stable across a reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(u32);

impl SlotId {
    /// Creates a slot from its raw position.
    #[must_use]
    pub const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns the slot as a `usize` offset into the arena.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Parses the string key used in the metadata JSON file.
    pub fn parse_key(key: &str) -> Option<Self> {
        key.parse::<u32>().ok().map(Self)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Similarity score produced by the inner product of two vectors.
///
/// For unit-length vectors the score equals cosine similarity and lies in
/// [-1.0, 1.0]. Scores are never NaN, which gives them a total order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(pub(crate) f32);

impl Score {
    /// Creates a new `Score`, rejecting NaN.
    pub fn new(value: f32) -> Result<Self, VectorError> {
        if value.is_nan() {
            return Err(VectorError::InvalidScore {
                value,
                reason: "Score cannot be NaN",
            });
        }
        Ok(Self(value))
    }

    /// Returns the underlying f32 value.
    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Type-safe wrapper for vector dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero or above `MAX_VECTOR_DIMENSION`.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        if dim > MAX_VECTOR_DIMENSION {
            return Err(VectorError::InvalidDimension {
                dimension: dim,
                reason: "Vector dimension exceeds 4096",
            });
        }
        Ok(Self(dim))
    }

    /// Creates a standard 384-dimensional vector dimension.
    #[must_use]
    pub const fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<usize> for VectorDimension {
    type Error = VectorError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VectorDimension> for usize {
    fn from(dim: VectorDimension) -> Self {
        dim.0
    }
}

/// Scales a vector to unit length so that inner product equals cosine similarity.
///
/// A zero (or non-finite) vector cannot be normalized and is rejected.
pub fn normalize(mut vector: Vec<f32>) -> Result<Vec<f32>, VectorError> {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude == 0.0 || !magnitude.is_finite() {
        return Err(VectorError::EmbeddingFailed(
            "Embedding has zero or non-finite magnitude and cannot be normalized".to_string(),
        ));
    }
    for value in &mut vector {
        *value /= magnitude;
    }
    Ok(vector)
}

/// Inner product of two equal-length vectors.
#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Invalid score value: {value}\nReason: {reason}")]
    InvalidScore { value: f32, reason: &'static str },

    #[error(
        "Vector contains a non-finite value at position {position}\nSuggestion: Check the embedding model output for NaN or infinity"
    )]
    NonFiniteValue { position: usize },

    #[error(
        "Slot {slot} is out of range (index holds {count} vectors)\nSuggestion: Slots are only valid for the index instance that assigned them"
    )]
    SlotOutOfRange { slot: u32, count: usize },

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized and the text is not empty"
    )]
    EmbeddingFailed(String),

    #[error("Storage error: {0}\nSuggestion: Check disk space and file permissions")]
    Storage(#[from] std::io::Error),

    #[error(
        "Invalid storage format: {0}\nSuggestion: The vector file may be corrupted. Rebuild it with a reindex"
    )]
    InvalidFormat(String),

    #[error(
        "Invalid storage version: expected {expected}, got {actual}\nSuggestion: Migrate the storage format or use a compatible version"
    )]
    VersionMismatch { expected: u32, actual: u32 },
}
