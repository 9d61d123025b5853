//! Error types for the document index
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::vector::{VectorError, VectorStorageError};

/// Main error type for index operations
#[derive(Error, Debug)]
pub enum IndexError {
    /// Text could not be turned into a vector (empty text, model unavailable)
    #[error("Failed to encode text: {reason}")]
    Encoding { reason: String },

    /// Vector of the wrong length for this index
    #[error(
        "Embedding dimension mismatch: index expects {expected}, got {actual}. The embedding model does not match the index"
    )]
    Dimension { expected: usize, actual: usize },

    /// On-disk snapshot is inconsistent or unreadable
    #[error("Index snapshot at '{path}' is corrupted: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    #[error("Document '{document_id}' not found in the index")]
    DocumentNotFound { document_id: String },

    #[error("Slot {slot} is out of range for an index of {count} vectors")]
    SlotOutOfRange { slot: u32, count: usize },

    #[error(
        "Document '{document_id}' is already indexed at slot {slot}. Remove it first or use update"
    )]
    DuplicateDocument { document_id: String, slot: u32 },

    /// Metadata failed validation at the storage boundary
    #[error("Invalid value for '{field}': {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Failed to persist index to '{path}': {source}")]
    Persistence {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// A cancellable operation was cancelled before it completed
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// General errors for cases where we need to preserve existing behavior
    #[error("{0}")]
    General(String),
}

impl IndexError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::Encoding { .. } => "ENCODING_ERROR",
            Self::Dimension { .. } => "DIMENSION_ERROR",
            Self::CorruptState { .. } => "CORRUPT_STATE",
            Self::DocumentNotFound { .. } => "DOCUMENT_NOT_FOUND",
            Self::SlotOutOfRange { .. } => "SLOT_OUT_OF_RANGE",
            Self::DuplicateDocument { .. } => "DUPLICATE_DOCUMENT",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Cancelled { .. } => "CANCELLED",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Encoding { .. } => vec![
                "Check that the document text is not empty",
                "Verify the embedding model downloaded correctly",
            ],
            Self::Dimension { .. } => vec![
                "The configured embedding model differs from the one that built the index",
                "Run 'lexvec reindex' to rebuild the index with the current model",
            ],
            Self::CorruptState { .. } => vec![
                "The service starts with an empty index when the snapshot is corrupted",
                "Run 'lexvec reindex' to rebuild from the authoritative document set",
            ],
            Self::DuplicateDocument { .. } => vec![
                "Use 'lexvec update' to replace the existing document",
                "Or remove the document before adding it again",
            ],
            Self::Persistence { .. } => vec![
                "Check disk space and permissions in the index directory",
                "The in-memory index is still valid; retry the save",
            ],
            Self::Cancelled { .. } => {
                vec!["The live index was not modified; start the operation again"]
            }
            _ => vec![],
        }
    }

    /// True for errors that only affect a single document in a batch.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            Self::Encoding { .. }
                | Self::Dimension { .. }
                | Self::DuplicateDocument { .. }
                | Self::Validation { .. }
        )
    }
}

impl From<VectorError> for IndexError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { expected, actual } => {
                Self::Dimension { expected, actual }
            }
            VectorError::SlotOutOfRange { slot, count } => Self::SlotOutOfRange { slot, count },
            VectorError::EmbeddingFailed(reason) => Self::Encoding { reason },
            VectorError::NonFiniteValue { position } => Self::Encoding {
                reason: format!("embedding has a non-finite value at position {position}"),
            },
            other => Self::General(other.to_string()),
        }
    }
}

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Helper trait for attaching a snapshot path to storage errors
pub trait ErrorContext<T> {
    /// Treat the error as a corrupted snapshot at `path`
    fn corrupt_at(self, path: &std::path::Path) -> Result<T, IndexError>;

    /// Treat the error as a failed write to `path`
    fn persist_at(self, path: &std::path::Path) -> Result<T, IndexError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn corrupt_at(self, path: &std::path::Path) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::CorruptState {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn persist_at(self, path: &std::path::Path) -> Result<T, IndexError> {
        self.map_err(|e| IndexError::Persistence {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
    }
}

impl From<VectorStorageError> for IndexError {
    fn from(err: VectorStorageError) -> Self {
        match err {
            VectorStorageError::Vector(inner) => inner.into(),
            other => Self::General(other.to_string()),
        }
    }
}
