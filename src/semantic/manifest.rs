//! Snapshot manifest.
//!
//! `manifest.json` is the last artifact written by a save. It records which
//! model built the index and the counts and generation the other two
//! artifacts must agree with, so a crash between renames is detectable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorContext, IndexError, IndexResult};
use crate::vector::atomic_write;

/// File name of the manifest inside a snapshot directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Current UTC time as seconds since the Unix epoch.
pub fn get_utc_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Version of the manifest format
    pub version: u32,

    /// Name of the embedding model that produced the vectors
    pub model_name: String,

    /// Dimension of every stored vector
    pub dimension: usize,

    /// Slots in `vectors.bin`, tombstones included
    pub vector_count: usize,

    /// Entries in `metadata.json`
    pub active_count: usize,

    /// Save counter shared with the `vectors.bin` header
    pub generation: u64,

    /// Unix timestamp of the first save into this directory
    pub created_at: u64,

    /// Unix timestamp of this save
    pub updated_at: u64,
}

impl SnapshotManifest {
    /// Current manifest version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(
        model_name: impl Into<String>,
        dimension: usize,
        vector_count: usize,
        active_count: usize,
        generation: u64,
    ) -> Self {
        let now = get_utc_timestamp();
        Self {
            version: Self::CURRENT_VERSION,
            model_name: model_name.into(),
            dimension,
            vector_count,
            active_count,
            generation,
            created_at: now,
            updated_at: now,
        }
    }

    /// Keep the creation time of an earlier snapshot.
    pub fn created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at.min(self.updated_at);
        self
    }

    /// Atomically write `manifest.json` into `dir`.
    pub fn save(&self, dir: &Path) -> IndexResult<()> {
        let path = dir.join(MANIFEST_FILE_NAME);
        atomic_write(&path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, self).map_err(std::io::Error::other)
        })
        .persist_at(&path)
    }

    /// Load `manifest.json` from `dir`.
    ///
    /// Unreadable, unparsable, or newer-than-supported manifests are all
    /// reported as `CorruptState`.
    pub fn load(dir: &Path) -> IndexResult<Self> {
        let path = dir.join(MANIFEST_FILE_NAME);
        let json = std::fs::read_to_string(&path).corrupt_at(&path)?;
        let manifest: Self = serde_json::from_str(&json).corrupt_at(&path)?;

        if manifest.version > Self::CURRENT_VERSION {
            return Err(IndexError::CorruptState {
                path,
                reason: format!(
                    "manifest version {} is newer than supported version {}",
                    manifest.version,
                    Self::CURRENT_VERSION
                ),
            });
        }

        Ok(manifest)
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(MANIFEST_FILE_NAME).exists()
    }
}
