//! Snapshot persistence for the live index.
//!
//! A snapshot directory holds three artifacts, written in this order:
//! `vectors.bin`, `metadata.json`, `manifest.json`. Each is replaced by an
//! atomic rename. The vector header and the manifest carry the same
//! generation number, so a load can tell whether all three came from the
//! same save.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ErrorContext, IndexError, IndexResult};
use crate::semantic::manifest::{MANIFEST_FILE_NAME, SnapshotManifest, get_utc_timestamp};
use crate::semantic::metadata::{MetadataEntry, MetadataStore};
use crate::semantic::state::IndexState;
use crate::vector::{MmapVectorStorage, SlotId, VECTOR_FILE_NAME, atomic_write};

/// File name of the slot → document map.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// A snapshot read back from disk.
#[derive(Debug)]
pub struct LoadedSnapshot {
    pub state: IndexState,
    /// Absent only for snapshots written before manifests existed
    pub manifest: Option<SnapshotManifest>,
}

/// Manages persistence of the index
#[derive(Debug, Clone)]
pub struct IndexPersistence {
    base_path: PathBuf,
}

impl IndexPersistence {
    /// Create a new persistence manager
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn vector_storage(&self) -> MmapVectorStorage {
        MmapVectorStorage::new(&self.base_path)
    }

    fn metadata_path(&self) -> PathBuf {
        self.base_path.join(METADATA_FILE_NAME)
    }

    /// True if any snapshot artifact is present.
    pub fn exists(&self) -> bool {
        self.vector_storage().exists()
            || self.metadata_path().exists()
            || SnapshotManifest::exists(&self.base_path)
    }

    /// Write `state` as the next generation.
    ///
    /// The generation is bumped before anything is written and stored back
    /// into `state`, so callers must hold exclusive access for the whole
    /// call. On error the previous snapshot may be partially replaced; the
    /// generation check on load catches that.
    #[must_use = "Save errors should be handled to ensure data is persisted"]
    pub fn save(&self, state: &mut IndexState, model_name: &str) -> IndexResult<()> {
        std::fs::create_dir_all(&self.base_path).persist_at(&self.base_path)?;

        let generation = state.generation + 1;
        let created_at = SnapshotManifest::load(&self.base_path)
            .map(|m| m.created_at)
            .unwrap_or_else(|_| get_utc_timestamp());

        let storage = self.vector_storage();
        storage
            .write_index(&state.index, generation)
            .persist_at(storage.path())?;

        let metadata_path = self.metadata_path();
        atomic_write(&metadata_path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, state.metadata.as_map())
                .map_err(std::io::Error::other)
        })
        .persist_at(&metadata_path)?;

        SnapshotManifest::new(
            model_name,
            state.index.dimension().get(),
            state.index.count(),
            state.metadata.len(),
            generation,
        )
        .created_at(created_at)
        .save(&self.base_path)?;

        state.generation = generation;
        debug!(
            generation,
            vectors = state.index.count(),
            active = state.metadata.len(),
            path = %self.base_path.display(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Load the snapshot, if one exists.
    ///
    /// Returns `Ok(None)` when the directory holds no artifacts at all. Any
    /// inconsistency between artifacts is `CorruptState`.
    #[must_use = "Load errors should be handled appropriately"]
    pub fn load(&self) -> IndexResult<Option<LoadedSnapshot>> {
        let storage = self.vector_storage();
        let metadata_path = self.metadata_path();
        let has_manifest = SnapshotManifest::exists(&self.base_path);

        match (storage.exists(), metadata_path.exists()) {
            (false, false) if !has_manifest => return Ok(None),
            (true, true) => {}
            (vectors, _) => {
                let missing = if vectors {
                    METADATA_FILE_NAME
                } else {
                    VECTOR_FILE_NAME
                };
                return Err(self.corrupt(format!("snapshot is missing {missing}")));
            }
        }

        let (index, header) = storage.load_index().corrupt_at(storage.path())?;

        let json = std::fs::read_to_string(&metadata_path).corrupt_at(&metadata_path)?;
        let raw: BTreeMap<String, MetadataEntry> =
            serde_json::from_str(&json).corrupt_at(&metadata_path)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (key, entry) in raw {
            let slot = SlotId::parse_key(&key).ok_or_else(|| IndexError::CorruptState {
                path: metadata_path.clone(),
                reason: format!("'{key}' is not a slot number"),
            })?;
            entries.push((slot, entry));
        }
        let metadata = MetadataStore::from_entries(entries).map_err(|e| IndexError::CorruptState {
            path: metadata_path.clone(),
            reason: e.to_string(),
        })?;

        let manifest = if has_manifest {
            Some(SnapshotManifest::load(&self.base_path)?)
        } else {
            None
        };

        if let Some(manifest) = &manifest {
            if manifest.generation != header.generation {
                return Err(self.corrupt(format!(
                    "manifest generation {} does not match vector file generation {}",
                    manifest.generation, header.generation
                )));
            }
            if manifest.vector_count != header.count {
                return Err(self.corrupt(format!(
                    "manifest records {} vectors, vector file holds {}",
                    manifest.vector_count, header.count
                )));
            }
            if manifest.active_count != metadata.len() {
                return Err(self.corrupt(format!(
                    "manifest records {} active documents, metadata holds {}",
                    manifest.active_count,
                    metadata.len()
                )));
            }
            if manifest.dimension != header.dimension.get() {
                return Err(self.corrupt(format!(
                    "manifest dimension {} does not match vector file dimension {}",
                    manifest.dimension,
                    header.dimension.get()
                )));
            }
        }

        let state = IndexState::from_parts(index, metadata, header.generation)
            .map_err(|reason| self.corrupt(reason))?;

        debug!(
            generation = header.generation,
            vectors = state.index.count(),
            active = state.metadata.len(),
            "snapshot loaded"
        );
        Ok(Some(LoadedSnapshot { state, manifest }))
    }

    /// Remove every snapshot artifact.
    pub fn clear(&self) -> IndexResult<()> {
        let manifest_path = self.base_path.join(MANIFEST_FILE_NAME);
        for path in [
            self.vector_storage().path().to_path_buf(),
            self.metadata_path(),
            manifest_path,
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).persist_at(&path),
            }
        }
        Ok(())
    }

    fn corrupt(&self, reason: String) -> IndexError {
        IndexError::CorruptState {
            path: self.base_path.clone(),
            reason,
        }
    }
}
