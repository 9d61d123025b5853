//! Binary persistence for the flat vector index.
//!
//! The file is read back through a memory map, validated, and copied into
//! the in-memory arena.
//!
//! # Storage Format
//!
//! - Header (28 bytes): magic `LXVI`, u32 version, u32 dimension,
//!   u64 vector count, u64 snapshot generation
//! - Vectors: `count * dimension` contiguous f32 values in slot order
//!
//! All integers and floats are little-endian.
//!
//! Writes never touch the canonical path directly: data goes to a temporary
//! file in the same directory, is synced, and is then renamed into place.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::vector::index::VectorIndex;
use crate::vector::types::{VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 28;

/// Magic bytes to identify vector index files.
const MAGIC_BYTES: &[u8; 4] = b"LXVI";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// File name of the vector artifact inside a snapshot directory.
pub const VECTOR_FILE_NAME: &str = "vectors.bin";

/// Errors specific to vector storage operations.
#[derive(Error, Debug)]
pub enum VectorStorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),
}

/// Parsed header of a vector file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorFileHeader {
    pub version: u32,
    pub dimension: VectorDimension,
    pub count: usize,
    pub generation: u64,
}

/// Handle on the vector artifact of a snapshot directory.
#[derive(Debug, Clone)]
pub struct MmapVectorStorage {
    /// Path to the storage file.
    path: PathBuf,
}

impl MmapVectorStorage {
    /// Creates a handle for `base_path/vectors.bin`. Nothing is touched on disk.
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            path: base_path.as_ref().join(VECTOR_FILE_NAME),
        }
    }

    /// Path of the canonical vector file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks if the storage file exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Returns the size of the storage file in bytes.
    pub fn file_size(&self) -> Result<u64, io::Error> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    /// Atomically replaces the vector file with the contents of `index`.
    pub fn write_index(
        &self,
        index: &VectorIndex,
        generation: u64,
    ) -> Result<(), VectorStorageError> {
        let header = VectorFileHeader {
            version: STORAGE_VERSION,
            dimension: index.dimension(),
            count: index.count(),
            generation,
        };

        atomic_write(&self.path, |writer| {
            write_header(writer, &header)?;
            for &value in index.as_raw() {
                writer.write_all(&value.to_le_bytes())?;
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Reads only the header of the vector file.
    pub fn read_header(&self) -> Result<VectorFileHeader, VectorStorageError> {
        let mmap = self.map()?;
        read_header(&mmap)
    }

    /// Loads the full index and its header.
    ///
    /// The file length must match the header exactly; a truncated or padded
    /// file is rejected.
    pub fn load_index(&self) -> Result<(VectorIndex, VectorFileHeader), VectorStorageError> {
        let mmap = self.map()?;
        let header = read_header(&mmap)?;

        if header.version != STORAGE_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: STORAGE_VERSION,
                actual: header.version,
            }
            .into());
        }

        let dimension = header.dimension.get();
        let expected_len = header
            .count
            .checked_mul(dimension)
            .and_then(|values| values.checked_mul(BYTES_PER_F32))
            .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
            .ok_or_else(|| {
                VectorStorageError::InvalidFormat("vector count overflows file size".to_string())
            })?;

        if mmap.len() != expected_len {
            return Err(VectorStorageError::InvalidFormat(format!(
                "expected {expected_len} bytes for {} vectors of dimension {dimension}, found {}",
                header.count,
                mmap.len()
            )));
        }

        let data: Vec<f32> = mmap[HEADER_SIZE..]
            .chunks_exact(BYTES_PER_F32)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let index = VectorIndex::from_raw(header.dimension, data)?;
        Ok((index, header))
    }

    fn map(&self) -> Result<Mmap, VectorStorageError> {
        let file = File::open(&self.path)?;
        // SAFETY: snapshot files are only ever replaced by rename, never
        // modified in place, so the mapped bytes cannot change underneath us.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(mmap)
    }
}

fn write_header(writer: &mut impl Write, header: &VectorFileHeader) -> io::Result<()> {
    writer.write_all(MAGIC_BYTES)?;
    writer.write_all(&header.version.to_le_bytes())?;
    writer.write_all(&(header.dimension.get() as u32).to_le_bytes())?;
    writer.write_all(&(header.count as u64).to_le_bytes())?;
    writer.write_all(&header.generation.to_le_bytes())?;
    Ok(())
}

fn read_header(mmap: &Mmap) -> Result<VectorFileHeader, VectorStorageError> {
    if mmap.len() < HEADER_SIZE {
        return Err(VectorStorageError::InvalidFormat(
            "File too small to contain header".to_string(),
        ));
    }

    if &mmap[0..4] != MAGIC_BYTES {
        return Err(VectorStorageError::InvalidFormat(
            "Invalid magic bytes".to_string(),
        ));
    }

    let u32_at = |at: usize| u32::from_le_bytes([mmap[at], mmap[at + 1], mmap[at + 2], mmap[at + 3]]);
    let u64_at = |at: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&mmap[at..at + 8]);
        u64::from_le_bytes(bytes)
    };

    let version = u32_at(4);
    let dimension = VectorDimension::new(u32_at(8) as usize)?;
    let count = usize::try_from(u64_at(12)).map_err(|_| {
        VectorStorageError::InvalidFormat("vector count does not fit in memory".to_string())
    })?;
    let generation = u64_at(20);

    Ok(VectorFileHeader {
        version,
        dimension,
        count,
        generation,
    })
}

/// Writes a file through a synced temporary sibling and an atomic rename.
///
/// A crash at any point leaves either the old file or the complete new file
/// at `path`, never a partial one.
pub fn atomic_write<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> io::Result<()>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    let temp = NamedTempFile::new_in(&parent)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    sync_directory(&parent)
}

fn sync_directory(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    {
        let _ = dir;
    }
    Ok(())
}
