//! Append-only flat vector index with exact inner-product search.
//!
//! Vectors live in a single contiguous arena of `f32` values. A vector's
//! slot is its position in the arena, assigned at insertion and never
//! reused or removed. Logical deletion happens one layer up, in the
//! metadata store; the index keeps tombstoned vectors and scores them like
//! any other.
//!
//! Search is a brute-force scan over every stored vector, O(N·D) per
//! query. The scan is split across the rayon pool.

use rayon::prelude::*;

use crate::vector::types::{Score, SlotId, VectorDimension, VectorError, inner_product};

/// Below this many vectors the scan runs on the calling thread.
const PARALLEL_SCAN_THRESHOLD: usize = 4096;

/// Exact (flat) vector index over a fixed dimension.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Contiguous storage, `count * dimension` values.
    data: Vec<f32>,

    /// Vector dimension (all vectors must have same dimension).
    dimension: VectorDimension,

    /// Number of vectors stored, tombstones included.
    count: usize,
}

impl VectorIndex {
    /// Creates an empty index for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: VectorDimension) -> Self {
        Self {
            data: Vec::new(),
            dimension,
            count: 0,
        }
    }

    /// Rebuilds an index from a raw arena, as read back from storage.
    pub fn from_raw(dimension: VectorDimension, data: Vec<f32>) -> Result<Self, VectorError> {
        if data.len() % dimension.get() != 0 {
            return Err(VectorError::InvalidFormat(format!(
                "arena of {} values is not a multiple of dimension {}",
                data.len(),
                dimension.get()
            )));
        }
        if let Some(position) = data.iter().position(|v| !v.is_finite()) {
            return Err(VectorError::InvalidFormat(format!(
                "non-finite value in slot {} at position {}",
                position / dimension.get(),
                position % dimension.get()
            )));
        }
        let count = data.len() / dimension.get();
        Ok(Self {
            data,
            dimension,
            count,
        })
    }

    /// Appends a vector and returns its slot.
    ///
    /// Rejects vectors of the wrong dimension or containing NaN/infinity.
    pub fn add(&mut self, vector: &[f32]) -> Result<SlotId, VectorError> {
        self.dimension.validate_vector(vector)?;
        if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
            return Err(VectorError::NonFiniteValue { position });
        }
        let slot = u32::try_from(self.count).map_err(|_| {
            VectorError::InvalidFormat("index is full: slot space exhausted".to_string())
        })?;

        self.data.extend_from_slice(vector);
        self.count += 1;
        Ok(SlotId::new(slot))
    }

    /// Returns the `k` highest-scoring slots for `query`.
    ///
    /// Every stored vector is scored, tombstones included. Results are
    /// ordered by descending score; equal scores keep the lower slot first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(SlotId, Score)>, VectorError> {
        self.dimension.validate_vector(query)?;
        if let Some(position) = query.iter().position(|v| !v.is_finite()) {
            return Err(VectorError::NonFiniteValue { position });
        }

        if k == 0 || self.count == 0 {
            return Ok(Vec::new());
        }

        let dim = self.dimension.get();
        let score_one = |(i, vector): (usize, &[f32])| {
            // Stored and query values are finite, so the product is never NaN.
            (SlotId::new(i as u32), Score(inner_product(query, vector)))
        };

        let mut scored: Vec<(SlotId, Score)> = if self.count >= PARALLEL_SCAN_THRESHOLD {
            self.data
                .par_chunks_exact(dim)
                .enumerate()
                .map(score_one)
                .collect()
        } else {
            self.data.chunks_exact(dim).enumerate().map(score_one).collect()
        };

        let rank = |a: &(SlotId, Score), b: &(SlotId, Score)| b.1.cmp(&a.1).then(a.0.cmp(&b.0));

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank);

        Ok(scored)
    }

    /// Returns a copy of the vector stored at `slot`.
    pub fn reconstruct(&self, slot: SlotId) -> Result<Vec<f32>, VectorError> {
        self.vector(slot).map(<[f32]>::to_vec)
    }

    /// Borrows the vector stored at `slot`.
    pub fn vector(&self, slot: SlotId) -> Result<&[f32], VectorError> {
        if slot.index() >= self.count {
            return Err(VectorError::SlotOutOfRange {
                slot: slot.get(),
                count: self.count,
            });
        }
        let dim = self.dimension.get();
        let start = slot.index() * dim;
        Ok(&self.data[start..start + dim])
    }

    /// Number of stored vectors, tombstones included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns true when no vectors are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the vector dimension.
    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    /// Raw arena in slot order, for serialization.
    #[must_use]
    pub fn as_raw(&self) -> &[f32] {
        &self.data
    }
}
