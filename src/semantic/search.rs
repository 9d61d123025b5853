//! Query-time search over the live index.
//!
//! The flat index scores tombstoned slots like any other, so each query
//! fetches more candidates than requested and drops the tombstones after.

use serde::Serialize;

use crate::error::{IndexError, IndexResult};
use crate::semantic::engine::DocumentIndex;
use crate::semantic::metadata::DocumentMetadata;
use crate::semantic::state::IndexState;
use crate::vector::{Score, SlotId};

/// A ranked document returned by a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document_id: String,
    pub score: f32,
    pub slot: SlotId,
    pub metadata: DocumentMetadata,
}

/// Candidates to request from the flat index for `k` live results.
///
/// `min(count, max(k * factor, k + tombstones))`: with every tombstone
/// fetched on top of `k`, no live result can be crowded out.
pub(crate) fn overfetch_size(k: usize, factor: usize, count: usize, tombstones: usize) -> usize {
    k.saturating_mul(factor)
        .max(k.saturating_add(tombstones))
        .min(count)
}

impl DocumentIndex {
    /// Return up to `k` active documents most similar to `query`.
    ///
    /// Only scores `>= threshold` are kept; `None` uses the configured
    /// default. Results are ordered by score, ties broken by lower slot.
    pub fn similarity_search(
        &self,
        query: &str,
        k: usize,
        threshold: Option<f32>,
    ) -> IndexResult<Vec<SearchResult>> {
        let threshold = threshold.unwrap_or(self.search.threshold);
        if threshold.is_nan() {
            return Err(IndexError::Validation {
                field: "threshold",
                reason: "must be a number".to_string(),
            });
        }
        let query_vector = self.encode(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let live = self.live.read();
        let fetch = overfetch_size(
            k,
            self.search.overfetch_factor,
            live.index().count(),
            live.tombstone_count(),
        );
        let candidates = live.index().search(&query_vector, fetch)?;

        let results = collect_live(&live, candidates, k, Some(threshold), None);
        tracing::debug!(
            k,
            threshold,
            candidates = fetch,
            returned = results.len(),
            "similarity search"
        );
        Ok(results)
    }

    /// Return up to `k` active documents most similar to an indexed one.
    ///
    /// The query is the stored vector of `document_id`; the document itself
    /// is never in the results. No threshold is applied.
    pub fn find_similar_to_document(
        &self,
        document_id: &str,
        k: usize,
    ) -> IndexResult<Vec<SearchResult>> {
        let live = self.live.read();
        let source = live
            .metadata()
            .find_slot_by_document_id(document_id)
            .ok_or_else(|| IndexError::DocumentNotFound {
                document_id: document_id.to_string(),
            })?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = live.index().vector(source)?;
        let fetch = overfetch_size(
            k.saturating_add(1),
            self.search.overfetch_factor,
            live.index().count(),
            live.tombstone_count(),
        );
        let candidates = live.index().search(query_vector, fetch)?;

        Ok(collect_live(&live, candidates, k, None, Some(source)))
    }
}

/// Drop tombstones, the excluded slot, and sub-threshold scores, then keep `k`.
///
/// Candidates arrive sorted by descending score, so the threshold check
/// stops at the first miss.
fn collect_live(
    live: &IndexState,
    candidates: Vec<(SlotId, Score)>,
    k: usize,
    threshold: Option<f32>,
    exclude: Option<SlotId>,
) -> Vec<SearchResult> {
    candidates
        .into_iter()
        .take_while(|(_, score)| threshold.is_none_or(|t| score.get() >= t))
        .filter(|(slot, _)| Some(*slot) != exclude)
        .filter_map(|(slot, score)| {
            live.metadata().get(slot).map(|entry| SearchResult {
                document_id: entry.document_id.clone(),
                score: score.get(),
                slot,
                metadata: entry.metadata.clone(),
            })
        })
        .take(k)
        .collect()
}
