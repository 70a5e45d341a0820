//! Merge policy and N-way segment merge
//!
//! A merge reads a set of segments and writes one new segment holding only
//! their live documents, renumbered densely in input order. Term
//! dictionaries are merged in a single ordered pass over all inputs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::reader::SegmentReader;
use super::statistics::SegmentStatistics;
use super::stored::StoredFields;
use super::term_dict::TermCursor;
use super::types::{DocNo, Posting, PostingListMeta, SegmentId};
use super::writer::{SegmentBuilder, SegmentWriteResult};
use crate::error::{LucaError, Result};

/// Configuration for the tiered merge policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergePolicyConfig {
    /// Merge once the index holds more segments than this
    pub max_segments: usize,
    /// Minimum number of segments to merge at once
    pub min_merge_count: usize,
    /// Maximum number of segments to merge at once
    pub max_merge_count: usize,
    /// Delete ratio above which a segment is rewritten on its own
    pub delete_ratio_threshold: f64,
}

impl Default for MergePolicyConfig {
    fn default() -> Self {
        Self {
            max_segments: 10,
            min_merge_count: 2,
            max_merge_count: 10,
            delete_ratio_threshold: 0.5,
        }
    }
}

/// A candidate merge operation
#[derive(Clone, Debug, PartialEq)]
pub struct MergeCandidate {
    /// Segment IDs to merge
    pub segment_ids: Vec<SegmentId>,
    /// Total size of the inputs
    pub estimated_size: u64,
    /// Reason for merge
    pub reason: MergeReason,
}

/// Reason why segments should be merged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeReason {
    /// More segments than the policy allows
    TooManySegments,
    /// High delete ratio
    HighDeleteRatio,
    /// Forced merge down to a single segment
    Forced,
}

/// Decides which segments to merge after a commit
pub trait MergePolicy: Send + Sync + std::fmt::Debug {
    fn find_merges(&self, segments: &[Arc<SegmentReader>]) -> Option<MergeCandidate>;
}

/// Tiered merge policy implementation
#[derive(Clone, Debug, Default)]
pub struct TieredMergePolicy {
    config: MergePolicyConfig,
}

impl TieredMergePolicy {
    pub fn new(config: MergePolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergePolicyConfig {
        &self.config
    }

    fn too_many_segments(&self, segments: &[Arc<SegmentReader>]) -> Option<MergeCandidate> {
        if segments.len() <= self.config.max_segments {
            return None;
        }
        let merge_count = (segments.len() - self.config.max_segments + 1)
            .max(self.config.min_merge_count)
            .min(self.config.max_merge_count.max(2))
            .min(segments.len());

        // Smallest segments first, ties by id for determinism
        let mut sorted: Vec<_> = segments.iter().collect();
        sorted.sort_by_key(|s| (s.meta().size_bytes, s.id()));
        let mut segment_ids: Vec<_> = sorted.iter().take(merge_count).map(|s| s.id()).collect();
        segment_ids.sort();

        Some(MergeCandidate {
            estimated_size: sorted.iter().take(merge_count).map(|s| s.meta().size_bytes).sum(),
            segment_ids,
            reason: MergeReason::TooManySegments,
        })
    }

    fn high_deletes(&self, segments: &[Arc<SegmentReader>]) -> Option<MergeCandidate> {
        let heavy: Vec<_> = segments
            .iter()
            .filter(|s| s.delete_ratio() > self.config.delete_ratio_threshold)
            .take(self.config.max_merge_count.max(1))
            .collect();
        if heavy.is_empty() {
            return None;
        }
        Some(MergeCandidate {
            segment_ids: heavy.iter().map(|s| s.id()).collect(),
            estimated_size: heavy.iter().map(|s| s.meta().size_bytes).sum(),
            reason: MergeReason::HighDeleteRatio,
        })
    }
}

impl MergePolicy for TieredMergePolicy {
    fn find_merges(&self, segments: &[Arc<SegmentReader>]) -> Option<MergeCandidate> {
        self.too_many_segments(segments)
            .or_else(|| self.high_deletes(segments))
    }
}

/// Never merges on its own; force merges still work
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMergePolicy;

impl MergePolicy for NoMergePolicy {
    fn find_merges(&self, _segments: &[Arc<SegmentReader>]) -> Option<MergeCandidate> {
        None
    }
}

/// Merge `segments` into a new in-memory segment `id`, dropping deleted documents
pub fn merge_segments(segments: &[Arc<SegmentReader>], id: SegmentId) -> Result<SegmentWriteResult> {
    if segments.is_empty() {
        return Err(LucaError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "no segments to merge",
        )));
    }

    // Renumber live documents densely, segment by segment
    let mut stored = StoredFields::new();
    let mut stats = SegmentStatistics::new();
    let mut remaps: Vec<Vec<Option<DocNo>>> = Vec::with_capacity(segments.len());
    for segment in segments {
        let mut remap = vec![None; segment.doc_count() as usize];
        for old in segment.live_docs().iter() {
            let raw = segment.stored().raw(old).ok_or_else(|| {
                LucaError::corrupt(format!("{} has no stored document {}", segment.id(), old))
            })?;
            let new = stored.push_raw(raw);
            stats.append_from(segment.stats(), old);
            if let Some(slot) = remap.get_mut(old.as_usize()) {
                *slot = Some(new);
            }
        }
        remaps.push(remap);
    }

    let mut cursors: Vec<TermCursor<'_>> = segments.iter().map(|s| s.terms().cursor()).collect();
    let mut heads: Vec<Option<&PostingListMeta>> = vec![None; segments.len()];
    let mut heap: BinaryHeap<Reverse<(Vec<u8>, usize)>> = BinaryHeap::new();
    for (idx, cursor) in cursors.iter_mut().enumerate() {
        if let Some((key, meta)) = cursor.advance() {
            heads[idx] = Some(meta);
            heap.push(Reverse((key, idx)));
        }
    }

    let mut builder = SegmentBuilder::new();
    while let Some(Reverse((key, first))) = heap.pop() {
        let mut group = vec![first];
        while heap.peek().map_or(false, |Reverse((k, _))| *k == key) {
            if let Some(Reverse((_, idx))) = heap.pop() {
                group.push(idx);
            }
        }
        group.sort_unstable();

        let mut merged: Vec<Posting> = Vec::new();
        for idx in group {
            if let Some(meta) = heads[idx].take() {
                for posting in segments[idx].postings().get_postings(meta)? {
                    if let Some(Some(new)) = remaps[idx].get(posting.docno.as_usize()) {
                        merged.push(Posting {
                            docno: *new,
                            ..posting
                        });
                    }
                }
            }
            if let Some((next_key, meta)) = cursors[idx].advance() {
                heads[idx] = Some(meta);
                heap.push(Reverse((next_key, idx)));
            }
        }

        builder.add_term(key, merged);
    }

    let result = builder.finish(id, stored, stats)?;
    tracing::debug!(
        segment = %id,
        inputs = segments.len(),
        docs = result.reader.doc_count(),
        terms = result.reader.term_count(),
        "Merged segments"
    );
    Ok(result)
}
