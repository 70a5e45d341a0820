//! Query executor for running queries against a segment list
//!
//! Each segment is scored into its own bounded top-K list; the per-segment
//! lists are then merged into the global top-K with the same bounded heap,
//! so at most `top_k` candidates per segment are ever held.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use ordered_float::OrderedFloat;

use super::ast::{Query, NO_MORE_DOCS};
use super::context::{CollectionStats, SegmentContext};
use crate::error::Result;
use crate::segment::{Bm25Params, DocAddress, DocNo, SegmentReader};

/// A scored match, ordered best first: higher score, then lower address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoredDoc {
    pub score: OrderedFloat<f32>,
    pub address: DocAddress,
}

impl ScoredDoc {
    pub fn new(score: f32, address: DocAddress) -> Self {
        Self {
            score: OrderedFloat(score),
            address,
        }
    }
}

// Greater means worse, so the heap's top is the weakest kept candidate
impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.address.cmp(&other.address))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keeps the best `k` candidates seen so far
pub struct TopKCollector {
    k: usize,
    heap: BinaryHeap<ScoredDoc>,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(1024)),
        }
    }

    pub fn collect(&mut self, candidate: ScoredDoc) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek() {
            if candidate < *worst {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Candidates best first
    pub fn into_sorted(self) -> Vec<ScoredDoc> {
        self.heap.into_sorted_vec()
    }
}

/// Query execution result
#[derive(Debug, Default)]
pub struct QueryResult {
    pub hits: Vec<ScoredDoc>,
    /// Number of documents that matched, before top-K truncation
    pub total_hits: u64,
}

/// Query executor for running queries
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute `query` over `segments` and keep the `top_k` best matches
    pub fn execute(
        query: &Query,
        segments: &[Arc<SegmentReader>],
        bm25: Bm25Params,
        top_k: usize,
    ) -> Result<QueryResult> {
        query.validate()?;

        let mut terms = Vec::new();
        query.collect_terms(&mut terms);
        let mut fields = Vec::new();
        query.collect_fields(&mut fields);
        let stats = CollectionStats::gather(segments, &terms, &fields);

        let mut global = TopKCollector::new(top_k);
        let mut total_hits = 0;
        for segment in segments {
            let (local, hits) = Self::execute_segment(query, segment, &stats, bm25, top_k)?;
            total_hits += hits;
            for candidate in local.into_sorted() {
                global.collect(candidate);
            }
        }

        Ok(QueryResult {
            hits: global.into_sorted(),
            total_hits,
        })
    }

    fn execute_segment(
        query: &Query,
        segment: &SegmentReader,
        stats: &CollectionStats,
        bm25: Bm25Params,
        top_k: usize,
    ) -> Result<(TopKCollector, u64)> {
        let mut collector = TopKCollector::new(top_k);
        let ctx = SegmentContext::new(segment, stats, bm25);
        let Some(mut scorer) = query.scorer(&ctx)? else {
            return Ok((collector, 0));
        };

        let mut hits = 0;
        let mut doc = scorer.next_doc();
        while doc != NO_MORE_DOCS {
            hits += 1;
            if top_k > 0 {
                let address = DocAddress::new(segment.id(), DocNo(doc));
                collector.collect(ScoredDoc::new(scorer.score(), address));
            }
            doc = scorer.next_doc();
        }
        Ok((collector, hits))
    }
}
