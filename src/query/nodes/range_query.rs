//! Range scorer - matches numeric field values within inclusive bounds
//!
//! Numeric terms sort like the integers they encode, so a range is one
//! contiguous walk over the field's slice of the term dictionary. Matches
//! are collected into a bitmap and scored with a constant.

use roaring::RoaringBitmap;

use crate::error::Result;
use crate::query::ast::{Scorer, NO_MORE_DOCS};
use crate::query::context::SegmentContext;

const RANGE_SCORE: f32 = 1.0;

pub struct RangeScorer {
    docs: Vec<u32>,
    index: usize,
    started: bool,
}

impl RangeScorer {
    /// `lower` and `upper` are encoded term bytes, both inclusive
    pub fn create(ctx: &SegmentContext<'_>, field: &str, lower: &[u8], upper: &[u8]) -> Result<Option<Self>> {
        let reader = ctx.reader();
        let mut matches = RoaringBitmap::new();
        for (_, meta) in reader.terms().range(field, lower, upper) {
            for posting in reader.postings_for_meta(meta)? {
                matches.insert(posting.docno.0);
            }
        }
        if matches.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::from_bitmap(&matches)))
    }

    pub fn from_bitmap(matches: &RoaringBitmap) -> Self {
        Self {
            docs: matches.iter().collect(),
            index: 0,
            started: false,
        }
    }
}

impl Scorer for RangeScorer {
    fn doc(&self) -> u32 {
        if !self.started {
            return 0;
        }
        self.docs.get(self.index).copied().unwrap_or(NO_MORE_DOCS)
    }

    fn next_doc(&mut self) -> u32 {
        if self.started && self.index < self.docs.len() {
            self.index += 1;
        }
        self.started = true;
        self.doc()
    }

    fn advance(&mut self, target: u32) -> u32 {
        if self.started && self.doc() >= target {
            return self.doc();
        }
        self.started = true;
        self.index += self.docs[self.index..].partition_point(|&d| d < target);
        self.doc()
    }

    fn score(&mut self) -> f32 {
        RANGE_SCORE
    }

    fn cost(&self) -> u64 {
        self.docs.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::Query;
    use crate::query::context::CollectionStats;
    use crate::query::nodes::test_support::{docs, segment};
    use crate::segment::Bm25Params;

    fn range_matches(lower: Option<i64>, upper: Option<i64>, inclusive: bool) -> Vec<u32> {
        // "size" is 0, 10, 20, 30, 40
        let reader = segment(&["a", "b", "c", "d", "e"]);
        let stats = CollectionStats::default();
        let ctx = SegmentContext::new(&reader, &stats, Bm25Params::default());
        let query = Query::Range {
            field: "size".into(),
            lower,
            upper,
            include_lower: inclusive,
            include_upper: inclusive,
        };
        let found = match query.scorer(&ctx).unwrap() {
            Some(mut scorer) => docs(scorer.as_mut()),
            None => Vec::new(),
        };
        found
    }

    #[test]
    fn test_inclusive_range() {
        assert_eq!(range_matches(Some(10), Some(30), true), vec![1, 2, 3]);
    }

    #[test]
    fn test_exclusive_range() {
        assert_eq!(range_matches(Some(10), Some(30), false), vec![2]);
    }

    #[test]
    fn test_open_ended_ranges() {
        assert_eq!(range_matches(None, Some(10), true), vec![0, 1]);
        assert_eq!(range_matches(Some(35), None, true), vec![4]);
        assert_eq!(range_matches(None, None, true), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_range_without_matches() {
        assert!(range_matches(Some(11), Some(19), true).is_empty());
    }

    #[test]
    fn test_advance_uses_sorted_docs() {
        let bitmap: RoaringBitmap = [1u32, 5, 9].into_iter().collect();
        let mut scorer = RangeScorer::from_bitmap(&bitmap);
        assert_eq!(scorer.advance(2), 5);
        assert_eq!(scorer.advance(5), 5);
        assert_eq!(scorer.next_doc(), 9);
        assert_eq!(scorer.advance(10), NO_MORE_DOCS);
        assert_eq!(scorer.score(), RANGE_SCORE);
    }
}
