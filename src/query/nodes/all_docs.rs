//! All documents scorer - matches every live document of a segment

use crate::query::ast::{Scorer, NO_MORE_DOCS};
use crate::query::context::SegmentContext;
use crate::segment::{DocNo, LiveDocs};

const MATCH_ALL_SCORE: f32 = 1.0;

pub struct AllDocsScorer<'a> {
    live: &'a LiveDocs,
    max_doc: u32,
    doc: u32,
    started: bool,
}

impl<'a> AllDocsScorer<'a> {
    /// `None` for a segment without live documents
    pub fn create(ctx: &SegmentContext<'a>) -> Option<Self> {
        let reader = ctx.reader();
        if reader.live_doc_count() == 0 {
            return None;
        }
        Some(Self {
            live: reader.live_docs(),
            max_doc: reader.doc_count(),
            doc: 0,
            started: false,
        })
    }

    /// First live docno at or after `from`
    fn seek(&mut self, from: u32) -> u32 {
        self.started = true;
        self.doc = (from..self.max_doc)
            .find(|&d| self.live.is_live(DocNo(d)))
            .unwrap_or(NO_MORE_DOCS);
        self.doc
    }
}

impl Scorer for AllDocsScorer<'_> {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> u32 {
        if !self.started {
            return self.seek(0);
        }
        if self.doc == NO_MORE_DOCS {
            return NO_MORE_DOCS;
        }
        self.seek(self.doc + 1)
    }

    fn advance(&mut self, target: u32) -> u32 {
        if self.started && self.doc >= target {
            return self.doc;
        }
        self.seek(target)
    }

    fn score(&mut self) -> f32 {
        MATCH_ALL_SCORE
    }

    fn cost(&self) -> u64 {
        self.live.live_count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::context::CollectionStats;
    use crate::query::nodes::test_support::{docs, segment};
    use crate::segment::Bm25Params;

    #[test]
    fn test_all_docs_skips_deleted() {
        let reader = segment(&["a", "b", "c", "d"]);
        let live = reader
            .live_docs()
            .with_deleted([DocNo(1), DocNo(3)])
            .unwrap();
        let reader = reader.with_live_docs(live);
        let stats = CollectionStats::default();
        let ctx = SegmentContext::new(&reader, &stats, Bm25Params::default());

        let mut scorer = AllDocsScorer::create(&ctx).unwrap();
        assert_eq!(scorer.cost(), 2);
        assert_eq!(docs(&mut scorer), vec![0, 2]);
    }

    #[test]
    fn test_advance_past_end() {
        let reader = segment(&["a", "b"]);
        let stats = CollectionStats::default();
        let ctx = SegmentContext::new(&reader, &stats, Bm25Params::default());
        let mut scorer = AllDocsScorer::create(&ctx).unwrap();
        assert_eq!(scorer.advance(1), 1);
        assert_eq!(scorer.advance(5), NO_MORE_DOCS);
        assert_eq!(scorer.next_doc(), NO_MORE_DOCS);
    }
}
