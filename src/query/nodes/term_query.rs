//! Term scorer - exact match on a field, scored with BM25

use crate::error::Result;
use crate::query::ast::{Scorer, NO_MORE_DOCS};
use crate::query::context::SegmentContext;
use crate::segment::{Bm25Params, DocNo, LivePostings, Posting, SegmentReader, Term};

/// Walks the live postings of one term
pub struct TermScorer<'a> {
    postings: LivePostings<'a>,
    current: Option<Posting>,
    started: bool,
    reader: &'a SegmentReader,
    field: String,
    idf: f32,
    avg_field_length: f32,
    bm25: Bm25Params,
    cost: u64,
}

impl<'a> TermScorer<'a> {
    /// `None` when the segment does not contain the term
    pub fn create(ctx: &SegmentContext<'a>, term: Term) -> Result<Option<Self>> {
        let reader = ctx.reader();
        let Some(meta) = reader.posting_meta(&term) else {
            return Ok(None);
        };
        let postings = reader.postings_for_meta(meta)?;
        Ok(Some(Self {
            postings,
            current: None,
            started: false,
            reader,
            idf: ctx.stats().idf(&term),
            avg_field_length: ctx.stats().avg_field_length(term.field()),
            field: term.field().to_string(),
            bm25: ctx.bm25(),
            cost: meta.doc_frequency as u64,
        }))
    }

    fn position(&mut self, posting: Option<Posting>) -> u32 {
        self.started = true;
        self.current = posting;
        self.doc()
    }
}

impl Scorer for TermScorer<'_> {
    fn doc(&self) -> u32 {
        match &self.current {
            Some(p) => p.docno.0,
            None if self.started => NO_MORE_DOCS,
            None => 0,
        }
    }

    fn next_doc(&mut self) -> u32 {
        let next = self.postings.next();
        self.position(next)
    }

    fn advance(&mut self, target: u32) -> u32 {
        if self.started && self.doc() >= target {
            return self.doc();
        }
        let next = self.postings.skip_to(DocNo(target));
        self.position(next)
    }

    fn score(&mut self) -> f32 {
        let Some(posting) = &self.current else {
            return 0.0;
        };
        let field_length = self.reader.field_length(&self.field, posting.docno) as f32;
        self.idf
            * self
                .bm25
                .tf_norm(posting.term_frequency as f32, field_length, self.avg_field_length)
    }

    fn cost(&self) -> u64 {
        self.cost
    }
}
