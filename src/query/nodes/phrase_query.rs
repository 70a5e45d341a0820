//! Phrase scorer - matches token sequences with optional proximity/slop
//!
//! Candidate documents come from intersecting the postings of every phrase
//! term; each candidate is then verified against the stored positions.
//! With `slop` 0 the terms must sit at consecutive positions; a larger slop
//! allows that many extra positions between the first and last term, with
//! the terms still in order.

use crate::error::Result;
use crate::query::ast::{Scorer, NO_MORE_DOCS};
use crate::query::context::SegmentContext;
use crate::segment::{Bm25Params, DocNo, LivePostings, Posting, SegmentReader, Term};

pub struct PhraseScorer<'a> {
    postings: Vec<LivePostings<'a>>,
    current: Vec<Option<Posting>>,
    slop: u32,
    doc: u32,
    started: bool,
    freq: u32,
    reader: &'a SegmentReader,
    field: String,
    idf: f32,
    avg_field_length: f32,
    bm25: Bm25Params,
    cost: u64,
}

impl<'a> PhraseScorer<'a> {
    /// `None` when some phrase term is absent from the segment
    pub fn create(
        ctx: &SegmentContext<'a>,
        field: &str,
        terms: &[String],
        slop: u32,
    ) -> Result<Option<Self>> {
        let reader = ctx.reader();
        let mut postings = Vec::with_capacity(terms.len());
        let mut current = Vec::with_capacity(terms.len());
        let mut idf = 0.0;
        let mut cost = u64::MAX;

        for (i, text) in terms.iter().enumerate() {
            let term = Term::new(field, text.as_str());
            let Some(meta) = reader.posting_meta(&term) else {
                return Ok(None);
            };
            let mut list = reader.postings_for_meta(meta)?;
            // The lead is primed by next_doc/advance, followers right away
            current.push(if i == 0 { None } else { list.next() });
            postings.push(list);
            idf += ctx.stats().idf(&term);
            cost = cost.min(meta.doc_frequency as u64);
        }

        Ok(Some(Self {
            postings,
            current,
            slop,
            doc: 0,
            started: false,
            freq: 0,
            reader,
            field: field.to_string(),
            idf,
            avg_field_length: ctx.stats().avg_field_length(field),
            bm25: ctx.bm25(),
            cost: if cost == u64::MAX { 0 } else { cost },
        }))
    }

    /// From the lead's current posting, find the next doc holding the phrase
    fn align(&mut self) -> u32 {
        self.started = true;
        'search: loop {
            let Some(mut target) = self.current[0].as_ref().map(|p| p.docno.0) else {
                return self.exhaust();
            };

            for i in 1..self.postings.len() {
                let behind = self.current[i]
                    .as_ref()
                    .map_or(false, |p| p.docno.0 < target);
                if behind {
                    self.current[i] = self.postings[i].skip_to(DocNo(target));
                }
                match &self.current[i] {
                    None => return self.exhaust(),
                    Some(p) if p.docno.0 > target => {
                        target = p.docno.0;
                        self.current[0] = self.postings[0].skip_to(DocNo(target));
                        continue 'search;
                    }
                    Some(_) => {}
                }
            }

            let freq = self.phrase_freq();
            if freq > 0 {
                self.doc = target;
                self.freq = freq;
                return target;
            }
            self.current[0] = self.postings[0].next();
        }
    }

    fn exhaust(&mut self) -> u32 {
        self.doc = NO_MORE_DOCS;
        self.freq = 0;
        NO_MORE_DOCS
    }

    /// Number of start positions from which the whole phrase fits in the slop
    fn phrase_freq(&self) -> u32 {
        let positions: Vec<&[u32]> = self
            .current
            .iter()
            .map(|p| p.as_ref().map_or(&[][..], |p| p.positions.as_slice()))
            .collect();
        let span_limit = (positions.len() as u32 - 1) + self.slop;

        let mut freq = 0;
        'starts: for &start in positions[0] {
            let mut prev = start;
            for list in &positions[1..] {
                match list.iter().find(|&&p| p > prev) {
                    Some(&p) => prev = p,
                    None => continue 'starts,
                }
            }
            if prev - start <= span_limit {
                freq += 1;
            }
        }
        freq
    }
}

impl Scorer for PhraseScorer<'_> {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> u32 {
        self.current[0] = self.postings[0].next();
        self.align()
    }

    fn advance(&mut self, target: u32) -> u32 {
        if self.started && self.doc >= target {
            return self.doc;
        }
        self.current[0] = self.postings[0].skip_to(DocNo(target));
        self.align()
    }

    fn score(&mut self) -> f32 {
        if self.doc == NO_MORE_DOCS {
            return 0.0;
        }
        let field_length = self.reader.field_length(&self.field, DocNo(self.doc)) as f32;
        self.idf * self.bm25.tf_norm(self.freq as f32, field_length, self.avg_field_length)
    }

    fn cost(&self) -> u64 {
        self.cost
    }
}

#[cfg(test)]
mod tests {
    use crate::query::ast::Query;
    use crate::query::context::{CollectionStats, SegmentContext};
    use crate::query::nodes::test_support::{docs, segment};
    use crate::segment::Bm25Params;

    fn phrase_matches(texts: &[&str], terms: &[&str], slop: u32) -> Vec<u32> {
        let reader = segment(texts);
        let stats = CollectionStats::default();
        let ctx = SegmentContext::new(&reader, &stats, Bm25Params::default());
        let query = Query::phrase("contents", terms.iter().copied()).with_slop(slop);
        let found = match query.scorer(&ctx).unwrap() {
            Some(mut scorer) => docs(scorer.as_mut()),
            None => Vec::new(),
        };
        found
    }

    const TEXTS: [&str; 4] = [
        "the quick brown fox",
        "the brown quick fox",
        "quick and very brown",
        "a quick brown dog and a quick brown fox",
    ];

    #[test]
    fn test_exact_phrase() {
        assert_eq!(phrase_matches(&TEXTS, &["quick", "brown"], 0), vec![0, 3]);
        assert_eq!(phrase_matches(&TEXTS, &["brown", "quick"], 0), vec![1]);
        assert_eq!(phrase_matches(&TEXTS, &["quick", "brown", "fox"], 0), vec![0, 3]);
    }

    #[test]
    fn test_sloppy_phrase() {
        assert_eq!(phrase_matches(&TEXTS, &["quick", "brown"], 2), vec![0, 2, 3]);
        assert_eq!(phrase_matches(&TEXTS, &["quick", "fox"], 1), vec![0, 1, 3]);
    }

    #[test]
    fn test_phrase_with_unknown_term() {
        assert!(phrase_matches(&TEXTS, &["quick", "cat"], 0).is_empty());
    }

    #[test]
    fn test_repeated_phrase_counts_frequency() {
        let reader = segment(&["quick brown x quick brown", "quick brown x y z"]);
        let stats = CollectionStats::default();
        let ctx = SegmentContext::new(&reader, &stats, Bm25Params::default());
        let mut scorer = Query::phrase("contents", ["quick", "brown"])
            .scorer(&ctx)
            .unwrap()
            .unwrap();
        assert_eq!(scorer.next_doc(), 0);
        let twice = scorer.score();
        assert_eq!(scorer.next_doc(), 1);
        let once = scorer.score();
        assert!(twice > once);
    }
}
