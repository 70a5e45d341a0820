//! Boolean scorers - combine child scorers with AND, OR, NOT semantics
//!
//! - `ConjunctionScorer`: every child matches (sorted intersection)
//! - `DisjunctionScorer`: at least one child matches (sorted union)
//! - `ReqExclScorer`: required matches minus excluded matches
//! - `ReqOptScorer`: required matches, with optional children adding score

use crate::query::ast::{Scorer, NO_MORE_DOCS};

/// Intersection of child scorers; the score is the sum of child scores
pub struct ConjunctionScorer<'a> {
    scorers: Vec<Box<dyn Scorer + 'a>>,
    doc: u32,
    started: bool,
}

impl<'a> ConjunctionScorer<'a> {
    pub fn new(mut scorers: Vec<Box<dyn Scorer + 'a>>) -> Self {
        // Rarest clause leads
        scorers.sort_by_key(|s| s.cost());
        Self {
            scorers,
            doc: 0,
            started: false,
        }
    }

    /// Leapfrog until every child sits on the lead's docno
    fn align(&mut self, mut target: u32) -> u32 {
        self.started = true;
        'search: while target != NO_MORE_DOCS {
            for i in 1..self.scorers.len() {
                let doc = self.scorers[i].advance(target);
                if doc > target {
                    target = self.scorers[0].advance(doc);
                    continue 'search;
                }
            }
            break;
        }
        self.doc = target;
        target
    }
}

impl Scorer for ConjunctionScorer<'_> {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> u32 {
        let lead = self.scorers[0].next_doc();
        self.align(lead)
    }

    fn advance(&mut self, target: u32) -> u32 {
        if self.started && self.doc >= target {
            return self.doc;
        }
        let lead = self.scorers[0].advance(target);
        self.align(lead)
    }

    fn score(&mut self) -> f32 {
        self.scorers.iter_mut().map(|s| s.score()).sum()
    }

    fn cost(&self) -> u64 {
        self.scorers.iter().map(|s| s.cost()).min().unwrap_or(0)
    }
}

/// Union of child scorers; the score sums the children on the current docno
pub struct DisjunctionScorer<'a> {
    scorers: Vec<Box<dyn Scorer + 'a>>,
    doc: u32,
    started: bool,
}

impl<'a> DisjunctionScorer<'a> {
    pub fn new(scorers: Vec<Box<dyn Scorer + 'a>>) -> Self {
        Self {
            scorers,
            doc: 0,
            started: false,
        }
    }

    fn settle(&mut self) -> u32 {
        self.started = true;
        self.doc = self
            .scorers
            .iter()
            .map(|s| s.doc())
            .min()
            .unwrap_or(NO_MORE_DOCS);
        self.doc
    }
}

impl Scorer for DisjunctionScorer<'_> {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> u32 {
        if !self.started {
            for scorer in &mut self.scorers {
                scorer.next_doc();
            }
        } else if self.doc != NO_MORE_DOCS {
            let current = self.doc;
            for scorer in &mut self.scorers {
                if scorer.doc() == current {
                    scorer.next_doc();
                }
            }
        }
        self.settle()
    }

    fn advance(&mut self, target: u32) -> u32 {
        if self.started && self.doc >= target {
            return self.doc;
        }
        for scorer in &mut self.scorers {
            scorer.advance(target);
        }
        self.settle()
    }

    fn score(&mut self) -> f32 {
        let current = self.doc;
        self.scorers
            .iter_mut()
            .filter(|s| s.doc() == current)
            .map(|s| s.score())
            .sum()
    }

    fn cost(&self) -> u64 {
        self.scorers.iter().map(|s| s.cost()).sum()
    }
}

/// Required matches that the excluded scorer does not match
pub struct ReqExclScorer<'a> {
    required: Box<dyn Scorer + 'a>,
    excluded: Box<dyn Scorer + 'a>,
}

impl<'a> ReqExclScorer<'a> {
    pub fn new(required: Box<dyn Scorer + 'a>, excluded: Box<dyn Scorer + 'a>) -> Self {
        Self { required, excluded }
    }

    fn skip_excluded(&mut self, mut doc: u32) -> u32 {
        while doc != NO_MORE_DOCS && self.excluded.advance(doc) == doc {
            doc = self.required.next_doc();
        }
        doc
    }
}

impl Scorer for ReqExclScorer<'_> {
    fn doc(&self) -> u32 {
        self.required.doc()
    }

    fn next_doc(&mut self) -> u32 {
        let doc = self.required.next_doc();
        self.skip_excluded(doc)
    }

    fn advance(&mut self, target: u32) -> u32 {
        let doc = self.required.advance(target);
        self.skip_excluded(doc)
    }

    fn score(&mut self) -> f32 {
        self.required.score()
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }
}

/// Required matches; the optional scorer only adds to their score
pub struct ReqOptScorer<'a> {
    required: Box<dyn Scorer + 'a>,
    optional: Box<dyn Scorer + 'a>,
}

impl<'a> ReqOptScorer<'a> {
    pub fn new(required: Box<dyn Scorer + 'a>, optional: Box<dyn Scorer + 'a>) -> Self {
        Self { required, optional }
    }
}

impl Scorer for ReqOptScorer<'_> {
    fn doc(&self) -> u32 {
        self.required.doc()
    }

    fn next_doc(&mut self) -> u32 {
        self.required.next_doc()
    }

    fn advance(&mut self, target: u32) -> u32 {
        self.required.advance(target)
    }

    fn score(&mut self) -> f32 {
        let doc = self.required.doc();
        let mut score = self.required.score();
        if self.optional.advance(doc) == doc {
            score += self.optional.score();
        }
        score
    }

    fn cost(&self) -> u64 {
        self.required.cost()
    }
}
