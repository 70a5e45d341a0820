//! Query tree and the per-segment scorer contract
//!
//! A `Query` is a plain description: it holds no index state and can be
//! serialized, cloned and reused across searchers. Executing it against one
//! segment produces a tree of `Scorer`s that walk the segment's postings in
//! docno order.

use serde::{Deserialize, Serialize};

use super::context::SegmentContext;
use super::nodes::{
    AllDocsScorer, ConjunctionScorer, DisjunctionScorer, PhraseScorer, RangeScorer,
    ReqExclScorer, ReqOptScorer, TermScorer,
};
use crate::error::{LucaError, Result};
use crate::segment::{encode_i64, Term};

/// Docno reported by an exhausted scorer
pub const NO_MORE_DOCS: u32 = u32::MAX;

/// Structured query over the indexed fields
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    /// Exact match of one already-normalized token
    Term { field: String, text: String },
    /// Boolean composition; `must_not` clauses never contribute to the score
    Bool {
        #[serde(default)]
        must: Vec<Query>,
        #[serde(default)]
        should: Vec<Query>,
        #[serde(default)]
        must_not: Vec<Query>,
    },
    /// Tokens at consecutive positions, allowing `slop` extra positions
    Phrase {
        field: String,
        terms: Vec<String>,
        #[serde(default)]
        slop: u32,
    },
    /// Numeric range; a missing bound is unbounded
    Range {
        field: String,
        #[serde(default)]
        lower: Option<i64>,
        #[serde(default)]
        upper: Option<i64>,
        #[serde(default = "inclusive")]
        include_lower: bool,
        #[serde(default = "inclusive")]
        include_upper: bool,
    },
    MatchAll,
}

fn inclusive() -> bool {
    true
}

impl Query {
    pub fn term(field: impl Into<String>, text: impl Into<String>) -> Self {
        Query::Term {
            field: field.into(),
            text: text.into(),
        }
    }

    pub fn phrase<S: Into<String>>(field: impl Into<String>, terms: impl IntoIterator<Item = S>) -> Self {
        Query::Phrase {
            field: field.into(),
            terms: terms.into_iter().map(Into::into).collect(),
            slop: 0,
        }
    }

    /// Inclusive numeric range
    pub fn range(field: impl Into<String>, lower: Option<i64>, upper: Option<i64>) -> Self {
        Query::Range {
            field: field.into(),
            lower,
            upper,
            include_lower: true,
            include_upper: true,
        }
    }

    pub fn match_all() -> Self {
        Query::MatchAll
    }

    /// Every clause must match
    pub fn and(clauses: Vec<Query>) -> Self {
        Query::Bool {
            must: clauses,
            should: Vec::new(),
            must_not: Vec::new(),
        }
    }

    /// At least one clause must match
    pub fn or(clauses: Vec<Query>) -> Self {
        Query::Bool {
            must: Vec::new(),
            should: clauses,
            must_not: Vec::new(),
        }
    }

    /// Documents matching `self` but not `excluded`
    pub fn but_not(self, excluded: Query) -> Self {
        match self {
            Query::Bool {
                must,
                should,
                mut must_not,
            } if !must.is_empty() || !should.is_empty() => {
                must_not.push(excluded);
                Query::Bool {
                    must,
                    should,
                    must_not,
                }
            }
            other => Query::Bool {
                must: vec![other],
                should: Vec::new(),
                must_not: vec![excluded],
            },
        }
    }

    /// Set the slop of a phrase query; other queries are returned unchanged
    pub fn with_slop(self, slop: u32) -> Self {
        match self {
            Query::Phrase { field, terms, .. } => Query::Phrase { field, terms, slop },
            other => other,
        }
    }

    pub fn query_type(&self) -> &'static str {
        match self {
            Query::Term { .. } => "term",
            Query::Bool { .. } => "bool",
            Query::Phrase { .. } => "phrase",
            Query::Range { .. } => "range",
            Query::MatchAll => "match_all",
        }
    }

    /// Reject queries that can never be executed
    pub fn validate(&self) -> Result<()> {
        match self {
            Query::Term { field, .. } | Query::Range { field, .. } if field.is_empty() => {
                Err(LucaError::InvalidQuery(format!("{} query without a field", self.query_type())))
            }
            Query::Phrase { field, terms, .. } => {
                if field.is_empty() {
                    return Err(LucaError::InvalidQuery("phrase query without a field".into()));
                }
                if terms.is_empty() {
                    return Err(LucaError::InvalidQuery(format!("empty phrase on field {field}")));
                }
                Ok(())
            }
            Query::Bool {
                must,
                should,
                must_not,
            } => {
                for clause in must.iter().chain(should).chain(must_not) {
                    clause.validate()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Every term whose collection statistics the scorers need
    pub fn collect_terms(&self, out: &mut Vec<Term>) {
        match self {
            Query::Term { field, text } => out.push(Term::new(field.as_str(), text.as_str())),
            Query::Phrase { field, terms, .. } => {
                out.extend(terms.iter().map(|t| Term::new(field.as_str(), t.as_str())))
            }
            Query::Bool { must, should, .. } => {
                for clause in must.iter().chain(should) {
                    clause.collect_terms(out);
                }
            }
            Query::Range { .. } | Query::MatchAll => {}
        }
    }

    /// Fields whose average length the scorers need
    pub fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            Query::Term { field, .. } | Query::Phrase { field, .. } => {
                if !out.contains(field) {
                    out.push(field.clone());
                }
            }
            Query::Bool { must, should, .. } => {
                for clause in must.iter().chain(should) {
                    clause.collect_fields(out);
                }
            }
            Query::Range { .. } | Query::MatchAll => {}
        }
    }

    /// Build the scorer tree for one segment; `None` when nothing can match
    pub fn scorer<'a>(&self, ctx: &SegmentContext<'a>) -> Result<Option<Box<dyn Scorer + 'a>>> {
        match self {
            Query::Term { field, text } => {
                Ok(TermScorer::create(ctx, Term::new(field.as_str(), text.as_str()))?
                    .map(|s| Box::new(s) as Box<dyn Scorer + 'a>))
            }
            Query::Phrase { field, terms, slop } => {
                if terms.len() == 1 {
                    return Query::term(field.as_str(), terms[0].as_str()).scorer(ctx);
                }
                Ok(PhraseScorer::create(ctx, field, terms, *slop)?
                    .map(|s| Box::new(s) as Box<dyn Scorer + 'a>))
            }
            Query::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let Some((lo, hi)) = inclusive_bounds(*lower, *upper, *include_lower, *include_upper)
                else {
                    return Ok(None);
                };
                Ok(RangeScorer::create(ctx, field, &encode_i64(lo), &encode_i64(hi))?
                    .map(|s| Box::new(s) as Box<dyn Scorer + 'a>))
            }
            Query::MatchAll => Ok(AllDocsScorer::create(ctx).map(|s| Box::new(s) as Box<dyn Scorer + 'a>)),
            Query::Bool {
                must,
                should,
                must_not,
            } => bool_scorer(ctx, must, should, must_not),
        }
    }
}

fn bool_scorer<'a>(
    ctx: &SegmentContext<'a>,
    must: &[Query],
    should: &[Query],
    must_not: &[Query],
) -> Result<Option<Box<dyn Scorer + 'a>>> {
    let mut required = Vec::with_capacity(must.len());
    for clause in must {
        match clause.scorer(ctx)? {
            Some(scorer) => required.push(scorer),
            // A required clause with no match empties the whole conjunction
            None => return Ok(None),
        }
    }

    let mut optional = Vec::with_capacity(should.len());
    for clause in should {
        if let Some(scorer) = clause.scorer(ctx)? {
            optional.push(scorer);
        }
    }

    let mut excluded = Vec::with_capacity(must_not.len());
    for clause in must_not {
        if let Some(scorer) = clause.scorer(ctx)? {
            excluded.push(scorer);
        }
    }

    let optional = match optional.len() {
        0 => None,
        1 => optional.pop(),
        _ => Some(Box::new(DisjunctionScorer::new(optional)) as Box<dyn Scorer + 'a>),
    };

    let base: Box<dyn Scorer + 'a> = if !required.is_empty() {
        let req = match required.len() {
            1 => required.remove(0),
            _ => Box::new(ConjunctionScorer::new(required)),
        };
        match optional {
            Some(opt) => Box::new(ReqOptScorer::new(req, opt)),
            None => req,
        }
    } else if let Some(opt) = optional {
        opt
    } else if !must.is_empty() || !should.is_empty() {
        // Positive clauses exist but none can match in this segment
        return Ok(None);
    } else if !must_not.is_empty() {
        // Purely negative: everything except the excluded documents
        match AllDocsScorer::create(ctx) {
            Some(all) => Box::new(all),
            None => return Ok(None),
        }
    } else {
        return Ok(None);
    };

    let excluded = match excluded.len() {
        0 => return Ok(Some(base)),
        1 => excluded.remove(0),
        _ => Box::new(DisjunctionScorer::new(excluded)),
    };
    Ok(Some(Box::new(ReqExclScorer::new(base, excluded))))
}

/// Normalize a numeric range to inclusive bounds; `None` if it is empty
pub(crate) fn inclusive_bounds(
    lower: Option<i64>,
    upper: Option<i64>,
    include_lower: bool,
    include_upper: bool,
) -> Option<(i64, i64)> {
    let lo = match lower {
        None => i64::MIN,
        Some(v) if include_lower => v,
        Some(v) => v.checked_add(1)?,
    };
    let hi = match upper {
        None => i64::MAX,
        Some(v) if include_upper => v,
        Some(v) => v.checked_sub(1)?,
    };
    (lo <= hi).then_some((lo, hi))
}

/// Doc-at-a-time iterator over the matches of a query in one segment.
///
/// A fresh scorer is unpositioned; `doc()` is only meaningful after the
/// first `next_doc` or `advance`. Once exhausted it reports `NO_MORE_DOCS`.
pub trait Scorer {
    /// Current docno
    fn doc(&self) -> u32;

    /// Move to the next match
    fn next_doc(&mut self) -> u32;

    /// Move to the first match at or after `target`; `target` is greater
    /// than the current docno
    fn advance(&mut self, target: u32) -> u32;

    /// Score of the current match
    fn score(&mut self) -> f32;

    /// Upper bound on the number of matches, used to order conjunctions
    fn cost(&self) -> u64;
}
