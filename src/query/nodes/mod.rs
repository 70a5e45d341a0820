//! Per-segment scorers, one module per query form
//!
//! Leaf scorers walk postings of a single segment; the boolean scorers
//! combine child scorers by intersecting, uniting or subtracting their
//! docno streams.

mod all_docs;
mod bool_query;
mod phrase_query;
mod range_query;
mod term_query;

pub use all_docs::AllDocsScorer;
pub use bool_query::{ConjunctionScorer, DisjunctionScorer, ReqExclScorer, ReqOptScorer};
pub use phrase_query::PhraseScorer;
pub use range_query::RangeScorer;
pub use term_query::TermScorer;
