//! Query model and execution engine
//!
//! Queries are plain values (`Query`) that can be built in code, parsed
//! from a Lucene-style query string, or deserialized from JSON:
//!
//! ```json
//! {
//!   "bool": {
//!     "must": [{ "term": { "field": "contents", "text": "rust" } }],
//!     "must_not": [{ "range": { "field": "modified", "upper": 1700000000 } }]
//!   }
//! }
//! ```
//!
//! Execution compiles a query into per-segment scorers, scores matches with
//! BM25 against collection-wide statistics and merges the per-segment top-K
//! lists into one ranking.

pub mod ast;
pub mod context;
pub mod executor;
pub mod nodes;
pub mod query_string;
mod searcher;

pub use ast::{Query, Scorer, NO_MORE_DOCS};
pub use context::{CollectionStats, SegmentContext};
pub use executor::{QueryExecutor, QueryResult, ScoredDoc, TopKCollector};
pub use query_string::{DefaultOperator, QueryStringParser};
pub use searcher::Searcher;
