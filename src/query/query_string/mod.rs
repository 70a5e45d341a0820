//! Lucene-style query string parser
//!
//! Supports syntax like:
//! - `fox` or `contents:fox` (bare words go to the default field)
//! - `quick AND fox -dog`, `+required optional`, `NOT fox`
//! - `"exact phrase"~2`
//! - `modified:[1700000000 TO *]`, `size:{10 TO 20}`
//! - `title:(rust OR go)`
//! - `*:*`
//!
//! # Example
//!
//! ```rust
//! use luca::query::query_string::QueryStringParser;
//! use luca::tokenizer::AnalyzerRegistry;
//!
//! let analyzers = AnalyzerRegistry::default();
//! let mut parser = QueryStringParser::new("contents:rust AND modified:[0 TO *]", &analyzers).unwrap();
//! let query = parser.parse().unwrap();
//! ```

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token};
pub use parser::{DefaultOperator, QueryStringParser};
