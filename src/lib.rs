//! Luca: an embedded full-text search engine.
//!
//! Documents are analyzed into an inverted index made of immutable
//! segments. A single writer per directory buffers changes and publishes
//! them atomically on commit; any number of searchers read consistent
//! point-in-time snapshots while the writer keeps working.

pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod query;
pub mod segment;
pub mod tokenizer;

pub use config::{AnalyzerKind, IndexSettings, OpenMode, TokenizerConfig};
pub use error::{LucaError, Result};
pub use index::{Index, IndexSnapshot, IndexState};
pub use models::*;
pub use query::{DefaultOperator, Query, QueryStringParser, Searcher};
pub use segment::{DocAddress, DocNo, SegmentId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
