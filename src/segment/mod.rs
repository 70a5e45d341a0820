//! Segment-based inverted index storage
//!
//! Segments are immutable once flushed: postings, term dictionary, stored
//! fields and statistics never change. Deletions live in generation-numbered
//! bitmap files next to them.
//!
//! # Architecture
//!
//! - `SegmentWriter`: In-memory buffer of one writer session
//! - `SegmentReader`: Immutable segment reader seen through a live-docs generation
//! - `SegmentStore`: Directory layout, atomic writes and checksums
//! - `SegmentManifest`: The commit pointer naming the live segments

mod types;
pub mod statistics;
mod postings;
mod term_dict;
mod stored;
mod live_docs;
mod reader;
mod writer;
mod manifest;
pub mod merge;
mod store;

pub use types::*;
pub use statistics::{idf, Bm25Params, SegmentStatistics};
pub use postings::*;
pub use term_dict::*;
pub use stored::*;
pub use live_docs::*;
pub use reader::*;
pub use writer::*;
pub use manifest::*;
pub use merge::{
    merge_segments, MergeCandidate, MergePolicy, MergePolicyConfig, MergeReason, NoMergePolicy,
    TieredMergePolicy,
};
pub use store::*;
