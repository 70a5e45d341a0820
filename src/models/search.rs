use serde::{Deserialize, Serialize};

use crate::segment::DocAddress;

/// Search result with relevance score
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Internal address of the document inside the searcher's snapshot
    pub address: DocAddress,
    /// Value of the id field, when the document carries one
    pub id: Option<String>,
    pub score: f32,
}

/// Search response with timing information
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TopDocs {
    pub hits: Vec<SearchHit>,
    /// Number of documents that matched, before top-K truncation
    pub total_hits: u64,
    pub took_ms: u64,
}

impl TopDocs {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}
