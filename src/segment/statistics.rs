//! Segment statistics for BM25 scoring
//!
//! Each segment stores per-field document lengths. Searchers sum lengths and
//! document counts across their snapshot to get collection-wide averages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::DocNo;

/// BM25 parameters
///
/// Length normalization is off by default: with `b > 0` an extra
/// occurrence of one matched term lengthens the field and lowers the
/// contribution of every other matched term, so a document can lose score
/// by matching more.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation parameter
    pub k1: f32,
    /// Length normalization parameter
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.0 }
    }
}

impl Bm25Params {
    /// Classic BM25 with length normalization
    pub fn length_normalized() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Params {
    /// Term-frequency component, normalized by field length
    pub fn tf_norm(&self, tf: f32, field_len: f32, avg_field_len: f32) -> f32 {
        if tf <= 0.0 {
            return 0.0;
        }
        let norm = if avg_field_len > 0.0 {
            1.0 - self.b + self.b * (field_len / avg_field_len)
        } else {
            1.0
        };
        (tf * (self.k1 + 1.0)) / (tf + self.k1 * norm)
    }
}

/// IDF with Robertson-Sparck-Jones formula, always positive
pub fn idf(doc_freq: u64, total_docs: u64) -> f32 {
    let n = total_docs.max(doc_freq) as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Token counts of one field across the documents of a segment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FieldLengths {
    /// Length by docno, zero where the document lacks the field
    lengths: Vec<u32>,
    total: u64,
}

impl FieldLengths {
    fn set(&mut self, docno: DocNo, len: u32) {
        let idx = docno.as_usize();
        if self.lengths.len() <= idx {
            self.lengths.resize(idx + 1, 0);
        }
        self.total += len as u64;
        self.lengths[idx] += len;
    }

    pub fn get(&self, docno: DocNo) -> u32 {
        self.lengths.get(docno.as_usize()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Statistics for a single segment
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SegmentStatistics {
    /// Total number of documents in this segment, deleted ones included
    pub doc_count: u32,
    fields: BTreeMap<String, FieldLengths>,
}

impl SegmentStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next document with its per-field token counts
    pub fn add_document<'a>(&mut self, lengths: impl IntoIterator<Item = (&'a str, u32)>) -> DocNo {
        let docno = DocNo::new(self.doc_count);
        for (field, len) in lengths {
            self.fields
                .entry(field.to_string())
                .or_default()
                .set(docno, len);
        }
        self.doc_count += 1;
        docno
    }

    /// Append `docno` of `other` as the next document of this segment
    pub fn append_from(&mut self, other: &SegmentStatistics, docno: DocNo) -> DocNo {
        let lengths: Vec<(&str, u32)> = other
            .fields
            .iter()
            .map(|(field, lens)| (field.as_str(), lens.get(docno)))
            .filter(|(_, len)| *len > 0)
            .collect();
        self.add_document(lengths)
    }

    /// Token count of `field` in a document
    pub fn field_length(&self, field: &str, docno: DocNo) -> u32 {
        self.fields.get(field).map_or(0, |f| f.get(docno))
    }

    /// Sum of token counts of `field` over every document
    pub fn field_total(&self, field: &str) -> u64 {
        self.fields.get(field).map_or(0, |f| f.total())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Get average length of a field
    pub fn avg_field_length(&self, field: &str) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.field_total(field) as f32 / self.doc_count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_basic() {
        let mut stats = SegmentStatistics::new();
        let d0 = stats.add_document([("body", 10), ("title", 2)]);
        let d1 = stats.add_document([("body", 20)]);
        assert_eq!(d0, DocNo(0));
        assert_eq!(d1, DocNo(1));
        assert_eq!(stats.doc_count, 2);
        assert_eq!(stats.field_length("body", d1), 20);
        assert_eq!(stats.field_length("title", d1), 0);
        assert_eq!(stats.field_total("body"), 30);
        assert!((stats.avg_field_length("body") - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_append_from() {
        let mut src = SegmentStatistics::new();
        src.add_document([("body", 3)]);
        src.add_document([("body", 7)]);

        let mut dst = SegmentStatistics::new();
        let new_docno = dst.append_from(&src, DocNo(1));
        assert_eq!(new_docno, DocNo(0));
        assert_eq!(dst.field_length("body", DocNo(0)), 7);
    }

    #[test]
    fn test_idf_decreases_with_df() {
        assert!(idf(1, 100) > idf(10, 100));
        assert!(idf(100, 100) > 0.0);
    }

    #[test]
    fn test_default_ignores_field_length() {
        let p = Bm25Params::default();
        assert_eq!(p.tf_norm(1.0, 3.0, 10.0), p.tf_norm(1.0, 300.0, 10.0));
        // Normalized scoring penalizes the longer field
        let normalized = Bm25Params::length_normalized();
        assert!(normalized.tf_norm(1.0, 4.0, 3.0) < normalized.tf_norm(1.0, 3.0, 3.0));
    }

    #[test]
    fn test_tf_norm_monotone() {
        let p = Bm25Params::default();
        let a = p.tf_norm(1.0, 10.0, 10.0);
        let b = p.tf_norm(2.0, 11.0, 10.0);
        assert!(b > a);
        assert_eq!(p.tf_norm(0.0, 1.0, 1.0), 0.0);
    }
}
