//! Query execution context
//!
//! Scores must not depend on how documents are split across segments, so
//! document frequencies and average field lengths are gathered once over the
//! whole snapshot and shared by every per-segment scorer.

use std::collections::HashMap;
use std::sync::Arc;

use crate::segment::{idf, Bm25Params, SegmentReader, Term};

/// Collection-wide statistics for the terms and fields of one query
#[derive(Clone, Debug, Default)]
pub struct CollectionStats {
    total_docs: u64,
    doc_frequencies: HashMap<Term, u64>,
    avg_field_lengths: HashMap<String, f32>,
}

impl CollectionStats {
    /// Gather statistics for `terms` and `fields` across `segments`
    pub fn gather(segments: &[Arc<SegmentReader>], terms: &[Term], fields: &[String]) -> Self {
        let total_docs = segments.iter().map(|s| s.doc_count() as u64).sum();

        let doc_frequencies = terms
            .iter()
            .map(|term| {
                let df = segments.iter().map(|s| s.doc_frequency(term) as u64).sum();
                (term.clone(), df)
            })
            .collect();

        let avg_field_lengths = fields
            .iter()
            .map(|field| {
                let total: u64 = segments.iter().map(|s| s.stats().field_total(field)).sum();
                let avg = if total_docs == 0 {
                    0.0
                } else {
                    total as f32 / total_docs as f32
                };
                (field.clone(), avg)
            })
            .collect();

        Self {
            total_docs,
            doc_frequencies,
            avg_field_lengths,
        }
    }

    pub fn total_docs(&self) -> u64 {
        self.total_docs
    }

    pub fn doc_frequency(&self, term: &Term) -> u64 {
        self.doc_frequencies.get(term).copied().unwrap_or(0)
    }

    pub fn idf(&self, term: &Term) -> f32 {
        idf(self.doc_frequency(term), self.total_docs)
    }

    pub fn avg_field_length(&self, field: &str) -> f32 {
        self.avg_field_lengths.get(field).copied().unwrap_or(0.0)
    }
}

/// What a scorer tree needs while walking one segment
pub struct SegmentContext<'a> {
    reader: &'a SegmentReader,
    stats: &'a CollectionStats,
    bm25: Bm25Params,
}

impl<'a> SegmentContext<'a> {
    pub fn new(reader: &'a SegmentReader, stats: &'a CollectionStats, bm25: Bm25Params) -> Self {
        Self { reader, stats, bm25 }
    }

    pub fn reader(&self) -> &'a SegmentReader {
        self.reader
    }

    pub fn stats(&self) -> &'a CollectionStats {
        self.stats
    }

    pub fn bm25(&self) -> Bm25Params {
        self.bm25
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::segment::{SegmentId, SegmentWriter};
    use crate::tokenizer::AnalyzerRegistry;

    fn segment(id: u64, texts: &[&str]) -> Arc<SegmentReader> {
        let mut writer = SegmentWriter::new(Arc::new(AnalyzerRegistry::default()), "path");
        for (i, text) in texts.iter().enumerate() {
            let doc = Document::new()
                .with_keyword("path", format!("{id}-{i}"))
                .with_text("contents", *text);
            writer.add_document(&doc).unwrap();
        }
        Arc::new(writer.build(SegmentId::new(id)).unwrap().reader)
    }

    #[test]
    fn test_stats_span_segments() {
        let segments = vec![segment(1, &["a b", "a"]), segment(2, &["b c d"])];
        let terms = vec![Term::new("contents", "a"), Term::new("contents", "b")];
        let stats = CollectionStats::gather(&segments, &terms, &["contents".to_string()]);

        assert_eq!(stats.total_docs(), 3);
        assert_eq!(stats.doc_frequency(&terms[0]), 2);
        assert_eq!(stats.doc_frequency(&terms[1]), 2);
        assert_eq!(stats.doc_frequency(&Term::new("contents", "zzz")), 0);
        assert!((stats.avg_field_length("contents") - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rarer_term_has_higher_idf() {
        let segments = vec![segment(1, &["common rare", "common", "common"])];
        let rare = Term::new("contents", "rare");
        let common = Term::new("contents", "common");
        let stats = CollectionStats::gather(&segments, &[rare.clone(), common.clone()], &[]);
        assert!(stats.idf(&rare) > stats.idf(&common));
    }
}
