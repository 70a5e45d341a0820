//! Immutable segment reader
//!
//! Each segment reader provides access to postings, term dictionary, stored
//! fields and segment statistics, seen through one live-docs generation.
//! Readers are shared behind `Arc`; a new live-docs generation yields a new
//! reader that shares every immutable part with the old one.

use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;

use super::live_docs::LiveDocs;
use super::postings::{PostingIterator, PostingsReader};
use super::statistics::SegmentStatistics;
use super::stored::StoredFields;
use super::term_dict::TermDictionary;
use super::types::{DocNo, Posting, PostingListMeta, SegmentId, Term};
use crate::error::{LucaError, Result};
use crate::models::Document;

/// Metadata written last into a segment directory; its presence marks the
/// segment complete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentMeta {
    /// Unique segment identifier
    pub id: SegmentId,
    /// Number of documents in the segment, deleted ones included
    pub doc_count: u32,
    /// Size in bytes of the immutable data files
    pub size_bytes: u64,
    /// Creation timestamp
    pub created_at: u64,
    /// CRC32 over all immutable data files
    pub checksum: u64,
}

/// Immutable segment reader backed by in-memory data
pub struct SegmentReader {
    meta: SegmentMeta,
    terms: Arc<TermDictionary>,
    postings: Arc<PostingsReader>,
    stored: Arc<StoredFields>,
    stats: Arc<SegmentStatistics>,
    live: Arc<LiveDocs>,
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("id", &self.meta.id)
            .field("doc_count", &self.meta.doc_count)
            .field("live_doc_count", &self.live.live_count())
            .field("live_generation", &self.live.generation())
            .finish()
    }
}

impl SegmentReader {
    pub fn from_parts(
        meta: SegmentMeta,
        terms: TermDictionary,
        postings: PostingsReader,
        stored: StoredFields,
        stats: SegmentStatistics,
        live: LiveDocs,
    ) -> Self {
        Self {
            meta,
            terms: Arc::new(terms),
            postings: Arc::new(postings),
            stored: Arc::new(stored),
            stats: Arc::new(stats),
            live: Arc::new(live),
        }
    }

    /// Same segment seen through another live-docs generation
    pub fn with_live_docs(&self, live: LiveDocs) -> Self {
        Self {
            meta: self.meta.clone(),
            terms: Arc::clone(&self.terms),
            postings: Arc::clone(&self.postings),
            stored: Arc::clone(&self.stored),
            stats: Arc::clone(&self.stats),
            live: Arc::new(live),
        }
    }

    pub fn meta(&self) -> &SegmentMeta {
        &self.meta
    }

    pub fn id(&self) -> SegmentId {
        self.meta.id
    }

    pub fn terms(&self) -> &TermDictionary {
        &self.terms
    }

    pub fn postings(&self) -> &PostingsReader {
        &self.postings
    }

    pub fn stats(&self) -> &SegmentStatistics {
        &self.stats
    }

    pub fn stored(&self) -> &StoredFields {
        &self.stored
    }

    pub fn live_docs(&self) -> &LiveDocs {
        &self.live
    }

    pub fn posting_meta(&self, term: &Term) -> Option<&PostingListMeta> {
        self.terms.get(term)
    }

    /// Raw postings for a term, deleted documents included
    pub fn lookup(&self, term: &Term) -> io::Result<Option<PostingIterator<'_>>> {
        match self.terms.get(term) {
            Some(meta) => Ok(Some(self.postings.get_postings(meta)?)),
            None => Ok(None),
        }
    }

    /// Postings of a term restricted to live documents
    pub fn document_ordinals(&self, term: &Term) -> io::Result<Option<LivePostings<'_>>> {
        Ok(self.lookup(term)?.map(|inner| LivePostings {
            inner,
            live: &self.live,
        }))
    }

    pub fn postings_for_meta(&self, meta: &PostingListMeta) -> io::Result<LivePostings<'_>> {
        Ok(LivePostings {
            inner: self.postings.get_postings(meta)?,
            live: &self.live,
        })
    }

    /// Live docnos containing the term
    pub fn live_docnos(&self, term: &Term) -> io::Result<Vec<DocNo>> {
        Ok(match self.document_ordinals(term)? {
            Some(postings) => postings.map(|p| p.docno).collect(),
            None => Vec::new(),
        })
    }

    /// Get document frequency for a term, deleted documents included
    pub fn doc_frequency(&self, term: &Term) -> u32 {
        self.terms.get(term).map_or(0, |m| m.doc_frequency)
    }

    pub fn is_live(&self, docno: DocNo) -> bool {
        self.live.is_live(docno)
    }

    pub fn field_length(&self, field: &str, docno: DocNo) -> u32 {
        self.stats.field_length(field, docno)
    }

    /// Stored document of a live docno
    pub fn retrieve(&self, docno: DocNo) -> Result<Document> {
        if docno.0 >= self.meta.doc_count {
            return Err(LucaError::DocumentNotFound(format!(
                "{} has no docno {}",
                self.meta.id, docno
            )));
        }
        if !self.live.is_live(docno) {
            return Err(LucaError::DeletedDocument {
                segment: self.meta.id,
                docno,
            });
        }
        Ok(self.stored.get(docno)?)
    }

    /// Value of the keyword id field of a document, if present
    pub fn document_id(&self, docno: DocNo, id_field: &str) -> Option<String> {
        self.stored
            .get(docno)
            .ok()
            .and_then(|doc| doc.get_str(id_field).map(str::to_string))
    }

    /// Number of documents in the segment, deleted ones included
    pub fn doc_count(&self) -> u32 {
        self.meta.doc_count
    }

    pub fn live_doc_count(&self) -> u32 {
        self.live.live_count()
    }

    pub fn delete_ratio(&self) -> f64 {
        if self.meta.doc_count == 0 {
            0.0
        } else {
            1.0 - (self.live_doc_count() as f64 / self.meta.doc_count as f64)
        }
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

/// Posting iterator that skips deleted documents
pub struct LivePostings<'a> {
    inner: PostingIterator<'a>,
    live: &'a LiveDocs,
}

impl<'a> LivePostings<'a> {
    /// First live posting with docno >= target
    pub fn skip_to(&mut self, target: DocNo) -> Option<Posting> {
        let first = self.inner.skip_to(target)?;
        if self.live.is_live(first.docno) {
            return Some(first);
        }
        self.next()
    }
}

impl<'a> Iterator for LivePostings<'a> {
    type Item = Posting;

    fn next(&mut self) -> Option<Posting> {
        let live = self.live;
        self.inner.by_ref().find(|p| live.is_live(p.docno))
    }
}
