//! Term dictionary using FST (Finite State Transducer)
//!
//! Keys are encoded terms (`field ++ 0x00 ++ token`), so a field's terms form
//! one contiguous key range and numeric tokens sort in numeric order.

use std::io;

use fst::{IntoStreamer, Map, MapBuilder, Streamer};

use super::types::{encode_term_key, PostingListMeta, Term, TERM_SEPARATOR};

/// Term dictionary backed by FST
///
/// The FST stores a u64 value which indexes into a metadata array.
pub struct TermDictionary {
    fst: Map<Vec<u8>>,
    metadata: Vec<PostingListMeta>,
}

impl std::fmt::Debug for TermDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermDictionary")
            .field("terms", &self.metadata.len())
            .finish()
    }
}

impl TermDictionary {
    /// Create a term dictionary from FST data and metadata
    pub fn new(fst_data: Vec<u8>, metadata: Vec<PostingListMeta>) -> io::Result<Self> {
        let fst = Map::new(fst_data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if fst.len() != metadata.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "term dictionary has {} keys but {} metadata entries",
                    fst.len(),
                    metadata.len()
                ),
            ));
        }
        Ok(Self { fst, metadata })
    }

    /// Look up a term and return its postings metadata
    pub fn get(&self, term: &Term) -> Option<&PostingListMeta> {
        self.get_key(&term.encode())
    }

    pub fn get_key(&self, key: &[u8]) -> Option<&PostingListMeta> {
        self.fst
            .get(key)
            .and_then(|idx| self.metadata.get(idx as usize))
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.fst.contains_key(term.encode())
    }

    /// Get the number of terms
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Terms of `field` whose token bytes fall within `[lower, upper]`
    pub fn range(&self, field: &str, lower: &[u8], upper: &[u8]) -> Vec<(Term, &PostingListMeta)> {
        let lo = encode_term_key(field, lower);
        let hi = encode_term_key(field, upper);
        let mut stream = self.fst.range().ge(&lo).le(&hi).into_stream();
        let mut results = Vec::new();
        while let Some((key, idx)) = stream.next() {
            if let (Some(term), Some(meta)) = (Term::decode(key), self.metadata.get(idx as usize)) {
                results.push((term, meta));
            }
        }
        results
    }

    /// All terms of one field, in token order
    pub fn field_terms(&self, field: &str) -> Vec<(Term, &PostingListMeta)> {
        let lo = encode_term_key(field, &[]);
        let mut hi = field.as_bytes().to_vec();
        hi.push(TERM_SEPARATOR + 1);
        let mut stream = self.fst.range().ge(&lo).lt(&hi).into_stream();
        let mut results = Vec::new();
        while let Some((key, idx)) = stream.next() {
            if let (Some(term), Some(meta)) = (Term::decode(key), self.metadata.get(idx as usize)) {
                results.push((term, meta));
            }
        }
        results
    }

    /// Ordered cursor over every encoded key in the dictionary
    pub fn cursor(&self) -> TermCursor<'_> {
        TermCursor {
            stream: self.fst.stream(),
            metadata: &self.metadata,
        }
    }

    /// Get the raw FST data (for serialization)
    pub fn fst_bytes(&self) -> &[u8] {
        self.fst.as_fst().as_bytes()
    }

    /// Get the metadata array (for serialization)
    pub fn metadata(&self) -> &[PostingListMeta] {
        &self.metadata
    }
}

/// Streaming walk over the dictionary in key order
pub struct TermCursor<'a> {
    stream: fst::map::Stream<'a>,
    metadata: &'a [PostingListMeta],
}

impl<'a> TermCursor<'a> {
    pub fn advance(&mut self) -> Option<(Vec<u8>, &'a PostingListMeta)> {
        let metadata = self.metadata;
        let (key, idx) = self.stream.next()?;
        let meta = metadata.get(idx as usize)?;
        Some((key.to_vec(), meta))
    }
}

/// Builder for term dictionaries
pub struct TermDictionaryBuilder {
    terms: Vec<(Vec<u8>, PostingListMeta)>,
}

impl TermDictionaryBuilder {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            terms: Vec::with_capacity(capacity),
        }
    }

    /// Add an encoded term key with its postings metadata
    pub fn add(&mut self, key: Vec<u8>, meta: PostingListMeta) {
        self.terms.push((key, meta));
    }

    /// Build the term dictionary
    pub fn build(mut self) -> io::Result<TermDictionary> {
        // FST requires sorted, unique input
        self.terms.sort_by(|a, b| a.0.cmp(&b.0));
        self.terms.dedup_by(|a, b| a.0 == b.0);

        let mut fst_builder = MapBuilder::memory();
        let mut metadata = Vec::with_capacity(self.terms.len());

        for (idx, (key, meta)) in self.terms.into_iter().enumerate() {
            fst_builder
                .insert(&key, idx as u64)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            metadata.push(meta);
        }

        let fst_data = fst_builder
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        TermDictionary::new(fst_data, metadata)
    }
}

impl Default for TermDictionaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
