//! Segment writer for creating new immutable segments
//!
//! A [`SegmentWriter`] buffers the documents of one writer session in memory.
//! Flushing serializes the buffer through a [`SegmentBuilder`] into postings,
//! term dictionary, stored fields and statistics, which the store then
//! persists as a new segment directory.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::Arc;

use crc32fast::Hasher;
use roaring::RoaringBitmap;

use super::live_docs::LiveDocs;
use super::postings::{PostingsReader, PostingsWriter};
use super::reader::{SegmentMeta, SegmentReader};
use super::statistics::SegmentStatistics;
use super::store::SegmentStore;
use super::stored::StoredFields;
use super::term_dict::{TermDictionary, TermDictionaryBuilder};
use super::types::{encode_i64, encode_term_key, DocNo, Posting, SegmentId};
use crate::error::{LucaError, Result};
use crate::models::{current_timestamp, Document, FieldKind, FieldValue};
use crate::tokenizer::AnalyzerRegistry;

/// Result of writing a segment
pub struct SegmentWriteResult {
    /// The created segment reader, every document live
    pub reader: SegmentReader,
    pub postings_data: Vec<u8>,
    pub fst_data: Vec<u8>,
    pub term_metadata_data: Vec<u8>,
    pub stored_data: Vec<u8>,
    pub stats_data: Vec<u8>,
}

impl SegmentWriteResult {
    pub fn id(&self) -> SegmentId {
        self.reader.id()
    }

    /// Compute a checksum over all persisted segment artifacts.
    ///
    /// Coverage: postings, term dictionary FST, term metadata, stored fields, stats.
    /// Flush and merge both record this value in the segment meta and the manifest.
    pub fn checksum(&self) -> u64 {
        artifacts_checksum([
            self.postings_data.as_slice(),
            &self.fst_data,
            &self.term_metadata_data,
            &self.stored_data,
            &self.stats_data,
        ])
    }
}

/// CRC32 over the segment data files, in file order
pub fn artifacts_checksum<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> u64 {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize() as u64
}

/// Serializes sorted posting lists plus per-document data into a segment
pub struct SegmentBuilder {
    postings: PostingsWriter,
    terms: TermDictionaryBuilder,
}

impl SegmentBuilder {
    pub fn new() -> Self {
        Self {
            postings: PostingsWriter::new(),
            terms: TermDictionaryBuilder::new(),
        }
    }

    /// Add a posting list under an encoded term key; keys must arrive sorted
    pub fn add_term(&mut self, key: Vec<u8>, postings: impl IntoIterator<Item = Posting>) {
        self.postings.start_posting_list();
        let mut any = false;
        for posting in postings {
            self.postings.add_posting(posting);
            any = true;
        }
        let meta = self.postings.finish_posting_list();
        if any {
            self.terms.add(key, meta);
        }
    }

    pub fn finish(
        self,
        id: SegmentId,
        stored: StoredFields,
        stats: SegmentStatistics,
    ) -> io::Result<SegmentWriteResult> {
        let postings_data = self.postings.into_data();
        let term_dict = self.terms.build()?;

        let to_io = |e: bincode::Error| io::Error::new(io::ErrorKind::InvalidData, e);
        let fst_data = term_dict.fst_bytes().to_vec();
        let term_metadata_data = bincode::serialize(term_dict.metadata()).map_err(to_io)?;
        let stored_data = bincode::serialize(&stored).map_err(to_io)?;
        let stats_data = bincode::serialize(&stats).map_err(to_io)?;

        let checksum = artifacts_checksum([
            postings_data.as_slice(),
            &fst_data,
            &term_metadata_data,
            &stored_data,
            &stats_data,
        ]);
        let size_bytes = (postings_data.len()
            + fst_data.len()
            + term_metadata_data.len()
            + stored_data.len()
            + stats_data.len()) as u64;

        let doc_count = stats.doc_count;
        let meta = SegmentMeta {
            id,
            doc_count,
            size_bytes,
            created_at: current_timestamp(),
            checksum,
        };

        let reader = SegmentReader::from_parts(
            meta,
            TermDictionary::new(fst_data.clone(), term_dict.metadata().to_vec())?,
            PostingsReader::new(postings_data.clone()),
            stored,
            stats,
            LiveDocs::all_live(doc_count),
        );

        Ok(SegmentWriteResult {
            reader,
            postings_data,
            fst_data,
            term_metadata_data,
            stored_data,
            stats_data,
        })
    }
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory buffer of one writer session
pub struct SegmentWriter {
    analyzers: Arc<AnalyzerRegistry>,
    id_field: String,
    /// Field kinds declared so far in this session
    field_kinds: HashMap<String, FieldKind>,
    /// Encoded term key -> postings in docno order
    postings: BTreeMap<Vec<u8>, Vec<Posting>>,
    stored: StoredFields,
    stats: SegmentStatistics,
    /// Buffered documents deleted before the session was flushed
    deleted: RoaringBitmap,
    ids: HashMap<String, Vec<DocNo>>,
}

impl SegmentWriter {
    pub fn new(analyzers: Arc<AnalyzerRegistry>, id_field: impl Into<String>) -> Self {
        Self {
            analyzers,
            id_field: id_field.into(),
            field_kinds: HashMap::new(),
            postings: BTreeMap::new(),
            stored: StoredFields::new(),
            stats: SegmentStatistics::new(),
            deleted: RoaringBitmap::new(),
            ids: HashMap::new(),
        }
    }

    /// Reject documents that cannot be indexed in this session
    pub fn check_document(&self, doc: &Document) -> Result<()> {
        doc.validate()?;
        for field in doc.fields() {
            let kind = field.value.kind();
            if field.name == self.id_field && kind != FieldKind::Keyword {
                return Err(LucaError::InvalidDocument(format!(
                    "id field '{}' must be a keyword, got {}",
                    field.name, kind
                )));
            }
            if let Some(&declared) = self.field_kinds.get(&field.name) {
                if declared != kind {
                    return Err(LucaError::InvalidDocument(format!(
                        "field '{}' was declared as {} earlier in this session, got {}",
                        field.name, declared, kind
                    )));
                }
            }
        }
        Ok(())
    }

    /// Analyze and buffer a document, returning its docno in the pending segment
    pub fn add_document(&mut self, doc: &Document) -> Result<DocNo> {
        self.check_document(doc)?;

        let mut terms: BTreeMap<Vec<u8>, Vec<u32>> = BTreeMap::new();
        let mut lengths: BTreeMap<&str, u32> = BTreeMap::new();
        let mut next_position: HashMap<&str, u32> = HashMap::new();

        for field in doc.fields() {
            let name = field.name.as_str();
            let base = next_position.get(name).copied().unwrap_or(0);
            let mut end = base;
            let mut count = 0u32;

            match &field.value {
                FieldValue::Text(text) => {
                    for token in self.analyzers.for_field(name).analyze(text) {
                        let position = base + token.position;
                        terms
                            .entry(encode_term_key(name, token.text.as_bytes()))
                            .or_default()
                            .push(position);
                        end = position + 1;
                        count += 1;
                    }
                }
                FieldValue::Keyword(value) => {
                    terms
                        .entry(encode_term_key(name, value.as_bytes()))
                        .or_default()
                        .push(base);
                    end = base + 1;
                    count = 1;
                }
                FieldValue::Numeric(value) => {
                    terms
                        .entry(encode_term_key(name, &encode_i64(*value)))
                        .or_default()
                        .push(base);
                    end = base + 1;
                    count = 1;
                }
            }

            next_position.insert(name, end);
            *lengths.entry(name).or_default() += count;
        }

        let docno = self.stored.push(doc)?;
        let stats_docno = self.stats.add_document(lengths);
        debug_assert_eq!(docno, stats_docno);

        for field in doc.fields() {
            self.field_kinds
                .entry(field.name.clone())
                .or_insert_with(|| field.value.kind());
        }

        for (key, mut positions) in terms {
            positions.sort_unstable();
            match self.postings.get_mut(&key) {
                Some(list) => list.push(Posting::with_positions(docno, positions)),
                None => {
                    self.postings
                        .insert(key, vec![Posting::with_positions(docno, positions)]);
                }
            }
        }

        if let Some(id) = doc.get(&self.id_field).and_then(FieldValue::as_str) {
            self.ids.entry(id.to_string()).or_default().push(docno);
        }

        Ok(docno)
    }

    /// Mark every buffered document with this id deleted
    pub fn delete_by_id(&mut self, id: &str) -> usize {
        match self.ids.remove(id) {
            Some(docnos) => {
                for docno in &docnos {
                    self.deleted.insert(docno.0);
                }
                docnos.len()
            }
            None => 0,
        }
    }

    pub fn num_docs(&self) -> u32 {
        self.stats.doc_count
    }

    pub fn live_doc_count(&self) -> u32 {
        self.num_docs() - self.deleted.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.num_docs() == 0
    }

    /// Buffered docnos deleted within this session
    pub fn session_deletes(&self) -> &RoaringBitmap {
        &self.deleted
    }

    /// Serialize the buffer into an in-memory segment
    pub fn build(&self, id: SegmentId) -> Result<SegmentWriteResult> {
        let mut builder = SegmentBuilder::new();
        for (key, postings) in &self.postings {
            builder.add_term(key.clone(), postings.iter().cloned());
        }
        Ok(builder.finish(id, self.stored.clone(), self.stats.clone())?)
    }

    /// Build and persist the buffer as segment `id`.
    ///
    /// The buffer is left intact; callers reset it once the segment is
    /// referenced by a durable commit.
    pub fn flush(&self, id: SegmentId, store: &SegmentStore) -> Result<SegmentReader> {
        let result = self.build(id)?;
        store.write_segment(&result)?;
        tracing::debug!(
            segment = %id,
            docs = self.num_docs(),
            terms = self.postings.len(),
            bytes = result.reader.meta().size_bytes,
            "Flushed segment"
        );
        Ok(result.reader)
    }

    /// Drop everything buffered and start a new session
    pub fn reset(&mut self) {
        self.field_kinds.clear();
        self.postings.clear();
        self.stored.clear();
        self.stats = SegmentStatistics::new();
        self.deleted.clear();
        self.ids.clear();
    }
}
