//! Point-in-time search over one commit generation.
//!
//! A `Searcher` pins the segment readers of the generation it was opened
//! on. Later commits and merges publish new snapshots without touching
//! pinned ones, and files they make obsolete stay on disk until the last
//! pinning searcher is dropped.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::ast::Query;
use super::executor::QueryExecutor;
use super::query_string::QueryStringParser;
use crate::config::IndexSettings;
use crate::error::{LucaError, Result};
use crate::index::IndexSnapshot;
use crate::models::{Document, SearchHit, TopDocs};
use crate::segment::{DocAddress, SegmentStore, Term};
use crate::tokenizer::AnalyzerRegistry;

/// Attempts to load a consistent commit while a writer keeps publishing
const MAX_OPEN_ATTEMPTS: usize = 5;

/// Read-only view of one commit generation
#[derive(Clone, Debug)]
pub struct Searcher {
    snapshot: Arc<IndexSnapshot>,
    settings: Arc<IndexSettings>,
    analyzers: Arc<AnalyzerRegistry>,
}

impl Searcher {
    pub(crate) fn new(
        snapshot: Arc<IndexSnapshot>,
        settings: Arc<IndexSettings>,
        analyzers: Arc<AnalyzerRegistry>,
    ) -> Self {
        Self {
            snapshot,
            settings,
            analyzers,
        }
    }

    /// Open the latest commit of `dir` without taking the writer lock.
    ///
    /// A writer may publish a new commit while segments are being loaded;
    /// in that case loading starts over from the new commit point.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(LucaError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("index directory {} does not exist", dir.display()),
            )));
        }
        let store = SegmentStore::new(dir)?;
        let settings = store.load_settings()?.unwrap_or_default();
        let analyzers = Arc::new(AnalyzerRegistry::from_settings(&settings));

        let mut last_err = None;
        let mut moved = (0, 0);
        for attempt in 1..=MAX_OPEN_ATTEMPTS {
            let Some(manifest) = store.load_manifest()? else {
                return Err(LucaError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} holds no committed index", dir.display()),
                )));
            };

            let loaded: Result<Vec<_>> = manifest
                .segments
                .iter()
                .map(|entry| store.read_segment(entry).map(Arc::new))
                .collect();
            let current = store.load_manifest()?.map(|m| m.generation);

            match loaded {
                Ok(segments) if current == Some(manifest.generation) => {
                    info!(
                        dir = %dir.display(),
                        generation = manifest.generation,
                        segments = segments.len(),
                        "Opened searcher"
                    );
                    let snapshot = IndexSnapshot {
                        generation: manifest.generation,
                        segments,
                    };
                    return Ok(Self::new(Arc::new(snapshot), Arc::new(settings), analyzers));
                }
                Err(err) if current == Some(manifest.generation) => return Err(err),
                Ok(_) => {}
                Err(err) => last_err = Some(err),
            }
            moved = (manifest.generation, current.unwrap_or(0));
            warn!(attempt, generation = manifest.generation, "Commit point moved while opening, retrying");
        }

        Err(last_err.unwrap_or(LucaError::CommitConflict {
            expected: moved.0,
            found: moved.1,
        }))
    }

    /// Best `top_k` hits for `query`, highest score first
    pub fn search(&self, query: &Query, top_k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.search_with_stats(query, top_k)?.hits)
    }

    /// Like `search`, also reporting the total number of matches
    pub fn search_with_stats(&self, query: &Query, top_k: usize) -> Result<TopDocs> {
        let started = Instant::now();
        let result = QueryExecutor::execute(
            query,
            &self.snapshot.segments,
            self.settings.bm25,
            top_k,
        )?;

        let hits = result
            .hits
            .into_iter()
            .map(|candidate| SearchHit {
                address: candidate.address,
                id: self.document_id(candidate.address),
                score: candidate.score.into_inner(),
            })
            .collect::<Vec<_>>();

        let took_ms = started.elapsed().as_millis() as u64;
        debug!(
            query = query.query_type(),
            generation = self.snapshot.generation,
            total_hits = result.total_hits,
            returned = hits.len(),
            took_ms,
            "Search completed"
        );
        Ok(TopDocs {
            hits,
            total_hits: result.total_hits,
            took_ms,
        })
    }

    /// Parse a query string with this index's analyzers
    pub fn parse_query(&self, input: &str) -> Result<Query> {
        QueryStringParser::new(input, &self.analyzers)?.parse()
    }

    /// Stored fields of the document at `address`
    pub fn retrieve(&self, address: DocAddress) -> Result<Document> {
        let segment = self
            .snapshot
            .segments
            .iter()
            .find(|s| s.id() == address.segment)
            .ok_or_else(|| {
                LucaError::DocumentNotFound(format!("{} is not part of this snapshot", address.segment))
            })?;
        segment.retrieve(address.docno)
    }

    /// Stored fields of the live document whose id field equals `id`
    pub fn retrieve_by_id(&self, id: &str) -> Result<Document> {
        let term = Term::new(self.settings.id_field.as_str(), id);
        // Newest segments first
        for segment in self.snapshot.segments.iter().rev() {
            if let Some(docno) = segment.live_docnos(&term)?.last() {
                return segment.retrieve(*docno);
            }
        }
        Err(LucaError::DocumentNotFound(id.to_string()))
    }

    fn document_id(&self, address: DocAddress) -> Option<String> {
        self.snapshot
            .segments
            .iter()
            .find(|s| s.id() == address.segment)
            .and_then(|s| s.document_id(address.docno, &self.settings.id_field))
    }

    /// Live documents in the snapshot
    pub fn doc_count(&self) -> u64 {
        self.snapshot.live_doc_count()
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    pub fn segment_count(&self) -> usize {
        self.snapshot.segments.len()
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Release the snapshot; obsolete files it pinned become deletable
    pub fn close(self) {
        debug!(generation = self.snapshot.generation, "Closed searcher");
    }
}
