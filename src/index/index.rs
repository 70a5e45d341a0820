//! The writer-side index handle.
//!
//! `Index` owns the writer lock of a directory, the active writer session and
//! the current list of committed segments. Every mutation of the commit point
//! (commit, merge publish) happens under `commit_lock`; additions only touch
//! the session and never wait on a merge.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::deleter::FileDeleter;
use super::lock::WriterLock;
use super::recovery::recover;
use crate::config::{IndexSettings, OpenMode};
use crate::error::{LucaError, Result};
use crate::models::{validate_field_name, Document};
use crate::query::Searcher;
use crate::segment::{
    merge_segments, DocNo, LiveDocs, ManifestEntry, ManifestHolder, MergePolicy, MergeReason,
    SegmentId, SegmentManifest, SegmentReader, SegmentStore, SegmentWriter, Term,
    TieredMergePolicy,
};
use crate::tokenizer::AnalyzerRegistry;

/// Attempts a merge makes before giving up on a moving segment list
const MAX_MERGE_ATTEMPTS: usize = 3;

/// Upper bound on policy-driven merges run after one commit
const MAX_MERGES_PER_COMMIT: usize = 8;

/// Lifecycle of the index handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexState {
    Open,
    Writing,
    Flushing,
    Merging,
    Committed,
    Closed,
}

/// Segment list of one commit generation, as pinned by searchers
#[derive(Debug)]
pub struct IndexSnapshot {
    pub generation: u64,
    pub segments: Vec<Arc<SegmentReader>>,
}

impl IndexSnapshot {
    pub fn live_doc_count(&self) -> u64 {
        self.segments.iter().map(|s| s.live_doc_count() as u64).sum()
    }
}

struct WriterSession {
    writer: SegmentWriter,
    /// Ids to delete from committed segments at the next commit
    pending_deletes: BTreeSet<String>,
}

impl WriterSession {
    fn has_changes(&self) -> bool {
        !self.writer.is_empty() || !self.pending_deletes.is_empty()
    }

    fn reset(&mut self) {
        self.writer.reset();
        self.pending_deletes.clear();
    }
}

/// Result of preparing a commit, before the manifest is published
struct PreparedCommit {
    segments: Vec<Arc<SegmentReader>>,
    obsolete: Vec<(Arc<SegmentReader>, Vec<PathBuf>)>,
    flushed: Option<SegmentId>,
}

/// Handle to an index directory with the single writer session
pub struct Index {
    dir: PathBuf,
    settings: Arc<IndexSettings>,
    analyzers: Arc<AnalyzerRegistry>,
    store: SegmentStore,
    session: Mutex<WriterSession>,
    snapshot: ArcSwap<IndexSnapshot>,
    manifest: ManifestHolder,
    next_segment_id: AtomicU64,
    commit_lock: Mutex<()>,
    merge_lock: Mutex<()>,
    merge_policy: RwLock<Arc<dyn MergePolicy>>,
    state: Mutex<IndexState>,
    deleter: Mutex<FileDeleter>,
    _lock: WriterLock,
}

impl Index {
    /// Open with default settings
    pub fn open(dir: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_settings(dir, mode, IndexSettings::default())
    }

    /// Open an index directory for writing.
    ///
    /// For an existing index the analysis settings stored with it are kept;
    /// merge, buffering and scoring knobs come from `settings`.
    pub fn open_with_settings(
        dir: impl AsRef<Path>,
        mode: OpenMode,
        settings: IndexSettings,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        validate_field_name(&settings.id_field)?;
        fs::create_dir_all(&dir)?;
        let lock = WriterLock::acquire(&dir)?;
        let store = SegmentStore::new(&dir)?;

        let (settings, manifest, segments) = match mode {
            OpenMode::Create => {
                store.wipe()?;
                Self::initialize(&store, settings)?
            }
            OpenMode::CreateOrOpen => match recover(&store)? {
                Some(recovered) => {
                    let settings = match store.load_settings()? {
                        Some(stored) => stored.merged_with_runtime(&settings),
                        None => {
                            store.save_settings(&settings)?;
                            settings
                        }
                    };
                    (settings, recovered.manifest, recovered.segments)
                }
                None => Self::initialize(&store, settings)?,
            },
        };

        let analyzers = Arc::new(AnalyzerRegistry::from_settings(&settings));
        let writer = SegmentWriter::new(Arc::clone(&analyzers), settings.id_field.clone());
        let merge_policy: Arc<dyn MergePolicy> =
            Arc::new(TieredMergePolicy::new(settings.merge.clone()));

        info!(
            dir = %dir.display(),
            ?mode,
            generation = manifest.generation,
            segments = segments.len(),
            "Opened index"
        );

        Ok(Self {
            dir,
            settings: Arc::new(settings),
            analyzers,
            store,
            session: Mutex::new(WriterSession {
                writer,
                pending_deletes: BTreeSet::new(),
            }),
            snapshot: ArcSwap::from_pointee(IndexSnapshot {
                generation: manifest.generation,
                segments,
            }),
            next_segment_id: AtomicU64::new(manifest.next_segment_id.0),
            manifest: ManifestHolder::new(manifest),
            commit_lock: Mutex::new(()),
            merge_lock: Mutex::new(()),
            merge_policy: RwLock::new(merge_policy),
            state: Mutex::new(IndexState::Open),
            deleter: Mutex::new(FileDeleter::new()),
            _lock: lock,
        })
    }

    fn initialize(
        store: &SegmentStore,
        settings: IndexSettings,
    ) -> Result<(IndexSettings, SegmentManifest, Vec<Arc<SegmentReader>>)> {
        let manifest = SegmentManifest::new();
        store.save_settings(&settings)?;
        store.save_manifest(&manifest)?;
        info!(dir = %store.base_dir().display(), "Created empty index");
        Ok((settings, manifest, Vec::new()))
    }

    /// Buffer a document in the writer session
    pub fn add(&self, doc: &Document) -> Result<()> {
        let buffer_full = {
            let mut session = self.session.lock();
            session.writer.add_document(doc)?;
            self.set_state(IndexState::Writing);
            self.buffer_full(&session)
        };
        if buffer_full {
            debug!("Writer buffer full, committing");
            self.commit()?;
        }
        Ok(())
    }

    /// Replace every document whose id field equals `id` with `doc`
    pub fn update(&self, id: &str, doc: &Document) -> Result<()> {
        let buffer_full = {
            let mut session = self.session.lock();
            session.writer.check_document(doc)?;
            session.pending_deletes.insert(id.to_string());
            session.writer.delete_by_id(id);
            session.writer.add_document(doc)?;
            self.set_state(IndexState::Writing);
            self.buffer_full(&session)
        };
        if buffer_full {
            self.commit()?;
        }
        Ok(())
    }

    /// Delete every document whose id field equals `id`, at the next commit
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut session = self.session.lock();
        session.pending_deletes.insert(id.to_string());
        let buffered = session.writer.delete_by_id(id);
        self.set_state(IndexState::Writing);
        debug!(id, buffered, "Delete queued");
        Ok(())
    }

    fn buffer_full(&self, session: &WriterSession) -> bool {
        self.settings
            .max_buffered_docs
            .map_or(false, |max| session.writer.num_docs() as usize >= max)
    }

    /// Flush the session and publish a new commit generation.
    ///
    /// On failure the previous commit stays in effect and the session keeps
    /// its buffered work.
    pub fn commit(&self) -> Result<u64> {
        let started = Instant::now();
        let generation = {
            let _commit = self.commit_lock.lock();
            let mut session = self.session.lock();
            self.set_state(IndexState::Flushing);
            match self.commit_locked(&session) {
                Ok(generation) => {
                    session.reset();
                    self.set_state(IndexState::Committed);
                    generation
                }
                Err(err) => {
                    error!(error = %err, "Commit failed, previous commit point kept");
                    self.set_state(IndexState::Writing);
                    return Err(err);
                }
            }
        };

        let snapshot = self.snapshot.load();
        info!(
            generation,
            segments = snapshot.segments.len(),
            docs = snapshot.live_doc_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Committed"
        );
        drop(snapshot);

        self.purge_obsolete_files();
        if let Err(err) = self.maybe_merge() {
            warn!(error = %err, "Merge after commit failed");
        }
        Ok(generation)
    }

    fn commit_locked(&self, session: &WriterSession) -> Result<u64> {
        let base = self.manifest.snapshot();
        self.check_commit_point(&base)?;

        let current = self.snapshot.load_full();
        let mut written: Vec<PathBuf> = Vec::new();
        let prepared = match self.prepare_commit(session, &current, &mut written) {
            Ok(prepared) => prepared,
            Err(err) => {
                self.discard(&written);
                return Err(err);
            }
        };

        let entries = prepared.segments.iter().map(|s| manifest_entry(s)).collect();
        let manifest = base.successor(entries, self.peek_next_segment_id());
        if let Err(err) = self.store.save_manifest(&manifest) {
            self.discard(&written);
            return Err(err.into());
        }

        let generation = manifest.generation;
        self.manifest.store(manifest);
        self.snapshot.store(Arc::new(IndexSnapshot {
            generation,
            segments: prepared.segments,
        }));

        let mut deleter = self.deleter.lock();
        for (reader, paths) in prepared.obsolete {
            deleter.schedule(reader, paths);
        }
        if let Some(id) = prepared.flushed {
            debug!(segment = %id, generation, "Flushed segment committed");
        }
        Ok(generation)
    }

    fn prepare_commit(
        &self,
        session: &WriterSession,
        current: &IndexSnapshot,
        written: &mut Vec<PathBuf>,
    ) -> Result<PreparedCommit> {
        let id_field = self.settings.id_field.as_str();
        let mut segments = Vec::with_capacity(current.segments.len() + 1);
        let mut obsolete = Vec::new();

        // Copy-on-write live docs for segments touched by pending deletes
        for reader in &current.segments {
            let mut docnos = Vec::new();
            for id in &session.pending_deletes {
                docnos.extend(reader.live_docnos(&Term::new(id_field, id.as_str()))?);
            }
            match reader.live_docs().with_deleted(docnos) {
                Some(live) => {
                    self.store.write_live_docs(reader.id(), &live)?;
                    written.push(self.store.live_docs_path(reader.id(), live.generation()));
                    let old_path = self
                        .store
                        .live_docs_path(reader.id(), reader.live_docs().generation());
                    obsolete.push((Arc::clone(reader), vec![old_path]));
                    segments.push(Arc::new(reader.with_live_docs(live)));
                }
                None => segments.push(Arc::clone(reader)),
            }
        }

        let mut flushed = None;
        if session.writer.live_doc_count() > 0 {
            let id = self.allocate_segment_id();
            written.push(self.store.segment_dir(id));
            let reader = session.writer.flush(id, &self.store)?;
            let deletes = session.writer.session_deletes().iter().map(DocNo);
            let reader = match LiveDocs::all_live(reader.doc_count()).with_deleted(deletes) {
                Some(live) => {
                    self.store.write_live_docs(id, &live)?;
                    reader.with_live_docs(live)
                }
                None => reader,
            };
            segments.push(Arc::new(reader));
            flushed = Some(id);
        }

        // Segments with nothing live left are dropped from the commit
        let (kept, emptied): (Vec<_>, Vec<_>) = segments
            .into_iter()
            .partition(|s| s.live_doc_count() > 0);
        for reader in emptied {
            debug!(segment = %reader.id(), "Dropping fully deleted segment");
            let dir = self.store.segment_dir(reader.id());
            obsolete.push((reader, vec![dir]));
        }

        Ok(PreparedCommit {
            segments: kept,
            obsolete,
            flushed,
        })
    }

    /// The on-disk commit point must still be the one this handle published
    fn check_commit_point(&self, base: &SegmentManifest) -> Result<()> {
        match self.store.load_manifest()? {
            Some(on_disk) if on_disk.generation == base.generation => Ok(()),
            Some(on_disk) => Err(LucaError::CommitConflict {
                expected: base.generation,
                found: on_disk.generation,
            }),
            None => Err(LucaError::corrupt(format!(
                "commit point of {} disappeared",
                self.dir.display()
            ))),
        }
    }

    fn discard(&self, written: &[PathBuf]) {
        for path in written {
            if let Err(err) = crate::segment::remove_path(path) {
                warn!(path = %path.display(), error = %err, "Failed to remove partial write");
            }
        }
    }

    /// Merge down to exactly one segment without deletions
    pub fn force_merge_to_one(&self) -> Result<()> {
        if self.has_uncommitted_changes() {
            self.commit()?;
        }
        for _ in 0..MAX_MERGE_ATTEMPTS {
            let snapshot = self.snapshot.load_full();
            let needs_merge = snapshot.segments.len() > 1
                || snapshot
                    .segments
                    .first()
                    .map_or(false, |s| s.live_docs().has_deletions());
            if !needs_merge {
                return Ok(());
            }
            let ids: Vec<SegmentId> = snapshot.segments.iter().map(|s| s.id()).collect();
            self.merge_with_reason(&ids, MergeReason::Forced)?;
        }
        warn!("Force merge did not converge, segment list kept changing");
        Ok(())
    }

    /// Run the merge policy until it finds nothing more to do
    pub fn maybe_merge(&self) -> Result<usize> {
        let mut merges = 0;
        while merges < MAX_MERGES_PER_COMMIT {
            let snapshot = self.snapshot.load_full();
            let policy = Arc::clone(&*self.merge_policy.read());
            let Some(candidate) = policy.find_merges(&snapshot.segments) else {
                break;
            };
            drop(snapshot);
            if self
                .merge_with_reason(&candidate.segment_ids, candidate.reason)?
                .is_none()
            {
                break;
            }
            merges += 1;
        }
        Ok(merges)
    }

    /// Merge the given committed segments into one new segment
    pub fn merge(&self, ids: &[SegmentId]) -> Result<Option<SegmentId>> {
        self.merge_with_reason(ids, MergeReason::Forced)
    }

    fn merge_with_reason(&self, ids: &[SegmentId], reason: MergeReason) -> Result<Option<SegmentId>> {
        let _merging = self.merge_lock.lock();

        for attempt in 1..=MAX_MERGE_ATTEMPTS {
            let snapshot = self.snapshot.load_full();
            let inputs: Vec<Arc<SegmentReader>> = snapshot
                .segments
                .iter()
                .filter(|s| ids.contains(&s.id()))
                .cloned()
                .collect();
            drop(snapshot);
            if inputs.is_empty() {
                return Ok(None);
            }

            self.set_state(IndexState::Merging);
            let started = Instant::now();
            let id = self.allocate_segment_id();
            let result = merge_segments(&inputs, id)?;
            let merged = if result.reader.live_doc_count() > 0 {
                if let Err(err) = self.store.write_segment(&result) {
                    self.discard(&[self.store.segment_dir(id)]);
                    self.set_state(IndexState::Committed);
                    return Err(err.into());
                }
                Some(Arc::new(result.reader))
            } else {
                None
            };

            let published = {
                let _commit = self.commit_lock.lock();
                self.publish_merge(&inputs, merged)
            };
            self.set_state(IndexState::Committed);

            match published {
                Ok(Some(generation)) => {
                    info!(
                        segment = %id,
                        inputs = inputs.len(),
                        ?reason,
                        generation,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Merged segments"
                    );
                    drop(inputs);
                    self.purge_obsolete_files();
                    return Ok(Some(id));
                }
                Ok(None) => {
                    warn!(attempt, segment = %id, "Merge lost race with a commit, retrying");
                    self.discard(&[self.store.segment_dir(id)]);
                }
                Err(err) => {
                    self.discard(&[self.store.segment_dir(id)]);
                    return Err(err);
                }
            }
        }
        Ok(None)
    }

    /// Swap merge inputs for the merged segment, unless a commit changed them
    fn publish_merge(
        &self,
        inputs: &[Arc<SegmentReader>],
        merged: Option<Arc<SegmentReader>>,
    ) -> Result<Option<u64>> {
        let current = self.snapshot.load_full();
        let unchanged = inputs
            .iter()
            .all(|input| current.segments.iter().any(|s| Arc::ptr_eq(s, input)));
        if !unchanged {
            return Ok(None);
        }

        let base = self.manifest.snapshot();
        self.check_commit_point(&base)?;

        let is_input = |s: &Arc<SegmentReader>| inputs.iter().any(|i| Arc::ptr_eq(i, s));
        let mut segments = Vec::with_capacity(current.segments.len());
        let mut merged = merged;
        for reader in &current.segments {
            if is_input(reader) {
                if let Some(m) = merged.take() {
                    segments.push(m);
                }
            } else {
                segments.push(Arc::clone(reader));
            }
        }

        let entries = segments.iter().map(|s| manifest_entry(s)).collect();
        let manifest = base.successor(entries, self.peek_next_segment_id());
        self.store.save_manifest(&manifest)?;

        let generation = manifest.generation;
        self.manifest.store(manifest);
        self.snapshot.store(Arc::new(IndexSnapshot {
            generation,
            segments,
        }));

        let mut deleter = self.deleter.lock();
        for input in inputs {
            deleter.schedule(Arc::clone(input), vec![self.store.segment_dir(input.id())]);
        }
        Ok(Some(generation))
    }

    /// Replace the merge policy used after commits
    pub fn set_merge_policy(&self, policy: Arc<dyn MergePolicy>) {
        *self.merge_policy.write() = policy;
    }

    /// Searcher over the current commit generation
    pub fn open_searcher(&self) -> Searcher {
        Searcher::new(
            self.snapshot.load_full(),
            Arc::clone(&self.settings),
            Arc::clone(&self.analyzers),
        )
    }

    /// Commit pending work if configured to, then release the writer lock
    pub fn close(self) -> Result<()> {
        if self.settings.commit_on_close && self.has_uncommitted_changes() {
            self.commit()?;
        } else if self.has_uncommitted_changes() {
            warn!("Closing index with uncommitted changes");
        }
        self.set_state(IndexState::Closed);
        let removed = self.deleter.lock().purge();
        info!(dir = %self.dir.display(), removed, "Closed index");
        Ok(())
    }

    fn purge_obsolete_files(&self) {
        let removed = self.deleter.lock().purge();
        if removed > 0 {
            debug!(removed, "Purged obsolete files");
        }
    }

    fn allocate_segment_id(&self) -> SegmentId {
        SegmentId::new(self.next_segment_id.fetch_add(1, Ordering::SeqCst))
    }

    fn peek_next_segment_id(&self) -> SegmentId {
        SegmentId::new(self.next_segment_id.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: IndexState) {
        *self.state.lock() = state;
    }

    pub fn state(&self) -> IndexState {
        *self.state.lock()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Generation of the last published commit
    pub fn generation(&self) -> u64 {
        self.manifest.generation()
    }

    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.snapshot.load().segments.iter().map(|s| s.id()).collect()
    }

    /// Live documents visible in the last commit
    pub fn live_doc_count(&self) -> u64 {
        self.snapshot.load().live_doc_count()
    }

    pub fn buffered_doc_count(&self) -> u32 {
        self.session.lock().writer.num_docs()
    }

    pub fn has_uncommitted_changes(&self) -> bool {
        self.session.lock().has_changes()
    }

    /// Obsolete files still pinned by open searchers
    pub fn pending_file_deletions(&self) -> usize {
        self.deleter.lock().pending_count()
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("dir", &self.dir)
            .field("generation", &self.generation())
            .field("state", &self.state())
            .finish()
    }
}

fn manifest_entry(reader: &SegmentReader) -> ManifestEntry {
    ManifestEntry {
        id: reader.id(),
        doc_count: reader.doc_count(),
        live_doc_count: reader.live_doc_count(),
        live_generation: reader.live_docs().generation(),
        checksum: reader.meta().checksum,
        size_bytes: reader.meta().size_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(id: &str, text: &str) -> Document {
        Document::new()
            .with_keyword("path", id)
            .with_text("contents", text)
    }

    #[test]
    fn test_commit_increments_generation() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(dir.path(), OpenMode::Create).unwrap();
        assert_eq!(index.generation(), 0);
        assert_eq!(index.state(), IndexState::Open);

        index.add(&doc("1", "hello")).unwrap();
        assert_eq!(index.state(), IndexState::Writing);
        assert_eq!(index.buffered_doc_count(), 1);
        assert_eq!(index.commit().unwrap(), 1);
        assert_eq!(index.state(), IndexState::Committed);
        assert_eq!(index.buffered_doc_count(), 0);
        assert_eq!(index.live_doc_count(), 1);
        assert_eq!(index.commit().unwrap(), 2);
    }

    #[test]
    fn test_update_replaces_document() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(dir.path(), OpenMode::Create).unwrap();
        index.add(&doc("1", "old text")).unwrap();
        index.commit().unwrap();

        index.update("1", &doc("1", "new text")).unwrap();
        index.commit().unwrap();
        assert_eq!(index.live_doc_count(), 1);
    }

    #[test]
    fn test_delete_of_buffered_document() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(dir.path(), OpenMode::Create).unwrap();
        index.add(&doc("1", "a")).unwrap();
        index.add(&doc("2", "b")).unwrap();
        index.delete("1").unwrap();
        index.commit().unwrap();
        assert_eq!(index.live_doc_count(), 1);
    }

    #[test]
    fn test_fully_deleted_segment_is_dropped() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(dir.path(), OpenMode::Create).unwrap();
        index.add(&doc("1", "a")).unwrap();
        index.commit().unwrap();
        let first = index.segment_ids()[0];

        index.delete("1").unwrap();
        index.commit().unwrap();
        assert!(index.segment_ids().is_empty());
        assert!(!dir.path().join(first.dir_name()).exists());
    }

    #[test]
    fn test_auto_commit_when_buffer_full() {
        let dir = TempDir::new().unwrap();
        let settings = IndexSettings::default().with_max_buffered_docs(2);
        let index = Index::open_with_settings(dir.path(), OpenMode::Create, settings).unwrap();
        index.add(&doc("1", "a")).unwrap();
        assert_eq!(index.generation(), 0);
        index.add(&doc("2", "b")).unwrap();
        assert_eq!(index.generation(), 1);
        assert_eq!(index.buffered_doc_count(), 0);
    }

    #[test]
    fn test_invalid_document_keeps_session() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(dir.path(), OpenMode::Create).unwrap();
        index.add(&doc("1", "a")).unwrap();
        let bad = Document::new().with_numeric("contents", 5);
        assert!(matches!(index.add(&bad), Err(LucaError::InvalidDocument(_))));
        index.commit().unwrap();
        assert_eq!(index.live_doc_count(), 1);
    }

    #[test]
    fn test_commit_conflict_detected() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(dir.path(), OpenMode::Create).unwrap();
        index.add(&doc("1", "a")).unwrap();

        // Another process rewrote the commit point behind our back
        let store = SegmentStore::new(dir.path()).unwrap();
        let foreign = store
            .load_manifest()
            .unwrap()
            .unwrap()
            .successor(vec![], SegmentId::new(50));
        store.save_manifest(&foreign).unwrap();

        let err = index.commit().unwrap_err();
        assert!(matches!(err, LucaError::CommitConflict { expected: 0, found: 1 }));
        assert_eq!(index.buffered_doc_count(), 1);
    }

    #[test]
    fn test_force_merge_to_one() {
        let dir = TempDir::new().unwrap();
        let index = Index::open(dir.path(), OpenMode::Create).unwrap();
        for i in 0..3 {
            index.add(&doc(&i.to_string(), "shared words")).unwrap();
            index.commit().unwrap();
        }
        index.delete("0").unwrap();
        index.commit().unwrap();
        assert_eq!(index.segment_ids().len(), 2);

        index.force_merge_to_one().unwrap();
        assert_eq!(index.segment_ids().len(), 1);
        assert_eq!(index.live_doc_count(), 2);
    }

    #[test]
    fn test_policy_merges_when_too_many_segments() {
        let dir = TempDir::new().unwrap();
        let settings = IndexSettings::default().with_merge(crate::segment::MergePolicyConfig {
            max_segments: 3,
            ..Default::default()
        });
        let index = Index::open_with_settings(dir.path(), OpenMode::Create, settings).unwrap();
        for i in 0..6 {
            index.add(&doc(&i.to_string(), "text")).unwrap();
            index.commit().unwrap();
            assert!(index.segment_ids().len() <= 3);
        }
        assert_eq!(index.live_doc_count(), 6);
    }
}
