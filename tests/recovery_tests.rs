//! Crash simulation and directory-level failure handling

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use luca::segment::{NoMergePolicy, SegmentStore, MANIFEST_FILE};
use luca::{
    AnalyzerKind, Document, Index, IndexSettings, LucaError, OpenMode, Query, SegmentId, Searcher,
};

fn doc(id: &str, text: &str) -> Document {
    Document::new()
        .with_keyword("path", id)
        .with_text("contents", text)
}

fn committed_index(dir: &TempDir) -> Vec<SegmentId> {
    let index = Index::open(dir.path(), OpenMode::Create).unwrap();
    index.set_merge_policy(Arc::new(NoMergePolicy));
    index.add(&doc("1", "first commit")).unwrap();
    index.commit().unwrap();
    index.add(&doc("2", "second commit")).unwrap();
    index.commit().unwrap();
    let ids = index.segment_ids();
    index.close().unwrap();
    ids
}

fn hit_count(index: &Index, word: &str) -> usize {
    index
        .open_searcher()
        .search(&Query::term("contents", word), 10)
        .unwrap()
        .len()
}

#[test]
fn test_uncommitted_segment_is_discarded_on_open() {
    let dir = TempDir::new().unwrap();
    let committed = committed_index(&dir);

    // A flush that wrote a segment but crashed before publishing the manifest
    let orphan = dir.path().join(SegmentId::new(99).dir_name());
    fs::create_dir_all(&orphan).unwrap();
    fs::write(orphan.join("postings.bin"), b"truncated").unwrap();
    fs::write(orphan.join("segment.meta"), b"{ not json").unwrap();

    let index = Index::open(dir.path(), OpenMode::CreateOrOpen).unwrap();
    assert_eq!(index.segment_ids(), committed);
    assert_eq!(index.live_doc_count(), 2);
    assert_eq!(hit_count(&index, "commit"), 2);
    assert!(!orphan.exists());
}

#[test]
fn test_temp_files_are_removed_on_open() {
    let dir = TempDir::new().unwrap();
    let committed = committed_index(&dir);

    let tmp_segment = dir.path().join(format!("{}.tmp", SegmentId::new(7).dir_name()));
    fs::create_dir_all(&tmp_segment).unwrap();
    fs::write(tmp_segment.join("stored.bin"), b"partial").unwrap();
    let tmp_manifest = dir.path().join(format!("{MANIFEST_FILE}.tmp"));
    fs::write(&tmp_manifest, b"{\"generation\": 9").unwrap();
    let tmp_live = dir.path().join(committed[0].dir_name()).join("live_5.del.tmp");
    fs::write(&tmp_live, b"partial").unwrap();

    let index = Index::open(dir.path(), OpenMode::CreateOrOpen).unwrap();
    assert_eq!(index.generation(), 2);
    assert_eq!(hit_count(&index, "first"), 1);
    assert!(!tmp_segment.exists());
    assert!(!tmp_manifest.exists());
    assert!(!tmp_live.exists());
}

#[test]
fn test_recovered_index_accepts_new_writes() {
    let dir = TempDir::new().unwrap();
    committed_index(&dir);
    fs::create_dir_all(dir.path().join(SegmentId::new(3).dir_name())).unwrap();

    let index = Index::open(dir.path(), OpenMode::CreateOrOpen).unwrap();
    index.add(&doc("3", "third commit")).unwrap();
    index.commit().unwrap();
    assert_eq!(hit_count(&index, "commit"), 3);
    let stored = index.open_searcher().retrieve_by_id("3").unwrap();
    assert_eq!(stored.get_str("contents"), Some("third commit"));
}

#[test]
fn test_corrupted_committed_segment_is_fatal() {
    let dir = TempDir::new().unwrap();
    let committed = committed_index(&dir);

    let stored = dir.path().join(committed[1].dir_name()).join("stored.bin");
    let mut bytes = fs::read(&stored).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&stored, bytes).unwrap();

    let err = Index::open(dir.path(), OpenMode::CreateOrOpen).unwrap_err();
    assert!(err.is_fatal(), "{err}");
    assert!(matches!(Searcher::open(dir.path()), Err(LucaError::CorruptIndex(_))));
}

#[test]
fn test_segments_without_manifest_are_corrupt() {
    let dir = TempDir::new().unwrap();
    committed_index(&dir);
    fs::remove_file(dir.path().join(MANIFEST_FILE)).unwrap();

    assert!(matches!(
        Index::open(dir.path(), OpenMode::CreateOrOpen),
        Err(LucaError::CorruptIndex(_))
    ));
    // Create mode starts over regardless
    let index = Index::open(dir.path(), OpenMode::Create).unwrap();
    assert_eq!(index.generation(), 0);
    assert_eq!(index.live_doc_count(), 0);
}

#[test]
fn test_second_writer_is_refused() {
    let dir = TempDir::new().unwrap();
    let first = Index::open(dir.path(), OpenMode::Create).unwrap();
    let err = Index::open(dir.path(), OpenMode::CreateOrOpen).unwrap_err();
    assert!(matches!(err, LucaError::LockHeld { .. }));
    assert!(err.is_retriable());

    // Readers do not need the lock
    assert!(Searcher::open(dir.path()).is_ok());

    first.close().unwrap();
    assert!(Index::open(dir.path(), OpenMode::CreateOrOpen).is_ok());
}

#[test]
fn test_commit_conflict_keeps_session() {
    let dir = TempDir::new().unwrap();
    let index = Index::open(dir.path(), OpenMode::Create).unwrap();
    index.add(&doc("1", "pending")).unwrap();

    // Someone else published a commit point in the meantime
    let store = SegmentStore::new(dir.path()).unwrap();
    let manifest = store.load_manifest().unwrap().unwrap();
    let next = manifest.next_segment_id;
    store.save_manifest(&manifest.successor(vec![], next)).unwrap();

    let err = index.commit().unwrap_err();
    assert!(matches!(err, LucaError::CommitConflict { expected: 0, found: 1 }));
    assert!(err.is_retriable());
    assert!(index.has_uncommitted_changes());
    assert_eq!(index.generation(), 0);
}

#[test]
fn test_analysis_settings_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let settings = IndexSettings::default().with_analyzer("contents", AnalyzerKind::English);
    {
        let index = Index::open_with_settings(dir.path(), OpenMode::Create, settings).unwrap();
        index.add(&doc("1", "running dogs")).unwrap();
        index.close().unwrap();
    }

    // Reopened with defaults, queries still go through the English analyzer
    let index = Index::open(dir.path(), OpenMode::CreateOrOpen).unwrap();
    assert_eq!(index.settings().analyzer_for("contents"), AnalyzerKind::English);
    let searcher = index.open_searcher();
    let query = searcher.parse_query("run").unwrap();
    assert_eq!(searcher.search(&query, 10).unwrap().len(), 1);
}
