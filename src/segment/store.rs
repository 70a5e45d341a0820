//! Persistent storage for segment files and the manifest.
//!
//! Layout of an index directory:
//!
//! ```text
//! write.lock
//! settings.json
//! segments.manifest
//! segment_<id>/
//!     postings.bin  terms.fst  terms.meta  stored.bin  stats.bin
//!     live_<gen>.del
//!     segment.meta      (written last, marks the segment complete)
//! ```
//!
//! Anything whose name ends in `.tmp` is an incomplete write.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::IndexSettings;
use crate::error::{LucaError, Result};
use crate::segment::live_docs::LiveDocs;
use crate::segment::manifest::{ManifestEntry, SegmentManifest};
use crate::segment::postings::PostingsReader;
use crate::segment::reader::{SegmentMeta, SegmentReader};
use crate::segment::statistics::SegmentStatistics;
use crate::segment::stored::StoredFields;
use crate::segment::term_dict::TermDictionary;
use crate::segment::types::{PostingListMeta, SegmentId};
use crate::segment::writer::{artifacts_checksum, SegmentWriteResult};

pub const MANIFEST_FILE: &str = "segments.manifest";
pub const SETTINGS_FILE: &str = "settings.json";
pub const LOCK_FILE: &str = "write.lock";
pub const TMP_SUFFIX: &str = ".tmp";

const POSTINGS_FILE: &str = "postings.bin";
const FST_FILE: &str = "terms.fst";
const TERM_META_FILE: &str = "terms.meta";
const STORED_FILE: &str = "stored.bin";
const STATS_FILE: &str = "stats.bin";
const META_FILE: &str = "segment.meta";

/// Persistent storage for segment files and manifest.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    base_dir: PathBuf,
}

impl SegmentStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> io::Result<Self> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn segment_dir(&self, id: SegmentId) -> PathBuf {
        self.base_dir.join(id.dir_name())
    }

    pub fn live_docs_path(&self, id: SegmentId, generation: u64) -> PathBuf {
        self.segment_dir(id).join(live_file_name(generation))
    }

    /// Persist a built segment, all-live at generation 0.
    ///
    /// Files land in a temporary directory that is renamed into place only
    /// after every file, `segment.meta` last, has been synced.
    pub fn write_segment(&self, result: &SegmentWriteResult) -> io::Result<()> {
        let id = result.id();
        let final_dir = self.segment_dir(id);
        if final_dir.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", final_dir.display()),
            ));
        }

        let tmp_dir = self
            .base_dir
            .join(format!("{}{}", id.dir_name(), TMP_SUFFIX));
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        write_synced(&tmp_dir.join(POSTINGS_FILE), &result.postings_data)?;
        write_synced(&tmp_dir.join(FST_FILE), &result.fst_data)?;
        write_synced(&tmp_dir.join(TERM_META_FILE), &result.term_metadata_data)?;
        write_synced(&tmp_dir.join(STORED_FILE), &result.stored_data)?;
        write_synced(&tmp_dir.join(STATS_FILE), &result.stats_data)?;
        write_synced(
            &tmp_dir.join(live_file_name(0)),
            &LiveDocs::all_live(result.reader.doc_count()).to_bytes()?,
        )?;
        write_synced(
            &tmp_dir.join(META_FILE),
            &serde_json::to_vec_pretty(result.reader.meta())?,
        )?;
        sync_dir(&tmp_dir)?;

        fs::rename(&tmp_dir, &final_dir)?;
        sync_dir(&self.base_dir)?;
        Ok(())
    }

    /// Load a segment referenced by a manifest entry, verifying completeness
    /// and checksums. Any failure is reported as a corrupt index.
    pub fn read_segment(&self, entry: &ManifestEntry) -> Result<SegmentReader> {
        self.try_read_segment(entry).map_err(|e| {
            LucaError::corrupt(format!("{} failed validation: {}", entry.id, e))
        })
    }

    fn try_read_segment(&self, entry: &ManifestEntry) -> io::Result<SegmentReader> {
        let dir = self.segment_dir(entry.id);
        let meta_path = dir.join(META_FILE);
        if !meta_path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "segment is incomplete (no segment.meta)",
            ));
        }
        let meta: SegmentMeta = serde_json::from_slice(&fs::read(&meta_path)?)?;

        let postings = fs::read(dir.join(POSTINGS_FILE))?;
        let fst_data = fs::read(dir.join(FST_FILE))?;
        let term_meta_bytes = fs::read(dir.join(TERM_META_FILE))?;
        let stored_bytes = fs::read(dir.join(STORED_FILE))?;
        let stats_bytes = fs::read(dir.join(STATS_FILE))?;

        let checksum = artifacts_checksum([
            postings.as_slice(),
            &fst_data,
            &term_meta_bytes,
            &stored_bytes,
            &stats_bytes,
        ]);
        if checksum != meta.checksum || checksum != entry.checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "checksum mismatch: files {:#x}, segment.meta {:#x}, manifest {:#x}",
                    checksum, meta.checksum, entry.checksum
                ),
            ));
        }
        if meta.id != entry.id || meta.doc_count != entry.doc_count {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "segment.meta does not match the manifest entry",
            ));
        }

        let to_io = |e: bincode::Error| io::Error::new(io::ErrorKind::InvalidData, e);
        let term_meta: Vec<PostingListMeta> =
            bincode::deserialize(&term_meta_bytes).map_err(to_io)?;
        let stored: StoredFields = bincode::deserialize(&stored_bytes).map_err(to_io)?;
        let stats: SegmentStatistics = bincode::deserialize(&stats_bytes).map_err(to_io)?;

        let live = self.read_live_docs(entry.id, entry.live_generation)?;
        if live.max_doc() != meta.doc_count || live.generation() != entry.live_generation {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "live docs do not match the segment",
            ));
        }

        Ok(SegmentReader::from_parts(
            meta,
            TermDictionary::new(fst_data, term_meta)?,
            PostingsReader::new(postings),
            stored,
            stats,
            live,
        ))
    }

    pub fn read_live_docs(&self, id: SegmentId, generation: u64) -> io::Result<LiveDocs> {
        LiveDocs::from_bytes(&fs::read(self.live_docs_path(id, generation))?)
    }

    /// Write a new live-docs generation next to the segment
    pub fn write_live_docs(&self, id: SegmentId, live: &LiveDocs) -> io::Result<()> {
        let path = self.live_docs_path(id, live.generation());
        let tmp = tmp_path(&path);
        write_synced(&tmp, &live.to_bytes()?)?;
        fs::rename(&tmp, &path)?;
        sync_dir(&self.segment_dir(id))
    }

    /// Live-docs generations present in a segment directory
    pub fn live_generations(&self, id: SegmentId) -> io::Result<Vec<u64>> {
        let mut gens = Vec::new();
        for entry in fs::read_dir(self.segment_dir(id))? {
            let name = entry?.file_name();
            if let Some(gen) = name.to_str().and_then(parse_live_file_name) {
                gens.push(gen);
            }
        }
        gens.sort_unstable();
        Ok(gens)
    }

    /// Segment directories present on disk, complete or not
    pub fn list_segments(&self) -> io::Result<Vec<SegmentId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(SegmentId::parse_dir_name) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Leftovers of interrupted writes, in the index directory and in
    /// segment directories
    pub fn list_temp_entries(&self) -> io::Result<Vec<PathBuf>> {
        let mut found = Vec::new();
        collect_tmp(&self.base_dir, &mut found)?;
        for id in self.list_segments()? {
            collect_tmp(&self.segment_dir(id), &mut found)?;
        }
        Ok(found)
    }

    pub fn remove_segment(&self, id: SegmentId) -> io::Result<()> {
        remove_path(&self.segment_dir(id))
    }

    /// Remove everything except the lock file
    pub fn wipe(&self) -> io::Result<()> {
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_name() == LOCK_FILE {
                continue;
            }
            remove_path(&entry.path())?;
        }
        sync_dir(&self.base_dir)
    }

    /// Publish a manifest: temp file, fsync, rename, fsync directory
    pub fn save_manifest(&self, manifest: &SegmentManifest) -> io::Result<()> {
        let path = self.base_dir.join(MANIFEST_FILE);
        let tmp = tmp_path(&path);
        write_synced(&tmp, &manifest.to_bytes()?)?;
        fs::rename(&tmp, &path)?;
        sync_dir(&self.base_dir)
    }

    /// Committed manifest, or `None` for a directory that never committed
    pub fn load_manifest(&self) -> Result<Option<SegmentManifest>> {
        let path = self.base_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        SegmentManifest::from_bytes(&bytes)
            .map(Some)
            .map_err(|e| LucaError::corrupt(format!("{}: {}", path.display(), e)))
    }

    pub fn save_settings(&self, settings: &IndexSettings) -> io::Result<()> {
        let path = self.base_dir.join(SETTINGS_FILE);
        let tmp = tmp_path(&path);
        write_synced(&tmp, &serde_json::to_vec_pretty(settings)?)?;
        fs::rename(&tmp, &path)?;
        sync_dir(&self.base_dir)
    }

    pub fn load_settings(&self) -> Result<Option<IndexSettings>> {
        let path = self.base_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| LucaError::corrupt(format!("{}: {}", path.display(), e)))
    }
}

pub fn live_file_name(generation: u64) -> String {
    format!("live_{}.del", generation)
}

fn parse_live_file_name(name: &str) -> Option<u64> {
    name.strip_prefix("live_")?.strip_suffix(".del")?.parse().ok()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

fn collect_tmp(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry
            .file_name()
            .to_str()
            .map_or(false, |n| n.ends_with(TMP_SUFFIX))
        {
            found.push(entry.path());
        }
    }
    Ok(())
}

pub(crate) fn remove_path(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::segment::writer::SegmentWriter;
    use crate::tokenizer::AnalyzerRegistry;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn build_result(id: u64) -> SegmentWriteResult {
        let mut writer = SegmentWriter::new(Arc::new(AnalyzerRegistry::default()), "path");
        writer
            .add_document(
                &Document::new()
                    .with_keyword("path", "a.txt")
                    .with_text("contents", "hello world"),
            )
            .unwrap();
        writer.build(SegmentId::new(id)).unwrap()
    }

    fn entry_for(result: &SegmentWriteResult) -> ManifestEntry {
        ManifestEntry {
            id: result.id(),
            doc_count: result.reader.doc_count(),
            live_doc_count: result.reader.live_doc_count(),
            live_generation: 0,
            checksum: result.checksum(),
            size_bytes: result.reader.meta().size_bytes,
        }
    }

    #[test]
    fn test_write_and_read_segment() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        let result = build_result(1);
        store.write_segment(&result).unwrap();

        let reader = store.read_segment(&entry_for(&result)).unwrap();
        assert_eq!(reader.doc_count(), 1);
        assert_eq!(store.list_segments().unwrap(), vec![SegmentId::new(1)]);
        assert!(store.list_temp_entries().unwrap().is_empty());
        assert!(store.write_segment(&result).is_err());
    }

    #[test]
    fn test_corrupted_segment_detected() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        let result = build_result(1);
        store.write_segment(&result).unwrap();

        let postings = store.segment_dir(SegmentId::new(1)).join(POSTINGS_FILE);
        let mut bytes = fs::read(&postings).unwrap();
        bytes[0] ^= 0xFF;
        fs::write(&postings, bytes).unwrap();

        let err = store.read_segment(&entry_for(&result)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_incomplete_segment_detected() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        let result = build_result(1);
        store.write_segment(&result).unwrap();
        fs::remove_file(store.segment_dir(SegmentId::new(1)).join(META_FILE)).unwrap();

        assert!(matches!(
            store.read_segment(&entry_for(&result)),
            Err(LucaError::CorruptIndex(_))
        ));
    }

    #[test]
    fn test_live_docs_generations() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        let result = build_result(1);
        store.write_segment(&result).unwrap();

        let gen1 = LiveDocs::all_live(1)
            .with_deleted([crate::segment::DocNo(0)])
            .unwrap();
        store.write_live_docs(SegmentId::new(1), &gen1).unwrap();
        assert_eq!(store.live_generations(SegmentId::new(1)).unwrap(), vec![0, 1]);

        let mut entry = entry_for(&result);
        entry.live_generation = 1;
        let reader = store.read_segment(&entry).unwrap();
        assert_eq!(reader.live_doc_count(), 0);
    }

    #[test]
    fn test_manifest_and_settings_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        assert!(store.load_manifest().unwrap().is_none());

        let manifest = SegmentManifest::new();
        store.save_manifest(&manifest).unwrap();
        assert_eq!(store.load_manifest().unwrap(), Some(manifest));

        store.save_settings(&IndexSettings::default()).unwrap();
        assert_eq!(store.load_settings().unwrap().unwrap().id_field, "path");

        fs::write(dir.path().join(MANIFEST_FILE), b"garbage").unwrap();
        assert!(store.load_manifest().unwrap_err().is_fatal());
    }

    #[test]
    fn test_wipe_keeps_lock() {
        let dir = TempDir::new().unwrap();
        let store = SegmentStore::new(dir.path()).unwrap();
        fs::write(dir.path().join(LOCK_FILE), b"1").unwrap();
        store.write_segment(&build_result(1)).unwrap();
        store.wipe().unwrap();
        assert!(dir.path().join(LOCK_FILE).exists());
        assert!(store.list_segments().unwrap().is_empty());
    }
}
