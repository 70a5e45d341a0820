//! Segment manifest: the commit pointer of an index directory.
//!
//! Publishing a commit:
//! 1. Write new segment directories and live-docs files, fsync
//! 2. Write segments.manifest.tmp, fsync
//! 3. Atomic rename to segments.manifest, fsync directory
//!
//! The manifest on disk is the single source of truth for which segments,
//! at which live-docs generation, make up the committed index.

use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::types::SegmentId;
use crate::models::current_timestamp;

/// Manifest entry for a segment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: SegmentId,
    /// Number of documents in the segment, deleted ones included
    pub doc_count: u32,
    pub live_doc_count: u32,
    /// Live-docs generation in effect for this commit
    pub live_generation: u64,
    /// Checksum of segment data files
    pub checksum: u64,
    pub size_bytes: u64,
}

/// The segment manifest tracks all live segments
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentManifest {
    /// Manifest version (for format upgrades)
    pub version: u32,
    /// Commit generation (incremented on each publish)
    pub generation: u64,
    /// Next segment ID to allocate
    pub next_segment_id: SegmentId,
    /// Segments in commit order
    pub segments: Vec<ManifestEntry>,
    /// Timestamp of last update
    pub updated_at: u64,
}

/// On-disk envelope carrying a checksum of the manifest body
#[derive(Serialize, Deserialize)]
struct ManifestFile {
    manifest: SegmentManifest,
    checksum: u32,
}

impl SegmentManifest {
    /// Current manifest format version
    pub const VERSION: u32 = 1;

    /// Create a new empty manifest
    pub fn new() -> Self {
        Self {
            version: Self::VERSION,
            generation: 0,
            next_segment_id: SegmentId::new(1),
            segments: Vec::new(),
            updated_at: current_timestamp(),
        }
    }

    /// Next generation with the given segment list
    pub fn successor(&self, segments: Vec<ManifestEntry>, next_segment_id: SegmentId) -> Self {
        Self {
            version: Self::VERSION,
            generation: self.generation + 1,
            next_segment_id: next_segment_id.max(self.next_segment_id),
            segments,
            updated_at: current_timestamp(),
        }
    }

    /// Get total document count across all segments
    pub fn total_doc_count(&self) -> u64 {
        self.segments.iter().map(|e| e.doc_count as u64).sum()
    }

    /// Get total live document count across all segments
    pub fn total_live_doc_count(&self) -> u64 {
        self.segments.iter().map(|e| e.live_doc_count as u64).sum()
    }

    /// Get segments count
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Get segment entry by ID
    pub fn get_segment(&self, segment_id: SegmentId) -> Option<&ManifestEntry> {
        self.segments.iter().find(|e| e.id == segment_id)
    }

    pub fn contains(&self, segment_id: SegmentId) -> bool {
        self.get_segment(segment_id).is_some()
    }

    /// Serialize with a trailing checksum over the body
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let body = serde_json::to_vec(self)?;
        let file = ManifestFile {
            manifest: self.clone(),
            checksum: crc32fast::hash(&body),
        };
        Ok(serde_json::to_vec_pretty(&file)?)
    }

    /// Deserialize and verify the checksum
    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        let file: ManifestFile = serde_json::from_slice(data)?;
        let body = serde_json::to_vec(&file.manifest)?;
        if crc32fast::hash(&body) != file.checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "manifest checksum mismatch",
            ));
        }
        if file.manifest.version > Self::VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported manifest version {}", file.manifest.version),
            ));
        }
        Ok(file.manifest)
    }
}

impl Default for SegmentManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe manifest holder with atomic updates
pub struct ManifestHolder {
    inner: arc_swap::ArcSwap<SegmentManifest>,
}

impl ManifestHolder {
    pub fn new(manifest: SegmentManifest) -> Self {
        Self {
            inner: arc_swap::ArcSwap::from_pointee(manifest),
        }
    }

    /// Get the current manifest
    pub fn load(&self) -> arc_swap::Guard<Arc<SegmentManifest>> {
        self.inner.load()
    }

    /// Get a clone of the current manifest
    pub fn snapshot(&self) -> SegmentManifest {
        (**self.inner.load()).clone()
    }

    /// Atomically replace the manifest
    pub fn store(&self, manifest: SegmentManifest) {
        self.inner.store(Arc::new(manifest));
    }

    /// Get generation number
    pub fn generation(&self) -> u64 {
        self.inner.load().generation
    }
}

impl Default for ManifestHolder {
    fn default() -> Self {
        Self::new(SegmentManifest::new())
    }
}
