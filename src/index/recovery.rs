//! Startup recovery scan.
//!
//! The committed manifest is authoritative. Anything on disk it does not
//! reference is the residue of an interrupted flush, merge or commit and is
//! removed; anything it does reference must validate.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{LucaError, Result};
use crate::segment::{remove_path, SegmentManifest, SegmentReader, SegmentStore};

pub(crate) struct Recovered {
    pub manifest: SegmentManifest,
    pub segments: Vec<Arc<SegmentReader>>,
}

/// Load the last commit and discard unreferenced files.
///
/// Returns `None` for a directory that holds no index at all.
pub(crate) fn recover(store: &SegmentStore) -> Result<Option<Recovered>> {
    for path in store.list_temp_entries()? {
        info!(path = %path.display(), "Removing incomplete write");
        remove_path(&path)?;
    }

    let manifest = match store.load_manifest()? {
        Some(manifest) => manifest,
        None => {
            let orphans = store.list_segments()?;
            if !orphans.is_empty() {
                return Err(LucaError::corrupt(format!(
                    "{} contains {} segment(s) but no commit point",
                    store.base_dir().display(),
                    orphans.len()
                )));
            }
            return Ok(None);
        }
    };

    for id in store.list_segments()? {
        if !manifest.contains(id) {
            info!(segment = %id, generation = manifest.generation, "Removing uncommitted segment");
            store.remove_segment(id)?;
        }
    }

    let mut segments = Vec::with_capacity(manifest.segments.len());
    for entry in &manifest.segments {
        if entry.id >= manifest.next_segment_id {
            return Err(LucaError::corrupt(format!(
                "{} is not below the next segment id {}",
                entry.id, manifest.next_segment_id.0
            )));
        }
        let reader = store.read_segment(entry)?;

        for gen in store.live_generations(entry.id)? {
            if gen != entry.live_generation {
                let path = store.live_docs_path(entry.id, gen);
                if let Err(err) = remove_path(&path) {
                    warn!(path = %path.display(), error = %err, "Failed to remove stale live docs");
                }
            }
        }
        segments.push(Arc::new(reader));
    }

    info!(
        generation = manifest.generation,
        segments = segments.len(),
        docs = manifest.total_live_doc_count(),
        "Recovered index"
    );
    Ok(Some(Recovered { manifest, segments }))
}
