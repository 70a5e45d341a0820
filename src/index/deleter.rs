//! Deferred removal of files that are no longer part of the commit.
//!
//! A file replaced by a commit or merge may still back a searcher snapshot.
//! Its removal waits until the last reader referencing it is dropped.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::segment::{remove_path, SegmentReader};

struct PendingDeletion {
    /// Obsolete reader; the paths go once nothing else holds it
    reader: Arc<SegmentReader>,
    paths: Vec<PathBuf>,
}

#[derive(Default)]
pub(crate) struct FileDeleter {
    pending: Vec<PendingDeletion>,
}

impl FileDeleter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, reader: Arc<SegmentReader>, paths: Vec<PathBuf>) {
        if !paths.is_empty() {
            self.pending.push(PendingDeletion { reader, paths });
        }
    }

    /// Remove files whose readers are no longer referenced; returns how many
    /// scheduled deletions completed
    pub fn purge(&mut self) -> usize {
        let mut completed = 0;
        self.pending.retain(|entry| {
            if Arc::strong_count(&entry.reader) > 1 {
                return true;
            }
            for path in &entry.paths {
                match remove_path(path) {
                    Ok(()) => debug!(path = %path.display(), "Removed obsolete index file"),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "Failed to remove obsolete index file")
                    }
                }
            }
            completed += 1;
            false
        });
        completed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Document;
    use crate::segment::{SegmentId, SegmentWriter};
    use crate::tokenizer::AnalyzerRegistry;
    use tempfile::TempDir;

    fn reader() -> Arc<SegmentReader> {
        let mut writer = SegmentWriter::new(Arc::new(AnalyzerRegistry::default()), "path");
        writer
            .add_document(&Document::new().with_keyword("path", "a"))
            .unwrap();
        Arc::new(writer.build(SegmentId::new(1)).unwrap().reader)
    }

    #[test]
    fn test_deletion_waits_for_readers() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("obsolete.del");
        std::fs::write(&file, b"x").unwrap();

        let reader = reader();
        let pinned = Arc::clone(&reader);
        let mut deleter = FileDeleter::new();
        deleter.schedule(reader, vec![file.clone()]);

        assert_eq!(deleter.purge(), 0);
        assert!(file.exists());

        drop(pinned);
        assert_eq!(deleter.purge(), 1);
        assert!(!file.exists());
        assert_eq!(deleter.pending_count(), 0);
    }
}
