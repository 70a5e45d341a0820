use std::path::PathBuf;

use thiserror::Error;

use crate::segment::{DocNo, SegmentId};

/// Main error type for Luca index operations
#[derive(Error, Debug)]
pub enum LucaError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Index lock {path} is held by another writer ({holder})")]
    LockHeld { path: PathBuf, holder: String },

    #[error("Commit conflict: expected generation {expected}, found {found} on disk")]
    CommitConflict { expected: u64, found: u64 },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Document {docno} in {segment} is deleted")]
    DeletedDocument { segment: SegmentId, docno: DocNo },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),
}

/// Result type alias for Luca operations
pub type Result<T> = std::result::Result<T, LucaError>;

impl LucaError {
    /// Check if this error indicates a transient failure that could be retried
    pub fn is_retriable(&self) -> bool {
        matches!(self, LucaError::LockHeld { .. } | LucaError::CommitConflict { .. })
    }

    /// Check if this error is fatal for the open attempt that produced it
    pub fn is_fatal(&self) -> bool {
        matches!(self, LucaError::CorruptIndex(_))
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        LucaError::CorruptIndex(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LucaError::DocumentNotFound("a.txt".to_string());
        assert_eq!(err.to_string(), "Document not found: a.txt");

        let err = LucaError::DeletedDocument {
            segment: SegmentId::new(3),
            docno: DocNo::new(7),
        };
        assert_eq!(err.to_string(), "Document 7 in segment_3 is deleted");
    }

    #[test]
    fn test_retriable_errors() {
        assert!(LucaError::CommitConflict {
            expected: 1,
            found: 2
        }
        .is_retriable());
        assert!(LucaError::LockHeld {
            path: PathBuf::from("write.lock"),
            holder: "pid 1".to_string()
        }
        .is_retriable());
        assert!(!LucaError::InvalidDocument("x".to_string()).is_retriable());
        assert!(LucaError::corrupt("bad").is_fatal());
    }
}
