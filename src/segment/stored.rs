//! Stored fields: the original documents, addressable by docno.

use serde::{Deserialize, Serialize};
use std::io;

use super::types::DocNo;
use crate::models::Document;

/// Serialized documents plus an offset table
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoredFields {
    /// Start offset of each document; the end is the next offset or `data.len()`
    offsets: Vec<u64>,
    data: Vec<u8>,
}

impl StoredFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, doc: &Document) -> bincode::Result<DocNo> {
        let bytes = bincode::serialize(doc)?;
        Ok(self.push_raw(&bytes))
    }

    /// Append an already serialized document, as merges do
    pub fn push_raw(&mut self, bytes: &[u8]) -> DocNo {
        let docno = DocNo::new(self.offsets.len() as u32);
        self.offsets.push(self.data.len() as u64);
        self.data.extend_from_slice(bytes);
        docno
    }

    pub fn raw(&self, docno: DocNo) -> Option<&[u8]> {
        let idx = docno.as_usize();
        let start = *self.offsets.get(idx)? as usize;
        let end = self
            .offsets
            .get(idx + 1)
            .map_or(self.data.len(), |&o| o as usize);
        self.data.get(start..end)
    }

    pub fn get(&self, docno: DocNo) -> io::Result<Document> {
        let bytes = self.raw(docno).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no stored document for docno {}", docno),
            )
        })?;
        bincode::deserialize(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_get() {
        let mut stored = StoredFields::new();
        let a = Document::new().with_keyword("path", "a").with_text("body", "x y");
        let b = Document::new().with_numeric("n", -3);
        assert_eq!(stored.push(&a).unwrap(), DocNo(0));
        assert_eq!(stored.push(&b).unwrap(), DocNo(1));

        assert_eq!(stored.get(DocNo(0)).unwrap(), a);
        assert_eq!(stored.get(DocNo(1)).unwrap(), b);
        assert!(stored.get(DocNo(2)).is_err());
    }

    #[test]
    fn test_raw_copy() {
        let mut src = StoredFields::new();
        let doc = Document::new().with_text("body", "hello");
        src.push(&doc).unwrap();

        let mut dst = StoredFields::new();
        dst.push_raw(src.raw(DocNo(0)).unwrap());
        assert_eq!(dst.get(DocNo(0)).unwrap(), doc);
    }
}
