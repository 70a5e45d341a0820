//! Live-document bitmaps.
//!
//! A segment's data files never change after flush. Deletions are recorded in
//! a separate, generation-numbered bitmap file; each change produces a new
//! generation and the commit pointer names the one in effect.

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::io;

use super::types::DocNo;

/// Set of non-deleted docnos of one segment at one generation
#[derive(Clone, Debug, PartialEq)]
pub struct LiveDocs {
    max_doc: u32,
    generation: u64,
    live: RoaringBitmap,
}

#[derive(Serialize, Deserialize)]
struct LiveDocsFile {
    max_doc: u32,
    generation: u64,
    bitmap: Vec<u8>,
    checksum: u32,
}

impl LiveDocs {
    /// Every document live, generation 0
    pub fn all_live(max_doc: u32) -> Self {
        let mut live = RoaringBitmap::new();
        live.insert_range(0..max_doc);
        Self {
            max_doc,
            generation: 0,
            live,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn max_doc(&self) -> u32 {
        self.max_doc
    }

    pub fn is_live(&self, docno: DocNo) -> bool {
        self.live.contains(docno.0)
    }

    pub fn live_count(&self) -> u32 {
        self.live.len() as u32
    }

    pub fn deleted_count(&self) -> u32 {
        self.max_doc - self.live_count()
    }

    pub fn has_deletions(&self) -> bool {
        self.deleted_count() > 0
    }

    pub fn bitmap(&self) -> &RoaringBitmap {
        &self.live
    }

    /// New generation with `docnos` removed; `self` is left untouched.
    /// Returns `None` when none of the docnos was live.
    pub fn with_deleted(&self, docnos: impl IntoIterator<Item = DocNo>) -> Option<Self> {
        let mut live = self.live.clone();
        let mut changed = false;
        for docno in docnos {
            changed |= live.remove(docno.0);
        }
        changed.then(|| Self {
            max_doc: self.max_doc,
            generation: self.generation + 1,
            live,
        })
    }

    /// Live docnos in ascending order
    pub fn iter(&self) -> impl Iterator<Item = DocNo> + '_ {
        self.live.iter().map(DocNo)
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut bitmap = Vec::with_capacity(self.live.serialized_size());
        self.live.serialize_into(&mut bitmap)?;
        let file = LiveDocsFile {
            max_doc: self.max_doc,
            generation: self.generation,
            checksum: crc32fast::hash(&bitmap),
            bitmap,
        };
        bincode::serialize(&file).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let file: LiveDocsFile = bincode::deserialize(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if crc32fast::hash(&file.bitmap) != file.checksum {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "live docs checksum mismatch",
            ));
        }
        let live = RoaringBitmap::deserialize_from(&file.bitmap[..])?;
        if live.max().map_or(false, |m| m >= file.max_doc) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "live docs reference docno beyond max_doc",
            ));
        }
        Ok(Self {
            max_doc: file.max_doc,
            generation: file.generation,
            live,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_live() {
        let live = LiveDocs::all_live(5);
        assert_eq!(live.live_count(), 5);
        assert!(!live.has_deletions());
        assert!(live.is_live(DocNo(4)));
        assert!(!live.is_live(DocNo(5)));
    }

    #[test]
    fn test_copy_on_write_delete() {
        let gen0 = LiveDocs::all_live(4);
        let gen1 = gen0.with_deleted([DocNo(1), DocNo(3)]).unwrap();
        assert_eq!(gen1.generation(), 1);
        assert_eq!(gen1.live_count(), 2);
        assert!(gen0.is_live(DocNo(1)));
        assert!(!gen1.is_live(DocNo(1)));
        assert!(gen1.with_deleted([DocNo(1)]).is_none());
        assert_eq!(gen1.iter().collect::<Vec<_>>(), vec![DocNo(0), DocNo(2)]);
    }

    #[test]
    fn test_bytes_roundtrip_and_corruption() {
        let live = LiveDocs::all_live(10).with_deleted([DocNo(7)]).unwrap();
        let mut bytes = live.to_bytes().unwrap();
        assert_eq!(LiveDocs::from_bytes(&bytes).unwrap(), live);

        let last = bytes.len() - 5;
        bytes[last] ^= 0xFF;
        assert!(LiveDocs::from_bytes(&bytes).is_err());
    }
}
