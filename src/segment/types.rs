//! Core types for the segment-based index

use serde::{Deserialize, Serialize};
use std::fmt;

/// Segment identifier, allocated monotonically per index directory
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl SegmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Directory name of the segment inside the index directory
    pub fn dir_name(&self) -> String {
        format!("segment_{}", self.0)
    }

    /// Parse a directory name produced by [`SegmentId::dir_name`]
    pub fn parse_dir_name(name: &str) -> Option<Self> {
        name.strip_prefix("segment_")?.parse().ok().map(Self)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment_{}", self.0)
    }
}

/// Dense document number within a segment (0..max_doc)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocNo(pub u32);

impl DocNo {
    pub const MAX: DocNo = DocNo(u32::MAX);

    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DocNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a document inside a searcher snapshot.
///
/// Ordering is (segment, docno), which is the tie-break order for equal scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocAddress {
    pub segment: SegmentId,
    pub docno: DocNo,
}

impl DocAddress {
    pub fn new(segment: SegmentId, docno: DocNo) -> Self {
        Self { segment, docno }
    }
}

impl fmt::Display for DocAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.segment, self.docno)
    }
}

/// Byte separating the field name from the token in an encoded term key
pub const TERM_SEPARATOR: u8 = 0;

/// A (field, token) pair.
///
/// Encoded as `field ++ 0x00 ++ token`, so byte order of encoded keys equals
/// the derived order of `Term` values and all terms of a field are contiguous.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Term {
    field: String,
    bytes: Vec<u8>,
}

impl Term {
    pub fn new(field: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            bytes: token.into().into_bytes(),
        }
    }

    pub fn from_bytes(field: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field: field.into(),
            bytes,
        }
    }

    /// Term for a numeric value, ordered like the integers themselves
    pub fn numeric(field: impl Into<String>, value: i64) -> Self {
        Self::from_bytes(field, encode_i64(value).to_vec())
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_term_key(&self.field, &self.bytes)
    }

    pub fn decode(key: &[u8]) -> Option<Self> {
        let split = key.iter().position(|&b| b == TERM_SEPARATOR)?;
        let field = std::str::from_utf8(&key[..split]).ok()?;
        Some(Self::from_bytes(field, key[split + 1..].to_vec()))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Some(text) => write!(f, "{}:{}", self.field, text),
            None => write!(f, "{}:{:?}", self.field, self.bytes),
        }
    }
}

pub fn encode_term_key(field: &str, token: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(field.len() + 1 + token.len());
    key.extend_from_slice(field.as_bytes());
    key.push(TERM_SEPARATOR);
    key.extend_from_slice(token);
    key
}

/// Big-endian with the sign bit flipped, so byte order equals numeric order
pub fn encode_i64(value: i64) -> [u8; 8] {
    ((value as u64) ^ (1u64 << 63)).to_be_bytes()
}

pub fn decode_i64(bytes: &[u8]) -> Option<i64> {
    let arr: [u8; 8] = bytes.try_into().ok()?;
    Some((u64::from_be_bytes(arr) ^ (1u64 << 63)) as i64)
}

/// A single posting entry within a posting list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Dense document number within the segment
    pub docno: DocNo,
    /// Term frequency in this document
    pub term_frequency: u32,
    /// Token positions, ascending
    pub positions: Vec<u32>,
}

impl Posting {
    pub fn new(docno: DocNo, term_frequency: u32) -> Self {
        Self {
            docno,
            term_frequency,
            positions: Vec::new(),
        }
    }

    pub fn with_positions(docno: DocNo, positions: Vec<u32>) -> Self {
        Self {
            docno,
            term_frequency: positions.len() as u32,
            positions,
        }
    }
}

/// Postings per block (fixed size for skip data)
pub const BLOCK_SIZE: usize = 128;

/// Posting list metadata stored in the term dictionary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostingListMeta {
    /// Offset in the postings file
    pub offset: u64,
    /// Length in bytes
    pub length: u64,
    /// Document frequency (number of documents containing this term)
    pub doc_frequency: u32,
    /// Total term frequency across all documents
    pub total_term_frequency: u64,
}
