//! Postings format with block-based compression
//!
//! Postings are stored in fixed-size blocks of [`BLOCK_SIZE`] documents:
//! - docno deltas: bitpacked
//! - term frequencies: bitpacked
//! - positions: vbyte deltas, in a length-prefixed stream after the block
//! - skip data per block, written ahead of the blocks

use std::io;

use super::types::{DocNo, Posting, PostingListMeta, BLOCK_SIZE};

/// Variable-byte encoding for integers (commonly used in search engines)
pub fn encode_vbyte(value: u32, output: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            output.push(byte | 0x80); // high bit marks the last byte
            break;
        } else {
            output.push(byte);
        }
    }
}

/// Decode a variable-byte encoded integer
pub fn decode_vbyte(input: &[u8], pos: &mut usize) -> io::Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;

    loop {
        if *pos >= input.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected end of vbyte",
            ));
        }

        let byte = input[*pos];
        *pos += 1;

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 != 0 {
            return Ok(result);
        }

        shift += 7;
        if shift > 28 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "VByte value too large",
            ));
        }
    }
}

/// Simple bitpacking for a block of integers
/// Uses the minimum number of bits needed to represent the max value
pub fn bitpack_encode(values: &[u32], output: &mut Vec<u8>) {
    let max_val = match values.iter().max() {
        Some(&max) => max,
        None => {
            output.push(0);
            return;
        }
    };
    let bits_needed = if max_val == 0 {
        1
    } else {
        32 - max_val.leading_zeros()
    } as u8;

    output.push(bits_needed);

    let mut current_byte: u64 = 0;
    let mut bits_in_current = 0;

    for &value in values {
        current_byte |= (value as u64) << bits_in_current;
        bits_in_current += bits_needed as u32;

        while bits_in_current >= 8 {
            output.push(current_byte as u8);
            current_byte >>= 8;
            bits_in_current -= 8;
        }
    }

    if bits_in_current > 0 {
        output.push(current_byte as u8);
    }
}

/// Decode bitpacked integers
pub fn bitpack_decode(input: &[u8], pos: &mut usize, count: usize) -> io::Result<Vec<u32>> {
    if *pos >= input.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Unexpected end of bitpack",
        ));
    }

    let bits_needed = input[*pos] as u32;
    *pos += 1;

    if bits_needed == 0 {
        return Ok(vec![0; count]);
    }
    if bits_needed > 32 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Invalid bitpack width",
        ));
    }

    let total_bits = count as u64 * bits_needed as u64;
    let bytes_needed = ((total_bits + 7) / 8) as usize;

    if *pos + bytes_needed > input.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Not enough bytes for bitpack",
        ));
    }

    let mut values = Vec::with_capacity(count);
    let mut current: u64 = 0;
    let mut bits_available = 0;
    let mask = (1u64 << bits_needed) - 1;

    for _ in 0..count {
        while bits_available < bits_needed {
            current |= (input[*pos] as u64) << bits_available;
            *pos += 1;
            bits_available += 8;
        }

        values.push((current & mask) as u32);
        current >>= bits_needed;
        bits_available -= bits_needed;
    }

    Ok(values)
}

/// Skip data for fast block skipping during query processing
#[derive(Clone, Debug, Default)]
pub struct SkipEntry {
    /// Maximum docno in this block
    pub max_docno: DocNo,
    /// Offset to this block, relative to the first block
    pub block_offset: u64,
}

/// Writer for posting lists
pub struct PostingsWriter {
    /// Accumulated blocks for current posting list
    block_data: Vec<u8>,
    /// Skip entries for the current term
    skip_entries: Vec<SkipEntry>,
    /// Current block being built
    current_block: Vec<Posting>,
    /// Last docno written, base for delta encoding across blocks
    last_docno: u32,
    doc_frequency: u32,
    total_term_frequency: u64,
    /// Final output data
    data: Vec<u8>,
}

impl PostingsWriter {
    pub fn new() -> Self {
        Self {
            block_data: Vec::new(),
            skip_entries: Vec::new(),
            current_block: Vec::with_capacity(BLOCK_SIZE),
            last_docno: 0,
            doc_frequency: 0,
            total_term_frequency: 0,
            data: Vec::new(),
        }
    }

    /// Start writing a new posting list
    pub fn start_posting_list(&mut self) {
        self.block_data.clear();
        self.skip_entries.clear();
        self.current_block.clear();
        self.last_docno = 0;
        self.doc_frequency = 0;
        self.total_term_frequency = 0;
    }

    /// Add a posting to the current list; docnos must be strictly ascending
    pub fn add_posting(&mut self, posting: Posting) {
        debug_assert!(self
            .current_block
            .last()
            .map_or(true, |last| last.docno < posting.docno));
        self.doc_frequency += 1;
        self.total_term_frequency += posting.term_frequency as u64;
        self.current_block.push(posting);

        if self.current_block.len() >= BLOCK_SIZE {
            self.flush_block();
        }
    }

    /// Finish writing a posting list and return metadata
    pub fn finish_posting_list(&mut self) -> PostingListMeta {
        if !self.current_block.is_empty() {
            self.flush_block();
        }

        let offset = self.data.len() as u64;

        encode_vbyte(self.skip_entries.len() as u32, &mut self.data);

        for skip in &self.skip_entries {
            encode_vbyte(skip.max_docno.0, &mut self.data);
            self.data.extend_from_slice(&skip.block_offset.to_le_bytes());
        }

        self.data.extend_from_slice(&self.block_data);

        let length = self.data.len() as u64 - offset;

        PostingListMeta {
            offset,
            length,
            doc_frequency: self.doc_frequency,
            total_term_frequency: self.total_term_frequency,
        }
    }

    /// Take the data (consuming the writer)
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn flush_block(&mut self) {
        let Some(last) = self.current_block.last() else {
            return;
        };
        let max_docno = last.docno;

        self.skip_entries.push(SkipEntry {
            max_docno,
            block_offset: self.block_data.len() as u64,
        });

        encode_vbyte(self.current_block.len() as u32, &mut self.block_data);

        let mut deltas = Vec::with_capacity(self.current_block.len());
        let mut prev = self.last_docno;
        for posting in &self.current_block {
            deltas.push(posting.docno.0 - prev);
            prev = posting.docno.0;
        }
        bitpack_encode(&deltas, &mut self.block_data);

        let tfs: Vec<u32> = self
            .current_block
            .iter()
            .map(|p| p.term_frequency)
            .collect();
        bitpack_encode(&tfs, &mut self.block_data);

        let mut positions = Vec::new();
        for posting in &self.current_block {
            let mut prev_pos = 0u32;
            for &pos in &posting.positions {
                encode_vbyte(pos - prev_pos, &mut positions);
                prev_pos = pos;
            }
        }
        encode_vbyte(positions.len() as u32, &mut self.block_data);
        self.block_data.extend_from_slice(&positions);

        self.last_docno = max_docno.0;
        self.current_block.clear();
    }
}

impl Default for PostingsWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader for posting lists
#[derive(Debug)]
pub struct PostingsReader {
    data: Vec<u8>,
}

impl PostingsReader {
    /// Create a reader from data
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Get an iterator over postings for a term
    pub fn get_postings(&self, meta: &PostingListMeta) -> io::Result<PostingIterator<'_>> {
        let start = meta.offset as usize;
        let end = (meta.offset + meta.length) as usize;

        if end > self.data.len() || start > end {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Posting list extends beyond data",
            ));
        }

        PostingIterator::new(&self.data[start..end])
    }
}

/// Iterator over postings in a posting list
pub struct PostingIterator<'a> {
    data: &'a [u8],
    /// Position in data where blocks start (after skip entries)
    blocks_start: usize,
    /// Current position in data
    pos: usize,
    skip_entries: Vec<SkipEntry>,
    /// Index of the next block to decode
    next_block_idx: usize,
    current_block: Vec<Posting>,
    /// Position within current block
    block_pos: usize,
    /// Last docno decoded (for delta decoding)
    last_docno: u32,
}

impl<'a> PostingIterator<'a> {
    pub fn new(data: &'a [u8]) -> io::Result<Self> {
        let mut pos = 0;
        let block_count = decode_vbyte(data, &mut pos)? as usize;

        let mut skip_entries = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            let max_docno = decode_vbyte(data, &mut pos)?;
            let bytes: [u8; 8] = data
                .get(pos..pos + 8)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::UnexpectedEof, "Truncated skip entry")
                })?;
            pos += 8;

            skip_entries.push(SkipEntry {
                max_docno: DocNo(max_docno),
                block_offset: u64::from_le_bytes(bytes),
            });
        }

        Ok(Self {
            data,
            blocks_start: pos,
            pos,
            skip_entries,
            next_block_idx: 0,
            current_block: Vec::new(),
            block_pos: 0,
            last_docno: 0,
        })
    }

    /// Skip to the first posting with docno >= target
    pub fn skip_to(&mut self, target: DocNo) -> Option<Posting> {
        let in_current = self
            .current_block
            .last()
            .map_or(false, |last| last.docno >= target && self.block_pos < self.current_block.len());

        if !in_current {
            // Jump over whole blocks whose max docno is below the target
            let mut idx = self.next_block_idx;
            while idx < self.skip_entries.len() && self.skip_entries[idx].max_docno < target {
                idx += 1;
            }
            if idx >= self.skip_entries.len() {
                self.next_block_idx = idx;
                self.current_block.clear();
                self.block_pos = 0;
                return None;
            }
            if idx > self.next_block_idx {
                self.pos = self.blocks_start + self.skip_entries[idx].block_offset as usize;
                self.last_docno = self.skip_entries[idx - 1].max_docno.0;
                self.next_block_idx = idx;
                self.current_block.clear();
                self.block_pos = 0;
            }
        }

        for posting in self.by_ref() {
            if posting.docno >= target {
                return Some(posting);
            }
        }
        None
    }

    fn load_next_block(&mut self) -> io::Result<bool> {
        if self.next_block_idx >= self.skip_entries.len() {
            return Ok(false);
        }

        let count = decode_vbyte(self.data, &mut self.pos)? as usize;
        let deltas = bitpack_decode(self.data, &mut self.pos, count)?;
        let tfs = bitpack_decode(self.data, &mut self.pos, count)?;
        let positions_len = decode_vbyte(self.data, &mut self.pos)? as usize;
        let positions_end = self.pos + positions_len;
        if positions_end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Truncated positions stream",
            ));
        }

        self.current_block.clear();
        let mut docno = self.last_docno;
        for (delta, tf) in deltas.into_iter().zip(tfs) {
            docno += delta;
            let mut positions = Vec::with_capacity(tf as usize);
            let mut prev = 0u32;
            for _ in 0..tf {
                prev += decode_vbyte(&self.data[..positions_end], &mut self.pos)?;
                positions.push(prev);
            }
            self.current_block.push(Posting {
                docno: DocNo(docno),
                term_frequency: tf,
                positions,
            });
        }
        self.pos = positions_end;
        self.last_docno = docno;
        self.block_pos = 0;
        self.next_block_idx += 1;
        Ok(true)
    }
}

impl<'a> Iterator for PostingIterator<'a> {
    type Item = Posting;

    fn next(&mut self) -> Option<Self::Item> {
        if self.block_pos >= self.current_block.len() {
            match self.load_next_block() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to decode posting block");
                    self.next_block_idx = self.skip_entries.len();
                    return None;
                }
            }
        }

        let slot = self.current_block.get_mut(self.block_pos)?;
        self.block_pos += 1;
        Some(std::mem::replace(slot, Posting::new(DocNo(0), 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_list(postings: Vec<Posting>) -> (PostingsReader, PostingListMeta) {
        let mut writer = PostingsWriter::new();
        writer.start_posting_list();
        for posting in postings {
            writer.add_posting(posting);
        }
        let meta = writer.finish_posting_list();
        (PostingsReader::new(writer.into_data()), meta)
    }

    #[test]
    fn test_vbyte_encoding() {
        let mut output = Vec::new();

        encode_vbyte(0, &mut output);
        encode_vbyte(127, &mut output);
        encode_vbyte(128, &mut output);
        encode_vbyte(16383, &mut output);
        encode_vbyte(1_000_000, &mut output);

        let mut pos = 0;
        assert_eq!(decode_vbyte(&output, &mut pos).unwrap(), 0);
        assert_eq!(decode_vbyte(&output, &mut pos).unwrap(), 127);
        assert_eq!(decode_vbyte(&output, &mut pos).unwrap(), 128);
        assert_eq!(decode_vbyte(&output, &mut pos).unwrap(), 16383);
        assert_eq!(decode_vbyte(&output, &mut pos).unwrap(), 1_000_000);
    }

    #[test]
    fn test_bitpack_large_values() {
        let values = vec![1000, 2000, 3000, 4000];
        let mut output = Vec::new();

        bitpack_encode(&values, &mut output);

        let mut pos = 0;
        let decoded = bitpack_decode(&output, &mut pos, values.len()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(pos, output.len());
    }

    #[test]
    fn test_postings_with_positions() {
        let (reader, meta) = write_list(vec![
            Posting::with_positions(DocNo(0), vec![0, 4]),
            Posting::with_positions(DocNo(3), vec![7]),
            Posting::with_positions(DocNo(10), vec![1, 2, 30]),
        ]);
        assert_eq!(meta.doc_frequency, 3);
        assert_eq!(meta.total_term_frequency, 6);

        let postings: Vec<_> = reader.get_postings(&meta).unwrap().collect();
        assert_eq!(postings.len(), 3);
        assert_eq!(postings[0].positions, vec![0, 4]);
        assert_eq!(postings[1].docno, DocNo(3));
        assert_eq!(postings[2].positions, vec![1, 2, 30]);
        assert_eq!(postings[2].term_frequency, 3);
    }

    #[test]
    fn test_multi_block_docnos() {
        let input: Vec<Posting> = (0..300)
            .map(|i| Posting::with_positions(DocNo(i * 3 + 1), vec![i]))
            .collect();
        let (reader, meta) = write_list(input.clone());
        let output: Vec<_> = reader.get_postings(&meta).unwrap().collect();
        assert_eq!(output, input);
    }

    #[test]
    fn test_postings_skip() {
        let input: Vec<Posting> = (0..300)
            .map(|i| Posting::with_positions(DocNo(i * 2), vec![0]))
            .collect();
        let (reader, meta) = write_list(input);
        let mut iter = reader.get_postings(&meta).unwrap();

        let hit = iter.skip_to(DocNo(401)).unwrap();
        assert_eq!(hit.docno, DocNo(402));
        let next = iter.next().unwrap();
        assert_eq!(next.docno, DocNo(404));
        assert_eq!(iter.skip_to(DocNo(404)).map(|p| p.docno), Some(DocNo(406)));
        assert!(iter.skip_to(DocNo(10_000)).is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_truncated_header_is_error() {
        assert!(PostingIterator::new(&[0x05]).is_err());
    }
}
