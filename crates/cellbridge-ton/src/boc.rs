//! Bag-of-cells (BOC) deserializer.
//!
//! # Wire layout
//! ```text
//! magic            4 bytes   b5ee9c72 | 68ff65f3 | acc3a728
//! flags            1 byte    has_idx:1 has_crc32c:1 has_cache_bits:1 flags:2 ref_size:3
//! off_size         1 byte
//! cells            ref_size  big-endian
//! roots            ref_size
//! absent           ref_size
//! tot_cells_size   off_size
//! root_list        roots * ref_size            (generic magic only)
//! index            cells * off_size            (if has_idx, skipped)
//! cell_data        tot_cells_size bytes
//! crc32c           4 bytes little-endian       (if has_crc32c)
//! ```
//!
//! Each serialized cell is `d1 d2 [hashes] data refs`:
//! - `d1 = refs + 8*special + 16*with_hashes + 32*level_mask`
//! - `d2 = ceil(bits/8) + floor(bits/8)`; an odd `d2` means the last data
//!   byte carries a completion tag (a single `1` bit followed by zeros).
//!
//! Decoding runs in two passes over a pre-sized arena: cells are first
//! materialized with raw reference indices, then every index is resolved.
//! References may therefore point forward or backward.

use cellbridge_core::{DecodeError, DecodeLimits};
use tracing::{debug, trace};

use crate::cell::{Cell, CellTree, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::crc::crc32c;

pub const BOC_GENERIC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];
pub const BOC_INDEXED_MAGIC: [u8; 4] = [0x68, 0xff, 0x65, 0xf3];
pub const BOC_INDEXED_CRC32C_MAGIC: [u8; 4] = [0xac, 0xc3, 0xa7, 0x28];

/// Bytes of stored hash + depth per level when `with_hashes` is set.
const STORED_HASH_LEN: usize = 32 + 2;

/// Parsed BOC header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BocHeader {
    pub magic: [u8; 4],
    pub has_index: bool,
    pub has_crc32c: bool,
    pub has_cache_bits: bool,
    pub ref_size: usize,
    pub offset_size: usize,
    pub cell_count: usize,
    pub root_count: usize,
    pub absent_count: usize,
    pub total_cells_size: usize,
    pub root_indices: Vec<usize>,
}

/// A cell after the first pass: reference indices not yet validated.
struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
    special: bool,
    level_mask: u8,
}

/// Decodes serialized bags of cells into a `CellTree`.
#[derive(Debug, Clone, Default)]
pub struct BocDecoder {
    limits: DecodeLimits,
}

impl BocDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: DecodeLimits) -> Self {
        Self { limits }
    }

    /// Decode raw BOC bytes. Pure and deterministic: identical bytes always
    /// produce an identical tree with the same index order.
    pub fn decode(&self, bytes: &[u8]) -> Result<CellTree, DecodeError> {
        let mut reader = ByteReader::new(bytes);
        let header = self.read_header(&mut reader)?;

        // The checksum covers everything before it, header included.
        let body_end = if header.has_crc32c {
            let end = bytes
                .len()
                .checked_sub(4)
                .filter(|end| *end >= reader.pos)
                .ok_or_else(|| DecodeError::malformed("stream too short for crc32c trailer"))?;
            let mut stored = [0u8; 4];
            stored.copy_from_slice(&bytes[end..]);
            let stored = u32::from_le_bytes(stored);
            let computed = crc32c(&bytes[..end]);
            if stored != computed {
                return Err(DecodeError::malformed(format!(
                    "crc32c mismatch: stored {stored:#010x}, computed {computed:#010x}"
                )));
            }
            end
        } else {
            bytes.len()
        };
        reader.limit(body_end);

        if header.has_index {
            reader.skip(header.cell_count * header.offset_size, "cell index")?;
        }

        if reader.remaining() < header.total_cells_size {
            return Err(DecodeError::malformed(format!(
                "cell data truncated: header declares {} bytes, {} remain",
                header.total_cells_size,
                reader.remaining()
            )));
        }

        let cells_start = reader.pos;
        let mut raw_cells = Vec::with_capacity(header.cell_count);
        for index in 0..header.cell_count {
            raw_cells.push(read_cell(&mut reader, header.ref_size, index)?);
        }

        let consumed = reader.pos - cells_start;
        if consumed != header.total_cells_size {
            return Err(DecodeError::malformed(format!(
                "cell data size mismatch: header declares {}, cells occupy {consumed}",
                header.total_cells_size
            )));
        }
        if reader.remaining() != 0 {
            return Err(DecodeError::malformed(format!(
                "{} trailing bytes after cell data",
                reader.remaining()
            )));
        }

        let tree = resolve(raw_cells, &header.root_indices)?;
        debug!(
            cells = tree.len(),
            roots = tree.roots().len(),
            crc = header.has_crc32c,
            "decoded bag of cells"
        );
        Ok(tree)
    }

    /// Parse the fixed header and root list, leaving `reader` at the index
    /// (or cell data when no index is present).
    pub fn read_header(&self, reader: &mut ByteReader<'_>) -> Result<BocHeader, DecodeError> {
        let magic_bytes = reader.take(4, "magic")?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(magic_bytes);

        let generic = match magic {
            BOC_GENERIC_MAGIC => true,
            BOC_INDEXED_MAGIC | BOC_INDEXED_CRC32C_MAGIC => false,
            other => {
                return Err(DecodeError::malformed(format!(
                    "unknown bag-of-cells magic 0x{}",
                    hex::encode(other)
                )))
            }
        };

        let flags = reader.u8("flags")?;
        let (has_index, has_crc32c, has_cache_bits) = if generic {
            (flags & 0x80 != 0, flags & 0x40 != 0, flags & 0x20 != 0)
        } else {
            (true, magic == BOC_INDEXED_CRC32C_MAGIC, false)
        };
        if has_cache_bits && !has_index {
            return Err(DecodeError::malformed("cache bits flagged without an index"));
        }

        let ref_size = usize::from(flags & 0x07);
        if !(1..=4).contains(&ref_size) {
            return Err(DecodeError::malformed(format!(
                "reference size {ref_size} outside 1..=4"
            )));
        }
        let offset_size = usize::from(reader.u8("offset size")?);
        if !(1..=8).contains(&offset_size) {
            return Err(DecodeError::malformed(format!(
                "offset size {offset_size} outside 1..=8"
            )));
        }

        let cell_count = reader.read_be(ref_size, "cell count")?;
        let root_count = reader.read_be(ref_size, "root count")?;
        let absent_count = reader.read_be(ref_size, "absent count")?;
        let total_cells_size = reader.read_be(offset_size, "total cells size")?;

        if cell_count > self.limits.max_cells {
            return Err(DecodeError::limit(format!(
                "{cell_count} cells exceeds limit of {}",
                self.limits.max_cells
            )));
        }
        if root_count > self.limits.max_roots {
            return Err(DecodeError::limit(format!(
                "{root_count} roots exceeds limit of {}",
                self.limits.max_roots
            )));
        }
        if root_count > cell_count || absent_count > cell_count {
            return Err(DecodeError::malformed(format!(
                "header inconsistent: {cell_count} cells, {root_count} roots, {absent_count} absent"
            )));
        }
        // Every cell needs at least its two descriptor bytes.
        if total_cells_size < cell_count * 2 {
            return Err(DecodeError::malformed(format!(
                "{total_cells_size} bytes cannot hold {cell_count} cells"
            )));
        }

        let root_indices = if generic {
            let mut roots = Vec::with_capacity(root_count);
            for _ in 0..root_count {
                roots.push(reader.read_be(ref_size, "root index")?);
            }
            roots
        } else {
            (0..root_count).collect()
        };

        trace!(
            cell_count,
            root_count,
            ref_size,
            offset_size,
            has_index,
            has_crc32c,
            "bag-of-cells header"
        );

        Ok(BocHeader {
            magic,
            has_index,
            has_crc32c,
            has_cache_bits,
            ref_size,
            offset_size,
            cell_count,
            root_count,
            absent_count,
            total_cells_size,
            root_indices,
        })
    }
}

fn read_cell(reader: &mut ByteReader<'_>, ref_size: usize, index: usize) -> Result<RawCell, DecodeError> {
    let d1 = reader.u8("cell descriptor")?;
    let d2 = reader.u8("cell descriptor")?;

    let ref_count = usize::from(d1 & 0x07);
    if ref_count == 7 {
        return Err(DecodeError::malformed(format!("cell {index} is an absent cell")));
    }
    if ref_count > MAX_CELL_REFS {
        return Err(DecodeError::malformed(format!(
            "cell {index} declares {ref_count} references"
        )));
    }
    let special = d1 & 0x08 != 0;
    let with_hashes = d1 & 0x10 != 0;
    let level_mask = d1 >> 5;

    if with_hashes {
        let hash_count = level_mask.count_ones() as usize + 1;
        reader.skip(hash_count * STORED_HASH_LEN, "stored cell hashes")?;
    }

    let data_len = (usize::from(d2) + 1) / 2;
    let mut data = reader.take(data_len, "cell data")?.to_vec();
    let bit_len = if d2 & 1 == 1 {
        // d2 odd ⇒ data_len >= 1
        let last = data[data_len - 1];
        if last == 0 {
            return Err(DecodeError::malformed(format!(
                "cell {index} is missing its completion tag"
            )));
        }
        (data_len - 1) * 8 + 7 - last.trailing_zeros() as usize
    } else {
        data_len * 8
    };
    if bit_len > MAX_CELL_BITS {
        return Err(DecodeError::malformed(format!(
            "cell {index} holds {bit_len} bits, maximum is {MAX_CELL_BITS}"
        )));
    }
    data.truncate(bit_len.div_ceil(8));

    let mut refs = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        refs.push(reader.read_be(ref_size, "cell reference")?);
    }

    Ok(RawCell {
        data,
        bit_len,
        refs,
        special,
        level_mask,
    })
}

/// Second pass: turn raw indices into validated arena links.
fn resolve(raw_cells: Vec<RawCell>, root_indices: &[usize]) -> Result<CellTree, DecodeError> {
    let n = raw_cells.len();

    for (pos, &root) in root_indices.iter().enumerate() {
        if root >= n {
            return Err(DecodeError::malformed(format!(
                "root {pos} references cell {root}, but only {n} cells exist"
            )));
        }
    }

    let mut cells = Vec::with_capacity(n);
    for (index, raw) in raw_cells.into_iter().enumerate() {
        if let Some(&bad) = raw.refs.iter().find(|&&r| r >= n) {
            return Err(DecodeError::malformed(format!(
                "cell {index} references cell {bad}, but only {n} cells exist"
            )));
        }
        cells.push(Cell::new(
            raw.data,
            raw.bit_len,
            raw.refs,
            raw.special,
            raw.level_mask,
        ));
    }

    Ok(CellTree::from_parts(cells, root_indices.to_vec()))
}

/// Bounds-checked big-endian cursor over a byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            end: bytes.len(),
        }
    }

    fn limit(&mut self, end: usize) {
        self.end = end.min(self.bytes.len());
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::malformed(format!(
                "truncated {what}: need {n} bytes at offset {}, {} remain",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn skip(&mut self, n: usize, what: &str) -> Result<(), DecodeError> {
        self.take(n, what).map(|_| ())
    }

    fn u8(&mut self, what: &str) -> Result<u8, DecodeError> {
        Ok(self.take(1, what)?[0])
    }

    /// Read an unsigned big-endian integer of `width` bytes (1..=8).
    fn read_be(&mut self, width: usize, what: &str) -> Result<usize, DecodeError> {
        let bytes = self.take(width, what)?;
        let value = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        usize::try_from(value)
            .map_err(|_| DecodeError::malformed(format!("{what} {value} does not fit in memory")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One root cell with 8 data bits (0xAB) and no refs; generic magic,
    /// ref_size 1, off_size 1.
    fn single_cell_boc(with_crc: bool) -> Vec<u8> {
        let mut b = BOC_GENERIC_MAGIC.to_vec();
        b.push(if with_crc { 0x41 } else { 0x01 });
        b.push(0x01); // off_size
        b.extend_from_slice(&[1, 1, 0, 4]); // cells, roots, absent, tot_size
        b.push(0); // root 0
        b.extend_from_slice(&[0x00, 0x04, 0xab, 0xcd]); // d1, d2, data
        if with_crc {
            let crc = crc32c(&b);
            b.extend_from_slice(&crc.to_le_bytes());
        }
        b
    }

    #[test]
    fn decode_minimal_tree() {
        let tree = BocDecoder::new().decode(&single_cell_boc(false)).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.roots(), &[0]);
        let root = tree.cell(0).unwrap();
        assert_eq!(root.bit_len(), 16);
        assert_eq!(root.data(), &[0xab, 0xcd]);
    }

    #[test]
    fn crc_verified_and_mismatch_rejected() {
        let good = single_cell_boc(true);
        assert!(BocDecoder::new().decode(&good).is_ok());

        let mut bad = good.clone();
        let last = bad.len() - 1;
        bad[last] ^= 0xff;
        let err = BocDecoder::new().decode(&bad).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInput { ref reason } if reason.contains("crc32c")));
    }

    #[test]
    fn completion_tag_sets_bit_length() {
        let mut b = BOC_GENERIC_MAGIC.to_vec();
        b.extend_from_slice(&[0x01, 0x01, 1, 1, 0, 3, 0]);
        // d2 = 1 → one byte with completion tag: 0b1010_1000 → 4 bits "1010"
        b.extend_from_slice(&[0x00, 0x01, 0b1010_1000]);
        let tree = BocDecoder::new().decode(&b).unwrap();
        let cell = tree.cell(0).unwrap();
        assert_eq!(cell.bit_len(), 4);
        assert_eq!(cell.data(), &[0b1010_0000]);
    }

    #[test]
    fn root_index_out_of_range() {
        let mut b = single_cell_boc(false);
        b[10] = 5; // root index
        let err = BocDecoder::new().decode(&b).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
    }

    #[test]
    fn reference_index_out_of_range() {
        let mut b = BOC_GENERIC_MAGIC.to_vec();
        b.extend_from_slice(&[0x01, 0x01, 1, 1, 0, 3, 0]);
        b.extend_from_slice(&[0x01, 0x00, 0x09]); // one ref → cell 9
        let err = BocDecoder::new().decode(&b).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInput { ref reason } if reason.contains("cell 9")));
    }

    #[test]
    fn descriptor_longer_than_data_is_malformed() {
        let mut b = BOC_GENERIC_MAGIC.to_vec();
        b.extend_from_slice(&[0x01, 0x01, 1, 1, 0, 4, 0]);
        b.extend_from_slice(&[0x00, 0x08, 0xaa, 0xbb]); // claims 4 bytes, has 2
        let err = BocDecoder::new().decode(&b).unwrap_err();
        assert_eq!(err.kind(), "malformed_input");
    }

    #[test]
    fn unknown_magic_rejected() {
        let err = BocDecoder::new().decode(&[0xde, 0xad, 0xbe, 0xef, 0x01]).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInput { .. }));
    }

    #[test]
    fn trailing_garbage_rejected() {
        let mut b = single_cell_boc(false);
        b.push(0x00);
        assert!(BocDecoder::new().decode(&b).is_err());
    }

    #[test]
    fn cell_limit_enforced() {
        let limits = DecodeLimits {
            max_cells: 0,
            ..DecodeLimits::default()
        };
        let err = BocDecoder::with_limits(limits)
            .decode(&single_cell_boc(false))
            .unwrap_err();
        assert_eq!(err.kind(), "depth_or_size_limit_exceeded");
    }

    #[test]
    fn legacy_indexed_magic_with_implicit_root() {
        let mut b = BOC_INDEXED_MAGIC.to_vec();
        b.push(0x01); // ref_size
        b.push(0x01); // off_size
        b.extend_from_slice(&[1, 1, 0, 3]);
        b.push(3); // index entry for cell 0
        b.extend_from_slice(&[0x00, 0x02, 0x7f]);
        let tree = BocDecoder::new().decode(&b).unwrap();
        assert_eq!(tree.roots(), &[0]);
        assert_eq!(tree.cell(0).unwrap().data(), &[0x7f]);
    }

    #[test]
    fn stored_hashes_are_skipped() {
        let mut b = BOC_GENERIC_MAGIC.to_vec();
        b.extend_from_slice(&[0x01, 0x01, 1, 1, 0, 2 + 34 + 1, 0]);
        b.extend_from_slice(&[0x10, 0x02]); // with_hashes, level 0, 1 byte
        b.extend_from_slice(&[0x11; 34]);
        b.push(0x42);
        let tree = BocDecoder::new().decode(&b).unwrap();
        assert_eq!(tree.cell(0).unwrap().data(), &[0x42]);
    }

    #[test]
    fn decoding_is_deterministic() {
        let bytes = single_cell_boc(true);
        let a = BocDecoder::new().decode(&bytes).unwrap();
        let b = BocDecoder::new().decode(&bytes).unwrap();
        assert_eq!(a, b);
    }
}
