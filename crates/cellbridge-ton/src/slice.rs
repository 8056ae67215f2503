//! Bit-level cursor over a chain of cells.
//!
//! A record may not fit in one cell. When the current cell runs out of bits,
//! the cursor moves into the cell's last reference (the
//! continuation cell) and carries on as if the bits were one stream.
//! Every move into a child counts against the depth limit, and the cells on
//! the current descent path are tracked so a cycle is rejected, not walked.
//!
//! A slice opened with [`CellSlice::single`] never continues: structures that
//! address their children explicitly read them with [`CellSlice::load_ref`].

use alloy_primitives::{I256, U256};
use cellbridge_core::DecodeError;
use tracing::trace;

use crate::cell::{Cell, CellTree};

#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    tree: &'a CellTree,
    cell: usize,
    bit_pos: usize,
    ref_pos: usize,
    chained: bool,
    depth: usize,
    max_depth: usize,
    path: Vec<usize>,
}

impl<'a> CellSlice<'a> {
    /// Open a cursor at the first bit of `cell`.
    pub fn new(tree: &'a CellTree, cell: usize, max_depth: usize) -> Result<Self, DecodeError> {
        Self::open(tree, cell, max_depth, true)
    }

    /// Open a cursor confined to `cell`; running out of bits is an error.
    pub fn single(tree: &'a CellTree, cell: usize) -> Result<Self, DecodeError> {
        Self::open(tree, cell, 0, false)
    }

    fn open(
        tree: &'a CellTree,
        cell: usize,
        max_depth: usize,
        chained: bool,
    ) -> Result<Self, DecodeError> {
        let c = tree
            .cell(cell)
            .ok_or_else(|| DecodeError::malformed(format!("cell {cell} does not exist")))?;
        if c.is_special() {
            return Err(DecodeError::malformed(format!(
                "cell {cell} is a special cell, expected ordinary data"
            )));
        }
        Ok(Self {
            tree,
            cell,
            bit_pos: 0,
            ref_pos: 0,
            chained,
            depth: 0,
            max_depth,
            path: vec![cell],
        })
    }

    fn current(&self) -> &'a Cell {
        // index validated on entry
        &self.tree.cells()[self.cell]
    }

    pub fn cell_index(&self) -> usize {
        self.cell
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Bits left in the current cell only (continuations not counted).
    pub fn remaining_bits(&self) -> usize {
        self.current().bit_len() - self.bit_pos
    }

    /// Abandon the rest of the current cell and continue reading from its
    /// first reference.
    pub fn descend_ref(&mut self) -> Result<(), DecodeError> {
        let child = *self.current().references().first().ok_or_else(|| {
            DecodeError::malformed(format!(
                "cell {} has no reference to descend into",
                self.cell
            ))
        })?;
        self.enter(child)
    }

    /// Next unread reference of the current cell, without descending into it.
    pub fn load_ref(&mut self) -> Result<usize, DecodeError> {
        let child = *self
            .current()
            .references()
            .get(self.ref_pos)
            .ok_or_else(|| {
                DecodeError::malformed(format!(
                    "cell {} has no reference #{}",
                    self.cell, self.ref_pos
                ))
            })?;
        self.ref_pos += 1;
        Ok(child)
    }

    /// Follow the continuation link once the current cell is exhausted.
    fn continue_stream(&mut self) -> Result<(), DecodeError> {
        if !self.chained {
            return Err(DecodeError::malformed(format!(
                "bit stream truncated: cell {} exhausted",
                self.cell
            )));
        }
        let child = *self.current().references().last().ok_or_else(|| {
            DecodeError::malformed(format!(
                "bit stream truncated: cell {} exhausted with no continuation cell",
                self.cell
            ))
        })?;
        self.enter(child)
    }

    fn enter(&mut self, child: usize) -> Result<(), DecodeError> {
        if self.depth + 1 > self.max_depth {
            return Err(DecodeError::limit(format!(
                "descent into cell {child} exceeds maximum depth {}",
                self.max_depth
            )));
        }
        if self.path.contains(&child) {
            return Err(DecodeError::malformed(format!(
                "reference cycle: cell {child} is already on the descent path"
            )));
        }
        let cell = self
            .tree
            .cell(child)
            .ok_or_else(|| DecodeError::malformed(format!("cell {child} does not exist")))?;
        if cell.is_special() {
            return Err(DecodeError::malformed(format!(
                "cell {child} is a special cell, expected ordinary data"
            )));
        }
        trace!(from = self.cell, to = child, depth = self.depth + 1, "descending");
        self.path.push(child);
        self.cell = child;
        self.bit_pos = 0;
        self.ref_pos = 0;
        self.depth += 1;
        Ok(())
    }

    pub fn load_bit(&mut self) -> Result<bool, DecodeError> {
        while self.remaining_bits() == 0 {
            self.continue_stream()?;
        }
        let bit = self.current().bit(self.bit_pos).unwrap_or(false);
        self.bit_pos += 1;
        Ok(bit)
    }

    /// Read `bits` (≤ 64) as a big-endian unsigned integer.
    pub fn load_u64(&mut self, bits: usize) -> Result<u64, DecodeError> {
        debug_assert!(bits <= 64);
        let mut acc = 0u64;
        for _ in 0..bits {
            acc = (acc << 1) | u64::from(self.load_bit()?);
        }
        Ok(acc)
    }

    /// Read `bits` (≤ 256) as a big-endian unsigned integer.
    pub fn load_uint(&mut self, bits: usize) -> Result<U256, DecodeError> {
        if bits > 256 {
            return Err(DecodeError::unsupported(format!(
                "integer width {bits} exceeds 256 bits"
            )));
        }
        let mut acc = U256::ZERO;
        for _ in 0..bits {
            acc = (acc << 1usize) | U256::from(u8::from(self.load_bit()?));
        }
        Ok(acc)
    }

    /// Read a byte-aligned little-endian unsigned integer.
    pub fn load_uint_le(&mut self, bits: usize) -> Result<U256, DecodeError> {
        if bits % 8 != 0 || bits > 256 {
            return Err(DecodeError::unsupported(format!(
                "little-endian field width {bits} must be a multiple of 8 up to 256"
            )));
        }
        let bytes = self.load_bits(bits)?;
        Ok(U256::from_le_slice(&bytes))
    }

    /// Read `bits` (≤ 256) as a two's-complement signed integer.
    pub fn load_int(&mut self, bits: usize) -> Result<I256, DecodeError> {
        let raw = self.load_uint(bits)?;
        if bits == 0 {
            return Ok(I256::ZERO);
        }
        let negative = raw.bit(bits - 1);
        let extended = if negative && bits < 256 {
            raw | (U256::MAX << bits)
        } else {
            raw
        };
        Ok(I256::from_raw(extended))
    }

    /// Read `bits` raw bits, packed MSB-first into `ceil(bits/8)` bytes.
    pub fn load_bits(&mut self, bits: usize) -> Result<Vec<u8>, DecodeError> {
        let mut out = vec![0u8; bits.div_ceil(8)];
        for i in 0..bits {
            if self.load_bit()? {
                out[i / 8] |= 0x80 >> (i % 8);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn tree(cells: Vec<Cell>) -> CellTree {
        CellTree::from_parts(cells, vec![0])
    }

    #[test]
    fn reads_across_continuation() {
        // cell 0: 0xAB (8 bits) → continuation cell 1: 0xCD
        let t = tree(vec![
            Cell::new(vec![0xab], 8, vec![1], false, 0),
            Cell::new(vec![0xcd], 8, vec![], false, 0),
        ]);
        let mut s = CellSlice::new(&t, 0, 4).unwrap();
        assert_eq!(s.load_u64(4).unwrap(), 0xa);
        assert_eq!(s.load_u64(8).unwrap(), 0xbc);
        assert_eq!(s.cell_index(), 1);
        assert_eq!(s.depth(), 1);
        assert_eq!(s.load_u64(4).unwrap(), 0xd);
    }

    #[test]
    fn truncated_stream() {
        let t = tree(vec![Cell::new(vec![0xff], 8, vec![], false, 0)]);
        let mut s = CellSlice::new(&t, 0, 4).unwrap();
        let err = s.load_u64(9).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInput { ref reason } if reason.contains("truncated")));
    }

    #[test]
    fn cycle_detected() {
        let t = tree(vec![
            Cell::new(vec![], 0, vec![1], false, 0),
            Cell::new(vec![], 0, vec![0], false, 0),
        ]);
        let mut s = CellSlice::new(&t, 0, 16).unwrap();
        let err = s.load_bit().unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInput { ref reason } if reason.contains("cycle")));
    }

    #[test]
    fn depth_limit() {
        let t = tree(vec![
            Cell::new(vec![], 0, vec![1], false, 0),
            Cell::new(vec![], 0, vec![2], false, 0),
            Cell::new(vec![0x80], 1, vec![], false, 0),
        ]);
        let mut s = CellSlice::new(&t, 0, 1).unwrap();
        let err = s.load_bit().unwrap_err();
        assert_eq!(err.kind(), "depth_or_size_limit_exceeded");

        let mut s = CellSlice::new(&t, 0, 2).unwrap();
        assert!(s.load_bit().unwrap());
    }

    #[test]
    fn signed_and_little_endian() {
        let t = tree(vec![Cell::new(vec![0xff, 0x01, 0x02], 24, vec![], false, 0)]);
        let mut s = CellSlice::new(&t, 0, 0).unwrap();
        assert_eq!(s.load_int(8).unwrap(), I256::MINUS_ONE);
        assert_eq!(s.load_uint_le(16).unwrap(), U256::from(0x0201u64));
    }

    #[test]
    fn descend_ref_uses_first_reference() {
        let t = tree(vec![
            Cell::new(vec![0x00], 8, vec![1, 2], false, 0),
            Cell::new(vec![0x11], 8, vec![], false, 0),
            Cell::new(vec![0x22], 8, vec![], false, 0),
        ]);
        let mut s = CellSlice::new(&t, 0, 4).unwrap();
        s.descend_ref().unwrap();
        assert_eq!(s.load_u64(8).unwrap(), 0x11);
    }

    #[test]
    fn single_cell_does_not_continue() {
        let t = tree(vec![
            Cell::new(vec![0xab], 8, vec![1, 2], false, 0),
            Cell::new(vec![0xcd], 8, vec![], false, 0),
            Cell::new(vec![0xef], 8, vec![], false, 0),
        ]);
        let mut s = CellSlice::single(&t, 0).unwrap();
        assert_eq!(s.load_ref().unwrap(), 1);
        assert_eq!(s.load_ref().unwrap(), 2);
        assert!(matches!(s.load_ref(), Err(DecodeError::MalformedInput { .. })));
        assert_eq!(s.load_u64(8).unwrap(), 0xab);
        let err = s.load_bit().unwrap_err();
        assert!(matches!(err, DecodeError::MalformedInput { ref reason } if reason.contains("truncated")));
    }

    #[test]
    fn special_cell_rejected() {
        let t = tree(vec![
            Cell::new(vec![], 0, vec![1], false, 0),
            Cell::new(vec![0x01], 8, vec![], true, 1),
        ]);
        let mut s = CellSlice::new(&t, 0, 4).unwrap();
        assert!(matches!(s.load_bit(), Err(DecodeError::MalformedInput { .. })));
    }
}
