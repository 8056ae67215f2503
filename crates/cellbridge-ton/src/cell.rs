//! Cells and the index-addressed cell arena.
//!
//! A cell tree is a DAG: one cell may be referenced by several parents.
//! References are stored as arena indices rather than owning links, so
//! shared children need no reference counting and a cycle can never leak.

/// Maximum number of data bits a single cell can hold.
pub const MAX_CELL_BITS: usize = 1023;
/// Maximum number of child references per cell.
pub const MAX_CELL_REFS: usize = 4;

/// The atomic unit of the tree format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    /// `ceil(bit_len / 8)` bytes, MSB first; bits past `bit_len` are zero.
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<usize>,
    /// Exotic cell (pruned branch, library reference, Merkle proof/update)
    special: bool,
    level_mask: u8,
}

impl Cell {
    /// Build a cell from raw parts. Bits past `bit_len` in the last byte are cleared.
    ///
    /// Callers guarantee `data.len() == ceil(bit_len / 8)`.
    pub fn new(
        mut data: Vec<u8>,
        bit_len: usize,
        references: Vec<usize>,
        special: bool,
        level_mask: u8,
    ) -> Self {
        debug_assert_eq!(data.len(), bit_len.div_ceil(8));
        let rem = bit_len % 8;
        if rem != 0 {
            if let Some(last) = data.last_mut() {
                *last &= 0xffu8 << (8 - rem);
            }
        }
        Self {
            data,
            bit_len,
            references,
            special,
            level_mask,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn references(&self) -> &[usize] {
        &self.references
    }

    pub fn is_special(&self) -> bool {
        self.special
    }

    pub fn level_mask(&self) -> u8 {
        self.level_mask
    }

    /// Bit at position `i` (0 = most significant bit of the first byte).
    pub fn bit(&self, i: usize) -> Option<bool> {
        if i >= self.bit_len {
            return None;
        }
        Some(self.data[i / 8] & (0x80 >> (i % 8)) != 0)
    }

    /// Hex rendering in the usual "augmented" form: an odd bit length gets a
    /// trailing `_` after the completion-tagged final nibble.
    pub fn to_hex_string(&self) -> String {
        let mut s = hex::encode(&self.data);
        let rem = self.bit_len % 8;
        if rem == 0 {
            return s;
        }
        // Re-append the completion tag so the padding is visible.
        let last = self.data[self.data.len() - 1] | (0x80 >> rem);
        s.truncate(s.len() - 2);
        s.push_str(&hex::encode([last]));
        if rem < 4 {
            // tag sits in the high nibble; the low one is all padding
            s.pop();
        }
        s.push('_');
        s
    }
}

/// A decoded bag of cells: an immutable arena plus designated roots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CellTree {
    cells: Vec<Cell>,
    roots: Vec<usize>,
}

impl CellTree {
    /// Build a tree. All indices must already be resolved against `cells`.
    pub(crate) fn from_parts(cells: Vec<Cell>, roots: Vec<usize>) -> Self {
        Self { cells, roots }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// The primary (first) root, if any.
    pub fn root(&self) -> Option<usize> {
        self.roots.first().copied()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
