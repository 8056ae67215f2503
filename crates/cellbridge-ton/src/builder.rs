//! Writing side of the cell format.
//!
//! - [`CellBuilder`] packs bits and references into a single [`Cell`].
//! - [`TreeBuilder`] collects cells into a [`CellTree`] arena.
//! - [`BocWriter`] serializes a tree in parent-before-child order.
//! - [`EventWriter`] inverts an [`EventLayout`]: record in, cell tree out.
//!   It is what fixtures and round-trip tests are produced with.

use alloy_primitives::U256;
use cellbridge_core::{DecodeError, EventRecord, RecordValue};
use tracing::debug;

use crate::boc::BOC_GENERIC_MAGIC;
use crate::cell::{Cell, CellTree, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::crc::crc32c;
use crate::layout::{Endian, EventLayout, Step, EXTERNAL_EVENT_V1};

// ─── Bit buffer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct BitBuf {
    bits: Vec<bool>,
}

impl BitBuf {
    fn push_u64(&mut self, value: u64, bits: usize) {
        for i in (0..bits).rev() {
            self.bits.push(i < 64 && (value >> i) & 1 == 1);
        }
    }

    fn push_uint(&mut self, value: U256, bits: usize) {
        for i in (0..bits).rev() {
            self.bits.push(i < 256 && value.bit(i));
        }
    }

    /// `bits` bits of `bytes`, MSB first; missing bytes read as zero.
    fn push_bytes(&mut self, bytes: &[u8], bits: usize) {
        for i in 0..bits {
            let byte = bytes.get(i / 8).copied().unwrap_or(0);
            self.bits.push(byte & (0x80 >> (i % 8)) != 0);
        }
    }

    fn pack(bits: &[bool]) -> Vec<u8> {
        let mut out = vec![0u8; bits.len().div_ceil(8)];
        for (i, _) in bits.iter().enumerate().filter(|(_, b)| **b) {
            out[i / 8] |= 0x80 >> (i % 8);
        }
        out
    }
}

// ─── CellBuilder ──────────────────────────────────────────────────────────────

/// Accumulates up to 1023 bits and 4 references for one ordinary cell.
#[derive(Debug, Clone, Default)]
pub struct CellBuilder {
    buf: BitBuf,
    references: Vec<usize>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.buf.bits.len()
    }

    fn reserve(&self, bits: usize) -> Result<(), DecodeError> {
        if self.bit_len() + bits > MAX_CELL_BITS {
            return Err(DecodeError::limit(format!(
                "cell overflow: {} + {bits} bits exceeds {MAX_CELL_BITS}",
                self.bit_len()
            )));
        }
        Ok(())
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, DecodeError> {
        self.reserve(1)?;
        self.buf.bits.push(bit);
        Ok(self)
    }

    /// Store the low `bits` bits of `value`, big-endian.
    pub fn store_u64(&mut self, value: u64, bits: usize) -> Result<&mut Self, DecodeError> {
        self.reserve(bits)?;
        self.buf.push_u64(value, bits);
        Ok(self)
    }

    pub fn store_uint(&mut self, value: U256, bits: usize) -> Result<&mut Self, DecodeError> {
        self.reserve(bits)?;
        self.buf.push_uint(value, bits);
        Ok(self)
    }

    pub fn store_bits(&mut self, bytes: &[u8], bits: usize) -> Result<&mut Self, DecodeError> {
        self.reserve(bits)?;
        self.buf.push_bytes(bytes, bits);
        Ok(self)
    }

    pub fn store_ref(&mut self, cell: usize) -> Result<&mut Self, DecodeError> {
        if self.references.len() == MAX_CELL_REFS {
            return Err(DecodeError::limit(format!(
                "cell overflow: more than {MAX_CELL_REFS} references"
            )));
        }
        self.references.push(cell);
        Ok(self)
    }

    pub fn build(self) -> Result<Cell, DecodeError> {
        let bit_len = self.bit_len();
        Ok(Cell::new(
            BitBuf::pack(&self.buf.bits),
            bit_len,
            self.references,
            false,
            0,
        ))
    }
}

// ─── TreeBuilder ──────────────────────────────────────────────────────────────

/// Arena under construction. Children are pushed first; `push` returns the
/// index to reference them by.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    cells: Vec<Cell>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cell: Cell) -> usize {
        self.cells.push(cell);
        self.cells.len() - 1
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn finish(self, roots: Vec<usize>) -> CellTree {
        CellTree::from_parts(self.cells, roots)
    }
}

// ─── BocWriter ────────────────────────────────────────────────────────────────

/// Serializes a [`CellTree`] with the generic magic.
///
/// Cells are renumbered so every parent precedes its children and the first
/// root gets index 0. Cells unreachable from any root are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct BocWriter {
    with_crc: bool,
    with_index: bool,
}

impl BocWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_crc(mut self, on: bool) -> Self {
        self.with_crc = on;
        self
    }

    pub fn with_index(mut self, on: bool) -> Self {
        self.with_index = on;
        self
    }

    pub fn write(&self, tree: &CellTree) -> Result<Vec<u8>, DecodeError> {
        let order = topological_order(tree)?;
        let mut new_index = vec![usize::MAX; tree.len()];
        for (pos, &old) in order.iter().enumerate() {
            new_index[old] = pos;
        }

        let ref_size = byte_width(order.len());
        let mut body = Vec::new();
        let mut ends = Vec::with_capacity(order.len());
        for &old in &order {
            let cell = &tree.cells()[old];
            serialize_cell(cell, &new_index, ref_size, &mut body);
            ends.push(body.len());
        }
        let off_size = byte_width(body.len());

        let mut flags = ref_size as u8;
        if self.with_index {
            flags |= 0x80;
        }
        if self.with_crc {
            flags |= 0x40;
        }

        let mut out = Vec::with_capacity(body.len() + 32);
        out.extend_from_slice(&BOC_GENERIC_MAGIC);
        out.push(flags);
        out.push(off_size as u8);
        put_be(&mut out, order.len(), ref_size);
        put_be(&mut out, tree.roots().len(), ref_size);
        put_be(&mut out, 0, ref_size);
        put_be(&mut out, body.len(), off_size);
        for &root in tree.roots() {
            put_be(&mut out, new_index[root], ref_size);
        }
        if self.with_index {
            for end in ends {
                put_be(&mut out, end, off_size);
            }
        }
        out.extend_from_slice(&body);
        if self.with_crc {
            let crc = crc32c(&out);
            out.extend_from_slice(&crc.to_le_bytes());
        }

        debug!(
            cells = order.len(),
            roots = tree.roots().len(),
            bytes = out.len(),
            "bag of cells written"
        );
        Ok(out)
    }
}

/// Reverse post-order DFS from the roots. Roots are walked last-to-first so
/// the first root ends up at position 0.
fn topological_order(tree: &CellTree) -> Result<Vec<usize>, DecodeError> {
    const UNSEEN: u8 = 0;
    const ON_STACK: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNSEEN; tree.len()];
    let mut post = Vec::with_capacity(tree.len());

    for &root in tree.roots().iter().rev() {
        match state.get(root) {
            None => {
                return Err(DecodeError::malformed(format!(
                    "root index {root} out of range for {} cells",
                    tree.len()
                )))
            }
            Some(&UNSEEN) => {}
            Some(_) => continue,
        }
        state[root] = ON_STACK;
        let mut stack = vec![(root, 0usize)];
        while let Some(&(cell, next)) = stack.last() {
            let refs = tree.cells()[cell].references();
            if let Some(&child) = refs.get(next) {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                match state.get(child) {
                    None => {
                        return Err(DecodeError::malformed(format!(
                            "cell {cell} references missing cell {child}"
                        )))
                    }
                    Some(&UNSEEN) => {
                        state[child] = ON_STACK;
                        stack.push((child, 0));
                    }
                    Some(&ON_STACK) => {
                        return Err(DecodeError::malformed(format!(
                            "reference cycle through cell {child}"
                        )))
                    }
                    Some(_) => {}
                }
            } else {
                state[cell] = DONE;
                post.push(cell);
                stack.pop();
            }
        }
    }

    post.reverse();
    Ok(post)
}

fn serialize_cell(cell: &Cell, new_index: &[usize], ref_size: usize, out: &mut Vec<u8>) {
    let d1 = cell.references().len() as u8
        + if cell.is_special() { 8 } else { 0 }
        + (cell.level_mask() << 5);
    let d2 = (cell.bit_len().div_ceil(8) + cell.bit_len() / 8) as u8;
    out.push(d1);
    out.push(d2);

    let mut data = cell.data().to_vec();
    let rem = cell.bit_len() % 8;
    if rem != 0 {
        if let Some(last) = data.last_mut() {
            *last |= 0x80 >> rem;
        }
    }
    out.extend_from_slice(&data);
    for &r in cell.references() {
        put_be(out, new_index[r], ref_size);
    }
}

/// Smallest number of bytes (at least one) that holds `value`.
fn byte_width(value: usize) -> usize {
    let bits = usize::BITS - value.leading_zeros();
    (bits as usize).div_ceil(8).max(1)
}

fn put_be(out: &mut Vec<u8>, value: usize, width: usize) {
    let bytes = (value as u64).to_be_bytes();
    out.extend_from_slice(&bytes[8 - width..]);
}

// ─── EventWriter ──────────────────────────────────────────────────────────────

/// Writes an `EventRecord` as a message cell tree following a layout.
///
/// By default the body is inline and every cell is filled to capacity before
/// a continuation cell is chained in as the last reference.
#[derive(Debug, Clone, Copy)]
pub struct EventWriter {
    layout: &'static EventLayout,
    body_in_ref: bool,
    split_after_bits: Option<usize>,
}

impl Default for EventWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventWriter {
    pub fn new() -> Self {
        Self {
            layout: &EXTERNAL_EVENT_V1,
            body_in_ref: false,
            split_after_bits: None,
        }
    }

    pub fn with_layout(mut self, layout: &'static EventLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Put the body in its own cell (`Either` bit = 1).
    pub fn body_in_ref(mut self, on: bool) -> Self {
        self.body_in_ref = on;
        self
    }

    /// Cap the first cell of the body-carrying chain at `bits` bits so the
    /// rest spills into a continuation cell.
    pub fn split_after_bits(mut self, bits: usize) -> Self {
        self.split_after_bits = Some(bits);
        self
    }

    pub fn write_tree(&self, record: &EventRecord) -> Result<CellTree, DecodeError> {
        let mut head = BitBuf::default();
        let mut body = BitBuf::default();
        let mut in_body = false;

        for step in self.layout.steps {
            let out = if in_body && self.body_in_ref {
                &mut body
            } else {
                &mut head
            };
            match *step {
                Step::Tag { bits, expected, .. } => out.push_u64(expected, bits as usize),
                Step::Uint { name, bits, endian } => {
                    let value = field(record, name)?
                        .as_uint()
                        .ok_or_else(|| wrong_kind(name, "uint"))?;
                    match endian {
                        Endian::Big => out.push_uint(value, bits as usize),
                        Endian::Little => {
                            let le = value.to_le_bytes::<32>();
                            out.push_bytes(&le, bits as usize);
                        }
                    }
                }
                Step::StdAddress { name } => write_std_address(out, record, name)?,
                Step::ExtAddress { name } => write_ext_address(out, record, name)?,
                Step::AbsentMaybe { .. } => out.bits.push(false),
                Step::Body => {
                    out.bits.push(self.body_in_ref);
                    in_body = true;
                }
            }
        }

        let mut tb = TreeBuilder::new();
        let root = if self.body_in_ref {
            let body_cell = chain(&mut tb, &body.bits, self.split_after_bits, Vec::new())?;
            if head.bits.len() > MAX_CELL_BITS {
                return Err(DecodeError::limit(format!(
                    "message header of {} bits does not fit one cell",
                    head.bits.len()
                )));
            }
            chain(&mut tb, &head.bits, None, vec![body_cell])?
        } else {
            chain(&mut tb, &head.bits, self.split_after_bits, Vec::new())?
        };
        Ok(tb.finish(vec![root]))
    }

    /// Write the record straight to serialized bytes.
    pub fn write_boc(&self, record: &EventRecord, writer: &BocWriter) -> Result<Vec<u8>, DecodeError> {
        writer.write(&self.write_tree(record)?)
    }
}

/// Lay `bits` out over a chain of cells linked through their last reference.
/// `head_refs` go on the first cell, before its continuation link.
fn chain(
    tb: &mut TreeBuilder,
    bits: &[bool],
    first_cap: Option<usize>,
    head_refs: Vec<usize>,
) -> Result<usize, DecodeError> {
    let first = first_cap.unwrap_or(MAX_CELL_BITS).min(MAX_CELL_BITS).min(bits.len());
    let mut chunks = vec![&bits[..first]];
    chunks.extend(bits[first..].chunks(MAX_CELL_BITS));

    let mut next: Option<usize> = None;
    for (i, chunk) in chunks.iter().enumerate().rev() {
        let mut refs = if i == 0 { head_refs.clone() } else { Vec::new() };
        refs.extend(next);
        if refs.len() > MAX_CELL_REFS {
            return Err(DecodeError::limit("cell overflow: too many references"));
        }
        let cell = Cell::new(BitBuf::pack(chunk), chunk.len(), refs, false, 0);
        next = Some(tb.push(cell));
    }
    next.ok_or_else(|| DecodeError::malformed("empty cell chain"))
}

fn field<'a>(record: &'a EventRecord, name: &str) -> Result<&'a RecordValue, DecodeError> {
    record
        .get(name)
        .ok_or_else(|| DecodeError::malformed(format!("record has no field `{name}`")))
}

fn wrong_kind(name: &str, expected: &str) -> DecodeError {
    DecodeError::malformed(format!("record field `{name}` is not a {expected}"))
}

fn write_std_address(out: &mut BitBuf, record: &EventRecord, name: &str) -> Result<(), DecodeError> {
    let addr = field(record, name)?
        .as_record()
        .ok_or_else(|| wrong_kind(name, "record"))?;
    let workchain = match addr.get("workchain") {
        Some(RecordValue::Int { value, .. }) => i8::try_from(*value).ok(),
        _ => None,
    }
    .ok_or_else(|| wrong_kind(&format!("{name}.workchain"), "int8"))?;
    let address = addr
        .get("address")
        .and_then(RecordValue::as_bytes)
        .filter(|b| b.len() == 32)
        .ok_or_else(|| wrong_kind(&format!("{name}.address"), "32-byte string"))?;
    out.push_u64(0b10, 2);
    out.bits.push(false);
    out.push_u64(workchain as u8 as u64, 8);
    out.push_bytes(address, 256);
    Ok(())
}

fn write_ext_address(out: &mut BitBuf, record: &EventRecord, name: &str) -> Result<(), DecodeError> {
    let addr = field(record, name)?
        .as_record()
        .ok_or_else(|| wrong_kind(name, "record"))?;
    let len = addr
        .get("len")
        .and_then(RecordValue::as_uint)
        .ok_or_else(|| wrong_kind(&format!("{name}.len"), "uint9"))?;
    let len = u64::try_from(len)
        .ok()
        .filter(|l| *l < 512)
        .ok_or_else(|| wrong_kind(&format!("{name}.len"), "uint9"))? as usize;
    if len == 0 {
        out.push_u64(0b00, 2);
        return Ok(());
    }
    let bytes = addr
        .get("address")
        .and_then(RecordValue::as_bytes)
        .ok_or_else(|| wrong_kind(&format!("{name}.address"), "bit string"))?;
    out.push_u64(0b01, 2);
    out.push_u64(len as u64, 9);
    out.push_bytes(bytes, len);
    Ok(())
}
