//! Event extractor: reads a typed `EventRecord` out of a decoded cell tree
//! by interpreting an [`EventLayout`] against the primary root.

use cellbridge_core::{DecodeError, DecodeLimits, EventRecord, RecordValue};
use tracing::{debug, trace};

use crate::cell::CellTree;
use crate::layout::{Endian, EventLayout, Step, EXTERNAL_EVENT_V1};
use crate::slice::CellSlice;

/// Extracts event records following a pinned layout.
#[derive(Debug, Clone, Copy)]
pub struct EventExtractor {
    limits: DecodeLimits,
    layout: &'static EventLayout,
}

impl EventExtractor {
    pub fn new() -> Self {
        Self::with_limits(DecodeLimits::default())
    }

    pub fn with_limits(limits: DecodeLimits) -> Self {
        Self {
            limits,
            layout: &EXTERNAL_EVENT_V1,
        }
    }

    /// Use a layout other than [`EXTERNAL_EVENT_V1`].
    pub fn with_layout(mut self, layout: &'static EventLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &'static EventLayout {
        self.layout
    }

    /// Extract the event carried by the tree's first root.
    pub fn extract(&self, tree: &CellTree) -> Result<EventRecord, DecodeError> {
        let root = tree
            .root()
            .ok_or_else(|| DecodeError::malformed("missing root: cell tree has no roots"))?;
        let mut slice = CellSlice::new(tree, root, self.limits.max_depth)?;
        let mut record = EventRecord::new();

        for step in self.layout.steps {
            trace!(?step, cell = slice.cell_index(), "layout step");
            match *step {
                Step::Tag {
                    what,
                    bits,
                    expected,
                } => {
                    let found = slice.load_u64(bits as usize)?;
                    if found != expected {
                        return Err(DecodeError::unsupported(format!(
                            "{what}: expected tag {expected:#0w$b}, found {found:#0w$b}",
                            w = bits as usize + 2
                        )));
                    }
                }
                Step::Uint { name, bits, endian } => {
                    let value = match endian {
                        Endian::Big => slice.load_uint(bits as usize)?,
                        Endian::Little => slice.load_uint_le(bits as usize)?,
                    };
                    record.insert(name, RecordValue::Uint { bits, value });
                }
                Step::StdAddress { name } => {
                    record.insert(name, RecordValue::Record(read_std_address(&mut slice, name)?));
                }
                Step::ExtAddress { name } => {
                    record.insert(name, RecordValue::Record(read_ext_address(&mut slice, name)?));
                }
                Step::AbsentMaybe { what } => {
                    if slice.load_bit()? {
                        return Err(DecodeError::unsupported(format!(
                            "{what} is present, only messages without it are supported"
                        )));
                    }
                }
                Step::Body => {
                    if slice.load_bit()? {
                        slice.descend_ref()?;
                    }
                }
            }
        }

        debug!(
            layout = self.layout.version,
            fields = record.len(),
            depth = slice.depth(),
            "event extracted"
        );
        Ok(record)
    }
}

impl Default for EventExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn read_std_address(slice: &mut CellSlice<'_>, name: &str) -> Result<EventRecord, DecodeError> {
    let tag = slice.load_u64(2)?;
    if tag != 0b10 {
        return Err(DecodeError::unsupported(format!(
            "{name}: expected addr_std (0b10), found {tag:#04b}"
        )));
    }
    if slice.load_bit()? {
        return Err(DecodeError::unsupported(format!(
            "{name}: anycast addresses are not supported"
        )));
    }
    let workchain = slice.load_int(8)?;
    let address = slice.load_bits(256)?;
    Ok(EventRecord::new()
        .with("workchain", RecordValue::int(8, workchain))
        .with("address", RecordValue::Bytes(address)))
}

fn read_ext_address(slice: &mut CellSlice<'_>, name: &str) -> Result<EventRecord, DecodeError> {
    let (len, address) = match slice.load_u64(2)? {
        0b00 => (0, Vec::new()),
        0b01 => {
            let len = slice.load_u64(9)?;
            (len, slice.load_bits(len as usize)?)
        }
        other => {
            return Err(DecodeError::unsupported(format!(
                "{name}: expected addr_none or addr_extern, found {other:#04b}"
            )))
        }
    };
    Ok(EventRecord::new()
        .with("len", RecordValue::uint(9, len))
        .with("address", RecordValue::Bytes(address)))
}
