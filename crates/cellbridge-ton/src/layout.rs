//! Versioned, data-driven description of where each event field lives in the
//! bit stream of a message cell.
//!
//! The extractor walks a layout's steps in order; the test-support
//! [`EventWriter`](crate::builder::EventWriter) walks the same steps to
//! produce bits. Adding a layout means adding a constant, not code.

/// Byte order of a fixed-width integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    /// Only valid for byte-multiple widths.
    Little,
}

/// One instruction of an event layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A fixed discriminator. Any other value means the message is not
    /// something this layout describes.
    Tag {
        what: &'static str,
        bits: u16,
        expected: u64,
    },
    /// Unsigned integer stored under `name`.
    Uint {
        name: &'static str,
        bits: u16,
        endian: Endian,
    },
    /// `addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256`,
    /// with the anycast required to be absent.
    StdAddress { name: &'static str },
    /// `addr_none$00` or `addr_extern$01 len:(## 9) external_address:(bits len)`.
    ExtAddress { name: &'static str },
    /// A `Maybe` bit that must be `0`.
    AbsentMaybe { what: &'static str },
    /// `Either X ^X`: `0` keeps reading inline, `1` moves into the first
    /// reference of the current cell.
    Body,
}

/// An ordered list of steps tagged with a version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLayout {
    pub version: u32,
    pub steps: &'static [Step],
}

impl EventLayout {
    /// Names of the record fields this layout produces, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().filter_map(|step| match step {
            Step::Uint { name, .. } | Step::StdAddress { name } | Step::ExtAddress { name } => {
                Some(*name)
            }
            _ => None,
        })
    }
}

// ─── Pinned layouts ───────────────────────────────────────────────────────────

/// Outbound external message carrying a `(event_id:uint32, state:uint256)` body.
pub const EXTERNAL_EVENT_V1: EventLayout = EventLayout {
    version: 1,
    steps: &[
        Step::Tag {
            what: "ext_out_msg_info",
            bits: 2,
            expected: 0b11,
        },
        Step::StdAddress { name: "src" },
        Step::ExtAddress { name: "dest" },
        Step::Uint {
            name: "created_lt",
            bits: 64,
            endian: Endian::Big,
        },
        Step::Uint {
            name: "created_at",
            bits: 32,
            endian: Endian::Big,
        },
        Step::AbsentMaybe { what: "init" },
        Step::Body,
        Step::Uint {
            name: "event_id",
            bits: 32,
            endian: Endian::Big,
        },
        Step::Uint {
            name: "state",
            bits: 256,
            endian: Endian::Big,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_fields_in_order() {
        let names: Vec<_> = EXTERNAL_EVENT_V1.field_names().collect();
        assert_eq!(
            names,
            ["src", "dest", "created_lt", "created_at", "event_id", "state"]
        );
        assert_eq!(EXTERNAL_EVENT_V1.version, 1);
    }

    #[test]
    fn v1_has_exactly_one_body_switch() {
        let bodies = EXTERNAL_EVENT_V1
            .steps
            .iter()
            .filter(|s| matches!(s, Step::Body))
            .count();
        assert_eq!(bodies, 1);
    }
}
