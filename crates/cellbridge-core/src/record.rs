//! Extracted event records.
//!
//! Every field the extractor pulls out of a cell tree lands in a
//! `RecordValue`, a closed set of variants shared by the extractor and the
//! ABI encoder. Records keep fields in extraction order.

use alloy_primitives::{ruint::UintTryFrom, I256, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single typed value inside an `EventRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RecordValue {
    /// Unsigned integer with its declared bit width (1..=256).
    Uint { bits: u16, value: U256 },
    /// Signed integer with its declared bit width (1..=256).
    Int { bits: u16, value: I256 },
    Bytes(Vec<u8>),
    Bool(bool),
    Record(EventRecord),
    Seq(Vec<RecordValue>),
}

impl RecordValue {
    /// Accepts any unsigned primitive or `U256`.
    pub fn uint<T>(bits: u16, value: T) -> Self
    where
        U256: UintTryFrom<T>,
    {
        RecordValue::Uint {
            bits,
            value: U256::from(value),
        }
    }

    pub fn int(bits: u16, value: I256) -> Self {
        RecordValue::Int { bits, value }
    }

    /// Short type description used in mismatch errors, e.g. `uint64`, `bytes(32)`.
    pub fn type_name(&self) -> String {
        match self {
            RecordValue::Uint { bits, .. } => format!("uint{bits}"),
            RecordValue::Int { bits, .. } => format!("int{bits}"),
            RecordValue::Bytes(b) => format!("bytes({})", b.len()),
            RecordValue::Bool(_) => "bool".into(),
            RecordValue::Record(_) => "record".into(),
            RecordValue::Seq(items) => format!("seq({})", items.len()),
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            RecordValue::Uint { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RecordValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&EventRecord> {
        match self {
            RecordValue::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Uint { value, .. } => write!(f, "{value}"),
            RecordValue::Int { value, .. } => write!(f, "{value}"),
            RecordValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            RecordValue::Bool(v) => write!(f, "{v}"),
            RecordValue::Record(r) => write!(f, "{r}"),
            RecordValue::Seq(items) => {
                let parts: Vec<_> = items.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

/// Structured result of event extraction: field name → typed value,
/// in the order the fields were read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRecord {
    fields: IndexMap<String, RecordValue>,
}

impl EventRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing (in place) any previous value with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: RecordValue) {
        self.fields.insert(name.into(), value);
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, value: RecordValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RecordValue> {
        self.fields.get(name)
    }

    /// Resolve a dotted path such as `src.address` through nested records.
    pub fn lookup(&self, path: &str) -> Option<&RecordValue> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = current.as_record()?.get(part)?;
        }
        Some(current)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

impl FromIterator<(String, RecordValue)> for EventRecord {
    fn from_iter<T: IntoIterator<Item = (String, RecordValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EventRecord {
        EventRecord::new()
            .with(
                "src",
                RecordValue::Record(
                    EventRecord::new()
                        .with("workchain", RecordValue::int(8, I256::MINUS_ONE))
                        .with("address", RecordValue::Bytes(vec![0xab; 32])),
                ),
            )
            .with("created_lt", RecordValue::uint(64, 42u64))
    }

    #[test]
    fn lookup_dotted_path() {
        let r = sample();
        assert_eq!(
            r.lookup("src.address").and_then(|v| v.as_bytes()),
            Some(&[0xab; 32][..])
        );
        assert!(r.lookup("src.missing").is_none());
        assert!(r.lookup("created_lt.inner").is_none());
        assert_eq!(r.lookup("created_lt").and_then(|v| v.as_uint()), Some(U256::from(42u64)));
    }

    #[test]
    fn field_order_preserved() {
        let names: Vec<_> = sample().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, vec!["src", "created_lt"]);
    }

    #[test]
    fn display_and_type_name() {
        let r = sample();
        assert_eq!(r.get("created_lt").unwrap().type_name(), "uint64");
        assert!(r.to_string().starts_with("{src: {workchain: -1"));
    }

    #[test]
    fn record_serde_roundtrip() {
        let r = sample();
        let json = serde_json::to_string(&r).unwrap();
        let back: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
