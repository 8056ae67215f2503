//! Parameter encoder: maps an `EventRecord` onto an `AbiSchema` and produces
//! `selector ‖ head ‖ tail` calldata.
//!
//! # Layout
//! Each tuple (the parameter list itself, a `tuple` value, or the elements
//! of an array) is encoded as a head followed by a tail. Static values sit
//! in the head. Dynamic values leave a 32-byte offset word in the head,
//! measured from the start of that tuple's head, and their content goes in
//! the tail in head order. Array and tuple contents nest the same way.
//!
//! # Usage
//! ```ignore
//! let schema = parse_schema(r#"{"name":"TONStateChange","inputs":[{"name":"state","type":"uint256"}]}"#)?;
//! let payload = PayloadEncoder::new().encode(&record, &schema)?;
//! assert_eq!(&payload[..4], &[0x4c, 0xc6, 0x99, 0x8e]);
//! ```

use alloy_primitives::{I256, U256};
use cellbridge_core::{AbiParameter, AbiSchema, AbiType, EncodeError, EventRecord, RecordValue};
use tracing::debug;

use crate::selector::schema_selector;

/// Type nesting deeper than this is refused rather than recursed into.
pub const DEFAULT_MAX_NESTING: usize = 32;

const WORD: usize = 32;

/// Encodes event records as calldata for a target function.
#[derive(Debug, Clone, Copy)]
pub struct PayloadEncoder {
    max_nesting: usize,
}

impl Default for PayloadEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadEncoder {
    pub fn new() -> Self {
        Self {
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    pub fn with_max_nesting(max_nesting: usize) -> Self {
        Self { max_nesting }
    }

    /// Encode `record` as a call to `schema`'s function.
    ///
    /// Output length is always `4 + 32k`. Nothing is returned on error.
    pub fn encode(&self, record: &EventRecord, schema: &AbiSchema) -> Result<Vec<u8>, EncodeError> {
        let params = self.encode_params(record, &schema.inputs)?;
        let mut out = Vec::with_capacity(4 + params.len());
        out.extend_from_slice(&schema_selector(schema));
        out.extend_from_slice(&params);
        debug!(
            function = %schema.function_name,
            params = schema.inputs.len(),
            bytes = out.len(),
            "payload encoded"
        );
        Ok(out)
    }

    /// Encode the parameter block alone, without the selector.
    pub fn encode_params(
        &self,
        record: &EventRecord,
        params: &[AbiParameter],
    ) -> Result<Vec<u8>, EncodeError> {
        let mut items = Vec::with_capacity(params.len());
        for param in params {
            let value = record
                .lookup(&param.name)
                .ok_or_else(|| EncodeError::UnmappedParameter {
                    name: param.name.clone(),
                })?;
            let encoded = self.encode_value(&param.ty, value, &param.name, 1)?;
            items.push((param.ty.is_dynamic(), encoded));
        }
        Ok(encode_tuple(items))
    }

    /// Static types yield their head bytes; dynamic types yield their tail.
    fn encode_value(
        &self,
        ty: &AbiType,
        value: &RecordValue,
        path: &str,
        depth: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        if depth > self.max_nesting {
            return Err(EncodeError::DepthOrSizeLimitExceeded {
                reason: format!("parameter '{path}' nests deeper than {}", self.max_nesting),
            });
        }
        let mismatch = || EncodeError::mismatch(path, ty.to_string(), value.type_name());

        match (ty, value) {
            (AbiType::Uint(bits), _) => {
                let v = unsigned_value(value).filter(|v| v.bit_len() <= *bits as usize);
                v.map(|v| v.to_be_bytes::<32>().to_vec()).ok_or_else(mismatch)
            }
            (AbiType::Int(bits), _) => {
                let v = signed_value(value, *bits).ok_or_else(mismatch)?;
                Ok(v.into_raw().to_be_bytes::<32>().to_vec())
            }
            (AbiType::Bool, RecordValue::Bool(b)) => {
                Ok(U256::from(u8::from(*b)).to_be_bytes::<32>().to_vec())
            }
            (AbiType::Address, RecordValue::Bytes(b)) if b.len() == 20 => {
                let mut word = vec![0u8; WORD];
                word[12..].copy_from_slice(b);
                Ok(word)
            }
            (AbiType::Address, RecordValue::Uint { value, .. }) if value.bit_len() <= 160 => {
                Ok(value.to_be_bytes::<32>().to_vec())
            }
            (AbiType::FixedBytes(n), RecordValue::Bytes(b)) if b.len() <= *n as usize => {
                Ok(fixed_word(b))
            }
            (AbiType::FixedBytes(n), RecordValue::Uint { bits, value }) if *bits == u16::from(*n) * 8 => {
                let n = *n as usize;
                let be = value.to_be_bytes::<32>();
                Ok(fixed_word(&be[WORD - n..]))
            }
            (AbiType::Bytes | AbiType::String, RecordValue::Bytes(b)) => {
                let mut out = usize_word(b.len());
                out.extend_from_slice(&right_pad(b));
                Ok(out)
            }
            (AbiType::Array(elem), RecordValue::Seq(items)) => {
                let mut out = usize_word(items.len());
                out.extend_from_slice(&self.encode_elements(elem, items, path, depth)?);
                Ok(out)
            }
            (AbiType::FixedArray(elem, len), RecordValue::Seq(items)) if items.len() == *len => {
                self.encode_elements(elem, items, path, depth)
            }
            (AbiType::Tuple(components), RecordValue::Record(inner)) => {
                let mut parts = Vec::with_capacity(components.len());
                for c in components {
                    let child_path = format!("{path}.{}", c.name);
                    let v = inner
                        .get(&c.name)
                        .ok_or_else(|| EncodeError::UnmappedParameter {
                            name: child_path.clone(),
                        })?;
                    parts.push((c.ty.is_dynamic(), self.encode_value(&c.ty, v, &child_path, depth + 1)?));
                }
                Ok(encode_tuple(parts))
            }
            _ => Err(mismatch()),
        }
    }

    fn encode_elements(
        &self,
        elem: &AbiType,
        items: &[RecordValue],
        path: &str,
        depth: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        let dynamic = elem.is_dynamic();
        let mut parts = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let p = format!("{path}[{i}]");
            parts.push((dynamic, self.encode_value(elem, item, &p, depth + 1)?));
        }
        Ok(encode_tuple(parts))
    }
}

// ─── Head / tail ──────────────────────────────────────────────────────────────

/// Join encoded components: static bytes go to the head as-is; dynamic ones
/// leave an offset word and are appended to the tail in order.
fn encode_tuple(parts: Vec<(bool, Vec<u8>)>) -> Vec<u8> {
    let head_len: usize = parts
        .iter()
        .map(|(dynamic, bytes)| if *dynamic { WORD } else { bytes.len() })
        .sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();
    for (dynamic, bytes) in parts {
        if dynamic {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend_from_slice(&bytes);
        } else {
            head.extend_from_slice(&bytes);
        }
    }
    head.extend_from_slice(&tail);
    head
}

fn usize_word(n: usize) -> Vec<u8> {
    U256::from(n).to_be_bytes::<32>().to_vec()
}

/// Pad to the next multiple of 32 with trailing zeros.
fn right_pad(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(bytes.len().div_ceil(WORD) * WORD, 0);
    out
}

/// One word holding at most 32 bytes, left-aligned.
fn fixed_word(bytes: &[u8]) -> Vec<u8> {
    let mut word = vec![0u8; WORD];
    word[..bytes.len()].copy_from_slice(bytes);
    word
}

// ─── Value compatibility ──────────────────────────────────────────────────────

/// Unsigned view of a `Uint` or non-negative `Int`.
fn unsigned_value(value: &RecordValue) -> Option<U256> {
    match value {
        RecordValue::Uint { value, .. } => Some(*value),
        RecordValue::Int { value, .. } if !value.is_negative() => Some(value.into_raw()),
        _ => None,
    }
}

/// Signed view of an `Int` or `Uint` that fits `bits`-bit two's complement.
fn signed_value(value: &RecordValue, bits: u16) -> Option<I256> {
    let magnitude_bits = bits as usize - 1;
    match value {
        RecordValue::Int { value, .. } => {
            let raw = value.into_raw();
            // for negatives, !raw == -value - 1, which must fit the positive range
            let magnitude = if value.is_negative() { !raw } else { raw };
            (magnitude.bit_len() <= magnitude_bits).then_some(*value)
        }
        RecordValue::Uint { value, .. } => {
            (value.bit_len() <= magnitude_bits).then(|| I256::from_raw(*value))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    fn encode(schema: &str, record: &EventRecord) -> Result<Vec<u8>, EncodeError> {
        PayloadEncoder::new().encode(record, &parse_schema(schema).unwrap())
    }

    fn word(bytes: &[u8], i: usize) -> &[u8] {
        &bytes[4 + i * 32..4 + (i + 1) * 32]
    }

    #[test]
    fn state_change_payload() {
        let record = EventRecord::new().with("state", RecordValue::uint(256, 0xdead_beefu64));
        let out = encode(
            r#"{"name":"TONStateChange","inputs":[{"name":"state","type":"uint256"}]}"#,
            &record,
        )
        .unwrap();
        assert_eq!(
            hex::encode(&out),
            "4cc6998e00000000000000000000000000000000000000000000000000000000deadbeef"
        );
    }

    #[test]
    fn negative_int_sign_extended() {
        let record = EventRecord::new().with("wc", RecordValue::int(8, I256::MINUS_ONE));
        let out = encode(r#"{"name":"f","inputs":[{"name":"wc","type":"int8"}]}"#, &record).unwrap();
        assert_eq!(word(&out, 0), &[0xff; 32]);
    }

    #[test]
    fn int_range_checks() {
        let schema = r#"{"name":"f","inputs":[{"name":"v","type":"int8"}]}"#;
        let ok = |v: RecordValue| encode(schema, &EventRecord::new().with("v", v)).is_ok();
        assert!(ok(RecordValue::uint(64, 127u64)));
        assert!(!ok(RecordValue::uint(64, 128u64)));
        assert!(ok(RecordValue::int(16, I256::try_from(-128i64).unwrap())));
        assert!(!ok(RecordValue::int(16, I256::try_from(-129i64).unwrap())));

        let uschema = r#"{"name":"f","inputs":[{"name":"v","type":"uint8"}]}"#;
        let uok = |v: RecordValue| encode(uschema, &EventRecord::new().with("v", v)).is_ok();
        assert!(uok(RecordValue::uint(64, 255u64)));
        assert!(!uok(RecordValue::uint(64, 256u64)));
        assert!(uok(RecordValue::int(8, I256::try_from(5i64).unwrap())));
        assert!(!uok(RecordValue::int(8, I256::MINUS_ONE)));
    }

    #[test]
    fn address_and_fixed_bytes() {
        let record = EventRecord::new()
            .with("to", RecordValue::Bytes(vec![0x11; 20]))
            .with("tag", RecordValue::Bytes(vec![0xab, 0xcd]))
            .with("lt", RecordValue::uint(64, 0x0102_0304_0506_0708u64));
        let out = encode(
            r#"{"name":"f","inputs":[
                {"name":"to","type":"address"},
                {"name":"tag","type":"bytes4"},
                {"name":"lt","type":"bytes8"}]}"#,
            &record,
        )
        .unwrap();
        assert_eq!(&word(&out, 0)[..12], &[0u8; 12]);
        assert_eq!(&word(&out, 0)[12..], &[0x11; 20]);
        assert_eq!(&word(&out, 1)[..4], &[0xab, 0xcd, 0, 0]);
        assert_eq!(&word(&out, 2)[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(&word(&out, 2)[8..], &[0u8; 24]);

        // 32 bytes is not an address
        let bad = EventRecord::new().with("to", RecordValue::Bytes(vec![0x11; 32]));
        let err = encode(r#"{"name":"f","inputs":[{"name":"to","type":"address"}]}"#, &bad).unwrap_err();
        assert_eq!(err.kind(), "type_mismatch");
    }

    #[test]
    fn dynamic_offsets() {
        let record = EventRecord::new()
            .with("a", RecordValue::uint(8, 1u64))
            .with("b", RecordValue::Bytes(b"hello".to_vec()))
            .with("c", RecordValue::Seq(vec![RecordValue::uint(8, 2u64), RecordValue::uint(8, 3u64)]));
        let out = encode(
            r#"{"name":"f","inputs":[
                {"name":"a","type":"uint8"},
                {"name":"b","type":"string"},
                {"name":"c","type":"uint8[]"}]}"#,
            &record,
        )
        .unwrap();
        assert_eq!((out.len() - 4) % 32, 0);
        // head: a, offset(b) = 96, offset(c) = 96 + 64
        assert_eq!(U256::from_be_slice(word(&out, 1)), U256::from(96u64));
        assert_eq!(U256::from_be_slice(word(&out, 2)), U256::from(160u64));
        assert_eq!(U256::from_be_slice(word(&out, 3)), U256::from(5u64));
        assert_eq!(&word(&out, 4)[..5], b"hello");
        assert_eq!(U256::from_be_slice(word(&out, 5)), U256::from(2u64));
        assert_eq!(U256::from_be_slice(word(&out, 7)), U256::from(3u64));
    }

    #[test]
    fn tuple_from_nested_record_and_dotted_path() {
        let record = EventRecord::new().with(
            "src",
            RecordValue::Record(
                EventRecord::new()
                    .with("workchain", RecordValue::int(8, I256::ZERO))
                    .with("address", RecordValue::Bytes(vec![0x22; 32])),
            ),
        );
        let tuple = encode(
            r#"{"name":"f","inputs":[{"name":"src","type":"tuple","components":[
                {"name":"workchain","type":"int8"},{"name":"address","type":"bytes32"}]}]}"#,
            &record,
        )
        .unwrap();
        let dotted = PayloadEncoder::new()
            .encode_params(
                &record,
                &[
                    AbiParameter::new("src.workchain", AbiType::Int(8)),
                    AbiParameter::new("src.address", AbiType::FixedBytes(32)),
                ],
            )
            .unwrap();
        assert_eq!(&tuple[4..], &dotted[..]);
    }

    #[test]
    fn unmapped_parameter() {
        let err = encode(
            r#"{"name":"f","inputs":[{"name":"missing","type":"uint256"}]}"#,
            &EventRecord::new(),
        )
        .unwrap_err();
        assert_eq!(err, EncodeError::UnmappedParameter { name: "missing".into() });

        let record = EventRecord::new().with("t", RecordValue::Record(EventRecord::new()));
        let err = encode(
            r#"{"name":"f","inputs":[{"name":"t","type":"tuple","components":[{"name":"x","type":"bool"}]}]}"#,
            &record,
        )
        .unwrap_err();
        assert_eq!(err, EncodeError::UnmappedParameter { name: "t.x".into() });
    }

    #[test]
    fn fixed_array_length_must_match() {
        let record = EventRecord::new().with("xs", RecordValue::Seq(vec![RecordValue::Bool(true)]));
        let err = encode(r#"{"name":"f","inputs":[{"name":"xs","type":"bool[2]"}]}"#, &record).unwrap_err();
        assert!(matches!(err, EncodeError::TypeMismatch { ref got, .. } if got == "seq(1)"));
    }

    #[test]
    fn nesting_limit() {
        let mut value = RecordValue::Bool(true);
        let mut ty = AbiType::Bool;
        for _ in 0..4 {
            value = RecordValue::Seq(vec![value]);
            ty = AbiType::Array(Box::new(ty));
        }
        let record = EventRecord::new().with("deep", value);
        let params = [AbiParameter::new("deep", ty)];
        let err = PayloadEncoder::with_max_nesting(3)
            .encode_params(&record, &params)
            .unwrap_err();
        assert_eq!(err.kind(), "depth_or_size_limit_exceeded");
        assert!(PayloadEncoder::with_max_nesting(5).encode_params(&record, &params).is_ok());
    }

    #[test]
    fn encoding_is_deterministic() {
        let record = EventRecord::new().with("b", RecordValue::Bytes(vec![7; 40]));
        let schema = r#"{"name":"f","inputs":[{"name":"b","type":"bytes"}]}"#;
        assert_eq!(encode(schema, &record).unwrap(), encode(schema, &record).unwrap());
    }
}
