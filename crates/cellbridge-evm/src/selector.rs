//! Function selector computation.
//!
//! The selector of a function is the first four bytes of the keccak256 hash
//! of its canonical signature string, e.g.:
//!   keccak256("transfer(address,uint256)")[..4] → 0xa9059cbb
//!
//! Parameter names never take part in the signature.

use cellbridge_core::AbiSchema;
use tiny_keccak::{Hasher, Keccak};

/// keccak256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// 4-byte selector of a canonical signature string.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Selector of a parsed schema's function.
pub fn schema_selector(schema: &AbiSchema) -> [u8; 4] {
    selector(&schema.signature())
}
