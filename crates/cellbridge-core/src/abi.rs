//! Contract-interface (ABI) type model.
//!
//! `AbiType` is a closed enumeration of every type the parameter encoder
//! understands. Its `Display` impl yields the canonical spelling used in
//! function signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbiType {
    /// Unsigned integer, width in bits (8..=256, multiple of 8).
    Uint(u16),
    /// Signed integer, width in bits (8..=256, multiple of 8).
    Int(u16),
    Bool,
    /// 20-byte account address
    Address,
    /// bytes1 .. bytes32. Length in bytes.
    FixedBytes(u8),
    /// Variable-length byte array
    Bytes,
    /// UTF-8 string (encoded exactly like `bytes`)
    String,
    /// `T[]`
    Array(Box<AbiType>),
    /// `T[K]`
    FixedArray(Box<AbiType>, usize),
    /// `(T1,T2,...)` with named components
    Tuple(Vec<AbiParameter>),
}

impl AbiType {
    /// Whether values of this type live in the tail region.
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(elem, _) => elem.is_dynamic(),
            AbiType::Tuple(components) => components.iter().any(|p| p.ty.is_dynamic()),
            _ => false,
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Uint(bits) => write!(f, "uint{bits}"),
            AbiType::Int(bits) => write!(f, "int{bits}"),
            AbiType::Bool => write!(f, "bool"),
            AbiType::Address => write!(f, "address"),
            AbiType::FixedBytes(n) => write!(f, "bytes{n}"),
            AbiType::Bytes => write!(f, "bytes"),
            AbiType::String => write!(f, "string"),
            AbiType::Array(elem) => write!(f, "{elem}[]"),
            AbiType::FixedArray(elem, len) => write!(f, "{elem}[{len}]"),
            AbiType::Tuple(components) => {
                let parts: Vec<_> = components.iter().map(|p| p.ty.to_string()).collect();
                write!(f, "({})", parts.join(","))
            }
        }
    }
}

/// A named, typed parameter of an interface function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbiParameter {
    pub name: String,
    pub ty: AbiType,
}

impl AbiParameter {
    pub fn new(name: impl Into<String>, ty: AbiType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A parsed interface description: one function with ordered inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiSchema {
    pub function_name: String,
    /// Encoded positionally, in declaration order.
    pub inputs: Vec<AbiParameter>,
    /// Parsed for completeness; never encoded.
    pub outputs: Vec<AbiParameter>,
}

impl AbiSchema {
    /// Canonical signature string: `name(type1,type2,...)`.
    pub fn signature(&self) -> String {
        let types: Vec<_> = self.inputs.iter().map(|p| p.ty.to_string()).collect();
        format!("{}({})", self.function_name, types.join(","))
    }
}
