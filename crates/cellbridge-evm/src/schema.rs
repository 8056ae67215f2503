//! Interface schema parser.
//!
//! Accepts the JSON a human writes to describe one target function:
//!
//! ```json
//! { "name": "TONStateChange",
//!   "inputs":  [ {"name": "state", "type": "uint256"} ],
//!   "outputs": [ ] }
//! ```
//!
//! A standard ABI array is also accepted; its first function entry is used.
//! Type strings are validated into the closed [`AbiType`] enumeration.

use std::collections::HashSet;

use cellbridge_core::{AbiParameter, AbiSchema, AbiType, SchemaError};
use serde::Deserialize;
use tracing::debug;

use crate::encoder::DEFAULT_MAX_NESTING;

// ─── Raw document ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Function(RawFunction),
    Abi(Vec<RawFunction>),
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    inputs: Vec<RawParam>,
    #[serde(default)]
    outputs: Vec<RawParam>,
}

#[derive(Debug, Deserialize)]
struct RawParam {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    components: Vec<RawParam>,
}

// ─── Parser ───────────────────────────────────────────────────────────────────

/// Parses interface JSON into an [`AbiSchema`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AbiSchemaParser;

impl AbiSchemaParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> Result<AbiSchema, SchemaError> {
        let doc: RawDocument =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;

        let raw = match doc {
            RawDocument::Function(f) => f,
            RawDocument::Abi(entries) => entries
                .into_iter()
                .find(|e| matches!(e.kind.as_deref(), None | Some("function")))
                .ok_or_else(|| {
                    SchemaError::InvalidJson("ABI array contains no function entry".into())
                })?,
        };

        validate_function_name(&raw.name)?;
        let inputs = parse_params(&raw.inputs, "", 0)?;
        let outputs = parse_params(&raw.outputs, "", 0)?;

        let schema = AbiSchema {
            function_name: raw.name,
            inputs,
            outputs,
        };
        debug!(signature = %schema.signature(), "interface schema parsed");
        Ok(schema)
    }
}

/// Parse a schema with the default parser.
pub fn parse_schema(text: &str) -> Result<AbiSchema, SchemaError> {
    AbiSchemaParser::new().parse(text)
}

fn validate_function_name(name: &str) -> Result<(), SchemaError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(SchemaError::EmptyFunctionName)?;
    let ident = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$';
    if first.is_ascii_digit() || !ident(first) || !chars.all(ident) {
        return Err(SchemaError::InvalidFunctionName { name: name.into() });
    }
    Ok(())
}

/// `prefix` is the dotted path of the enclosing tuple, empty at top level.
/// `depth` counts the array and tuple levels already entered.
fn parse_params(
    raw: &[RawParam],
    prefix: &str,
    depth: usize,
) -> Result<Vec<AbiParameter>, SchemaError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for p in raw {
        let path = if prefix.is_empty() {
            p.name.clone()
        } else {
            format!("{prefix}.{}", p.name)
        };
        // unnamed parameters (common in outputs) may repeat
        if !p.name.is_empty() && !seen.insert(p.name.as_str()) {
            return Err(SchemaError::DuplicateParameter { name: path });
        }
        let ty = parse_type(&p.ty, &p.components, &path, depth)?;
        out.push(AbiParameter::new(p.name.clone(), ty));
    }
    Ok(out)
}

/// Array suffixes are peeled iteratively, so the element type is parsed once
/// however many dimensions follow it.
fn parse_type(
    s: &str,
    components: &[RawParam],
    param: &str,
    depth: usize,
) -> Result<AbiType, SchemaError> {
    let full = s.trim();
    let unknown = || SchemaError::UnknownType {
        param: param.into(),
        ty: full.into(),
    };

    // innermost dimension last
    let mut dims = Vec::new();
    let mut base = full;
    while let Some(head) = base.strip_suffix(']') {
        let open = head.rfind('[').ok_or_else(unknown)?;
        let dim = &head[open + 1..];
        dims.push(if dim.is_empty() {
            None
        } else {
            Some(parse_decimal(dim).filter(|n| *n >= 1).ok_or_else(unknown)?)
        });
        base = &head[..open];
        if depth + dims.len() >= DEFAULT_MAX_NESTING {
            return Err(SchemaError::NestingTooDeep {
                param: param.into(),
                limit: DEFAULT_MAX_NESTING,
            });
        }
    }

    let mut ty = parse_base_type(base, components, param, depth + dims.len())
        .map_err(|e| retag(e, param, full))?;
    for dim in dims.into_iter().rev() {
        ty = match dim {
            None => AbiType::Array(Box::new(ty)),
            Some(len) => AbiType::FixedArray(Box::new(ty), len),
        };
    }
    Ok(ty)
}

/// A type without array suffixes. `depth` counts the levels enclosing it.
fn parse_base_type(
    s: &str,
    components: &[RawParam],
    param: &str,
    depth: usize,
) -> Result<AbiType, SchemaError> {
    let unknown = || SchemaError::UnknownType {
        param: param.into(),
        ty: s.into(),
    };

    match s {
        "bool" => Ok(AbiType::Bool),
        "address" => Ok(AbiType::Address),
        "bytes" => Ok(AbiType::Bytes),
        "string" => Ok(AbiType::String),
        "uint" => Ok(AbiType::Uint(256)),
        "int" => Ok(AbiType::Int(256)),
        "tuple" if !components.is_empty() => {
            if depth + 1 >= DEFAULT_MAX_NESTING {
                return Err(SchemaError::NestingTooDeep {
                    param: param.into(),
                    limit: DEFAULT_MAX_NESTING,
                });
            }
            Ok(AbiType::Tuple(parse_params(components, param, depth + 1)?))
        }
        _ if s.starts_with("uint") => int_width(&s[4..]).map(AbiType::Uint).ok_or_else(unknown),
        _ if s.starts_with("int") => int_width(&s[3..]).map(AbiType::Int).ok_or_else(unknown),
        _ if s.starts_with("bytes") => parse_decimal(&s[5..])
            .filter(|n| (1..=32).contains(n))
            .map(|n| AbiType::FixedBytes(n as u8))
            .ok_or_else(unknown),
        _ => Err(unknown()),
    }
}

/// Report the full type string rather than the stripped element type.
fn retag(err: SchemaError, param: &str, full: &str) -> SchemaError {
    match err {
        SchemaError::UnknownType { .. } => SchemaError::UnknownType {
            param: param.into(),
            ty: full.into(),
        },
        other => other,
    }
}

/// Plain decimal without sign or leading zeros.
fn parse_decimal(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || (s.len() > 1 && s.starts_with('0')) {
        return None;
    }
    s.parse().ok()
}

fn int_width(s: &str) -> Option<u16> {
    parse_decimal(s)
        .filter(|n| (8..=256).contains(n) && n % 8 == 0)
        .map(|n| n as u16)
}
