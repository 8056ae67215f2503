//! Error types for the CellBridge decode and encode pipelines.

use thiserror::Error;

/// Errors that can occur while decoding a cell tree or extracting an event from it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Truncated stream, out-of-range reference, header/descriptor
    /// inconsistency, checksum mismatch, reference cycle.
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Unsupported message kind: {reason}")]
    UnsupportedMessageKind { reason: String },

    #[error("Depth or size limit exceeded: {reason}")]
    DepthOrSizeLimitExceeded { reason: String },
}

impl DecodeError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedMessageKind {
            reason: reason.into(),
        }
    }

    pub fn limit(reason: impl Into<String>) -> Self {
        Self::DepthOrSizeLimitExceeded {
            reason: reason.into(),
        }
    }

    /// Stable snake_case tag, suitable for log fields and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "malformed_input",
            Self::UnsupportedMessageKind { .. } => "unsupported_message_kind",
            Self::DepthOrSizeLimitExceeded { .. } => "depth_or_size_limit_exceeded",
        }
    }
}

/// Errors from parsing a textual interface description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Invalid interface JSON: {0}")]
    InvalidJson(String),

    #[error("Function name is empty")]
    EmptyFunctionName,

    #[error("Invalid function name '{name}'")]
    InvalidFunctionName { name: String },

    #[error("Parameter '{param}': unrecognized type '{ty}'")]
    UnknownType { param: String, ty: String },

    #[error("Duplicate parameter name '{name}'")]
    DuplicateParameter { name: String },

    #[error("Parameter '{param}': type nests deeper than {limit} levels")]
    NestingTooDeep { param: String, limit: usize },
}

/// Errors from mapping an event record onto an ABI schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Schema parse error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Parameter '{name}' has no matching field in the event record")]
    UnmappedParameter { name: String },

    #[error("Parameter '{param}': expected {expected}, got {got}")]
    TypeMismatch {
        param: String,
        expected: String,
        got: String,
    },

    #[error("Depth or size limit exceeded: {reason}")]
    DepthOrSizeLimitExceeded { reason: String },
}

impl EncodeError {
    pub fn mismatch(
        param: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            param: param.into(),
            expected: expected.into(),
            got: got.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema_parse_error",
            Self::UnmappedParameter { .. } => "unmapped_parameter",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::DepthOrSizeLimitExceeded { .. } => "depth_or_size_limit_exceeded",
        }
    }
}

/// Errors from the combined decode → encode bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl From<SchemaError> for BridgeError {
    fn from(e: SchemaError) -> Self {
        BridgeError::Encode(EncodeError::Schema(e))
    }
}

impl BridgeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(e) => e.kind(),
            Self::Encode(e) => e.kind(),
        }
    }
}
