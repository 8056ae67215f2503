//! # cellbridge-core
//!
//! Types shared by every CellBridge crate: the extracted `EventRecord`,
//! the ABI type model, decode limits, and the error taxonomy.

pub mod abi;
pub mod error;
pub mod limits;
pub mod record;

pub use abi::{AbiParameter, AbiSchema, AbiType};
pub use error::{BridgeError, DecodeError, EncodeError, SchemaError};
pub use limits::DecodeLimits;
pub use record::{EventRecord, RecordValue};
