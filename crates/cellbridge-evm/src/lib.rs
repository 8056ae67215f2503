//! # cellbridge-evm
//!
//! Destination-chain side of CellBridge: parses a JSON interface description
//! into an [`AbiSchema`](cellbridge_core::AbiSchema) and encodes event records
//! as `selector ‖ head ‖ tail` calldata.

pub mod encoder;
pub mod schema;
pub mod selector;

pub use encoder::PayloadEncoder;
pub use schema::{parse_schema, AbiSchemaParser};
pub use selector::{keccak256, schema_selector, selector};
