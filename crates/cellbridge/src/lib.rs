//! # cellbridge
//!
//! Turns an event emitted on a cell-based chain into calldata for a contract
//! on an account-based chain:
//!
//! ```text
//! base64 ─▶ BocDecoder ─▶ CellTree ─▶ EventExtractor ─▶ EventRecord ─┐
//!                                                                     ├─▶ PayloadEncoder ─▶ selector ‖ params
//! interface JSON ─▶ AbiSchemaParser ─▶ AbiSchema ────────────────────┘
//! ```
//!
//! The free functions use default limits. Build a [`Bridge`] from a
//! [`BridgeConfig`] to change them.

pub mod bridge;
pub mod config;

pub use bridge::{Bridge, BridgeJob};
pub use config::{BridgeConfig, ConfigError};
pub use cellbridge_ton::{read_account_state, AccountState};

pub use cellbridge_core::{
    AbiParameter, AbiSchema, AbiType, BridgeError, DecodeError, DecodeLimits, EncodeError,
    EventRecord, RecordValue, SchemaError,
};

/// Base64 → decoded tree → event record.
pub fn decode_and_extract(blob_b64: &str) -> Result<EventRecord, DecodeError> {
    Bridge::default().decode_and_extract(blob_b64)
}

/// Raw bytes → decoded tree → event record.
pub fn decode_and_extract_bytes(raw: &[u8]) -> Result<EventRecord, DecodeError> {
    Bridge::default().decode_and_extract_bytes(raw)
}

/// Parse `schema_text` and encode `record` as a call to it.
pub fn encode_payload(record: &EventRecord, schema_text: &str) -> Result<Vec<u8>, EncodeError> {
    Bridge::default().encode_payload(record, schema_text)
}

/// The whole pipeline for one blob.
pub fn bridge(blob_b64: &str, schema_text: &str) -> Result<Vec<u8>, BridgeError> {
    Bridge::default().bridge(blob_b64, schema_text)
}

/// The whole pipeline for many independent blobs, in parallel.
pub fn bridge_batch(jobs: &[BridgeJob]) -> Vec<Result<Vec<u8>, BridgeError>> {
    Bridge::default().bridge_batch(jobs)
}
