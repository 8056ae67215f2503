//! `Bridge`: the decode → extract → encode pipeline bound to one config.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use cellbridge_core::{
    AbiSchema, BridgeError, DecodeError, EncodeError, EventRecord,
};
use cellbridge_evm::{AbiSchemaParser, PayloadEncoder};
use cellbridge_ton::{read_account_state, AccountState, BocDecoder, CellTree, EventExtractor};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BridgeConfig;

/// One independent unit of work for [`Bridge::bridge_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeJob {
    /// Base64-encoded bag of cells
    pub blob_b64: String,
    /// Interface JSON of the target function
    pub schema: String,
}

impl BridgeJob {
    pub fn new(blob_b64: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            blob_b64: blob_b64.into(),
            schema: schema.into(),
        }
    }
}

/// Stateless pipeline. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct Bridge {
    config: BridgeConfig,
    decoder: BocDecoder,
    extractor: EventExtractor,
    parser: AbiSchemaParser,
    encoder: PayloadEncoder,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            decoder: BocDecoder::with_limits(config.limits),
            extractor: EventExtractor::with_limits(config.limits),
            parser: AbiSchemaParser::new(),
            encoder: PayloadEncoder::new(),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Decode a base64 blob into its cell tree without extracting anything.
    pub fn decode_tree(&self, blob_b64: &str) -> Result<CellTree, DecodeError> {
        let raw = decode_base64(blob_b64)?;
        self.decoder.decode(&raw)
    }

    pub fn decode_and_extract(&self, blob_b64: &str) -> Result<EventRecord, DecodeError> {
        let raw = decode_base64(blob_b64)?;
        self.decode_and_extract_bytes(&raw)
    }

    /// Decode a base64 blob holding an account state.
    pub fn decode_account(&self, blob_b64: &str) -> Result<AccountState, DecodeError> {
        let tree = self.decode_tree(blob_b64)?;
        read_account_state(&tree)
    }

    pub fn decode_and_extract_bytes(&self, raw: &[u8]) -> Result<EventRecord, DecodeError> {
        let tree = self.decoder.decode(raw)?;
        match self.extractor.extract(&tree) {
            Err(DecodeError::UnsupportedMessageKind { .. }) if read_account_state(&tree).is_ok() => {
                Err(DecodeError::unsupported(
                    "blob holds an account state, not an outbound external message",
                ))
            }
            other => other,
        }
    }

    pub fn parse_schema(&self, schema_text: &str) -> Result<AbiSchema, EncodeError> {
        Ok(self.parser.parse(schema_text)?)
    }

    pub fn encode_payload(
        &self,
        record: &EventRecord,
        schema_text: &str,
    ) -> Result<Vec<u8>, EncodeError> {
        let schema = self.parse_schema(schema_text)?;
        self.encoder.encode(record, &schema)
    }

    /// Full pipeline. Decoding and schema parsing run concurrently; when both
    /// fail the decode error is reported.
    pub fn bridge(&self, blob_b64: &str, schema_text: &str) -> Result<Vec<u8>, BridgeError> {
        let (record, schema) = rayon::join(
            || self.decode_and_extract(blob_b64),
            || self.parse_schema(schema_text),
        );
        let record = record?;
        let schema = schema?;
        let payload = self.encoder.encode(&record, &schema)?;
        debug!(
            function = %schema.function_name,
            fields = record.len(),
            bytes = payload.len(),
            "bridged"
        );
        Ok(payload)
    }

    /// Run many independent jobs in parallel. Results keep input order.
    pub fn bridge_batch(&self, jobs: &[BridgeJob]) -> Vec<Result<Vec<u8>, BridgeError>> {
        let results: Vec<_> = jobs
            .par_iter()
            .map(|job| self.bridge(&job.blob_b64, &job.schema))
            .collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        debug!(jobs = jobs.len(), failed, "batch bridged");
        results
    }
}

/// Standard alphabet with padding; surrounding whitespace is ignored.
fn decode_base64(blob_b64: &str) -> Result<Vec<u8>, DecodeError> {
    STANDARD
        .decode(blob_b64.trim())
        .map_err(|e| DecodeError::malformed(format!("invalid base64: {e}")))
}
