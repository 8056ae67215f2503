//! # cellbridge-observability
//!
//! Structured logging for CellBridge.
//!
//! Library crates only emit `tracing` events (`debug!` per call, `trace!` per
//! step). Binaries call [`init_tracing`] once at startup to choose the level,
//! per-component overrides, and text or JSON output.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
