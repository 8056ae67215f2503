//! # cellbridge-ton
//!
//! Source-chain side of CellBridge: decodes bag-of-cells blobs into an
//! index-addressed [`CellTree`] and extracts typed event records from them
//! according to a pinned, versioned [`EventLayout`].
//!
//! ```text
//! bytes ──BocDecoder──▶ CellTree ──EventExtractor──▶ EventRecord
//! ```
//!
//! Blobs holding an account state rather than a message are read with
//! [`read_account_state`]. The [`builder`] module provides the inverse
//! direction for fixtures.

pub mod account;
pub mod boc;
pub mod builder;
pub mod cell;
pub mod crc;
pub mod extractor;
pub mod layout;
pub mod slice;

pub use account::{read_account_state, AccountAddress, AccountState, StorageUsed};
pub use boc::{BocDecoder, BocHeader};
pub use builder::{BocWriter, CellBuilder, EventWriter, TreeBuilder};
pub use cell::{Cell, CellTree};
pub use extractor::EventExtractor;
pub use layout::{EventLayout, Step, EXTERNAL_EVENT_V1};
pub use slice::CellSlice;
