//! `cellbridge encode` and `cellbridge selector`.

use anyhow::{Context, Result};
use cellbridge::Bridge;
use cellbridge_evm::schema_selector;

pub fn run(bridge: &Bridge, blob: &str, abi: &str) -> Result<()> {
    let payload = bridge.bridge(blob, abi).context("bridge event")?;
    println!("0x{}", hex::encode(payload));
    Ok(())
}

pub fn selector(bridge: &Bridge, abi: &str) -> Result<()> {
    let schema = bridge.parse_schema(abi).context("parse interface")?;
    println!("Signature: {}", schema.signature());
    println!("Selector:  0x{}", hex::encode(schema_selector(&schema)));
    Ok(())
}
