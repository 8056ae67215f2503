//! `cellbridge decode`: print the event record carried by a blob.

use anyhow::{Context, Result};
use cellbridge::Bridge;

pub fn run(bridge: &Bridge, blob: &str, json: bool) -> Result<()> {
    let record = bridge.decode_and_extract(blob).context("decode event")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        println!("Fields:");
        for (name, value) in record.iter() {
            println!("  {name}: {value}");
        }
    }
    Ok(())
}
