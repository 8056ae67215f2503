//! CellBridge CLI.
//!
//! # Commands
//! ```text
//! cellbridge decode    --blob <base64 | @file> [--json]
//! cellbridge inspect   --blob <base64 | @file>
//! cellbridge encode    --blob <base64 | @file> --abi <json | @file>
//! cellbridge selector  --abi <json | @file>
//! ```
//!
//! Global flags: `--config <path>` (YAML or JSON) and `-v/--verbose`.

use anyhow::{Context, Result};
use cellbridge::{Bridge, BridgeConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd_decode;
mod cmd_encode;
mod cmd_inspect;

#[derive(Parser)]
#[command(
    name = "cellbridge",
    about = "Decode cell-tree events and re-encode them as ABI calldata",
    long_about = "
CellBridge CLI: read a base64 bag of cells holding an outbound external
message, extract its event fields, and encode them as a call to the
function described by an interface JSON.

Arguments taking text accept '@path' to read the value from a file.

ENVIRONMENT VARIABLES:
  RUST_LOG    Overrides the configured log filter
",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to a YAML or JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a blob and print the extracted event record
    Decode {
        /// Base64 bag of cells, or @file
        #[arg(long)]
        blob: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode a blob and print its cell tree (and account state, if it is one)
    Inspect {
        /// Base64 bag of cells, or @file
        #[arg(long)]
        blob: String,
    },

    /// Decode a blob and encode its event as calldata
    Encode {
        /// Base64 bag of cells, or @file
        #[arg(long)]
        blob: String,
        /// Interface JSON, or @file
        #[arg(long)]
        abi: String,
    },

    /// Print the canonical signature and selector of an interface
    Selector {
        /// Interface JSON, or @file
        #[arg(long)]
        abi: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => BridgeConfig::default(),
    };
    if cli.verbose {
        config.log.level = "debug".into();
    }
    // a subscriber may already be installed when embedded; logging is optional
    let _ = cellbridge_observability::init_tracing(&config.log);

    let bridge = Bridge::new(config);
    match cli.command {
        Commands::Decode { blob, json } => cmd_decode::run(&bridge, &read_arg(&blob)?, json),
        Commands::Inspect { blob } => cmd_inspect::run(&bridge, &read_arg(&blob)?),
        Commands::Encode { blob, abi } => {
            cmd_encode::run(&bridge, &read_arg(&blob)?, &read_arg(&abi)?)
        }
        Commands::Selector { abi } => cmd_encode::selector(&bridge, &read_arg(&abi)?),
    }
}

/// `@path` reads the file; anything else is taken literally.
fn read_arg(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("read file '{path}'")),
        None => Ok(value.to_string()),
    }
}
