//! Resource bounds applied while decoding untrusted cell trees.

use serde::{Deserialize, Serialize};

/// Upper bounds that keep worst-case decode work proportional to honest input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeLimits {
    /// Maximum number of cells a serialized tree may declare
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    /// Maximum number of root cells
    #[serde(default = "default_max_roots")]
    pub max_roots: usize,
    /// Maximum number of reference descents while reading one record
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_cells() -> usize { 16_384 }
fn default_max_roots() -> usize { 16 }
fn default_max_depth() -> usize { 8 }

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_cells: default_max_cells(),
            max_roots: default_max_roots(),
            max_depth: default_max_depth(),
        }
    }
}
