//! Scan configuration types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::node::NODE_OVERHEAD;
use crate::size::SizeThreshold;

/// Block size assumed when the volume does not report one.
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// Heap budget for a single scan when the host does not pick one.
pub const DEFAULT_MAX_HEAP: usize = 16 * 1024 * 1024;

/// Directory depth below which subtrees are only sized, not built.
pub const DEFAULT_MAX_DEPTH: u32 = 20;

/// Configuration for a bounded scan.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanConfig {
    /// Root path to scan.
    pub root: PathBuf,

    /// Filesystem allocation unit in bytes.
    #[builder(default = "DEFAULT_BLOCK_SIZE")]
    #[serde(default = "default_block_size")]
    pub block_size: u64,

    /// Blocks in use on the volume; calibrates the detail threshold.
    #[builder(default)]
    #[serde(default)]
    pub allocated_blocks: u64,

    /// Heap bytes the tree may occupy.
    #[builder(default = "DEFAULT_MAX_HEAP")]
    #[serde(default = "default_max_heap")]
    pub max_heap: usize,

    /// The detail budget is `max_heap / detail_divisor`.
    #[builder(default = "2")]
    #[serde(default = "default_detail_divisor")]
    pub detail_divisor: u64,

    /// Fixed per-node cost used for budgeting. Name bytes are added on top.
    #[builder(default = "NODE_OVERHEAD")]
    #[serde(default = "default_node_overhead")]
    pub node_overhead: usize,

    /// Directories at this depth are sized without building their children.
    #[builder(default = "DEFAULT_MAX_DEPTH")]
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Paths, relative to the root, that are kept as empty directories.
    #[builder(default)]
    #[serde(default)]
    pub exclude: Vec<PathBuf>,
}

fn default_block_size() -> u64 {
    DEFAULT_BLOCK_SIZE
}

fn default_max_heap() -> usize {
    DEFAULT_MAX_HEAP
}

fn default_detail_divisor() -> u64 {
    2
}

fn default_node_overhead() -> usize {
    NODE_OVERHEAD
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.root {
            Some(ref root) if root.as_os_str().is_empty() => {
                return Err("Root path cannot be empty".to_string());
            }
            None => return Err("Root path is required".to_string()),
            _ => {}
        }
        if self.block_size == Some(0) {
            return Err("Block size must be positive".to_string());
        }
        if self.detail_divisor == Some(0) {
            return Err("Detail divisor must be positive".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a simple config for scanning a path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            block_size: DEFAULT_BLOCK_SIZE,
            allocated_blocks: 0,
            max_heap: DEFAULT_MAX_HEAP,
            detail_divisor: 2,
            node_overhead: NODE_OVERHEAD,
            max_depth: DEFAULT_MAX_DEPTH,
            exclude: Vec::new(),
        }
    }

    /// Share of a total heap budget given to one of `volumes` concurrent scans.
    ///
    /// One extra share is held back for the host itself.
    pub fn heap_share(total_heap: usize, volumes: usize) -> usize {
        total_heap / volumes.saturating_add(1)
    }

    /// Check a config that did not come through the builder.
    pub fn validate(&self) -> Result<(), ScanError> {
        let invalid = |message: &str| ScanError::InvalidConfig {
            message: message.to_string(),
        };
        if self.root.as_os_str().is_empty() {
            return Err(invalid("Root path cannot be empty"));
        }
        if self.block_size == 0 {
            return Err(invalid("Block size must be positive"));
        }
        if self.detail_divisor == 0 {
            return Err(invalid("Detail divisor must be positive"));
        }
        Ok(())
    }

    /// Heap bytes reserved for detailed entries.
    pub fn detail_budget(&self) -> u64 {
        self.max_heap as u64 / self.detail_divisor.max(1)
    }

    /// Threshold that separates small entries from normal ones.
    pub fn threshold(&self) -> SizeThreshold {
        SizeThreshold::new(self.allocated_blocks, self.detail_budget())
    }

    /// Budgeted cost of a node with the given name.
    pub fn node_cost(&self, name: &str) -> usize {
        self.node_overhead + name.len()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
