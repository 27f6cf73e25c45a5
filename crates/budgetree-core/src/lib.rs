//! Core types for budgetree.
//!
//! This crate provides the data structures shared by the scanner and its
//! hosts: the node arena, the finished tree container, the size ledger and
//! the scan configuration.

mod config;
mod error;
mod node;
pub mod size;
mod tree;

pub use config::{
    DEFAULT_BLOCK_SIZE, DEFAULT_MAX_DEPTH, DEFAULT_MAX_HEAP, ScanConfig, ScanConfigBuilder,
};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use node::{FileNode, NODE_OVERHEAD, NodeArena, NodeHandle, NodeId, NodeKind};
pub use size::SizeThreshold;
pub use tree::{FileTree, TreeStats};
