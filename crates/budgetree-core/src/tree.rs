//! Finished tree container and statistics.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::node::{FileNode, NodeArena, NodeId};
use crate::size;

/// Summary statistics for a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeStats {
    /// Total number of files seen.
    pub total_files: u64,
    /// Total number of directories seen, root included.
    pub total_dirs: u64,
    /// Total number of symbolic links seen.
    pub total_symlinks: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
    /// Small groups collapsed into aggregates.
    pub groups_collapsed: u64,
    /// Groups whose detail was discarded to stay within budget.
    pub groups_evicted: u64,
    /// Groups expanded back to full detail after the traversal.
    pub groups_restored: u64,
    /// Surviving groups whose parent was itself evicted.
    pub groups_orphaned: u64,
    /// Highest tracked heap charge seen after an eviction step.
    pub peak_heap: usize,
    /// Tracked heap charge once restoration is done.
    pub final_heap: usize,
}

impl TreeStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file.
    pub fn record_file(&mut self, depth: u32) {
        self.total_files += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record a symlink.
    pub fn record_symlink(&mut self, depth: u32) {
        self.total_symlinks += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Record the tracked heap charge after it changed.
    pub fn record_heap(&mut self, heap: usize) {
        self.peak_heap = self.peak_heap.max(heap);
    }
}

/// Complete scanned tree with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTree {
    /// All retained nodes; the root is always `NodeId(0)`.
    pub nodes: NodeArena,

    /// Root path that was scanned.
    pub root_path: PathBuf,

    /// When this scan was performed.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Scan configuration used.
    pub config: ScanConfig,

    /// Summary statistics.
    pub stats: TreeStats,

    /// Warnings encountered during scan.
    pub warnings: Vec<ScanWarning>,
}

impl FileTree {
    /// Id of the root node.
    pub const ROOT: NodeId = NodeId(0);

    /// Create a new file tree from a compacted arena.
    pub fn new(
        nodes: NodeArena,
        root_path: PathBuf,
        config: ScanConfig,
        stats: TreeStats,
        scan_duration: Duration,
        warnings: Vec<ScanWarning>,
    ) -> Self {
        Self {
            nodes,
            root_path,
            scanned_at: SystemTime::now(),
            scan_duration,
            config,
            stats,
            warnings,
        }
    }

    /// The root node.
    pub fn root(&self) -> &FileNode {
        self.nodes.get(Self::ROOT)
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> &FileNode {
        self.nodes.get(id)
    }

    /// Iterate over a node's children in display order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &FileNode)> {
        self.nodes.children(id)
    }

    /// Absolute path of a node.
    pub fn path_of(&self, id: NodeId) -> PathBuf {
        self.root_path.join(self.nodes.path_of(id))
    }

    /// Total size of the tree in blocks.
    pub fn total_blocks(&self) -> u64 {
        self.root().blocks
    }

    /// Total size of the tree in bytes.
    pub fn total_bytes(&self) -> u64 {
        size::blocks_to_bytes(self.total_blocks(), self.config.block_size)
    }

    /// Human-readable size of a node.
    pub fn size_label(&self, id: NodeId) -> String {
        size::blocks_to_label(self.node(id).blocks, self.config.block_size)
    }

    /// Number of nodes retained in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
