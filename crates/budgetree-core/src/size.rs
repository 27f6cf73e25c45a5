//! Size ledger: block arithmetic, labels and the detail threshold.

use serde::{Deserialize, Serialize};

/// Convert a byte length into blocks, rounding up.
///
/// Any nonzero length occupies at least one block; an empty file occupies none.
pub fn bytes_to_blocks(bytes: u64, block_size: u64) -> u64 {
    if bytes == 0 || block_size == 0 {
        return 0;
    }
    bytes.div_ceil(block_size).max(1)
}

/// Convert a block count back into bytes.
pub fn blocks_to_bytes(blocks: u64, block_size: u64) -> u64 {
    blocks.saturating_mul(block_size)
}

/// Human-readable size of a block count.
pub fn blocks_to_label(blocks: u64, block_size: u64) -> String {
    humansize::format_size(blocks_to_bytes(blocks, block_size), humansize::BINARY)
}

/// Label of an aggregate node summarizing `dirs` directories and `files` files.
pub fn group_label(dirs: u64, files: u64) -> String {
    if dirs == 0 {
        format!("<{files} files>")
    } else if files == 0 {
        format!("<{dirs} dirs>")
    } else {
        format!("<{dirs} dirs and {files} files>")
    }
}

/// Calibrates how many blocks an entry must represent per byte of metadata
/// to earn individual representation.
///
/// The threshold is `allocated_blocks / detail_budget` blocks per byte, where
/// the detail budget is the share of the heap reserved for detailed entries.
/// Comparisons are done by cross-multiplication in `u128` so no precision is
/// lost for large volumes or tiny budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeThreshold {
    allocated_blocks: u64,
    detail_budget: u64,
}

impl SizeThreshold {
    /// Create a threshold from the volume's allocated blocks and the heap
    /// bytes reserved for detailed entries.
    pub fn new(allocated_blocks: u64, detail_budget: u64) -> Self {
        Self {
            allocated_blocks,
            detail_budget,
        }
    }

    /// Whether an entry costing `cost` bytes of metadata is too cheap, at
    /// `blocks` blocks, to be kept individually.
    pub fn is_small(&self, cost: u64, blocks: u64) -> bool {
        u128::from(cost) * u128::from(self.allocated_blocks)
            > u128::from(blocks) * u128::from(self.detail_budget)
    }

    /// Threshold expressed as blocks per metadata byte, for diagnostics.
    pub fn blocks_per_byte(&self) -> f64 {
        if self.detail_budget == 0 {
            return f64::INFINITY;
        }
        self.allocated_blocks as f64 / self.detail_budget as f64
    }

    pub fn allocated_blocks(&self) -> u64 {
        self.allocated_blocks
    }

    pub fn detail_budget(&self) -> u64 {
        self.detail_budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_blocks_rounds_up() {
        assert_eq!(bytes_to_blocks(0, 4096), 0);
        assert_eq!(bytes_to_blocks(1, 4096), 1);
        assert_eq!(bytes_to_blocks(4096, 4096), 1);
        assert_eq!(bytes_to_blocks(4097, 4096), 2);
        assert_eq!(bytes_to_blocks(1000, 1), 1000);
    }

    #[test]
    fn test_blocks_to_label() {
        assert_eq!(blocks_to_label(0, 4096), "0 B");
        assert_eq!(blocks_to_label(1, 1024), "1 KiB");
        assert_eq!(blocks_to_label(256, 4096), "1 MiB");
    }

    #[test]
    fn test_group_label() {
        assert_eq!(group_label(0, 12), "<12 files>");
        assert_eq!(group_label(3, 0), "<3 dirs>");
        assert_eq!(group_label(3, 12), "<3 dirs and 12 files>");
    }

    #[test]
    fn test_threshold_classification() {
        // 5 blocks per metadata byte
        let threshold = SizeThreshold::new(1000, 200);
        assert!(threshold.is_small(101, 1));
        assert!(!threshold.is_small(103, 1000));
        // Exactly on the threshold is not small.
        assert!(!threshold.is_small(100, 500));
        assert_eq!(threshold.blocks_per_byte(), 5.0);
    }

    #[test]
    fn test_threshold_without_allocation_keeps_everything() {
        let threshold = SizeThreshold::new(0, 1 << 20);
        assert!(!threshold.is_small(u64::MAX, 0));
    }

    #[test]
    fn test_threshold_does_not_overflow() {
        let threshold = SizeThreshold::new(u64::MAX, 1);
        assert!(threshold.is_small(u64::MAX, u64::MAX - 1));
    }
}
