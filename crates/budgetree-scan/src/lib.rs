//! Memory-budgeted directory scanning for budgetree.
//!
//! # Overview
//!
//! `budgetree-scan` walks a directory tree depth-first and builds a
//! size-annotated tree whose metadata stays within a fixed heap budget:
//!
//! - **Collapsing**: entries too small to be worth their metadata are folded
//!   into one aggregate node per directory (`<12 files>`)
//! - **Eviction**: when the budget runs out, the collapsed groups with the
//!   fewest blocks per byte lose their detail permanently
//! - **Restoration**: groups that survive the traversal are expanded back
//! - **Progress and cancellation** through a shared [`ScanMonitor`]
//!
//! # Example
//!
//! ```rust,no_run
//! use budgetree_scan::{BoundedScanner, ScanConfig, VolumeStats};
//!
//! let volume = VolumeStats::query("/mnt/sdcard".as_ref());
//! let config = ScanConfig::builder()
//!     .root("/mnt/sdcard")
//!     .block_size(volume.block_size)
//!     .allocated_blocks(volume.used_blocks)
//!     .max_heap(8usize * 1024 * 1024)
//!     .build()
//!     .unwrap();
//!
//! let tree = BoundedScanner::new().scan(&config).unwrap();
//! println!("Total size: {} bytes", tree.total_bytes());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use budgetree_scan::{BoundedScanner, ScanConfig};
//!
//! let scanner = BoundedScanner::new();
//! let monitor = scanner.monitor();
//!
//! std::thread::spawn(move || {
//!     while monitor.last_touched().is_none() {
//!         std::thread::yield_now();
//!     }
//!     println!("Scanned {} bytes", monitor.bytes_processed());
//!     monitor.cancel();
//! });
//!
//! let result = scanner.scan(&ScanConfig::new("/"));
//! assert!(result.is_err_and(|e| e.is_cancelled()));
//! ```

mod exclude;
mod fs;
#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod progress;
mod queue;
mod scanner;
mod volume;

pub use exclude::ExcludeFilter;
pub use fs::{DirEntry, EntryKind, Filesystem, StdFilesystem};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryFilesystem;
pub use progress::{ScanMonitor, ScanProgress, TouchedEntry};
pub use queue::{SmallGroup, SmallGroupQueue};
pub use scanner::BoundedScanner;
pub use volume::{FALLBACK_BLOCK_SIZE, VolumeStats};

// Re-export core types for convenience
pub use budgetree_core::{
    FileNode, FileTree, NodeArena, NodeId, NodeKind, ScanConfig, ScanError, ScanWarning,
    TreeStats, WarningKind, size,
};
