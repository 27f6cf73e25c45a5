//! Depth-first scanner that builds a tree within a fixed heap budget.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use compact_str::CompactString;

use budgetree_core::{
    FileNode, FileTree, NodeArena, NodeId, NodeKind, ScanConfig, ScanError, ScanWarning,
    SizeThreshold, TreeStats, size,
};

use crate::exclude::ExcludeFilter;
use crate::fs::{EntryKind, Filesystem, StdFilesystem};
use crate::progress::ScanMonitor;
use crate::queue::{SmallGroup, SmallGroupQueue};

/// Scanner that keeps per-file detail only where the heap budget allows.
///
/// Entries that represent few blocks for the metadata they cost are collapsed
/// into one aggregate node per directory. The collapsed nodes are kept aside
/// and, when the budget runs out, the groups with the fewest blocks per byte
/// are discarded for good. Groups still held when the traversal ends are
/// expanded back into the tree.
pub struct BoundedScanner<F = StdFilesystem> {
    fs: F,
    monitor: Arc<ScanMonitor>,
}

impl BoundedScanner {
    /// Create a scanner over the real filesystem.
    pub fn new() -> Self {
        Self::with_filesystem(StdFilesystem)
    }
}

impl Default for BoundedScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Filesystem> BoundedScanner<F> {
    /// Create a scanner over any [`Filesystem`].
    pub fn with_filesystem(fs: F) -> Self {
        Self {
            fs,
            monitor: Arc::new(ScanMonitor::new()),
        }
    }

    /// Report progress to, and take cancellation from, a shared monitor.
    pub fn with_monitor(mut self, monitor: Arc<ScanMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Handle for observing and cancelling scans from another thread.
    pub fn monitor(&self) -> Arc<ScanMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Request cancellation of the running scan.
    pub fn cancel(&self) {
        self.monitor.cancel();
    }

    /// Scan the tree under `config.root`.
    pub fn scan(&self, config: &ScanConfig) -> Result<FileTree, ScanError> {
        config.validate()?;
        let start = Instant::now();
        let root_path = self
            .fs
            .canonicalize(&config.root)
            .map_err(|e| ScanError::io(&config.root, e))?;

        match self.fs.entry_kind(&root_path) {
            Ok(EntryKind::Directory) => {}
            Ok(_) => return Err(ScanError::NotADirectory { path: root_path }),
            Err(e) => return Err(ScanError::io(&root_path, e)),
        }

        self.monitor.begin(config.block_size);
        let filter = ExcludeFilter::new(&config.exclude);
        let threshold = config.threshold();
        tracing::info!(
            root = %root_path.display(),
            allocated_blocks = config.allocated_blocks,
            max_heap = config.max_heap,
            blocks_per_byte = threshold.blocks_per_byte(),
            "Starting bounded scan"
        );

        let mut walk = Walk {
            config,
            fs: &self.fs,
            monitor: &self.monitor,
            threshold,
            arena: NodeArena::new(),
            queue: SmallGroupQueue::new(),
            heap: 0,
            stats: TreeStats::new(),
            warnings: Vec::new(),
        };

        let name = root_name(&root_path);
        let filter = (!filter.is_empty()).then_some(&filter);
        let root = walk.scan_dir(&root_path, name, 0, filter)?;
        tracing::info!(heap = walk.heap, "Traversal done");

        walk.restore(root.id);
        let nodes = walk.arena.compact(root.id);
        tracing::info!(
            nodes = nodes.len(),
            heap = walk.stats.final_heap,
            restored = walk.stats.groups_restored,
            evicted = walk.stats.groups_evicted,
            orphaned = walk.stats.groups_orphaned,
            "Scan complete"
        );

        Ok(FileTree::new(
            nodes,
            root_path,
            config.clone(),
            walk.stats,
            start.elapsed(),
            walk.warnings,
        ))
    }
}

fn root_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| n.to_string_lossy().into())
        .unwrap_or_else(|| path.to_string_lossy().into())
}

/// A finished entry as seen by its parent's bookkeeping.
struct Built {
    id: NodeId,
    /// Heap charged for the nodes retained in this subtree, excluding groups
    /// collapsed inside it (those are charged to their own records).
    cost: usize,
    files: u64,
    dirs: u64,
}

/// Children of one directory on one side of the small/normal split.
#[derive(Default)]
struct Bucket {
    ids: Vec<NodeId>,
    cost: usize,
    blocks: u64,
    files: u64,
    dirs: u64,
}

impl Bucket {
    fn add(&mut self, built: Built, blocks: u64) {
        self.ids.push(built.id);
        self.cost += built.cost;
        self.blocks += blocks;
        self.files += built.files;
        self.dirs += built.dirs;
    }

    fn merge(&mut self, other: Bucket) {
        self.ids.extend(other.ids);
        self.cost += other.cost;
        self.blocks += other.blocks;
        self.files += other.files;
        self.dirs += other.dirs;
    }
}

/// State of one scan in progress.
struct Walk<'a, F> {
    config: &'a ScanConfig,
    fs: &'a F,
    monitor: &'a ScanMonitor,
    threshold: SizeThreshold,
    arena: NodeArena,
    queue: SmallGroupQueue,
    /// Heap charged for every live node, collapsed groups included.
    heap: usize,
    stats: TreeStats,
    warnings: Vec<ScanWarning>,
}

impl<F: Filesystem> Walk<'_, F> {
    fn scan_dir(
        &mut self,
        path: &Path,
        name: CompactString,
        depth: u32,
        filter: Option<&ExcludeFilter>,
    ) -> Result<Built, ScanError> {
        let (dir, dir_cost) = self.make_node(FileNode::new_directory(name));
        self.stats.record_dir(depth);
        self.monitor.record_dir();
        let empty = Built {
            id: dir,
            cost: dir_cost,
            files: 0,
            dirs: 1,
        };

        if filter.is_some_and(ExcludeFilter::is_excluded) {
            return Ok(empty);
        }
        if self.monitor.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        if depth >= self.config.max_depth {
            return self.size_truncated(empty, path);
        }

        let entries = match self.fs.list_entries(path) {
            Ok(entries) => entries,
            Err(err) if depth == 0 => return Err(ScanError::io(path, err)),
            Err(err) => {
                self.warn(ScanWarning::read_error(path, &err));
                return Ok(empty);
            }
        };

        let mut normal = Bucket {
            cost: dir_cost,
            dirs: 1,
            ..Bucket::default()
        };
        let mut small = Bucket::default();

        for entry in entries {
            let child_path = path.join(entry.name.as_str());
            let built = match entry.kind {
                EntryKind::Directory => {
                    let child_filter = filter.and_then(|f| f.child(&entry.name));
                    self.scan_dir(&child_path, entry.name, depth + 1, child_filter)?
                }
                EntryKind::Symlink => self.scan_symlink(entry.name, depth + 1),
                EntryKind::File | EntryKind::Other => {
                    self.scan_file(&child_path, entry.name, depth + 1)
                }
            };

            let blocks = self.arena.get(built.id).blocks;
            if self.threshold.is_small(built.cost as u64, blocks) {
                small.add(built, blocks);
            } else {
                normal.add(built, blocks);
            }
        }

        let total_blocks = normal.blocks + small.blocks;
        let total_cost = normal.cost + small.cost;
        let collapse =
            !small.ids.is_empty() && self.threshold.is_small(total_cost as u64, total_blocks);

        let files = normal.files + small.files;
        let dirs = normal.dirs + small.dirs;
        let group = if collapse {
            let label = size::group_label(small.dirs, small.files);
            let (aggregate, aggregate_cost) = self.make_node(FileNode::new_small_group(
                label,
                small.files,
                small.dirs,
                small.blocks,
            ));
            normal.ids.push(aggregate);
            normal.cost += aggregate_cost;
            Some(small)
        } else {
            normal.merge(small);
            None
        };

        let cost = normal.cost;
        self.arena.set_children(dir, normal.ids);
        self.arena.get_mut(dir).kind = NodeKind::Directory {
            file_count: files,
            dir_count: dirs,
            truncated: false,
        };

        if let Some(small) = group {
            tracing::trace!(
                path = %path.display(),
                entries = small.ids.len(),
                cost = small.cost,
                blocks = small.blocks,
                "Collapsed small entries"
            );
            self.queue.push(SmallGroup::new(
                self.arena.handle(dir),
                small.ids,
                small.cost,
                small.blocks,
            ));
            self.stats.groups_collapsed += 1;
            self.enforce_budget();
        }

        Ok(Built {
            id: dir,
            cost,
            files,
            dirs,
        })
    }

    fn scan_file(&mut self, path: &Path, name: CompactString, depth: u32) -> Built {
        let blocks = match self.fs.file_len(path) {
            Ok(len) => size::bytes_to_blocks(len, self.config.block_size),
            Err(err) => {
                self.warn(ScanWarning::metadata_error(path, &err));
                0
            }
        };
        self.monitor.record_file(&name, blocks);
        self.stats.record_file(depth);
        let (id, cost) = self.make_node(FileNode::new_file(name, blocks));
        Built {
            id,
            cost,
            files: 1,
            dirs: 0,
        }
    }

    fn scan_symlink(&mut self, name: CompactString, depth: u32) -> Built {
        self.monitor.record_file(&name, 0);
        self.stats.record_symlink(depth);
        let (id, cost) = self.make_node(FileNode::new_symlink(name));
        Built {
            id,
            cost,
            files: 1,
            dirs: 0,
        }
    }

    /// Size a directory at the depth limit without creating nodes for it.
    fn size_truncated(&mut self, built: Built, path: &Path) -> Result<Built, ScanError> {
        let (blocks, files, dirs) = self.measure(path)?;
        self.arena.get_mut(built.id).blocks = blocks;
        self.arena.get_mut(built.id).kind = NodeKind::Directory {
            file_count: files,
            dir_count: dirs,
            truncated: true,
        };
        Ok(Built {
            files,
            dirs,
            ..built
        })
    }

    fn measure(&mut self, path: &Path) -> Result<(u64, u64, u64), ScanError> {
        if self.monitor.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let entries = match self.fs.list_entries(path) {
            Ok(entries) => entries,
            Err(err) => {
                self.warn(ScanWarning::read_error(path, &err));
                return Ok((0, 0, 1));
            }
        };

        let (mut blocks, mut files, mut dirs) = (0u64, 0u64, 1u64);
        let (mut own_files, mut own_blocks) = (0u64, 0u64);
        for entry in entries {
            let child_path = path.join(entry.name.as_str());
            match entry.kind {
                EntryKind::Directory => {
                    self.stats.total_dirs += 1;
                    self.monitor.record_dir();
                    let (b, f, d) = self.measure(&child_path)?;
                    blocks += b;
                    files += f;
                    dirs += d;
                }
                EntryKind::Symlink => own_files += 1,
                EntryKind::File | EntryKind::Other => {
                    own_files += 1;
                    match self.fs.file_len(&child_path) {
                        Ok(len) => own_blocks += size::bytes_to_blocks(len, self.config.block_size),
                        Err(err) => self.warn(ScanWarning::metadata_error(&child_path, &err)),
                    }
                }
            }
        }
        self.monitor.record_uncounted(own_files, own_blocks);
        self.stats.total_files += own_files;
        Ok((blocks + own_blocks, files + own_files, dirs))
    }

    /// Create a node, charge its cost and evict groups if over budget.
    fn make_node(&mut self, node: FileNode) -> (NodeId, usize) {
        let cost = self.config.node_cost(&node.name);
        let id = self.arena.alloc(node);
        self.heap += cost;
        self.enforce_budget();
        (id, cost)
    }

    /// Evict the lowest-density groups until the charged heap fits the budget
    /// or nothing is left to evict.
    fn enforce_budget(&mut self) {
        while self.heap > self.config.max_heap {
            let Some(group) = self.queue.pop_min() else {
                break;
            };
            if let Some(parent) = self.arena.resolve(group.parent()) {
                tracing::debug!(
                    path = %self.arena.path_of(parent).display(),
                    cost = group.cost(),
                    density = group.density(),
                    "Evicted small group"
                );
            }
            self.heap = self.heap.saturating_sub(group.cost());
            for child in group.into_children() {
                self.arena.release_subtree(child);
            }
            self.stats.groups_evicted += 1;
        }
        self.stats.record_heap(self.heap);
    }

    /// Splice every surviving group back into its parent.
    ///
    /// A group is restored only once its parent hangs off `root` again, so
    /// groups nested inside other groups wait for the outer one. Whatever
    /// never reattaches sat below an evicted group and is released.
    fn restore(&mut self, root: NodeId) {
        let mut pending = self.queue.drain();
        let mut extra_heap = 0usize;

        loop {
            let (ready, waiting): (Vec<SmallGroup>, Vec<SmallGroup>) =
                pending.into_iter().partition(|group| {
                    self.arena
                        .resolve(group.parent())
                        .is_some_and(|parent| self.arena.is_attached(parent, root))
                });
            pending = waiting;
            if ready.is_empty() {
                break;
            }
            for group in ready {
                extra_heap += group.cost();
                self.splice(group);
            }
        }

        for group in pending {
            tracing::debug!(cost = group.cost(), "Released orphaned small group");
            self.heap = self.heap.saturating_sub(group.cost());
            for child in group.into_children() {
                self.arena.release_subtree(child);
            }
            self.stats.groups_orphaned += 1;
        }

        tracing::debug!(extra_heap, "Restored heap");
        self.stats.final_heap = self.heap;
    }

    /// Replace a directory's aggregate with the entries it stood for.
    fn splice(&mut self, group: SmallGroup) {
        let Some(parent) = self.arena.resolve(group.parent()) else {
            return;
        };
        tracing::debug!(
            path = %self.arena.path_of(parent).display(),
            cost = group.cost(),
            density = group.density(),
            "Restored small group"
        );

        let (aggregates, mut children): (Vec<NodeId>, Vec<NodeId>) = self
            .arena
            .get(parent)
            .children
            .iter()
            .partition(|&&child| self.arena.get(child).is_small_group());
        for aggregate in aggregates {
            let cost = self.config.node_cost(&self.arena.get(aggregate).name);
            self.heap = self.heap.saturating_sub(cost);
            self.arena.release_subtree(aggregate);
        }
        children.extend(group.into_children());
        self.arena.set_children(parent, children);
        self.stats.groups_restored += 1;
    }

    fn warn(&mut self, warning: ScanWarning) {
        tracing::warn!(path = %warning.path.display(), "{}", warning.message);
        self.monitor.record_warning();
        self.warnings.push(warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.txt"), vec![0u8; 10_000]).unwrap();

        temp
    }

    fn config(root: &Path) -> ScanConfig {
        ScanConfig::builder()
            .root(root)
            .block_size(1024u64)
            .build()
            .unwrap()
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let tree = BoundedScanner::new().scan(&config(temp.path())).unwrap();

        assert_eq!(tree.stats.total_files, 4);
        assert_eq!(tree.stats.total_dirs, 4);
        // 5 + 17 + 4 bytes take a block each, 10 000 bytes take 10.
        assert_eq!(tree.total_blocks(), 13);
        assert_eq!(tree.root().file_count(), 4);
        assert_eq!(tree.root().dir_count(), 4);
    }

    #[test]
    fn test_children_sorted_by_size() {
        let temp = create_test_tree();
        let tree = BoundedScanner::new().scan(&config(temp.path())).unwrap();

        let sizes: Vec<u64> = tree.children(FileTree::ROOT).map(|(_, n)| n.blocks).collect();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
        let (_, first) = tree.children(FileTree::ROOT).next().unwrap();
        assert_eq!(first.name.as_str(), "dir2");
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = BoundedScanner::new()
            .scan(&config(&temp.path().join("missing")))
            .unwrap_err();
        assert!(matches!(err, ScanError::NotFound { .. }));
    }

    #[test]
    fn test_root_must_be_directory() {
        let temp = create_test_tree();
        let err = BoundedScanner::new()
            .scan(&config(&temp.path().join("file1.txt")))
            .unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory { .. }));
    }

    #[test]
    fn test_exclude_keeps_empty_directory() {
        let temp = create_test_tree();
        let mut config = config(temp.path());
        config.exclude = vec!["dir2".into()];
        let tree = BoundedScanner::new().scan(&config).unwrap();

        let (_, dir2) = tree
            .children(FileTree::ROOT)
            .find(|(_, n)| n.name.as_str() == "dir2")
            .unwrap();
        assert_eq!(dir2.blocks, 0);
        assert_eq!(dir2.child_count(), 0);
        assert_eq!(tree.total_blocks(), 3);
    }

    #[test]
    fn test_progress_reflects_scan() {
        let temp = create_test_tree();
        let scanner = BoundedScanner::new();
        let monitor = scanner.monitor();
        scanner.scan(&config(temp.path())).unwrap();

        assert_eq!(monitor.files_scanned(), 4);
        assert_eq!(monitor.bytes_processed(), 13 * 1024);
        assert!(monitor.last_touched().is_some());
    }
}
