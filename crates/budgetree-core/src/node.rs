//! Tree nodes and the arena that owns them.

use std::cmp::Ordering;
use std::path::PathBuf;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Index of a node within a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new NodeId from a u32.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A [`NodeId`] paired with the generation of its slot.
///
/// Slots are reused after a subtree is released, so a plain id held across
/// releases may end up pointing at an unrelated node. A handle resolves only
/// while the slot still holds the node it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: NodeId,
    generation: u32,
}

impl NodeHandle {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// Type of tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file.
    File,
    /// Symbolic link. Never followed and always 0 blocks.
    Symlink,
    /// Directory.
    Directory {
        /// Non-directory entries in this subtree.
        file_count: u64,
        /// Directories in this subtree, including this one.
        dir_count: u64,
        /// Sized without building children (depth limit reached).
        truncated: bool,
    },
    /// Aggregate standing in for a collapsed group of small entries.
    SmallGroup {
        /// Non-directory entries summarized.
        file_count: u64,
        /// Directories summarized.
        dir_count: u64,
    },
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory { .. })
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File)
    }

    /// Check if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        matches!(self, NodeKind::Symlink)
    }

    /// Check if this is a collapsed small-group aggregate.
    pub fn is_small_group(&self) -> bool {
        matches!(self, NodeKind::SmallGroup { .. })
    }
}

/// A single file, directory or aggregate in the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    /// Entry name (not full path). Aggregates carry their label here.
    pub name: CompactString,

    /// Node type and associated counts.
    pub kind: NodeKind,

    /// Size in blocks (aggregate for directories and small groups).
    pub blocks: u64,

    /// Parent directory. Not an ownership edge.
    pub parent: Option<NodeId>,

    /// Children, sorted by size descending then name.
    pub children: Vec<NodeId>,
}

impl FileNode {
    /// Create a new file node.
    pub fn new_file(name: impl Into<CompactString>, blocks: u64) -> Self {
        Self::leaf(name, NodeKind::File, blocks)
    }

    /// Create a new symlink node.
    pub fn new_symlink(name: impl Into<CompactString>) -> Self {
        Self::leaf(name, NodeKind::Symlink, 0)
    }

    /// Create a new, empty directory node.
    pub fn new_directory(name: impl Into<CompactString>) -> Self {
        Self::leaf(
            name,
            NodeKind::Directory {
                file_count: 0,
                dir_count: 1,
                truncated: false,
            },
            0,
        )
    }

    /// Create an aggregate node for a collapsed group.
    pub fn new_small_group(
        name: impl Into<CompactString>,
        file_count: u64,
        dir_count: u64,
        blocks: u64,
    ) -> Self {
        Self::leaf(
            name,
            NodeKind::SmallGroup {
                file_count,
                dir_count,
            },
            blocks,
        )
    }

    fn leaf(name: impl Into<CompactString>, kind: NodeKind, blocks: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            blocks,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if this node is a collapsed small-group aggregate.
    pub fn is_small_group(&self) -> bool {
        self.kind.is_small_group()
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Non-directory entries represented by this node.
    pub fn file_count(&self) -> u64 {
        match self.kind {
            NodeKind::File | NodeKind::Symlink => 1,
            NodeKind::Directory { file_count, .. } | NodeKind::SmallGroup { file_count, .. } => {
                file_count
            }
        }
    }

    /// Directories represented by this node.
    pub fn dir_count(&self) -> u64 {
        match self.kind {
            NodeKind::File | NodeKind::Symlink => 0,
            NodeKind::Directory { dir_count, .. } | NodeKind::SmallGroup { dir_count, .. } => {
                dir_count
            }
        }
    }
}

/// Total order used for every child list: larger first, then by name.
pub(crate) fn compare_nodes(a: &FileNode, b: &FileNode) -> Ordering {
    b.blocks.cmp(&a.blocks).then_with(|| a.name.cmp(&b.name))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Slot {
    node: FileNode,
    generation: u32,
    vacant: bool,
}

/// Estimated bytes of heap a retained node occupies: its arena slot plus the
/// id held in its parent's child list. Name bytes are charged on top of this.
///
/// The charge covers the arena during the scan. [`NodeArena::compact`] at the
/// end briefly keeps the old slot vector next to the new one.
pub const NODE_OVERHEAD: usize = std::mem::size_of::<Slot>() + std::mem::size_of::<NodeId>();

/// Flat storage for tree nodes with slot reuse.
///
/// Released subtrees return their slots to a free list; later allocations
/// reuse them, so peak memory tracks live nodes rather than every node ever
/// created. [`NodeArena::compact`] drops vacant slots once building is done.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeArena {
    slots: Vec<Slot>,
    #[serde(skip)]
    free: Vec<NodeId>,
}

impl NodeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node and return its id.
    pub fn alloc(&mut self, node: FileNode) -> NodeId {
        if let Some(id) = self.free.pop() {
            let slot = &mut self.slots[id.index()];
            slot.node = node;
            slot.vacant = false;
            return id;
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot {
            node,
            generation: 0,
            vacant: false,
        });
        id
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> &FileNode {
        &self.slots[id.index()].node
    }

    /// Get a mutable node by id.
    pub fn get_mut(&mut self, id: NodeId) -> &mut FileNode {
        &mut self.slots[id.index()].node
    }

    /// Take a generation-checked handle to a live node.
    pub fn handle(&self, id: NodeId) -> NodeHandle {
        NodeHandle {
            id,
            generation: self.slots[id.index()].generation,
        }
    }

    /// Resolve a handle, or `None` if its node has since been released.
    pub fn resolve(&self, handle: NodeHandle) -> Option<NodeId> {
        let slot = self.slots.get(handle.id.index())?;
        (!slot.vacant && slot.generation == handle.generation).then_some(handle.id)
    }

    /// Whether a slot currently holds a node.
    pub fn is_live(&self, id: NodeId) -> bool {
        self.slots.get(id.index()).is_some_and(|slot| !slot.vacant)
    }

    /// Release a node and everything reachable through its children.
    ///
    /// Returns the number of slots freed.
    pub fn release_subtree(&mut self, id: NodeId) -> usize {
        let mut stack = vec![id];
        let mut released = 0;
        while let Some(id) = stack.pop() {
            let slot = &mut self.slots[id.index()];
            if slot.vacant {
                continue;
            }
            stack.append(&mut slot.node.children);
            slot.node.children = Vec::new();
            slot.node.name = CompactString::default();
            slot.node.parent = None;
            slot.vacant = true;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id);
            released += 1;
        }
        released
    }

    /// Replace a node's children wholesale.
    ///
    /// The new list is sorted by the tree order, every child is pointed back
    /// at `parent`, and the parent's size is reset to the sum of its children.
    pub fn set_children(&mut self, parent: NodeId, mut children: Vec<NodeId>) {
        self.sort_children(&mut children);
        let mut blocks: u64 = 0;
        for &child in &children {
            let node = self.get_mut(child);
            node.parent = Some(parent);
            blocks = blocks.saturating_add(node.blocks);
        }
        let node = self.get_mut(parent);
        node.children = children;
        node.blocks = blocks;
    }

    fn sort_children(&self, children: &mut [NodeId]) {
        children.sort_by(|&a, &b| compare_nodes(self.get(a), self.get(b)));
    }

    /// Iterate over the children of a node.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &FileNode)> {
        self.get(id)
            .children
            .iter()
            .map(move |&child| (child, self.get(child)))
    }

    /// Iterate over live nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &FileNode)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.vacant)
            .map(|(i, slot)| (NodeId(i as u32), &slot.node))
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Whether the arena holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path of a node relative to the tree root, built by walking parents.
    pub fn path_of(&self, id: NodeId) -> PathBuf {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.get(id);
            if node.parent.is_some() {
                names.push(node.name.as_str());
            }
            current = node.parent;
        }
        names.iter().rev().collect()
    }

    /// Whether `id` is `root` or reaches it through parent links.
    ///
    /// Entries detached into a collapsed group have no parent until they are
    /// spliced back, so they and everything below them are not attached.
    pub fn is_attached(&self, id: NodeId, root: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            if !self.is_live(id) {
                return false;
            }
            current = self.get(id).parent;
        }
        false
    }

    /// Move the subtree under `root` into a dense arena.
    ///
    /// The root becomes `NodeId(0)`; vacant and unreachable slots are dropped.
    /// Nodes are moved rather than cloned, so names and child lists exist
    /// once. The old slot vector lives until this returns, which briefly
    /// holds about one extra `NODE_OVERHEAD` per slot.
    pub fn compact(mut self, root: NodeId) -> NodeArena {
        let mut out = NodeArena::new();
        let mut root_node = self.take(root);
        root_node.parent = None;
        let root_children = std::mem::take(&mut root_node.children);
        let new_root = out.alloc(root_node);

        let mut stack = vec![(new_root, root_children)];
        while let Some((new, old_children)) = stack.pop() {
            let mut new_children = Vec::with_capacity(old_children.len());
            for child in old_children {
                let mut node = self.take(child);
                node.parent = Some(new);
                let grandchildren = std::mem::take(&mut node.children);
                let id = out.alloc(node);
                new_children.push(id);
                stack.push((id, grandchildren));
            }
            out.get_mut(new).children = new_children;
        }
        out
    }

    fn take(&mut self, id: NodeId) -> FileNode {
        std::mem::replace(&mut self.slots[id.index()].node, FileNode::new_file("", 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_with_files(arena: &mut NodeArena, sizes: &[(&str, u64)]) -> NodeId {
        let dir = arena.alloc(FileNode::new_directory("dir"));
        let children = sizes
            .iter()
            .map(|(name, blocks)| arena.alloc(FileNode::new_file(*name, *blocks)))
            .collect();
        arena.set_children(dir, children);
        dir
    }

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert_eq!(id.0, 42);
        assert_eq!(id.index(), 42);
    }

    #[test]
    fn test_file_node_creation() {
        let node = FileNode::new_file("test.txt", 3);
        assert!(node.is_file());
        assert!(!node.is_dir());
        assert_eq!(node.blocks, 3);
        assert_eq!(node.file_count(), 1);
        assert_eq!(node.dir_count(), 0);
    }

    #[test]
    fn test_directory_node_creation() {
        let node = FileNode::new_directory("test_dir");
        assert!(node.is_dir());
        assert_eq!(node.dir_count(), 1);
        assert_eq!(node.file_count(), 0);
    }

    #[test]
    fn test_set_children_sorts_and_sums() {
        let mut arena = NodeArena::new();
        let dir = dir_with_files(&mut arena, &[("b", 1), ("big", 1000), ("a", 1)]);

        let names: Vec<_> = arena.children(dir).map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(names, ["big", "a", "b"]);
        assert_eq!(arena.get(dir).blocks, 1002);
        assert!(arena.children(dir).all(|(_, n)| n.parent == Some(dir)));
    }

    #[test]
    fn test_release_reuses_slots_and_invalidates_handles() {
        let mut arena = NodeArena::new();
        let dir = dir_with_files(&mut arena, &[("a", 1), ("b", 2)]);
        let handle = arena.handle(dir);
        assert_eq!(arena.resolve(handle), Some(dir));

        assert_eq!(arena.release_subtree(dir), 3);
        assert!(arena.is_empty());
        assert_eq!(arena.resolve(handle), None);

        let reused = arena.alloc(FileNode::new_file("c", 1));
        assert!(reused.index() < 3);
        if reused == dir {
            assert_eq!(arena.resolve(handle), None);
        }
    }

    #[test]
    fn test_path_of() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(FileNode::new_directory("/mnt/volume"));
        let sub = arena.alloc(FileNode::new_directory("sub"));
        let file = arena.alloc(FileNode::new_file("file.txt", 1));
        arena.set_children(sub, vec![file]);
        arena.set_children(root, vec![sub]);

        assert_eq!(arena.path_of(file), PathBuf::from("sub/file.txt"));
        assert_eq!(arena.path_of(root), PathBuf::new());
    }

    #[test]
    fn test_compact_drops_released_nodes() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(FileNode::new_directory("root"));
        let keep = arena.alloc(FileNode::new_file("keep", 4));
        let gone = dir_with_files(&mut arena, &[("x", 1), ("y", 1)]);
        arena.set_children(root, vec![keep]);
        arena.release_subtree(gone);

        let dense = arena.compact(root);
        assert_eq!(dense.len(), 2);
        assert_eq!(dense.get(NodeId(0)).name.as_str(), "root");
        let (child, node) = dense.children(NodeId(0)).next().unwrap();
        assert_eq!(node.name.as_str(), "keep");
        assert_eq!(node.parent, Some(NodeId(0)));
        assert_eq!(child, NodeId(1));
    }

    #[test]
    fn test_is_attached_follows_parents_to_root() {
        let mut arena = NodeArena::new();
        let root = arena.alloc(FileNode::new_directory("root"));
        let linked = dir_with_files(&mut arena, &[("a", 1)]);
        let detached = dir_with_files(&mut arena, &[("b", 1)]);
        arena.set_children(root, vec![linked]);

        let (file, _) = arena.children(linked).next().unwrap();
        assert!(arena.is_attached(file, root));
        assert!(arena.is_attached(root, root));

        // Live, but not reachable from the root.
        let (orphan, _) = arena.children(detached).next().unwrap();
        assert!(arena.is_live(orphan));
        assert!(!arena.is_attached(orphan, root));

        arena.release_subtree(linked);
        assert!(!arena.is_attached(file, root));
    }
}
