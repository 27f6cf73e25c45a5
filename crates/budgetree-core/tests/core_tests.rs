use budgetree_core::{
    FileNode, FileTree, NODE_OVERHEAD, NodeArena, NodeId, NodeKind, ScanConfig, ScanError,
    ScanWarning, SizeThreshold, TreeStats, WarningKind, size,
};
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_node_id_operations() {
    let id1 = NodeId::new(42);
    let id2 = NodeId::new(42);

    assert_eq!(id1, id2);
    assert_eq!(id1.0, 42);
    assert_eq!(id1.index(), 42);
}

#[test]
fn test_node_kind_discrimination() {
    let dir = FileNode::new_directory("photos");
    assert!(dir.is_dir());
    assert_eq!(dir.dir_count(), 1);
    assert_eq!(dir.file_count(), 0);

    let link = FileNode::new_symlink("current");
    assert!(link.kind.is_symlink());
    assert_eq!(link.blocks, 0);
    assert_eq!(link.file_count(), 1);

    let group = FileNode::new_small_group("<3 dirs and 40 files>", 40, 3, 12);
    assert!(group.is_small_group());
    assert!(!group.is_dir());
    assert_eq!(group.file_count(), 40);
    assert_eq!(group.dir_count(), 3);
}

#[test]
fn test_handles_survive_unrelated_releases() {
    let mut arena = NodeArena::new();
    let root = arena.alloc(FileNode::new_directory("root"));
    let keep = arena.alloc(FileNode::new_directory("keep"));
    let drop = arena.alloc(FileNode::new_directory("drop"));
    let inner = arena.alloc(FileNode::new_file("inner.bin", 8));
    arena.set_children(drop, vec![inner]);
    arena.set_children(root, vec![keep, drop]);

    let keep_handle = arena.handle(keep);
    let drop_handle = arena.handle(drop);
    assert_eq!(arena.release_subtree(drop), 2);

    assert_eq!(arena.resolve(keep_handle), Some(keep));
    assert_eq!(arena.resolve(drop_handle), None);
    assert!(!arena.is_live(inner));
    assert_eq!(arena.len(), 2);

    // A reused slot does not resurrect the old handle.
    let reused = arena.alloc(FileNode::new_file("new.bin", 1));
    assert!(reused == drop || reused == inner);
    assert_eq!(arena.resolve(drop_handle), None);
}

#[test]
fn test_compact_roots_tree_at_zero() {
    let mut arena = NodeArena::new();
    let scratch = arena.alloc(FileNode::new_file("scratch", 1));
    let root = arena.alloc(FileNode::new_directory("root"));
    let music = arena.alloc(FileNode::new_directory("music"));
    let song = arena.alloc(FileNode::new_file("song.mp3", 900));
    arena.set_children(music, vec![song]);
    arena.set_children(root, vec![music]);
    arena.release_subtree(scratch);

    let compact = arena.compact(root);
    assert_eq!(compact.len(), 3);
    assert_eq!(compact.get(NodeId(0)).name.as_str(), "root");
    assert_eq!(compact.get(NodeId(0)).parent, None);
    assert_eq!(compact.get(NodeId(0)).blocks, 900);

    let (music, _) = compact.children(NodeId(0)).next().unwrap();
    assert_eq!(compact.path_of(music), PathBuf::from("music"));
    let (song, _) = compact.children(music).next().unwrap();
    assert_eq!(compact.path_of(song), PathBuf::from("music/song.mp3"));
}

#[test]
fn test_threshold_cross_multiplication() {
    // 1 000 000 blocks over a 1 000-byte budget: 1 000 blocks per byte.
    let threshold = SizeThreshold::new(1_000_000, 1000);
    assert!(threshold.is_small(100, 99_999));
    assert!(!threshold.is_small(100, 100_000));
    assert_eq!(threshold.blocks_per_byte(), 1000.0);

    // Nothing is small on a volume with no allocated blocks.
    assert!(!SizeThreshold::new(0, 1000).is_small(1_000_000, 0));

    // No overflow at the extremes.
    assert!(SizeThreshold::new(u64::MAX, 1).is_small(2, u64::MAX));
}

#[test]
fn test_group_labels() {
    assert_eq!(size::group_label(0, 12), "<12 files>");
    assert_eq!(size::group_label(4, 0), "<4 dirs>");
    assert_eq!(size::group_label(2, 7), "<2 dirs and 7 files>");
}

#[test]
fn test_config_builder() {
    let config = ScanConfig::builder()
        .root("/sdcard")
        .allocated_blocks(500_000u64)
        .max_heap(1_000_000usize)
        .detail_divisor(4u64)
        .exclude(vec![PathBuf::from("Android/obb")])
        .build()
        .unwrap();

    assert_eq!(config.block_size, 4096);
    assert_eq!(config.node_overhead, NODE_OVERHEAD);
    assert_eq!(config.detail_budget(), 250_000);
    assert_eq!(config.threshold().allocated_blocks(), 500_000);
    assert_eq!(config.node_cost("DCIM"), NODE_OVERHEAD + 4);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_builder_rejects_bad_values() {
    assert!(ScanConfig::builder().build().is_err());
    assert!(ScanConfig::builder().root("").build().is_err());
    assert!(ScanConfig::builder().root("/").block_size(0u64).build().is_err());
    assert!(ScanConfig::builder().root("/").detail_divisor(0u64).build().is_err());

    let mut config = ScanConfig::new("/");
    config.detail_divisor = 0;
    assert!(matches!(
        config.validate(),
        Err(ScanError::InvalidConfig { .. })
    ));
}

#[test]
fn test_heap_share() {
    assert_eq!(ScanConfig::heap_share(30, 2), 10);
    assert_eq!(ScanConfig::heap_share(64 << 20, 1), 32 << 20);
    assert_eq!(ScanConfig::heap_share(100, 0), 100);
}

#[test]
fn test_warning_kinds() {
    let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
    let broken = std::io::Error::other("bad sector");

    assert_eq!(
        ScanWarning::read_error("/a", &denied).kind,
        WarningKind::PermissionDenied
    );
    assert_eq!(
        ScanWarning::read_error("/a", &broken).kind,
        WarningKind::ReadError
    );
    assert_eq!(
        ScanWarning::metadata_error("/a/f", &broken).kind,
        WarningKind::MetadataError
    );
}

#[test]
fn test_tree_serializes_to_json() {
    let mut arena = NodeArena::new();
    let root = arena.alloc(FileNode::new_directory("vol"));
    let group = arena.alloc(FileNode::new_small_group("<5 files>", 5, 0, 3));
    arena.set_children(root, vec![group]);

    let tree = FileTree::new(
        arena.compact(root),
        PathBuf::from("/vol"),
        ScanConfig::new("/vol"),
        TreeStats::new(),
        Duration::from_millis(5),
        Vec::new(),
    );

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["root_path"], "/vol");
    assert_eq!(json["config"]["max_depth"], 20);
    assert!(json["nodes"].to_string().contains("<5 files>"));
    assert!(matches!(tree.node(NodeId(1)).kind, NodeKind::SmallGroup { .. }));
}
