//! budgetree - disk usage trees that fit in a fixed memory budget.
//!
//! Usage:
//!   budgetree scan [PATH]     Scan and show the largest entries
//!   budgetree export [PATH]   Export scan to JSON
//!   budgetree volume [PATH]   Show the volume figures a scan would use
//!   budgetree --help          Show help

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use budgetree_core::{FileTree, NodeId, NodeKind, size};
use budgetree_scan::{BoundedScanner, ScanConfig, ScanProgress, VolumeStats};

#[derive(Parser)]
#[command(
    name = "budgetree",
    version,
    about = "Disk usage trees that fit in a fixed memory budget",
    long_about = "budgetree shows where disk space goes while keeping its own memory use \
                  bounded. Entries too small to be worth their metadata are folded into \
                  aggregates like `<12 files>` when the budget runs short."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and show a summary with the largest entries
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// Show all entries (no depth limit on display)
        #[arg(short, long)]
        all: bool,

        /// Number of top entries to show per directory
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },

    /// Export scan results to JSON
    Export {
        #[command(flatten)]
        scan: ScanArgs,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show block size and usage of the volume holding PATH
    Volume {
        /// Path on the volume
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Path to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Total heap budget (e.g., "64MB"), shared between concurrent volumes
    #[arg(long, default_value = "32MB")]
    heap: String,

    /// Number of volumes scanned with the same total budget
    #[arg(long, default_value = "1")]
    volumes: usize,

    /// Block size in bytes (defaults to the volume's)
    #[arg(long)]
    block_size: Option<u64>,

    /// Blocks in use on the volume (defaults to the volume's)
    #[arg(long)]
    allocated_blocks: Option<u64>,

    /// Directory depth below which subtrees are only sized
    #[arg(long, default_value_t = budgetree_core::DEFAULT_MAX_DEPTH)]
    max_depth: u32,

    /// Directory to skip, relative to PATH (repeatable)
    #[arg(short = 'x', long)]
    exclude: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Scan {
            scan,
            depth,
            all,
            top,
        } => {
            run_scan(&scan, if all { None } else { Some(depth) }, top).await?;
        }
        Command::Export { scan, output } => {
            run_export(&scan, output).await?;
        }
        Command::Volume { path } => {
            run_volume(&path)?;
        }
    }

    Ok(())
}

/// Turn command line arguments into a scan configuration.
///
/// Block size and allocated blocks come from the volume unless given.
fn build_config(args: &ScanArgs) -> Result<ScanConfig> {
    let path = args.path.canonicalize().context("Invalid path")?;
    let volume = VolumeStats::query(&path);
    let block_size = args.block_size.unwrap_or(volume.block_size);
    let allocated_blocks = args.allocated_blocks.unwrap_or_else(|| {
        let used = size::blocks_to_bytes(volume.used_blocks, volume.block_size);
        size::bytes_to_blocks(used, block_size)
    });
    let total_heap = usize::try_from(parse_size(&args.heap)?).context("Heap budget too large")?;

    let config = ScanConfig::builder()
        .root(path)
        .block_size(block_size)
        .allocated_blocks(allocated_blocks)
        .max_heap(ScanConfig::heap_share(total_heap, args.volumes))
        .max_depth(args.max_depth)
        .exclude(args.exclude.clone())
        .build()
        .context("Invalid scan configuration")?;

    tracing::debug!(?config, "Scan configuration");
    Ok(config)
}

/// Scan on a blocking worker while reporting progress to stderr.
///
/// Ctrl-C cancels the scan; the worker notices at its next directory.
async fn scan_with_progress(config: ScanConfig) -> Result<FileTree> {
    eprintln!("Scanning {}...", config.root.display());

    let scanner = BoundedScanner::new();
    let monitor = scanner.monitor();
    let mut worker = tokio::task::spawn_blocking(move || scanner.scan(&config));

    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelling = false;

    let result = loop {
        tokio::select! {
            joined = &mut worker => break joined.context("Scan worker failed")?,
            _ = ticker.tick() => print_progress(&monitor.snapshot()),
            _ = &mut ctrl_c, if !cancelling => {
                cancelling = true;
                monitor.cancel();
                eprint!("\r\x1b[KCancelling...");
            }
        }
    };
    eprint!("\r\x1b[K");

    result.context("Scan failed")
}

fn print_progress(progress: &ScanProgress) {
    let current = progress
        .last_touched
        .as_ref()
        .map(|entry| entry.name.as_str())
        .unwrap_or_default();
    eprint!(
        "\r\x1b[K{} files, {} dirs, {} ({:.0} files/s) {}",
        progress.files_scanned,
        progress.dirs_scanned,
        format_size(progress.bytes_scanned),
        progress.files_per_second(),
        truncate(current, 30)
    );
}

/// Run a scan and display summary.
async fn run_scan(args: &ScanArgs, max_depth: Option<u32>, top_n: usize) -> Result<()> {
    let config = build_config(args)?;
    let tree = scan_with_progress(config).await?;
    let stats = &tree.stats;

    // Print summary
    println!();
    println!("{}", "─".repeat(60));
    println!(
        " {} - {}",
        tree.root_path.display(),
        tree.size_label(FileTree::ROOT)
    );
    println!(
        " {} files, {} directories, {} symlinks",
        stats.total_files, stats.total_dirs, stats.total_symlinks
    );
    println!(
        " Scanned in {:.2}s, {} nodes kept",
        tree.scan_duration.as_secs_f64(),
        tree.node_count()
    );
    println!(
        " Heap: peak {} of {} budget, {} at end",
        format_size(stats.peak_heap as u64),
        format_size(tree.config.max_heap as u64),
        format_size(stats.final_heap as u64)
    );
    println!(
        " Small groups: {} collapsed, {} evicted, {} restored, {} orphaned",
        stats.groups_collapsed, stats.groups_evicted, stats.groups_restored, stats.groups_orphaned
    );
    println!("{}", "─".repeat(60));
    println!();

    // Print tree
    print_node(
        &tree,
        FileTree::ROOT,
        0,
        max_depth.unwrap_or(u32::MAX),
        top_n,
        tree.total_blocks(),
    );

    if tree.has_warnings() {
        println!();
        println!("{} warning(s) during scan", tree.warnings.len());
        for warning in tree.warnings.iter().take(top_n) {
            println!("  {}", warning.message);
        }
    }

    Ok(())
}

/// Export scan results to JSON.
async fn run_export(args: &ScanArgs, output: Option<PathBuf>) -> Result<()> {
    let config = build_config(args)?;
    let tree = scan_with_progress(config).await?;

    let json = serde_json::to_string_pretty(&tree)?;

    match output {
        Some(output_path) => {
            std::fs::write(&output_path, json)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            eprintln!("Exported to {}", output_path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    Ok(())
}

/// Print the figures a scan of `path` would be calibrated with.
fn run_volume(path: &Path) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let volume = VolumeStats::query(&path);

    println!("{}", path.display());
    println!("  Block size:  {} bytes", volume.block_size);
    println!("  {}", volume.usage_label());
    println!(
        "  Blocks:      {} total, {} used, {} free",
        volume.total_blocks, volume.used_blocks, volume.free_blocks
    );

    Ok(())
}

/// Print a node and its children.
fn print_node(
    tree: &FileTree,
    id: NodeId,
    depth: u32,
    max_depth: u32,
    top_n: usize,
    root_blocks: u64,
) {
    let node = tree.node(id);
    let indent = "  ".repeat(depth as usize);
    let ratio = if root_blocks > 0 {
        node.blocks as f64 / root_blocks as f64 * 100.0
    } else {
        0.0
    };

    let bar = make_bar(ratio / 100.0, 10);

    let name = if depth == 0 {
        tree.root_path.display().to_string()
    } else {
        node.name.to_string()
    };

    let marker = match node.kind {
        NodeKind::Directory {
            truncated: true, ..
        } => "/ (not expanded)",
        NodeKind::Directory { .. } => "/",
        NodeKind::Symlink => " ->",
        NodeKind::File | NodeKind::SmallGroup { .. } => "",
    };

    println!(
        "{}{}{:<40} {:>10} {:>5.1}% {}",
        indent,
        if node.child_count() > 0 { "▼ " } else { "  " },
        truncate(&format!("{}{}", name, marker), 40),
        tree.size_label(id),
        ratio,
        bar
    );

    if node.is_dir() && depth < max_depth {
        let remaining = node.child_count().saturating_sub(top_n);

        for (child, _) in tree.children(id).take(top_n) {
            print_node(tree, child, depth + 1, max_depth, top_n, root_blocks);
        }

        if remaining > 0 {
            let indent = "  ".repeat((depth + 1) as usize);
            println!("{}  ... and {} more", indent, remaining);
        }
    }
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// Parse a size string (e.g., "512K", "16MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();
    let digits = s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.');

    let multiplier: u64 = match &s[digits.len()..] {
        "" | "B" => 1,
        "K" | "KB" => 1024,
        "M" | "MB" => 1024 * 1024,
        "G" | "GB" => 1024 * 1024 * 1024,
        unit => bail!("Unknown size unit {unit:?} in {s:?}"),
    };
    let num: f64 = digits
        .parse()
        .with_context(|| format!("Invalid size {s:?}"))?;
    if !num.is_finite() || num < 0.0 {
        bail!("Size must be a non-negative number: {s:?}");
    }

    let bytes = num * multiplier as f64;
    if bytes >= u64::MAX as f64 {
        bail!("Size too large: {s:?}");
    }
    Ok(bytes as u64)
}
