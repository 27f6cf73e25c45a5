//! Scan progress reporting and cancellation.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use compact_str::CompactString;

/// The most recent file the scanner created a node for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchedEntry {
    pub name: CompactString,
    pub blocks: u64,
}

/// Progress information during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Number of files scanned so far.
    pub files_scanned: u64,
    /// Number of directories scanned so far.
    pub dirs_scanned: u64,
    /// Total bytes, in whole blocks, scanned so far.
    pub bytes_scanned: u64,
    /// Last file touched.
    pub last_touched: Option<TouchedEntry>,
    /// Number of warnings encountered.
    pub errors_count: u64,
    /// Time elapsed since scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Create initial progress state.
    pub fn new() -> Self {
        Self {
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            last_touched: None,
            errors_count: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.files_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Calculate scan rate in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Get total items scanned (files + dirs).
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared view of a running scan.
///
/// The scanner writes; any other thread may read at any time. Counters use
/// relaxed ordering, so a snapshot can mix values from slightly different
/// moments. That is fine for display and nothing else should rely on it.
///
/// Cancellation is sticky: once [`ScanMonitor::cancel`] is called every scan
/// using this monitor stops at its next directory until [`ScanMonitor::reset`].
#[derive(Debug, Default)]
pub struct ScanMonitor {
    files: AtomicU64,
    dirs: AtomicU64,
    blocks: AtomicU64,
    block_size: AtomicU64,
    warnings: AtomicU64,
    cancelled: AtomicBool,
    last_touched: Mutex<Option<TouchedEntry>>,
    started: Mutex<Option<Instant>>,
}

impl ScanMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Clear counters and any pending cancellation.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
        self.begin(self.block_size.load(Ordering::Relaxed));
    }

    /// Last file touched, if any.
    pub fn last_touched(&self) -> Option<TouchedEntry> {
        self.last_touched.lock().ok().and_then(|guard| guard.clone())
    }

    /// Bytes processed so far, counted in whole blocks.
    pub fn bytes_processed(&self) -> u64 {
        self.blocks
            .load(Ordering::Relaxed)
            .saturating_mul(self.block_size.load(Ordering::Relaxed))
    }

    pub fn files_scanned(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    pub fn dirs_scanned(&self) -> u64 {
        self.dirs.load(Ordering::Relaxed)
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> ScanProgress {
        let elapsed = self
            .started
            .lock()
            .ok()
            .and_then(|guard| *guard)
            .map(|start| start.elapsed())
            .unwrap_or_default();
        ScanProgress {
            files_scanned: self.files_scanned(),
            dirs_scanned: self.dirs_scanned(),
            bytes_scanned: self.bytes_processed(),
            last_touched: self.last_touched(),
            errors_count: self.warnings.load(Ordering::Relaxed),
            elapsed,
        }
    }

    pub(crate) fn begin(&self, block_size: u64) {
        self.files.store(0, Ordering::Relaxed);
        self.dirs.store(0, Ordering::Relaxed);
        self.blocks.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.block_size.store(block_size, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_touched.lock() {
            *guard = None;
        }
        if let Ok(mut guard) = self.started.lock() {
            *guard = Some(Instant::now());
        }
    }

    pub(crate) fn record_file(&self, name: &str, blocks: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.blocks.fetch_add(blocks, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_touched.lock() {
            *guard = Some(TouchedEntry {
                name: name.into(),
                blocks,
            });
        }
    }

    pub(crate) fn record_uncounted(&self, files: u64, blocks: u64) {
        self.files.fetch_add(files, Ordering::Relaxed);
        self.blocks.fetch_add(blocks, Ordering::Relaxed);
    }

    pub(crate) fn record_dir(&self) {
        self.dirs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_warning(&self) {
        self.warnings.fetch_add(1, Ordering::Relaxed);
    }
}
