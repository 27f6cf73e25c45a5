//! Volume block statistics used to calibrate a scan.

use std::path::Path;

use budgetree_core::size;

/// Block size assumed when the volume cannot be queried.
pub const FALLBACK_BLOCK_SIZE: u64 = 512;

/// Allocation figures for the volume holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    pub block_size: u64,
    pub total_blocks: u64,
    pub free_blocks: u64,
    pub used_blocks: u64,
}

impl VolumeStats {
    /// Stats for an unknown volume: fallback block size, no counts.
    pub fn unknown() -> Self {
        Self {
            block_size: FALLBACK_BLOCK_SIZE,
            total_blocks: 0,
            free_blocks: 0,
            used_blocks: 0,
        }
    }

    /// Query the volume holding `path`, falling back to [`VolumeStats::unknown`].
    pub fn query(path: &Path) -> Self {
        match statvfs(path) {
            Some(stats) => stats,
            None => {
                tracing::warn!(path = %path.display(), "Failed to get filesystem stats");
                Self::unknown()
            }
        }
    }

    /// "Used X of Y" summary.
    pub fn usage_label(&self) -> String {
        if self.total_blocks == 0 {
            return "Used <no information>".to_string();
        }
        format!(
            "Used {} of {}",
            size::blocks_to_label(self.used_blocks, self.block_size),
            size::blocks_to_label(self.total_blocks, self.block_size)
        )
    }
}

#[cfg(unix)]
#[allow(clippy::unnecessary_cast)]
fn statvfs(path: &Path) -> Option<VolumeStats> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let path_cstr = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    // SAFETY: statvfs initializes the buffer when it returns 0
    let stat = unsafe {
        if libc::statvfs(path_cstr.as_ptr(), stat.as_mut_ptr()) != 0 {
            return None;
        }
        stat.assume_init()
    };

    let block_size = stat.f_frsize as u64;
    if block_size == 0 {
        return None;
    }
    let total_blocks = stat.f_blocks as u64;
    let free_blocks = stat.f_bavail as u64;
    Some(VolumeStats {
        block_size,
        total_blocks,
        free_blocks,
        used_blocks: total_blocks.saturating_sub(free_blocks),
    })
}

#[cfg(not(unix))]
fn statvfs(_path: &Path) -> Option<VolumeStats> {
    None
}
