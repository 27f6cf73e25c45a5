//! Filesystem access used by the scanner.

use std::io;
use std::path::{Path, PathBuf};

use compact_str::CompactString;

/// Type of a directory entry, as reported without following links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    /// Sockets, devices, fifos.
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: CompactString,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<CompactString>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// The platform calls a scan needs.
///
/// Errors are reported per call; the scanner decides which ones are fatal
/// (only those concerning the root) and degrades the rest.
pub trait Filesystem {
    /// Resolve the root path before scanning.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(path.to_path_buf())
    }

    /// Type of the entry at `path`, following links.
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind>;

    /// Immediate entries of a directory.
    fn list_entries(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Length of a file in bytes.
    fn file_len(&self, path: &Path) -> io::Result<u64>;
}

/// [`Filesystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFilesystem;

impl StdFilesystem {
    fn kind_of(file_type: std::fs::FileType) -> EntryKind {
        if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

impl Filesystem for StdFilesystem {
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }

    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        std::fs::metadata(path).map(|m| Self::kind_of(m.file_type()))
    }

    fn list_entries(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            // Entries that vanish mid-listing are skipped.
            let Ok(entry) = entry else { continue };
            let kind = entry
                .file_type()
                .map(Self::kind_of)
                .unwrap_or(EntryKind::Other);
            entries.push(DirEntry::new(entry.file_name().to_string_lossy(), kind));
        }
        Ok(entries)
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        std::fs::symlink_metadata(path).map(|m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_std_listing() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("file.txt"), "hello").unwrap();

        let fs = StdFilesystem;
        let mut entries = fs.list_entries(temp.path()).unwrap();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(
            entries,
            vec![
                DirEntry::new("file.txt", EntryKind::File),
                DirEntry::new("sub", EntryKind::Directory),
            ]
        );
        assert_eq!(fs.file_len(&temp.path().join("file.txt")).unwrap(), 5);
        assert_eq!(fs.entry_kind(temp.path()).unwrap(), EntryKind::Directory);
    }

    #[test]
    fn test_std_listing_missing_dir() {
        let temp = TempDir::new().unwrap();
        let err = StdFilesystem
            .list_entries(&temp.path().join("missing"))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("loop")).unwrap();

        let entries = StdFilesystem.list_entries(temp.path()).unwrap();
        assert_eq!(entries, vec![DirEntry::new("loop", EntryKind::Symlink)]);
    }
}
