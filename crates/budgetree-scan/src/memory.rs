//! In-memory [`Filesystem`] for tests and replaying recorded listings.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs::{DirEntry, EntryKind, Filesystem};

#[derive(Debug, Clone, Copy)]
enum MemEntry {
    File(u64),
    Dir,
    Symlink,
    /// Listed as a directory, but listing it fails.
    BrokenDir(io::ErrorKind),
    /// Listed as a file, but reading its length fails.
    BrokenFile(io::ErrorKind),
}

/// A filesystem held in a sorted map of absolute paths.
///
/// Parent directories are created implicitly. Listings come back in name
/// order, which keeps scans fully deterministic.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    entries: BTreeMap<PathBuf, MemEntry>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory.
    pub fn dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.insert(path.as_ref(), MemEntry::Dir)
    }

    /// Add a file of `len` bytes.
    pub fn file(&mut self, path: impl AsRef<Path>, len: u64) -> &mut Self {
        self.insert(path.as_ref(), MemEntry::File(len))
    }

    /// Add a symbolic link. Its target is irrelevant since links are never followed.
    pub fn symlink(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.insert(path.as_ref(), MemEntry::Symlink)
    }

    /// Add a directory whose listing fails with `kind`.
    pub fn unreadable_dir(&mut self, path: impl AsRef<Path>, kind: io::ErrorKind) -> &mut Self {
        self.insert(path.as_ref(), MemEntry::BrokenDir(kind))
    }

    /// Add a file whose length cannot be read.
    pub fn unreadable_file(&mut self, path: impl AsRef<Path>, kind: io::ErrorKind) -> &mut Self {
        self.insert(path.as_ref(), MemEntry::BrokenFile(kind))
    }

    fn insert(&mut self, path: &Path, entry: MemEntry) -> &mut Self {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.entries
                .entry(ancestor.to_path_buf())
                .or_insert(MemEntry::Dir);
        }
        self.entries.insert(path.to_path_buf(), entry);
        self
    }

    fn lookup(&self, path: &Path) -> io::Result<MemEntry> {
        self.entries
            .get(path)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

fn kind_of(entry: MemEntry) -> EntryKind {
    match entry {
        MemEntry::File(_) | MemEntry::BrokenFile(_) => EntryKind::File,
        MemEntry::Dir | MemEntry::BrokenDir(_) => EntryKind::Directory,
        MemEntry::Symlink => EntryKind::Symlink,
    }
}

impl Filesystem for MemoryFilesystem {
    fn entry_kind(&self, path: &Path) -> io::Result<EntryKind> {
        self.lookup(path).map(kind_of)
    }

    fn list_entries(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        match self.lookup(path)? {
            MemEntry::Dir => {}
            MemEntry::BrokenDir(kind) => return Err(io::Error::new(kind, "listing failed")),
            _ => return Err(io::Error::other("not a directory")),
        }
        Ok(self
            .entries
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .filter_map(|(p, entry)| {
                let name = p.file_name()?.to_string_lossy();
                Some(DirEntry::new(name, kind_of(*entry)))
            })
            .collect())
    }

    fn file_len(&self, path: &Path) -> io::Result<u64> {
        match self.lookup(path)? {
            MemEntry::File(len) => Ok(len),
            MemEntry::BrokenFile(kind) => Err(io::Error::new(kind, "stat failed")),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_parents_and_listing() {
        let mut fs = MemoryFilesystem::new();
        fs.file("/vol/a/x.bin", 10).symlink("/vol/link");

        assert_eq!(fs.entry_kind(Path::new("/vol/a")).unwrap(), EntryKind::Directory);
        assert_eq!(
            fs.list_entries(Path::new("/vol")).unwrap(),
            vec![
                DirEntry::new("a", EntryKind::Directory),
                DirEntry::new("link", EntryKind::Symlink),
            ]
        );
        assert_eq!(fs.file_len(Path::new("/vol/a/x.bin")).unwrap(), 10);
    }

    #[test]
    fn test_failures() {
        let mut fs = MemoryFilesystem::new();
        fs.unreadable_dir("/vol/locked", io::ErrorKind::PermissionDenied)
            .unreadable_file("/vol/bad", io::ErrorKind::Other);

        let err = fs.list_entries(Path::new("/vol/locked")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(fs.file_len(Path::new("/vol/bad")).is_err());
        assert!(fs.entry_kind(Path::new("/nowhere")).is_err());
    }
}
