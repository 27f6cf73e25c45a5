//! Directory exclusion by root-relative path.

use std::collections::HashMap;
use std::path::{Component, Path};

use compact_str::CompactString;

/// A tree of path components mirroring the directories to skip.
///
/// Each level of the scan looks up its child by name; an excluded node means
/// the directory is kept as an empty entry and not descended into.
#[derive(Debug, Clone, Default)]
pub struct ExcludeFilter {
    children: HashMap<CompactString, ExcludeFilter>,
    excluded: bool,
}

impl ExcludeFilter {
    /// Build a filter from paths relative to the scan root.
    ///
    /// Components other than plain names (`.`, `..`, roots) are ignored.
    pub fn new<P: AsRef<Path>>(paths: &[P]) -> Self {
        let mut root = Self::default();
        for path in paths {
            let mut node = &mut root;
            let mut named = false;
            for component in path.as_ref().components() {
                if let Component::Normal(name) = component {
                    node = node
                        .children
                        .entry(name.to_string_lossy().into())
                        .or_default();
                    named = true;
                }
            }
            if named {
                node.excluded = true;
            }
        }
        root
    }

    /// Whether the directory this node stands for is excluded.
    pub fn is_excluded(&self) -> bool {
        self.excluded
    }

    /// Filter for a child directory, if any exclusion lies below it.
    pub fn child(&self, name: &str) -> Option<&ExcludeFilter> {
        if self.excluded {
            return Some(self);
        }
        self.children.get(name)
    }

    /// Whether the filter excludes nothing.
    pub fn is_empty(&self) -> bool {
        !self.excluded && self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_exclusion() {
        let filter = ExcludeFilter::new(&["Android/data", "cache"]);
        assert!(!filter.is_excluded());
        assert!(filter.child("DCIM").is_none());

        let android = filter.child("Android").unwrap();
        assert!(!android.is_excluded());
        assert!(android.child("data").unwrap().is_excluded());
        assert!(android.child("media").is_none());
        assert!(filter.child("cache").unwrap().is_excluded());
    }

    #[test]
    fn test_ignores_non_name_components() {
        let filter = ExcludeFilter::new(&["./a/../b", "/"]);
        assert!(filter.child("a").unwrap().child("b").unwrap().is_excluded());
        assert!(!filter.is_excluded());
    }

    #[test]
    fn test_empty_filter() {
        let filter = ExcludeFilter::new::<&str>(&[]);
        assert!(filter.is_empty());
        assert!(filter.child("anything").is_none());
    }
}
