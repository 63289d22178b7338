//! Browse a flat list of archive entries one directory at a time.
//!
//! ZIP archives don't store a hierarchy, just a list of paths,
//! and directories only show up as optional marker entries.
//! Instead of building a whole tree up front, [`list()`] makes one pass
//! over the entries per view and picks out what sits directly below
//! the scope's prefix.

use std::borrow::Cow;
use std::collections::BTreeSet;

use log::*;

use crate::entry::ArchiveEntry;
use crate::path::{clamp, depth_of};

/// How deep a scope may go when the caller has no better idea.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// A (prefix, maximum depth) pair describing one virtual directory view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingScope {
    /// Path of the directory being viewed. Empty for the archive root.
    pub prefix: String,
    /// The prefix is clamped to this many segments before listing.
    pub max_depth: usize,
}

impl ListingScope {
    pub fn new<S: Into<String>>(prefix: S, max_depth: usize) -> Self {
        Self {
            prefix: prefix.into(),
            max_depth,
        }
    }

    pub fn root(max_depth: usize) -> Self {
        Self::new(String::new(), max_depth)
    }

    /// The clamped prefix with a trailing slash (unless it's empty),
    /// which every listed path starts with.
    pub fn canonical_prefix(&self) -> Cow<'_, str> {
        let clamped = clamp(&self.prefix, self.max_depth);
        if clamped.is_empty() || clamped.ends_with('/') {
            clamped
        } else {
            Cow::Owned(format!("{clamped}/"))
        }
    }
}

impl Default for ListingScope {
    fn default() -> Self {
        Self::root(DEFAULT_MAX_DEPTH)
    }
}

/// The immediate children of a [`ListingScope`], each sorted by full path.
#[derive(Debug)]
pub struct Listing<'a, E> {
    /// Full paths of the subdirectories, without trailing slashes.
    pub directories: Vec<String>,
    /// Files directly inside the scope.
    pub files: Vec<&'a E>,
}

impl<E> Listing<'_, E> {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

/// Lists the directories and files immediately below the given scope.
///
/// Directories are inferred from the paths of the entries beneath them,
/// so they show up whether or not the archive has marker entries for them.
/// Entries flagged as directories are never listed as files.
///
/// Paths that don't fit the expected shape simply don't show up;
/// this never fails.
pub fn list<'a, E: ArchiveEntry>(entries: &'a [E], scope: &ListingScope) -> Listing<'a, E> {
    let prefix = scope.canonical_prefix();
    let depth_limit = scope.max_depth.saturating_add(1);
    trace!("Listing {:?} (max depth {})", prefix, scope.max_depth);

    let mut directories = BTreeSet::new();
    let mut files = Vec::new();

    for entry in entries {
        let filename = entry.filename();
        let remainder = match filename.strip_prefix(&*prefix) {
            Some(r) if !r.is_empty() => r,
            // Either out of scope or the marker for the scope itself
            _ => continue,
        };

        match remainder.find('/') {
            None => {
                if !entry.is_directory() {
                    files.push(entry);
                }
            }
            // A doubled slash doesn't name a directory.
            Some(0) => {
                trace!("Skipping {filename}: empty path segment");
            }
            Some(slash) => {
                let dir_path = format!("{}{}", prefix, &remainder[..slash]);
                if depth_of(&dir_path) <= depth_limit {
                    directories.insert(dir_path);
                }
            }
        }
    }

    files.sort_by(|a, b| a.filename().cmp(b.filename()));

    Listing {
        directories: directories.into_iter().collect(),
        files,
    }
}
