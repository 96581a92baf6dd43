//! Symlink resolution and cycle detection.
//!
//! The resolver distinguishes the link from its target, canonicalises the
//! target with a bounded number of link hops, and tracks every path it has
//! followed in a visited set shared across worker threads. A path is
//! cyclic when either the initial symlink path or its canonical target is
//! already in the set; otherwise both are inserted before descent. Entries
//! are never removed, so first-writer-wins when the same canonical target
//! is reachable through two different links.
//!
//! The visited set is owned by the engine instance and reset at the start
//! of each walk.

use crate::error::EntryError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// How symbolic links are processed during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymlinkMode {
    /// Resolve links and walk their targets
    Follow,
    /// Drop link entries entirely
    #[default]
    Ignore,
    /// Deliver the link itself without following it
    Report,
}

/// Upper bound on link hops while canonicalising. Anything deeper is
/// treated as a cycle, matching kernel ELOOP behaviour.
const MAX_LINK_HOPS: usize = 40;

/// Outcome of resolving one path against the symlink policy.
#[derive(Debug)]
pub enum Resolved {
    /// Not a symlink; the lstat metadata passes through untouched.
    NotLink(fs::Metadata),
    /// Symlink under [`SymlinkMode::Ignore`]; the caller drops the entry.
    Ignored,
    /// Symlink under [`SymlinkMode::Report`]; metadata describes the link.
    Link(fs::Metadata),
    /// Followed symlink: canonical target path and its stat metadata.
    Followed { target: PathBuf, metadata: fs::Metadata },
    /// Following would revisit an already-seen path.
    Cycle,
}

/// Cycle-safe symlink resolver with a shared visited set.
#[derive(Debug, Default)]
pub struct SymlinkResolver {
    visited: Mutex<HashSet<PathBuf>>,
}

impl SymlinkResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the visited set. Called at each top-level walk entry point.
    pub fn reset(&self) {
        self.visited.lock().clear();
    }

    /// Insert-before-descend: record a directory the engine is about to
    /// walk. Returns false when the path is already present, meaning a
    /// link elsewhere has walked (or is walking) this directory.
    pub fn mark_dir(&self, path: &Path) -> bool {
        self.visited.lock().insert(path.to_path_buf())
    }

    /// Resolve `path` according to `mode`.
    ///
    /// Lstat, stat, and readlink failures propagate as entry errors; the
    /// resolver itself never panics.
    pub fn resolve(&self, path: &Path, mode: SymlinkMode) -> Result<Resolved, EntryError> {
        let meta = fs::symlink_metadata(path).map_err(|e| EntryError::stat(path, &e))?;

        if !meta.file_type().is_symlink() {
            return Ok(Resolved::NotLink(meta));
        }

        match mode {
            SymlinkMode::Ignore => Ok(Resolved::Ignored),
            SymlinkMode::Report => Ok(Resolved::Link(meta)),
            SymlinkMode::Follow => self.follow(path),
        }
    }

    fn follow(&self, path: &Path) -> Result<Resolved, EntryError> {
        let target = canonicalize_bounded(path)?;
        let metadata = fs::metadata(&target).map_err(|e| EntryError::stat(&target, &e))?;

        // Check-then-insert under one lock so two workers racing on the
        // same link cannot both descend.
        let mut visited = self.visited.lock();
        if visited.contains(path) || visited.contains(&target) {
            return Ok(Resolved::Cycle);
        }
        visited.insert(path.to_path_buf());
        visited.insert(target.clone());
        drop(visited);

        Ok(Resolved::Followed { target, metadata })
    }
}

/// Iteratively resolve link hops, bounded by [`MAX_LINK_HOPS`], then let
/// the filesystem produce the final canonical form.
fn canonicalize_bounded(path: &Path) -> Result<PathBuf, EntryError> {
    let mut current = path.to_path_buf();

    for _ in 0..MAX_LINK_HOPS {
        let meta = fs::symlink_metadata(&current).map_err(|e| EntryError::stat(&current, &e))?;
        if !meta.file_type().is_symlink() {
            return fs::canonicalize(&current).map_err(|e| EntryError::stat(&current, &e));
        }

        let link = fs::read_link(&current).map_err(|e| EntryError::read_link(&current, &e))?;
        current = if link.is_absolute() {
            link
        } else {
            current
                .parent()
                .unwrap_or_else(|| Path::new("/"))
                .join(link)
        };
    }

    Err(EntryError::Cycle {
        path: path.display().to_string(),
    })
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_regular_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let resolver = SymlinkResolver::new();
        match resolver.resolve(&file, SymlinkMode::Follow).unwrap() {
            Resolved::NotLink(meta) => assert!(meta.is_file()),
            other => panic!("expected NotLink, got {:?}", other),
        }
    }

    #[test]
    fn test_ignore_mode_drops_links() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("target.txt");
        fs::write(&file, b"x").unwrap();
        let link = dir.path().join("link");
        symlink(&file, &link).unwrap();

        let resolver = SymlinkResolver::new();
        assert!(matches!(
            resolver.resolve(&link, SymlinkMode::Ignore).unwrap(),
            Resolved::Ignored
        ));
    }

    #[test]
    fn test_report_mode_keeps_link_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("target.txt");
        fs::write(&file, b"x").unwrap();
        let link = dir.path().join("link");
        symlink(&file, &link).unwrap();

        let resolver = SymlinkResolver::new();
        match resolver.resolve(&link, SymlinkMode::Report).unwrap() {
            Resolved::Link(meta) => assert!(meta.file_type().is_symlink()),
            other => panic!("expected Link, got {:?}", other),
        }
    }

    #[test]
    fn test_follow_resolves_target() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("target.txt");
        fs::write(&file, b"data").unwrap();
        let link = dir.path().join("link");
        symlink(&file, &link).unwrap();

        let resolver = SymlinkResolver::new();
        match resolver.resolve(&link, SymlinkMode::Follow).unwrap() {
            Resolved::Followed { target, metadata } => {
                assert!(metadata.is_file());
                assert_eq!(target, file.canonicalize().unwrap());
            }
            other => panic!("expected Followed, got {:?}", other),
        }
    }

    #[test]
    fn test_second_visit_is_cyclic() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let link = dir.path().join("link");
        symlink(&sub, &link).unwrap();

        let resolver = SymlinkResolver::new();
        assert!(matches!(
            resolver.resolve(&link, SymlinkMode::Follow).unwrap(),
            Resolved::Followed { .. }
        ));
        // Same link again: the visited set rejects it
        assert!(matches!(
            resolver.resolve(&link, SymlinkMode::Follow).unwrap(),
            Resolved::Cycle
        ));
    }

    #[test]
    fn test_two_links_one_target_first_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        symlink(&sub, &first).unwrap();
        symlink(&sub, &second).unwrap();

        let resolver = SymlinkResolver::new();
        assert!(matches!(
            resolver.resolve(&first, SymlinkMode::Follow).unwrap(),
            Resolved::Followed { .. }
        ));
        assert!(matches!(
            resolver.resolve(&second, SymlinkMode::Follow).unwrap(),
            Resolved::Cycle
        ));
    }

    #[test]
    fn test_self_loop_errors_as_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("ouroboros");
        symlink(&link, &link).unwrap();

        let resolver = SymlinkResolver::new();
        let err = resolver.resolve(&link, SymlinkMode::Follow).unwrap_err();
        assert!(matches!(err, EntryError::Cycle { .. }));
    }

    #[test]
    fn test_reset_clears_visited() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let link = dir.path().join("link");
        symlink(&sub, &link).unwrap();

        let resolver = SymlinkResolver::new();
        let _ = resolver.resolve(&link, SymlinkMode::Follow).unwrap();
        resolver.reset();
        assert!(matches!(
            resolver.resolve(&link, SymlinkMode::Follow).unwrap(),
            Resolved::Followed { .. }
        ));
    }
}
