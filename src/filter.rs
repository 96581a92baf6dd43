//! Entry filtering.
//!
//! [`FilterOptions`] is a value type carrying thresholds and patterns.
//! Empty or zero-valued fields disable their clause; an entry passes when
//! every enabled clause holds. Evaluation short-circuits on the first
//! failing clause. Pattern-matching errors are treated as non-match.

use crate::entry::{Entry, EntryKind};
use crate::owner;
use crate::pattern;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

/// Criteria for including/excluding entries during traversal.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    /// Minimum file size in bytes (strict: entries smaller are rejected)
    pub min_size: u64,

    /// Maximum file size in bytes (strict: entries larger are rejected)
    pub max_size: u64,

    /// Exact file size in bytes
    pub exact_size: Option<u64>,

    /// Glob pattern matched against the base name
    pub pattern: String,

    /// Base-name globs; any match rejects the entry
    pub exclude_patterns: Vec<String>,

    /// Directory base-name globs that prune whole subtrees
    pub exclude_dirs: Vec<String>,

    /// File extensions to include (e.g. ".txt", ".go")
    pub include_extensions: Vec<String>,

    /// Entry kinds to include
    pub kinds: Vec<EntryKind>,

    /// Regex matched against the full path
    pub path_regex: Option<Regex>,

    /// Only entries modified strictly after this instant
    pub modified_after: Option<SystemTime>,

    /// Only entries modified strictly before this instant
    pub modified_before: Option<SystemTime>,

    /// Only entries accessed strictly after this instant
    pub accessed_after: Option<SystemTime>,

    /// Only entries accessed strictly before this instant
    pub accessed_before: Option<SystemTime>,

    /// Only entries created strictly after this instant (best-effort:
    /// entries without a creation time fail the clause)
    pub created_after: Option<SystemTime>,

    /// Only entries created strictly before this instant
    pub created_before: Option<SystemTime>,

    /// Permission bits that must all be present (e.g. 0o644)
    pub min_permissions: u32,

    /// Permission bits outside of which none may be set (e.g. 0o755)
    pub max_permissions: u32,

    /// Exact permission bits to match
    pub exact_permissions: Option<u32>,

    /// Filter by owner uid
    pub owner_uid: Option<u32>,

    /// Filter by group gid
    pub owner_gid: Option<u32>,

    /// Filter by owner user name
    pub owner_name: String,

    /// Filter by group name
    pub group_name: String,

    /// Minimum traversal depth (0 disables)
    pub min_depth: usize,

    /// Maximum traversal depth (0 disables)
    pub max_depth: usize,

    /// Only regular files of size zero
    pub empty_files_only: bool,

    /// Only directories whose readdir yields no entries
    pub empty_dirs_only: bool,
}

impl FilterOptions {
    /// Evaluate the conjunction of all enabled clauses against one entry.
    ///
    /// Pure with respect to the filter and entry; the only filesystem
    /// access is the readdir probe behind the empty-directory clause.
    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.size_clauses(entry) {
            return false;
        }
        if !self.time_clauses(entry) {
            return false;
        }
        if !self.permission_clauses(entry) {
            return false;
        }
        if !self.ownership_clauses(entry) {
            return false;
        }
        if !self.name_clauses(entry) {
            return false;
        }
        if !self.kind_clauses(entry) {
            return false;
        }
        if !self.depth_clauses(entry) {
            return false;
        }
        if !self.emptiness_clauses(entry) {
            return false;
        }
        true
    }

    fn size_clauses(&self, entry: &Entry) -> bool {
        if self.min_size > 0 && entry.size < self.min_size {
            return false;
        }
        if self.max_size > 0 && entry.size > self.max_size {
            return false;
        }
        if let Some(exact) = self.exact_size {
            if entry.size != exact {
                return false;
            }
        }
        true
    }

    fn time_clauses(&self, entry: &Entry) -> bool {
        if !after(entry.modified, self.modified_after) {
            return false;
        }
        if !before(entry.modified, self.modified_before) {
            return false;
        }
        if !after(entry.accessed, self.accessed_after) {
            return false;
        }
        if !before(entry.accessed, self.accessed_before) {
            return false;
        }
        if !after(entry.created, self.created_after) {
            return false;
        }
        if !before(entry.created, self.created_before) {
            return false;
        }
        true
    }

    fn permission_clauses(&self, entry: &Entry) -> bool {
        let mode = entry.mode & 0o7777;
        if let Some(exact) = self.exact_permissions {
            return mode == exact;
        }
        if self.min_permissions != 0 && mode & self.min_permissions != self.min_permissions {
            return false;
        }
        if self.max_permissions != 0 && mode & !self.max_permissions != 0 {
            return false;
        }
        true
    }

    fn ownership_clauses(&self, entry: &Entry) -> bool {
        if let Some(uid) = self.owner_uid {
            if entry.uid != uid {
                return false;
            }
        }
        if let Some(gid) = self.owner_gid {
            if entry.gid != gid {
                return false;
            }
        }
        // Name clauses resolve the entry's numeric id against the platform
        // database; a missing database entry fails the clause.
        if !self.owner_name.is_empty() {
            match owner::user_name(entry.uid) {
                Some(name) if name == self.owner_name => {}
                _ => return false,
            }
        }
        if !self.group_name.is_empty() {
            match owner::group_name(entry.gid) {
                Some(name) if name == self.group_name => {}
                _ => return false,
            }
        }
        true
    }

    fn name_clauses(&self, entry: &Entry) -> bool {
        if !self.pattern.is_empty() && !pattern::base_match(&self.pattern, &entry.name) {
            return false;
        }
        for exclude in &self.exclude_patterns {
            if pattern::base_match(exclude, &entry.name) {
                return false;
            }
        }
        if !self.include_extensions.is_empty() {
            let ext = entry.ext();
            if !self.include_extensions.iter().any(|e| *e == ext) {
                return false;
            }
        }
        if let Some(re) = &self.path_regex {
            if !pattern::regex_match(re, &entry.path.to_string_lossy()) {
                return false;
            }
        }
        true
    }

    fn kind_clauses(&self, entry: &Entry) -> bool {
        if self.kinds.is_empty() {
            return true;
        }
        self.kinds.contains(&entry.kind)
    }

    fn depth_clauses(&self, entry: &Entry) -> bool {
        if self.min_depth > 0 && entry.depth < self.min_depth {
            return false;
        }
        if self.max_depth > 0 && entry.depth > self.max_depth {
            return false;
        }
        true
    }

    fn emptiness_clauses(&self, entry: &Entry) -> bool {
        if self.empty_files_only && !(entry.kind.is_file() && entry.size == 0) {
            return false;
        }
        if self.empty_dirs_only && !(entry.is_dir() && is_dir_empty(&entry.path)) {
            return false;
        }
        true
    }

    /// Whether any directory-exclusion globs are configured.
    pub fn has_dir_excludes(&self) -> bool {
        !self.exclude_dirs.is_empty()
    }
}

/// Half-open "strictly after" comparison; a missing timestamp fails an
/// enabled clause.
fn after(actual: Option<SystemTime>, threshold: Option<SystemTime>) -> bool {
    match threshold {
        None => true,
        Some(threshold) => match actual {
            Some(actual) => actual > threshold,
            None => false,
        },
    }
}

/// Half-open "strictly before" comparison.
fn before(actual: Option<SystemTime>, threshold: Option<SystemTime>) -> bool {
    match threshold {
        None => true,
        Some(threshold) => match actual {
            Some(actual) => actual < threshold,
            None => false,
        },
    }
}

/// Readdir probe behind the empty-directory clause. Read errors count as
/// non-empty, which keeps the clause a rejection rather than an error.
pub fn is_dir_empty(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn file_entry(name: &str, size: u64) -> Entry {
        let mut entry = Entry::placeholder(PathBuf::from(format!("/data/{name}")), 1);
        entry.kind = EntryKind::File;
        entry.size = size;
        entry.mode = 0o644;
        entry.modified = Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000));
        entry
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = FilterOptions::default();
        assert!(filter.matches(&file_entry("a.txt", 0)));
        assert!(filter.matches(&file_entry("b.go", 1 << 30)));
    }

    #[test]
    fn test_size_clauses() {
        let filter = FilterOptions {
            min_size: 1024,
            ..Default::default()
        };
        assert!(!filter.matches(&file_entry("small", 500)));
        assert!(filter.matches(&file_entry("big", 2048)));
        assert!(filter.matches(&file_entry("edge", 1024)));

        let filter = FilterOptions {
            max_size: 1024,
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("small", 500)));
        assert!(!filter.matches(&file_entry("big", 2048)));

        let filter = FilterOptions {
            exact_size: Some(500),
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("match", 500)));
        assert!(!filter.matches(&file_entry("off", 501)));
    }

    #[test]
    fn test_pattern_and_excludes() {
        let filter = FilterOptions {
            pattern: "*.go".into(),
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("main.go", 10)));
        assert!(!filter.matches(&file_entry("main.rs", 10)));

        let filter = FilterOptions {
            exclude_patterns: vec!["*.tmp".into(), "*~".into()],
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("keep.txt", 10)));
        assert!(!filter.matches(&file_entry("junk.tmp", 10)));
        assert!(!filter.matches(&file_entry("draft~", 10)));
    }

    #[test]
    fn test_extension_include_list() {
        let filter = FilterOptions {
            include_extensions: vec![".go".into(), ".rs".into()],
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("lib.rs", 10)));
        assert!(!filter.matches(&file_entry("notes.md", 10)));
    }

    #[test]
    fn test_path_regex() {
        let filter = FilterOptions {
            path_regex: Some(Regex::new(r"/data/.*\.go$").unwrap()),
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("main.go", 10)));
        assert!(!filter.matches(&file_entry("main.py", 10)));
    }

    #[test]
    fn test_time_clauses_strict() {
        let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        let mut entry = file_entry("f", 10);
        entry.modified = Some(base);

        let filter = FilterOptions {
            modified_after: Some(base),
            ..Default::default()
        };
        // strictly after: equal fails
        assert!(!filter.matches(&entry));

        let filter = FilterOptions {
            modified_after: Some(base - Duration::from_secs(1)),
            ..Default::default()
        };
        assert!(filter.matches(&entry));

        let filter = FilterOptions {
            modified_before: Some(base + Duration::from_secs(1)),
            ..Default::default()
        };
        assert!(filter.matches(&entry));
    }

    #[test]
    fn test_missing_creation_time_fails_clause() {
        let entry = file_entry("f", 10); // created: None
        let filter = FilterOptions {
            created_after: Some(SystemTime::UNIX_EPOCH),
            ..Default::default()
        };
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_permission_clauses() {
        let mut entry = file_entry("f", 10);
        entry.mode = 0o644;

        let exact = FilterOptions {
            exact_permissions: Some(0o644),
            ..Default::default()
        };
        assert!(exact.matches(&entry));

        let exact_miss = FilterOptions {
            exact_permissions: Some(0o600),
            ..Default::default()
        };
        assert!(!exact_miss.matches(&entry));

        let min = FilterOptions {
            min_permissions: 0o600,
            ..Default::default()
        };
        assert!(min.matches(&entry));

        let min_miss = FilterOptions {
            min_permissions: 0o111,
            ..Default::default()
        };
        assert!(!min_miss.matches(&entry));

        let max = FilterOptions {
            max_permissions: 0o755,
            ..Default::default()
        };
        assert!(max.matches(&entry));

        let max_miss = FilterOptions {
            max_permissions: 0o600,
            ..Default::default()
        };
        // group/other read bits stick out of 0o600
        assert!(!max_miss.matches(&entry));
    }

    #[test]
    fn test_kind_clauses() {
        let filter = FilterOptions {
            kinds: vec![EntryKind::File],
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("f", 10)));

        let mut dir_entry = file_entry("d", 0);
        dir_entry.kind = EntryKind::Directory;
        assert!(!filter.matches(&dir_entry));
    }

    #[test]
    fn test_depth_clauses() {
        let mut entry = file_entry("f", 10);
        entry.depth = 3;

        let filter = FilterOptions {
            min_depth: 2,
            max_depth: 4,
            ..Default::default()
        };
        assert!(filter.matches(&entry));

        entry.depth = 1;
        assert!(!filter.matches(&entry));

        entry.depth = 5;
        assert!(!filter.matches(&entry));

        // max_depth 0 disables the upper bound
        let open = FilterOptions {
            min_depth: 2,
            ..Default::default()
        };
        assert!(open.matches(&entry));
    }

    #[test]
    fn test_empty_files_clause() {
        let filter = FilterOptions {
            empty_files_only: true,
            ..Default::default()
        };
        assert!(filter.matches(&file_entry("empty", 0)));
        assert!(!filter.matches(&file_entry("full", 1)));

        let mut dir_entry = file_entry("d", 0);
        dir_entry.kind = EntryKind::Directory;
        assert!(!filter.matches(&dir_entry));
    }

    #[test]
    fn test_empty_dirs_clause() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = tmp.path().join("empty");
        let full = tmp.path().join("full");
        fs::create_dir(&empty).unwrap();
        fs::create_dir(&full).unwrap();
        fs::write(full.join("x"), b"x").unwrap();

        let filter = FilterOptions {
            empty_dirs_only: true,
            ..Default::default()
        };

        let meta = fs::symlink_metadata(&empty).unwrap();
        let entry = Entry::from_metadata(empty.clone(), &meta, 1);
        assert!(filter.matches(&entry));

        let meta = fs::symlink_metadata(&full).unwrap();
        let entry = Entry::from_metadata(full.clone(), &meta, 1);
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_owner_uid_clause() {
        let mut entry = file_entry("f", 10);
        entry.uid = 1000;

        let filter = FilterOptions {
            owner_uid: Some(1000),
            ..Default::default()
        };
        assert!(filter.matches(&entry));

        let filter = FilterOptions {
            owner_uid: Some(0),
            ..Default::default()
        };
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_owner_name_unknown_uid_rejects() {
        let mut entry = file_entry("f", 10);
        entry.uid = u32::MAX - 11;
        let filter = FilterOptions {
            owner_name: "root".into(),
            ..Default::default()
        };
        assert!(!filter.matches(&entry));
    }

    #[test]
    fn test_predicate_is_pure() {
        let filter = FilterOptions {
            pattern: "*.go".into(),
            min_size: 100,
            ..Default::default()
        };
        let entry = file_entry("main.go", 200);
        let first = filter.matches(&entry);
        for _ in 0..10 {
            assert_eq!(filter.matches(&entry), first);
        }
    }
}
