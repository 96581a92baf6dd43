//! Glob and regex matching over entry names and paths.
//!
//! Globs use standard shell semantics (`*`, `?`, `[…]`); a pattern with no
//! wildcards degenerates to an equality check. Compiled matchers are kept
//! in a process-wide cache so repeated evaluation of the same pattern over
//! millions of entries stays allocation-free on the hot path. Invalid
//! patterns never surface an error to the caller: the match simply
//! evaluates to false.

use globset::{Glob, GlobMatcher};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Compiled-pattern cache. `None` records a pattern that failed to compile
/// so we do not retry it on every entry.
static GLOB_CACHE: LazyLock<RwLock<HashMap<String, Option<GlobMatcher>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Glob match over a base name.
pub fn base_match(pattern: &str, name: &str) -> bool {
    with_compiled(pattern, |matcher| matcher.is_match(name))
}

/// Glob match over a full path, with `*` matching any run of characters
/// including path separators.
pub fn path_match(pattern: &str, path: &str) -> bool {
    with_compiled(pattern, |matcher| matcher.is_match(path))
}

/// Regex match over a full path.
pub fn regex_match(re: &Regex, path: &str) -> bool {
    re.is_match(path)
}

/// Validate a glob pattern eagerly, for configuration-time checks.
pub fn compile_check(pattern: &str) -> Result<(), String> {
    Glob::new(pattern).map(|_| ()).map_err(|e| e.to_string())
}

fn with_compiled<F>(pattern: &str, apply: F) -> bool
where
    F: FnOnce(&GlobMatcher) -> bool,
{
    if let Some(cached) = GLOB_CACHE.read().get(pattern) {
        return match cached {
            Some(matcher) => apply(matcher),
            None => false,
        };
    }

    let compiled = Glob::new(pattern).ok().map(|g| g.compile_matcher());
    let result = match &compiled {
        Some(matcher) => apply(matcher),
        None => false,
    };
    GLOB_CACHE.write().insert(pattern.to_string(), compiled);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_match_wildcards() {
        assert!(base_match("*.go", "main.go"));
        assert!(!base_match("*.go", "main.rs"));
        assert!(base_match("data?", "data1"));
        assert!(!base_match("data?", "data12"));
        assert!(base_match("[ab]*.txt", "alpha.txt"));
        assert!(!base_match("[ab]*.txt", "gamma.txt"));
    }

    #[test]
    fn test_base_match_literal_equality() {
        assert!(base_match("Makefile", "Makefile"));
        assert!(!base_match("Makefile", "makefile"));
    }

    #[test]
    fn test_path_match_crosses_separators() {
        assert!(path_match("/src/*.go", "/src/pkg/main.go"));
        assert!(path_match("*/target/*", "/home/u/proj/target/debug"));
        assert!(!path_match("/src/*.go", "/lib/pkg/main.go"));
    }

    #[test]
    fn test_invalid_pattern_is_non_match() {
        assert!(!base_match("[unclosed", "anything"));
        // And the cached failure keeps evaluating to false
        assert!(!base_match("[unclosed", "x"));
    }

    #[test]
    fn test_regex_match() {
        let re = Regex::new(r"\.txt$").unwrap();
        assert!(regex_match(&re, "/data/notes.txt"));
        assert!(!regex_match(&re, "/data/notes.md"));
    }

    #[test]
    fn test_compile_check() {
        assert!(compile_check("*.rs").is_ok());
        assert!(compile_check("[bad").is_err());
    }
}
