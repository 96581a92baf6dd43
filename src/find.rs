//! The find orchestrator: richer predicates plus action dispatch.
//!
//! `find` layers name/path/regex matching, relative-time and size
//! constraints, hidden-file policy, and per-match actions (subprocess
//! exec, templated output) on top of the traversal engine. All matching
//! happens inside a callback wrapper, so the engine's scheduling, error
//! policy, and cancellation behaviour carry over unchanged. With the
//! watch flag set, the same predicate and handler keep running against
//! filesystem change notifications after the initial sweep.

use crate::cancel::Cancellation;
use crate::entry::{clean_path, Entry};
use crate::error::{ConfigError, Result, WalkError};
use crate::filter::FilterOptions;
use crate::pattern;
use crate::template;
use crate::walker::visit::{visit_fn, Flow, VisitFn};
use crate::walker::{ErrorMode, Walker, WalkStats};
use crate::watch::{self, EventKind, WatchOptions};
use crate::symlink::SymlinkMode;
use regex::Regex;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Criteria and actions for a find operation.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Glob matched against the base name
    pub name_pattern: String,

    /// Glob matched against the full path (`*` crosses separators)
    pub path_pattern: String,

    /// Paths matching this glob are skipped
    pub ignore_pattern: String,

    /// Regex matched against the full path
    pub regex: Option<Regex>,

    /// Only entries whose age exceeds this duration
    pub older_than: Option<Duration>,

    /// Only entries whose age is below this duration
    pub newer_than: Option<Duration>,

    /// Only entries strictly larger than this many bytes
    pub larger_than: u64,

    /// Only entries strictly smaller than this many bytes
    pub smaller_than: u64,

    /// Metadata key patterns; `None` requires the key absent or empty
    pub match_metadata: HashMap<String, Option<Regex>>,

    /// Tag key patterns; `None` requires the key absent or empty
    pub match_tags: HashMap<String, Option<Regex>>,

    /// Command template executed per match
    pub exec_cmd: String,

    /// Output template printed per match
    pub print_format: String,

    /// Maximum directory depth (0 = unlimited)
    pub max_depth: usize,

    /// Follow symbolic links
    pub follow_symlinks: bool,

    /// Include entries whose base name starts with a dot
    pub include_hidden: bool,

    /// Keep watching for changes after the initial sweep
    pub watch: bool,

    /// Event kinds delivered while watching; empty means all
    pub watch_events: Vec<EventKind>,

    /// Worker count override (0 = engine default)
    pub workers: usize,
}

impl FindOptions {
    /// Evaluate the find-specific clauses against one entry. Relative time
    /// constraints are interpreted against `now`.
    pub fn matches(&self, entry: &Entry, now: SystemTime) -> bool {
        let path = entry.path.to_string_lossy();

        if !self.name_pattern.is_empty() && !pattern::base_match(&self.name_pattern, &entry.name) {
            return false;
        }
        if !self.path_pattern.is_empty() && !pattern::path_match(&self.path_pattern, &path) {
            return false;
        }
        if !self.ignore_pattern.is_empty() && pattern::path_match(&self.ignore_pattern, &path) {
            return false;
        }
        if let Some(re) = &self.regex {
            if !pattern::regex_match(re, &path) {
                return false;
            }
        }

        if let Some(older) = self.older_than {
            match entry.modified {
                Some(modified) => {
                    let age = now.duration_since(modified).unwrap_or_default();
                    if age <= older {
                        return false;
                    }
                }
                None => return false,
            }
        }
        if let Some(newer) = self.newer_than {
            match entry.modified {
                Some(modified) => {
                    let age = now.duration_since(modified).unwrap_or_default();
                    if age >= newer {
                        return false;
                    }
                }
                None => return false,
            }
        }

        if self.larger_than > 0 && entry.size <= self.larger_than {
            return false;
        }
        if self.smaller_than > 0 && entry.size >= self.smaller_than {
            return false;
        }

        if !self.match_metadata.is_empty()
            && !match_regex_map(&self.match_metadata, entry.metadata.as_ref())
        {
            return false;
        }
        if !self.match_tags.is_empty() && !match_regex_map(&self.match_tags, entry.tags.as_ref()) {
            return false;
        }

        true
    }

    /// The name/path clauses alone, for events with no stat data.
    fn matches_name_only(&self, entry: &Entry) -> bool {
        let path = entry.path.to_string_lossy();
        if !self.name_pattern.is_empty() && !pattern::base_match(&self.name_pattern, &entry.name) {
            return false;
        }
        if !self.path_pattern.is_empty() && !pattern::path_match(&self.path_pattern, &path) {
            return false;
        }
        if !self.ignore_pattern.is_empty() && pattern::path_match(&self.ignore_pattern, &path) {
            return false;
        }
        if let Some(re) = &self.regex {
            if !pattern::regex_match(re, &path) {
                return false;
            }
        }
        true
    }
}

/// Per-match handler: receives the entry and, under watch, the event kind.
/// Invoked concurrently from many workers; must be thread-safe.
pub type FindHandler =
    Arc<dyn Fn(&Entry, Option<EventKind>, &Cancellation) -> Result<()> + Send + Sync>;

/// A handler that prints each match's path.
pub fn default_handler() -> FindHandler {
    Arc::new(|entry, _event, _cancel| {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", entry.path.display()).map_err(WalkError::Io)
    })
}

/// A handler that launches a subprocess per match, built from a command
/// template. The child's stdout is forwarded; cancellation kills pending
/// children.
pub fn exec_handler(cmd_template: String) -> FindHandler {
    Arc::new(move |entry, event, cancel| {
        let line = template::format(&cmd_template, entry, event);
        debug!(command = %line, "exec");
        run_command(&line, cancel).map_err(|err| match err {
            WalkError::Cancelled => WalkError::Cancelled,
            other => WalkError::callback(&entry.path, other.to_string()),
        })
    })
}

/// A handler that writes one formatted line per match. Lines are written
/// atomically; interleaving across workers is permitted.
pub fn format_handler(format_template: String) -> FindHandler {
    Arc::new(move |entry, event, _cancel| {
        let line = template::format(&format_template, entry, event);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        writeln!(out, "{}", line).map_err(WalkError::Io)
    })
}

/// Search `root` for entries matching `opts`, processing each match with
/// `handler`. With the watch flag set, keeps dispatching matching change
/// events through the same handler after the sweep until cancellation or
/// timeout.
pub fn find(
    root: &Path,
    opts: &FindOptions,
    handler: FindHandler,
    cancel: &Cancellation,
) -> Result<WalkStats> {
    let root = clean_path(root);
    let now = SystemTime::now();

    let symlink_mode = if opts.follow_symlinks {
        SymlinkMode::Follow
    } else {
        SymlinkMode::Ignore
    };

    // Max depth doubles as a pruning hint for the engine.
    let engine_filter = FilterOptions {
        max_depth: opts.max_depth,
        ..Default::default()
    };

    let mut builder = Walker::builder()
        .filter(engine_filter)
        .symlink_mode(symlink_mode)
        .error_mode(ErrorMode::Continue)
        .cancellation(cancel.clone());
    if opts.workers > 0 {
        builder = builder.workers(opts.workers);
    }
    let walker = builder.build()?;

    let visit = find_visit(opts.clone(), Arc::clone(&handler), now);
    let walk_result = walker.walk(&root, visit);

    // Per-entry failures during the sweep do not cancel live monitoring.
    if opts.watch && !cancel.is_cancelled() {
        let watch_opts = WatchOptions {
            events: opts.watch_events.clone(),
            recursive: true,
            timeout: None,
            pattern: String::new(),
            ignore_pattern: String::new(),
            include_hidden: opts.include_hidden,
            filter: FilterOptions::default(),
        };
        let watch_visit = watch_visit(opts.clone(), handler);
        watch::watch(&root, &watch_opts, watch_visit, cancel)?;
    }

    walk_result
}

/// Search and execute a command template for each match.
pub fn find_with_exec(
    root: &Path,
    opts: &FindOptions,
    cmd_template: &str,
    cancel: &Cancellation,
) -> Result<WalkStats> {
    let mut opts = opts.clone();
    opts.exec_cmd = cmd_template.to_string();
    find(root, &opts, exec_handler(cmd_template.to_string()), cancel)
}

/// Search and print a formatted line for each match.
pub fn find_with_format(
    root: &Path,
    opts: &FindOptions,
    format_template: &str,
    cancel: &Cancellation,
) -> Result<WalkStats> {
    let mut opts = opts.clone();
    opts.print_format = format_template.to_string();
    find(
        root,
        &opts,
        format_handler(format_template.to_string()),
        cancel,
    )
}

/// The callback wrapper the engine drives during the sweep.
fn find_visit(opts: FindOptions, handler: FindHandler, now: SystemTime) -> VisitFn {
    visit_fn(move |visit| {
        // Error-path invocations propagate so the engine collects them.
        if let Some(err) = visit.error {
            return Err(WalkError::Entry(err.clone()));
        }

        let entry = visit.entry;

        // The root itself (depth 0) is exempt from hidden-name policy.
        if !opts.include_hidden && entry.is_hidden() && entry.depth > 0 {
            return Ok(if entry.is_dir() {
                Flow::SkipDir
            } else {
                Flow::Continue
            });
        }

        // Directories steer traversal; find yields files only.
        if entry.is_dir() {
            return Ok(Flow::Continue);
        }

        if opts.matches(entry, now) {
            handler(entry, None, visit.cancel)?;
        }
        Ok(Flow::Continue)
    })
}

/// The callback wrapper watch dispatch goes through.
fn watch_visit(opts: FindOptions, handler: FindHandler) -> VisitFn {
    visit_fn(move |visit| {
        if visit.error.is_some() {
            return Ok(Flow::Continue);
        }
        let entry = visit.entry;
        if entry.is_dir() {
            return Ok(Flow::Continue);
        }

        let matched = match visit.event {
            // Deletes carry no stat data; judge on name/path clauses only.
            Some(EventKind::Delete) => opts.matches_name_only(entry),
            _ => opts.matches(entry, SystemTime::now()),
        };
        if matched {
            handler(entry, visit.event, visit.cancel)?;
        }
        Ok(Flow::Continue)
    })
}

/// Run one templated command: whitespace-split argv, captured output,
/// cancellation kills the child. The child's stdout is forwarded to ours.
pub fn run_command(line: &str, cancel: &Cancellation) -> Result<()> {
    let mut parts = line.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| WalkError::Io(io::Error::new(io::ErrorKind::InvalidInput, "empty command")))?;

    let mut child = Command::new(program)
        .args(parts)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(WalkError::Io)?;

    let mut child_stdout = child.stdout.take();
    let mut child_stderr = child.stderr.take();

    let status = std::thread::scope(|scope| {
        // Drain pipes concurrently so a chatty child cannot deadlock on a
        // full pipe buffer while we poll for exit.
        let stdout_reader = scope.spawn(move || {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = child_stdout {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });
        let stderr_reader = scope.spawn(move || {
            let mut buf = Vec::new();
            if let Some(ref mut pipe) = child_stderr {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
            match child.try_wait() {
                Ok(Some(status)) => break Some(Ok(status)),
                Ok(None) => std::thread::sleep(Duration::from_millis(10)),
                Err(err) => break Some(Err(err)),
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();
        (status, stdout, stderr)
    });

    let (status, stdout, stderr) = status;
    let status = match status {
        None => return Err(WalkError::Cancelled),
        Some(status) => status.map_err(WalkError::Io)?,
    };

    if !stdout.is_empty() {
        let out = io::stdout();
        let mut lock = out.lock();
        let _ = lock.write_all(&stdout);
    }

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr);
        warn!(command = %line, status = %status, "command failed");
        return Err(WalkError::Io(io::Error::other(format!(
            "command '{}' exited with {}: {}",
            line,
            status,
            stderr.trim()
        ))));
    }

    Ok(())
}

/// Compile `key=regex` patterns into a match map. An empty value compiles
/// to `None`, meaning the key must be absent or empty.
pub fn compile_regex_map(
    patterns: &HashMap<String, String>,
) -> std::result::Result<HashMap<String, Option<Regex>>, ConfigError> {
    let mut compiled = HashMap::with_capacity(patterns.len());
    for (key, value) in patterns {
        if value.is_empty() {
            compiled.insert(key.clone(), None);
            continue;
        }
        let re = Regex::new(value).map_err(|e| ConfigError::InvalidPattern {
            pattern: value.clone(),
            reason: e.to_string(),
        })?;
        compiled.insert(key.clone(), Some(re));
    }
    Ok(compiled)
}

/// Evaluate a compiled pattern map against a value map.
fn match_regex_map(
    patterns: &HashMap<String, Option<Regex>>,
    values: Option<&HashMap<String, String>>,
) -> bool {
    for (key, maybe_re) in patterns {
        let value = values.and_then(|m| m.get(key));
        match maybe_re {
            None => {
                // The key must be absent or empty.
                if let Some(v) = value {
                    if !v.is_empty() {
                        return false;
                    }
                }
            }
            Some(re) => match value {
                Some(v) if re.is_match(v) => {}
                _ => return false,
            },
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry_named(name: &str, size: u64, age: Duration, now: SystemTime) -> Entry {
        let mut entry = Entry::placeholder(PathBuf::from(format!("/work/{name}")), 1);
        entry.kind = crate::entry::EntryKind::File;
        entry.size = size;
        entry.modified = Some(now - age);
        entry
    }

    #[test]
    fn test_name_pattern() {
        let now = SystemTime::now();
        let opts = FindOptions {
            name_pattern: "*.go".into(),
            ..Default::default()
        };
        assert!(opts.matches(&entry_named("main.go", 10, Duration::ZERO, now), now));
        assert!(!opts.matches(&entry_named("main.rs", 10, Duration::ZERO, now), now));
    }

    #[test]
    fn test_path_and_ignore_patterns() {
        let now = SystemTime::now();
        let opts = FindOptions {
            path_pattern: "/work/*".into(),
            ignore_pattern: "*~".into(),
            ..Default::default()
        };
        assert!(opts.matches(&entry_named("keep.txt", 10, Duration::ZERO, now), now));
        assert!(!opts.matches(&entry_named("draft~", 10, Duration::ZERO, now), now));
    }

    #[test]
    fn test_age_constraints() {
        let now = SystemTime::now();
        let old = entry_named("old.log", 10, Duration::from_secs(86_400 * 30), now);
        let fresh = entry_named("fresh.log", 10, Duration::from_secs(60), now);

        let older = FindOptions {
            older_than: Some(Duration::from_secs(86_400 * 7)),
            ..Default::default()
        };
        assert!(older.matches(&old, now));
        assert!(!older.matches(&fresh, now));

        let newer = FindOptions {
            newer_than: Some(Duration::from_secs(3600)),
            ..Default::default()
        };
        assert!(newer.matches(&fresh, now));
        assert!(!newer.matches(&old, now));
    }

    #[test]
    fn test_size_constraints_are_strict() {
        let now = SystemTime::now();
        let opts = FindOptions {
            larger_than: 100,
            ..Default::default()
        };
        assert!(!opts.matches(&entry_named("edge", 100, Duration::ZERO, now), now));
        assert!(opts.matches(&entry_named("over", 101, Duration::ZERO, now), now));

        let opts = FindOptions {
            smaller_than: 100,
            ..Default::default()
        };
        assert!(!opts.matches(&entry_named("edge", 100, Duration::ZERO, now), now));
        assert!(opts.matches(&entry_named("under", 99, Duration::ZERO, now), now));
    }

    #[test]
    fn test_regex_clause() {
        let now = SystemTime::now();
        let opts = FindOptions {
            regex: Some(Regex::new(r"\.log$").unwrap()),
            ..Default::default()
        };
        assert!(opts.matches(&entry_named("app.log", 10, Duration::ZERO, now), now));
        assert!(!opts.matches(&entry_named("app.txt", 10, Duration::ZERO, now), now));
    }

    #[test]
    fn test_compile_regex_map() {
        let mut patterns = HashMap::new();
        patterns.insert("env".to_string(), "prod.*".to_string());
        patterns.insert("temp".to_string(), String::new());
        let compiled = compile_regex_map(&patterns).unwrap();
        assert!(compiled.get("env").unwrap().is_some());
        assert!(compiled.get("temp").unwrap().is_none());

        let mut bad = HashMap::new();
        bad.insert("k".to_string(), "[unclosed".to_string());
        assert!(compile_regex_map(&bad).is_err());
    }

    #[test]
    fn test_match_regex_map() {
        let mut patterns = HashMap::new();
        patterns.insert("env".to_string(), Some(Regex::new("prod.*").unwrap()));

        let mut values = HashMap::new();
        values.insert("env".to_string(), "production".to_string());
        assert!(match_regex_map(&patterns, Some(&values)));

        values.insert("env".to_string(), "staging".to_string());
        assert!(!match_regex_map(&patterns, Some(&values)));

        // Required key missing entirely
        assert!(!match_regex_map(&patterns, None));

        // None pattern: key must be absent or empty
        let mut absent = HashMap::new();
        absent.insert("temp".to_string(), None);
        assert!(match_regex_map(&absent, None));
        let mut values = HashMap::new();
        values.insert("temp".to_string(), "set".to_string());
        assert!(!match_regex_map(&absent, Some(&values)));
    }

    #[test]
    fn test_run_command_captures_exit() {
        let cancel = Cancellation::new();
        assert!(run_command("true", &cancel).is_ok());
        assert!(run_command("false", &cancel).is_err());
        assert!(run_command("", &cancel).is_err());
    }

    #[test]
    fn test_run_command_cancelled() {
        let cancel = Cancellation::new();
        cancel.cancel();
        let err = run_command("sleep 5", &cancel).unwrap_err();
        assert!(err.is_cancelled());
    }
}
