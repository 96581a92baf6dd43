//! Configuration types for fswalk
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - Literal parsing for sizes (KB/MB/GB/TB), durations (with `d` for
//!   days), octal permission masks, and YYYY-MM-DD dates

use crate::entry::EntryKind;
use crate::error::ConfigError;
use crate::filter::FilterOptions;
use crate::find::FindOptions;
use crate::pattern;
use crate::symlink::SymlinkMode;
use crate::walker::{ErrorMode, MAX_WORKERS};
use crate::watch::{EventKind, WatchOptions};
use chrono::{Local, NaiveDate, TimeZone};
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Directories excluded by default when no exclusion list is given. These
/// are system trees that routinely fail with permission errors.
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".Trash",
    ".Trashes",
    ".fseventsd",
    ".Spotlight-V100",
    "System Volume Information",
    "$RECYCLE.BIN",
    "lost+found",
];

/// Concurrent filesystem traversal with filtering, find actions, and
/// change watching
#[derive(Parser, Debug, Clone)]
#[command(
    name = "fswalk",
    version,
    about = "Concurrent filesystem traversal and file search",
    long_about = "fswalk walks a directory tree with a bounded worker pool, applying size, \
                  time, permission, ownership, pattern, and depth filters to every entry.\n\n\
                  The find subcommand adds richer predicates plus per-match actions \
                  (exec templates, formatted output) and optional live watching; the watch \
                  subcommand monitors a tree for changes without an initial sweep.",
    after_help = "EXAMPLES:\n    \
        fswalk /data --pattern '*.log' --min-size 1MB\n    \
        fswalk /src --workers 8 --exclude-dir .git,target --progress\n    \
        fswalk find /src --name '*.go' --larger-than 4KB --exec 'wc -l {}'\n    \
        fswalk find /var/log --older-than 30d --format '{} ({size} bytes)'\n    \
        fswalk watch /data --events create,modify --recursive --timeout 1h",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct CliArgs {
    /// Directory to walk
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Subcommand (find, watch)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Number of concurrent workers
    #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
    pub workers: usize,

    /// Glob pattern files must match
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Directories to exclude (comma-separated base-name globs)
    #[arg(long = "exclude-dir", value_name = "GLOBS")]
    pub exclude_dir: Option<String>,

    /// Patterns to exclude files (comma-separated)
    #[arg(long = "exclude-pattern", value_name = "GLOBS")]
    pub exclude_pattern: Option<String>,

    /// File types to include (comma-separated: file,dir,symlink,pipe,socket,device,char)
    #[arg(long = "file-types", value_name = "TYPES")]
    pub file_types: Option<String>,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Error handling mode (continue|stop|skip)
    #[arg(long = "error-mode", default_value = "continue", value_name = "MODE")]
    pub error_mode: String,

    /// Minimum file size (e.g. 500, 4KB, 1.5MB)
    #[arg(long = "min-size", value_name = "SIZE")]
    pub min_size: Option<String>,

    /// Maximum file size (e.g. 1GB)
    #[arg(long = "max-size", value_name = "SIZE")]
    pub max_size: Option<String>,

    /// Minimum file permissions (octal, e.g. 0644)
    #[arg(long = "min-permissions", value_name = "OCTAL")]
    pub min_permissions: Option<String>,

    /// Maximum file permissions (octal, e.g. 0755)
    #[arg(long = "max-permissions", value_name = "OCTAL")]
    pub max_permissions: Option<String>,

    /// Exact file permissions to match (octal, e.g. 0644)
    #[arg(long = "exact-permissions", value_name = "OCTAL")]
    pub exact_permissions: Option<String>,

    /// Include files modified after (YYYY-MM-DD)
    #[arg(long = "modified-after", value_name = "DATE")]
    pub modified_after: Option<String>,

    /// Include files modified before (YYYY-MM-DD)
    #[arg(long = "modified-before", value_name = "DATE")]
    pub modified_before: Option<String>,

    /// Include files accessed after (YYYY-MM-DD)
    #[arg(long = "accessed-after", value_name = "DATE")]
    pub accessed_after: Option<String>,

    /// Include files accessed before (YYYY-MM-DD)
    #[arg(long = "accessed-before", value_name = "DATE")]
    pub accessed_before: Option<String>,

    /// Include files created after (YYYY-MM-DD, best-effort)
    #[arg(long = "created-after", value_name = "DATE")]
    pub created_after: Option<String>,

    /// Include files created before (YYYY-MM-DD, best-effort)
    #[arg(long = "created-before", value_name = "DATE")]
    pub created_before: Option<String>,

    /// Filter by owner username
    #[arg(long, value_name = "NAME")]
    pub owner: Option<String>,

    /// Filter by group name
    #[arg(long, value_name = "NAME")]
    pub group: Option<String>,

    /// Filter by owner UID
    #[arg(long = "owner-uid", value_name = "UID")]
    pub owner_uid: Option<u32>,

    /// Filter by group GID
    #[arg(long = "owner-gid", value_name = "GID")]
    pub owner_gid: Option<u32>,

    /// Minimum directory depth to process
    #[arg(long = "min-depth", default_value = "0", value_name = "NUM")]
    pub min_depth: usize,

    /// Maximum directory depth to process (0 = unlimited)
    #[arg(long = "max-depth", default_value = "0", value_name = "NUM")]
    pub max_depth: usize,

    /// Include only empty files
    #[arg(long = "empty-files")]
    pub empty_files: bool,

    /// Include only empty directories
    #[arg(long = "empty-dirs")]
    pub empty_dirs: bool,

    /// Show progress updates
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Output format (text|json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: String,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Disable all output except errors
    #[arg(long)]
    pub silent: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Find files with advanced filtering and per-match actions
    Find(FindArgs),

    /// Watch a directory tree for filesystem changes
    Watch(WatchArgs),
}

/// Arguments for the find subcommand
#[derive(Args, Debug, Clone)]
pub struct FindArgs {
    /// Directory to search
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Match by file name (supports wildcards)
    #[arg(short = 'n', long, value_name = "GLOB")]
    pub name: Option<String>,

    /// Match by path (supports wildcards)
    #[arg(long = "path", value_name = "GLOB")]
    pub path_pattern: Option<String>,

    /// Skip paths matching this pattern
    #[arg(long, value_name = "GLOB")]
    pub ignore: Option<String>,

    /// Match by regular expression
    #[arg(short = 'r', long, value_name = "REGEX")]
    pub regex: Option<String>,

    /// Files older than this duration (e.g. 7d, 24h, 30m)
    #[arg(long = "older-than", value_name = "DURATION")]
    pub older_than: Option<String>,

    /// Files newer than this duration (e.g. 7d, 24h, 30m)
    #[arg(long = "newer-than", value_name = "DURATION")]
    pub newer_than: Option<String>,

    /// Files larger than this size (e.g. 1MB, 500KB)
    #[arg(long = "larger-than", value_name = "SIZE")]
    pub larger_than: Option<String>,

    /// Files smaller than this size (e.g. 1MB, 500KB)
    #[arg(long = "smaller-than", value_name = "SIZE")]
    pub smaller_than: Option<String>,

    /// Metadata key-value patterns to match (key=regex, repeatable)
    #[arg(long = "meta", value_name = "KEY=REGEX")]
    pub meta: Vec<String>,

    /// Tag key-value patterns to match (key=regex, repeatable)
    #[arg(long = "tag", value_name = "KEY=REGEX")]
    pub tag: Vec<String>,

    /// Command to execute for each match
    #[arg(long, value_name = "TEMPLATE")]
    pub exec: Option<String>,

    /// Format string for output
    #[arg(long = "format", value_name = "TEMPLATE")]
    pub format: Option<String>,

    /// Maximum directory depth to traverse (0 = unlimited)
    #[arg(short = 'd', long = "max-depth", default_value = "0", value_name = "NUM")]
    pub max_depth: usize,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Include hidden files
    #[arg(long)]
    pub include_hidden: bool,

    /// Watch for changes after the initial sweep
    #[arg(short = 'W', long)]
    pub watch: bool,

    /// Events to watch for (comma-separated)
    #[arg(long = "watch-events", default_value = "create,modify", value_name = "EVENTS")]
    pub watch_events: String,

    /// Number of concurrent workers
    #[arg(short = 'w', long, default_value_t = default_workers(), value_name = "NUM")]
    pub workers: usize,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Arguments for the watch subcommand
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Directory to watch
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Events to watch for (comma-separated: create,modify,delete,rename,chmod)
    #[arg(long, value_name = "EVENTS")]
    pub events: Option<String>,

    /// Watch subdirectories recursively
    #[arg(short = 'r', long)]
    pub recursive: bool,

    /// Stop watching after this long (e.g. 30s, 10m, 1h)
    #[arg(long, value_name = "DURATION")]
    pub timeout: Option<String>,

    /// Base-name glob events must match
    #[arg(long, value_name = "GLOB")]
    pub pattern: Option<String>,

    /// Base-name glob that suppresses events
    #[arg(long, value_name = "GLOB")]
    pub ignore: Option<String>,

    /// Include hidden files
    #[arg(long)]
    pub include_hidden: bool,

    /// Command to execute for each event
    #[arg(long, value_name = "TEMPLATE")]
    pub exec: Option<String>,

    /// Format string for event output
    #[arg(long = "format", value_name = "TEMPLATE")]
    pub format: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Output format for walk results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(format: &str) -> Result<Self, ConfigError> {
        match format {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::UnknownFormat {
                value: other.to_string(),
            }),
        }
    }
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Validated runtime configuration for the plain walk command.
#[derive(Debug, Clone)]
pub struct WalkConfig {
    /// Root directory to walk
    pub root: PathBuf,

    /// Number of worker threads
    pub workers: usize,

    /// Compiled filter
    pub filter: FilterOptions,

    /// Symlink handling
    pub symlink_mode: SymlinkMode,

    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Show progress indicator
    pub show_progress: bool,

    /// Output format
    pub format: OutputFormat,

    /// Verbose logging
    pub verbose: bool,

    /// Suppress per-file output
    pub silent: bool,
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments.
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        if args.workers == 0 || args.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: args.workers,
                max: MAX_WORKERS,
            });
        }

        let root = args.path.clone().ok_or(ConfigError::MissingPath)?;
        let error_mode = ErrorMode::parse(&args.error_mode)?;
        let format = OutputFormat::parse(&args.format)?;

        let mut filter = FilterOptions {
            min_depth: args.min_depth,
            max_depth: args.max_depth,
            empty_files_only: args.empty_files,
            empty_dirs_only: args.empty_dirs,
            ..Default::default()
        };

        if let Some(pattern) = &args.pattern {
            check_glob(pattern)?;
            filter.pattern = pattern.clone();
        }
        filter.exclude_dirs = match &args.exclude_dir {
            Some(list) => split_list(list),
            None => DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        };
        for glob in &filter.exclude_dirs {
            check_glob(glob)?;
        }
        if let Some(list) = &args.exclude_pattern {
            filter.exclude_patterns = split_list(list);
            for glob in &filter.exclude_patterns {
                check_glob(glob)?;
            }
        }
        if let Some(list) = &args.file_types {
            filter.kinds = split_list(list)
                .iter()
                .map(|name| {
                    EntryKind::parse(name).ok_or_else(|| ConfigError::UnknownFileType {
                        value: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
        }

        if let Some(size) = &args.min_size {
            filter.min_size = parse_size(size)?;
        }
        if let Some(size) = &args.max_size {
            filter.max_size = parse_size(size)?;
        }

        if let Some(perms) = &args.min_permissions {
            filter.min_permissions = parse_octal(perms)?;
        }
        if let Some(perms) = &args.max_permissions {
            filter.max_permissions = parse_octal(perms)?;
        }
        if let Some(perms) = &args.exact_permissions {
            filter.exact_permissions = Some(parse_octal(perms)?);
        }

        filter.modified_after = parse_date_opt(&args.modified_after)?;
        filter.modified_before = parse_date_opt(&args.modified_before)?;
        filter.accessed_after = parse_date_opt(&args.accessed_after)?;
        filter.accessed_before = parse_date_opt(&args.accessed_before)?;
        filter.created_after = parse_date_opt(&args.created_after)?;
        filter.created_before = parse_date_opt(&args.created_before)?;

        filter.owner_name = args.owner.clone().unwrap_or_default();
        filter.group_name = args.group.clone().unwrap_or_default();
        filter.owner_uid = args.owner_uid;
        filter.owner_gid = args.owner_gid;

        let symlink_mode = if args.follow_symlinks {
            SymlinkMode::Follow
        } else {
            SymlinkMode::Ignore
        };

        Ok(Self {
            root,
            workers: args.workers,
            filter,
            symlink_mode,
            error_mode,
            show_progress: args.progress,
            format,
            verbose: args.verbose,
            silent: args.silent,
        })
    }
}

impl FindArgs {
    /// Translate the CLI surface into library find options.
    pub fn to_options(&self) -> Result<FindOptions, ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.workers,
                max: MAX_WORKERS,
            });
        }

        let mut opts = FindOptions {
            name_pattern: self.name.clone().unwrap_or_default(),
            path_pattern: self.path_pattern.clone().unwrap_or_default(),
            ignore_pattern: self.ignore.clone().unwrap_or_default(),
            max_depth: self.max_depth,
            follow_symlinks: self.follow_symlinks,
            include_hidden: self.include_hidden,
            watch: self.watch,
            workers: self.workers,
            exec_cmd: self.exec.clone().unwrap_or_default(),
            print_format: self.format.clone().unwrap_or_default(),
            ..Default::default()
        };

        for glob in [&opts.name_pattern, &opts.path_pattern, &opts.ignore_pattern] {
            if !glob.is_empty() {
                check_glob(glob)?;
            }
        }

        if let Some(regex) = &self.regex {
            opts.regex = Some(Regex::new(regex).map_err(|e| ConfigError::InvalidPattern {
                pattern: regex.clone(),
                reason: e.to_string(),
            })?);
        }
        if let Some(duration) = &self.older_than {
            opts.older_than = Some(parse_duration(duration)?);
        }
        if let Some(duration) = &self.newer_than {
            opts.newer_than = Some(parse_duration(duration)?);
        }
        if let Some(size) = &self.larger_than {
            opts.larger_than = parse_size(size)?;
        }
        if let Some(size) = &self.smaller_than {
            opts.smaller_than = parse_size(size)?;
        }

        opts.match_metadata = crate::find::compile_regex_map(&parse_key_values(&self.meta)?)?;
        opts.match_tags = crate::find::compile_regex_map(&parse_key_values(&self.tag)?)?;

        opts.watch_events = split_list(&self.watch_events)
            .iter()
            .map(|name| EventKind::parse(name))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(opts)
    }
}

impl WatchArgs {
    /// Translate the CLI surface into library watch options.
    pub fn to_options(&self) -> Result<WatchOptions, ConfigError> {
        let mut opts = WatchOptions {
            recursive: self.recursive,
            include_hidden: self.include_hidden,
            pattern: self.pattern.clone().unwrap_or_default(),
            ignore_pattern: self.ignore.clone().unwrap_or_default(),
            ..Default::default()
        };

        for glob in [&opts.pattern, &opts.ignore_pattern] {
            if !glob.is_empty() {
                check_glob(glob)?;
            }
        }

        if let Some(events) = &self.events {
            opts.events = split_list(events)
                .iter()
                .map(|name| EventKind::parse(name))
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(timeout) = &self.timeout {
            opts.timeout = Some(parse_duration(timeout)?);
        }

        Ok(opts)
    }
}

/// Split a comma-separated CLI list, dropping empty items.
fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_glob(glob: &str) -> Result<(), ConfigError> {
    pattern::compile_check(glob).map_err(|reason| ConfigError::InvalidPattern {
        pattern: glob.to_string(),
        reason,
    })
}

/// Parse `key=value` pairs from repeated CLI flags.
fn parse_key_values(
    pairs: &[String],
) -> Result<std::collections::HashMap<String, String>, ConfigError> {
    let mut map = std::collections::HashMap::with_capacity(pairs.len());
    for pair in pairs {
        match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(ConfigError::InvalidPattern {
                    pattern: pair.clone(),
                    reason: "expected key=regex".to_string(),
                })
            }
        }
    }
    Ok(map)
}

/// Parse a size literal: a decimal number with an optional KB/MB/GB/TB
/// suffix (binary multiples).
pub fn parse_size(value: &str) -> Result<u64, ConfigError> {
    let upper = value.trim().to_uppercase();

    let (number, multiplier) = if let Some(stripped) = upper.strip_suffix("KB") {
        (stripped, 1u64 << 10)
    } else if let Some(stripped) = upper.strip_suffix("MB") {
        (stripped, 1u64 << 20)
    } else if let Some(stripped) = upper.strip_suffix("GB") {
        (stripped, 1u64 << 30)
    } else if let Some(stripped) = upper.strip_suffix("TB") {
        (stripped, 1u64 << 40)
    } else {
        (upper.as_str(), 1u64)
    };

    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSize {
            value: value.to_string(),
            reason: "not a number".to_string(),
        })?;
    if number < 0.0 {
        return Err(ConfigError::InvalidSize {
            value: value.to_string(),
            reason: "negative size".to_string(),
        });
    }

    Ok((number * multiplier as f64) as u64)
}

/// Parse a duration literal: standard `s`/`m`/`h` units plus `d` for days.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let trimmed = value.trim();
    let invalid = || ConfigError::InvalidDuration {
        value: value.to_string(),
        reason: "expected a number followed by s, m, h, or d".to_string(),
    };

    let (number, unit_secs) = if let Some(stripped) = trimmed.strip_suffix('d') {
        (stripped, 86_400.0)
    } else if let Some(stripped) = trimmed.strip_suffix('h') {
        (stripped, 3_600.0)
    } else if let Some(stripped) = trimmed.strip_suffix("ms") {
        (stripped, 0.001)
    } else if let Some(stripped) = trimmed.strip_suffix('m') {
        (stripped, 60.0)
    } else if let Some(stripped) = trimmed.strip_suffix('s') {
        (stripped, 1.0)
    } else {
        return Err(invalid());
    };

    let number: f64 = number.trim().parse().map_err(|_| invalid())?;
    if number < 0.0 {
        return Err(invalid());
    }

    Ok(Duration::from_secs_f64(number * unit_secs))
}

/// Parse an octal permission mask, with or without a leading zero.
pub fn parse_octal(value: &str) -> Result<u32, ConfigError> {
    let parsed =
        u32::from_str_radix(value.trim(), 8).map_err(|_| ConfigError::InvalidPermissions {
            value: value.to_string(),
        })?;
    if parsed > 0o7777 {
        return Err(ConfigError::InvalidPermissions {
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

/// Parse a YYYY-MM-DD date into the local midnight instant.
pub fn parse_date(value: &str) -> Result<SystemTime, ConfigError> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        ConfigError::InvalidDate {
            value: value.to_string(),
        }
    })?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or(ConfigError::InvalidDate {
        value: value.to_string(),
    })?;
    let local = Local
        .from_local_datetime(&midnight)
        .earliest()
        .ok_or(ConfigError::InvalidDate {
            value: value.to_string(),
        })?;
    Ok(SystemTime::from(local))
}

fn parse_date_opt(value: &Option<String>) -> Result<Option<SystemTime>, ConfigError> {
    value.as_ref().map(|v| parse_date(v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_plain() {
        assert_eq!(parse_size("500").unwrap(), 500);
        assert_eq!(parse_size("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_size_suffixes() {
        assert_eq!(parse_size("1KB").unwrap(), 1024);
        assert_eq!(parse_size("2MB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1 << 30);
        assert_eq!(parse_size("1TB").unwrap(), 1u64 << 40);
        assert_eq!(parse_size("1.5KB").unwrap(), 1536);
        // Case-insensitive
        assert_eq!(parse_size("4kb").unwrap(), 4096);
    }

    #[test]
    fn test_parse_size_invalid() {
        assert!(parse_size("abc").is_err());
        assert!(parse_size("-5MB").is_err());
        assert!(parse_size("").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("7d").unwrap(), Duration::from_secs(604_800));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(
            parse_duration("1.5h").unwrap(),
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("7").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration("1w").is_err());
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal("0644").unwrap(), 0o644);
        assert_eq!(parse_octal("755").unwrap(), 0o755);
        assert_eq!(parse_octal("7777").unwrap(), 0o7777);
        assert!(parse_octal("0999").is_err());
        assert!(parse_octal("17777").is_err());
        assert!(parse_octal("rw-").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2024-06-01").is_ok());
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("June 1st").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a,b , c"), vec!["a", "b", "c"]);
        assert_eq!(split_list(""), Vec::<String>::new());
    }

    #[test]
    fn test_walk_config_defaults() {
        let args = CliArgs::parse_from(["fswalk", "/tmp"]);
        let config = WalkConfig::from_args(&args).unwrap();
        assert_eq!(config.root, PathBuf::from("/tmp"));
        assert_eq!(config.error_mode, ErrorMode::Continue);
        assert_eq!(config.format, OutputFormat::Text);
        assert_eq!(config.symlink_mode, SymlinkMode::Ignore);
        // Default exclusions kick in when none are specified
        assert!(config
            .filter
            .exclude_dirs
            .contains(&"lost+found".to_string()));
    }

    #[test]
    fn test_walk_config_filters() {
        let args = CliArgs::parse_from([
            "fswalk",
            "/data",
            "--pattern",
            "*.log",
            "--min-size",
            "1KB",
            "--max-size",
            "1MB",
            "--exact-permissions",
            "0644",
            "--file-types",
            "file,symlink",
            "--exclude-dir",
            ".git,target",
            "--max-depth",
            "3",
        ]);
        let config = WalkConfig::from_args(&args).unwrap();
        assert_eq!(config.filter.pattern, "*.log");
        assert_eq!(config.filter.min_size, 1024);
        assert_eq!(config.filter.max_size, 1024 * 1024);
        assert_eq!(config.filter.exact_permissions, Some(0o644));
        assert_eq!(
            config.filter.kinds,
            vec![EntryKind::File, EntryKind::Symlink]
        );
        assert_eq!(config.filter.exclude_dirs, vec![".git", "target"]);
        assert_eq!(config.filter.max_depth, 3);
    }

    #[test]
    fn test_walk_config_rejects_bad_input() {
        let args = CliArgs::parse_from(["fswalk", "/x", "--error-mode", "panic"]);
        assert!(matches!(
            WalkConfig::from_args(&args),
            Err(ConfigError::UnknownErrorMode { .. })
        ));

        let args = CliArgs::parse_from(["fswalk", "/x", "--workers", "0"]);
        assert!(matches!(
            WalkConfig::from_args(&args),
            Err(ConfigError::InvalidWorkerCount { .. })
        ));

        let args = CliArgs::parse_from(["fswalk", "/x", "--file-types", "floppy"]);
        assert!(matches!(
            WalkConfig::from_args(&args),
            Err(ConfigError::UnknownFileType { .. })
        ));
    }

    #[test]
    fn test_find_args_to_options() {
        let args = CliArgs::parse_from([
            "fswalk",
            "find",
            "/src",
            "--name",
            "*.go",
            "--older-than",
            "7d",
            "--larger-than",
            "4KB",
            "--regex",
            r"\.go$",
            "--watch-events",
            "create,delete",
        ]);
        let Some(Command::Find(find_args)) = args.command else {
            panic!("expected find subcommand");
        };
        let opts = find_args.to_options().unwrap();
        assert_eq!(opts.name_pattern, "*.go");
        assert_eq!(opts.older_than, Some(Duration::from_secs(604_800)));
        assert_eq!(opts.larger_than, 4096);
        assert!(opts.regex.is_some());
        assert_eq!(
            opts.watch_events,
            vec![EventKind::Create, EventKind::Delete]
        );
    }

    #[test]
    fn test_watch_args_to_options() {
        let args = CliArgs::parse_from([
            "fswalk",
            "watch",
            "/data",
            "--events",
            "create,chmod",
            "--recursive",
            "--timeout",
            "10m",
        ]);
        let Some(Command::Watch(watch_args)) = args.command else {
            panic!("expected watch subcommand");
        };
        let opts = watch_args.to_options().unwrap();
        assert!(opts.recursive);
        assert_eq!(opts.timeout, Some(Duration::from_secs(600)));
        assert_eq!(opts.events, vec![EventKind::Create, EventKind::Chmod]);
    }

    #[test]
    fn test_bad_watch_event_rejected() {
        let args = CliArgs::parse_from(["fswalk", "watch", "/data", "--events", "explode"]);
        let Some(Command::Watch(watch_args)) = args.command else {
            panic!("expected watch subcommand");
        };
        assert!(matches!(
            watch_args.to_options(),
            Err(ConfigError::UnknownWatchEvent { .. })
        ));
    }
}
