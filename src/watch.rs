//! Live monitoring via filesystem change notifications.
//!
//! The watch adapter subscribes to OS notifications for a root (optionally
//! recursive), maps raw backend events onto the canonical
//! {create, modify, delete, rename, chmod} set, applies the same predicate
//! machinery as the traversal engine, and dispatches matches through the
//! same callback contract with the event kind annotated.
//!
//! Delete events carry no stat data: the entry record has size zero and no
//! usable mode, and predicate evaluation is limited to name and path
//! clauses. In recursive mode, directories observed via create events are
//! added to the watcher so events inside them keep flowing.

use crate::cancel::Cancellation;
use crate::entry::Entry;
use crate::error::{ConfigError, EntryError, Result, WalkError};
use crate::filter::FilterOptions;
use crate::pattern;
use crate::walker::visit::{Visit, VisitFn};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use notify::event::ModifyKind;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Poll interval for the event loop's cancellation checks.
const RECV_POLL: Duration = Duration::from_millis(100);

/// Canonical filesystem event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Modify,
    Delete,
    Rename,
    Chmod,
}

impl EventKind {
    /// Stable name, also used by the `{event}` template placeholder.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Modify => "modify",
            EventKind::Delete => "delete",
            EventKind::Rename => "rename",
            EventKind::Chmod => "chmod",
        }
    }

    /// Parse a CLI event name.
    pub fn parse(name: &str) -> std::result::Result<Self, ConfigError> {
        match name {
            "create" => Ok(EventKind::Create),
            "modify" => Ok(EventKind::Modify),
            "delete" => Ok(EventKind::Delete),
            "rename" => Ok(EventKind::Rename),
            "chmod" => Ok(EventKind::Chmod),
            other => Err(ConfigError::UnknownWatchEvent {
                value: other.to_string(),
            }),
        }
    }
}

/// Options for a watch subscription.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Event kinds to deliver; empty means all
    pub events: Vec<EventKind>,

    /// Watch subdirectories recursively
    pub recursive: bool,

    /// Stop watching after this long (None = until cancelled)
    pub timeout: Option<Duration>,

    /// Base-name glob a path must match to be delivered
    pub pattern: String,

    /// Base-name glob that suppresses delivery
    pub ignore_pattern: String,

    /// Deliver entries whose base name starts with a dot
    pub include_hidden: bool,

    /// Full predicate applied to stat-able events
    pub filter: FilterOptions,
}

impl WatchOptions {
    fn wants(&self, kind: EventKind) -> bool {
        self.events.is_empty() || self.events.contains(&kind)
    }
}

/// Map a backend event kind onto the canonical set. Access-only and other
/// bookkeeping events carry no information the callback contract models.
fn canonical_kind(kind: &notify::EventKind) -> Option<EventKind> {
    match kind {
        notify::EventKind::Create(_) => Some(EventKind::Create),
        notify::EventKind::Remove(_) => Some(EventKind::Delete),
        notify::EventKind::Modify(ModifyKind::Name(_)) => Some(EventKind::Rename),
        notify::EventKind::Modify(ModifyKind::Metadata(_)) => Some(EventKind::Chmod),
        notify::EventKind::Modify(_) => Some(EventKind::Modify),
        _ => None,
    }
}

/// Depth of `path` relative to `root` (root itself = 0).
fn relative_depth(root: &Path, path: &Path) -> usize {
    path.strip_prefix(root)
        .map(|rel| rel.components().count())
        .unwrap_or(0)
}

/// Subscribe to change notifications under `root` and dispatch matching
/// events through `visit` until cancellation or timeout.
pub fn watch(root: &Path, opts: &WatchOptions, visit: VisitFn, cancel: &Cancellation) -> Result<()> {
    let cancel = match opts.timeout {
        Some(timeout) => cancel.deadline(timeout),
        None => cancel.clone(),
    };

    let (tx, rx) = unbounded();
    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )
    .map_err(|e| WalkError::Watch(e.to_string()))?;

    let mode = if opts.recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };
    watcher
        .watch(root, mode)
        .map_err(|e| WalkError::Watch(e.to_string()))?;

    debug!(root = %root.display(), recursive = opts.recursive, "watching for changes");

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let event = match rx.recv_timeout(RECV_POLL) {
            Ok(Ok(event)) => event,
            Ok(Err(err)) => {
                warn!(error = %err, "watcher backend error");
                continue;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let Some(kind) = canonical_kind(&event.kind) else {
            continue;
        };
        if !opts.wants(kind) {
            continue;
        }

        for path in &event.paths {
            dispatch_event(root, opts, &visit, &cancel, &mut watcher, path, kind);
        }
    }

    Ok(())
}

/// Filter and deliver a single event path.
#[allow(clippy::too_many_arguments)]
fn dispatch_event(
    root: &Path,
    opts: &WatchOptions,
    visit: &VisitFn,
    cancel: &Cancellation,
    watcher: &mut RecommendedWatcher,
    path: &PathBuf,
    kind: EventKind,
) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !opts.include_hidden && name.starts_with('.') {
        return;
    }
    // Name and path clauses apply to every event kind, deletes included.
    if !opts.pattern.is_empty() && !pattern::base_match(&opts.pattern, &name) {
        return;
    }
    if !opts.ignore_pattern.is_empty() && pattern::base_match(&opts.ignore_pattern, &name) {
        return;
    }

    let depth = relative_depth(root, path);

    if kind == EventKind::Delete {
        // Nothing to stat: size 0, no usable mode, judged on name/path only.
        let entry = Entry::placeholder(path.clone(), depth);
        deliver(visit, cancel, &entry, None, kind);
        return;
    }

    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            // The object may already be gone again; report and move on.
            let entry_err = EntryError::stat(path, &err);
            let placeholder = Entry::placeholder(path.clone(), depth);
            deliver(visit, cancel, &placeholder, Some(&entry_err), kind);
            return;
        }
    };

    // Keep coverage of directories created after the subscription started.
    if opts.recursive && kind == EventKind::Create && meta.is_dir() {
        if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
            warn!(path = %path.display(), error = %err, "failed to watch new directory");
        }
    }

    let entry = Entry::from_metadata(path.clone(), &meta, depth);
    if !opts.filter.matches(&entry) {
        return;
    }

    deliver(visit, cancel, &entry, None, kind);
}

fn deliver(
    visit: &VisitFn,
    cancel: &Cancellation,
    entry: &Entry,
    error: Option<&EntryError>,
    kind: EventKind,
) {
    let visit_arg = Visit {
        entry,
        error,
        event: Some(kind),
        cancel,
    };
    if let Err(err) = visit(&visit_arg) {
        warn!(path = %entry.path.display(), error = %err, "watch callback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::visit::visit_fn;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::Create.as_str(), "create");
        assert_eq!(EventKind::parse("chmod").unwrap(), EventKind::Chmod);
        assert!(EventKind::parse("explode").is_err());
    }

    #[test]
    fn test_canonical_mapping() {
        use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};

        assert_eq!(
            canonical_kind(&notify::EventKind::Create(CreateKind::File)),
            Some(EventKind::Create)
        );
        assert_eq!(
            canonical_kind(&notify::EventKind::Remove(RemoveKind::File)),
            Some(EventKind::Delete)
        );
        assert_eq!(
            canonical_kind(&notify::EventKind::Modify(ModifyKind::Name(
                RenameMode::Any
            ))),
            Some(EventKind::Rename)
        );
        assert_eq!(
            canonical_kind(&notify::EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            Some(EventKind::Chmod)
        );
        assert_eq!(
            canonical_kind(&notify::EventKind::Modify(ModifyKind::Any)),
            Some(EventKind::Modify)
        );
        assert_eq!(canonical_kind(&notify::EventKind::Access(
            notify::event::AccessKind::Any
        )), None);
    }

    #[test]
    fn test_relative_depth() {
        let root = Path::new("/data");
        assert_eq!(relative_depth(root, Path::new("/data")), 0);
        assert_eq!(relative_depth(root, Path::new("/data/a")), 1);
        assert_eq!(relative_depth(root, Path::new("/data/a/b/c")), 3);
    }

    #[test]
    fn test_event_set_membership() {
        let opts = WatchOptions {
            events: vec![EventKind::Create, EventKind::Modify],
            ..Default::default()
        };
        assert!(opts.wants(EventKind::Create));
        assert!(!opts.wants(EventKind::Delete));

        let all = WatchOptions::default();
        assert!(all.wants(EventKind::Delete));
    }

    #[test]
    fn test_watch_timeout_returns() {
        let dir = tempfile::tempdir().unwrap();
        let opts = WatchOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let cancel = Cancellation::new();
        let seen: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        // Expires on its own; no events required.
        watch(
            dir.path(),
            &opts,
            visit_fn(move |visit| {
                sink.lock().push(visit.entry.path.clone());
                Ok(crate::walker::visit::Flow::Continue)
            }),
            &cancel,
        )
        .unwrap();
    }

    #[test]
    fn test_watch_delivers_create_events() {
        let dir = tempfile::tempdir().unwrap();
        let opts = WatchOptions {
            events: vec![EventKind::Create, EventKind::Modify],
            timeout: Some(Duration::from_secs(2)),
            pattern: "*.log".into(),
            ..Default::default()
        };
        let cancel = Cancellation::new();
        let seen: Arc<Mutex<Vec<(PathBuf, EventKind)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let root = dir.path().to_path_buf();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            std::fs::write(root.join("hit.log"), b"x").unwrap();
            std::fs::write(root.join("miss.txt"), b"x").unwrap();
        });

        watch(
            dir.path(),
            &opts,
            visit_fn(move |visit| {
                if let Some(kind) = visit.event {
                    sink.lock().push((visit.entry.path.clone(), kind));
                }
                Ok(crate::walker::visit::Flow::Continue)
            }),
            &cancel,
        )
        .unwrap();
        writer.join().unwrap();

        let seen = seen.lock();
        assert!(
            seen.iter().any(|(p, _)| p.ends_with("hit.log")),
            "expected hit.log event, saw {:?}",
            *seen
        );
        assert!(
            !seen.iter().any(|(p, _)| p.ends_with("miss.txt")),
            "pattern should have filtered miss.txt"
        );
    }
}
