//! The concurrent traversal engine.
//!
//! Scheduling is hybrid: directories are processed on the enumerating
//! thread, synchronously, so a SkipDir returned from the callback prunes
//! descent before any child is enqueued; files and other non-directory
//! entries are pushed as tasks into a bounded channel consumed by N worker
//! threads. The channel's capacity equals the worker count, so a saturated
//! pool applies backpressure to enumeration.
//!
//! ```text
//!                  ┌────────────────────────────┐
//!                  │     Enumerator thread      │
//!                  │  readdir → dirs inline,    │
//!                  │  files → bounded channel   │
//!                  └─────────────┬──────────────┘
//!                                │ capacity N
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!  ┌─────▼─────┐           ┌─────▼─────┐           ┌─────▼─────┐
//!  │ walker-0  │           │ walker-1  │           │ walker-N  │
//!  │ callback  │           │ callback  │           │ callback  │
//!  └───────────┘           └───────────┘           └───────────┘
//! ```
//!
//! Cancellation is cooperative and polled at three points: before a task
//! is enqueued, before a worker picks one up, and inside the enumeration
//! step. Delivery order across workers is unspecified; the only guarantee
//! is that a directory's callback returns before any of its descendants'
//! callbacks begin.

use crate::cancel::Cancellation;
use crate::entry::{clean_path, Entry};
use crate::error::{collapse, ConfigError, EntryError, Result, WalkError};
use crate::filter::FilterOptions;
use crate::pattern;
use crate::progress::{Counters, ProgressFn, ProgressPublisher};
use crate::symlink::{Resolved, SymlinkMode, SymlinkResolver};
use crate::walker::visit::{compose, Flow, MiddlewareFn, Visit, VisitFn};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Maximum reasonable worker count
pub const MAX_WORKERS: usize = 512;

/// How long a blocked channel send waits between cancellation polls.
const SEND_POLL: Duration = Duration::from_millis(50);

/// How errors encountered during traversal are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Report the error through the callback and keep walking
    #[default]
    Continue,
    /// Deliver the error; wind down on the first non-SkipDir error the
    /// callback returns
    Stop,
    /// Swallow the error at the engine; the entry is not delivered
    Skip,
}

impl ErrorMode {
    pub fn parse(mode: &str) -> std::result::Result<Self, ConfigError> {
        match mode {
            "continue" => Ok(ErrorMode::Continue),
            "stop" => Ok(ErrorMode::Stop),
            "skip" => Ok(ErrorMode::Skip),
            other => Err(ConfigError::UnknownErrorMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// Result of one complete walk.
#[derive(Debug, Clone, Default)]
pub struct WalkStats {
    pub files: u64,
    pub dirs: u64,
    pub empty_dirs: u64,
    pub bytes: u64,
    pub errors: u64,
    pub duration: Duration,
    pub completed: bool,
}

/// Lazily populated memo of directory exclusion decisions.
///
/// A directory is excluded when its base name, or any ancestor's base name
/// between it and the walk root, matches one of the exclusion globs.
#[derive(Debug, Default)]
struct ExcludedDirs {
    cache: RwLock<HashMap<PathBuf, bool>>,
}

impl ExcludedDirs {
    fn reset(&self) {
        self.cache.write().clear();
    }

    fn is_excluded(&self, path: &Path, root: &Path, globs: &[String]) -> bool {
        if globs.is_empty() {
            return false;
        }
        if let Some(&cached) = self.cache.read().get(path) {
            return cached;
        }

        let mut excluded = false;
        let mut current = path;
        loop {
            if let Some(name) = current.file_name() {
                let name = name.to_string_lossy();
                if globs.iter().any(|g| pattern::base_match(g, &name)) {
                    excluded = true;
                    break;
                }
            }
            if current == root {
                break;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        self.cache.write().insert(path.to_path_buf(), excluded);
        excluded
    }
}

/// A unit of work handed to the worker pool: one non-directory entry.
struct Task {
    entry: Entry,
}

/// State shared between the enumerator and the worker pool for the
/// duration of one walk.
struct Shared {
    visit: VisitFn,
    counters: Arc<Counters>,
    errors: Mutex<Vec<WalkError>>,
    halted: AtomicBool,
    cancel: Cancellation,
    error_mode: ErrorMode,
    root: PathBuf,
}

impl Shared {
    /// Record an error returned by the callback, wrapping foreign error
    /// kinds so the collected value always names the path. Under the stop
    /// policy the first such error winds the walk down.
    fn record_callback_error(&self, path: &Path, err: WalkError) {
        let collected = match err {
            err @ (WalkError::Callback { .. } | WalkError::Cancelled | WalkError::Entry(_)) => err,
            other => WalkError::callback(path, other.to_string()),
        };
        self.errors.lock().push(collected);
        if self.error_mode == ErrorMode::Stop {
            self.halted.store(true, Ordering::SeqCst);
        }
    }

    fn record_cancellation(&self) {
        let mut errors = self.errors.lock();
        if !errors.iter().any(|e| e.is_cancelled()) {
            errors.push(WalkError::Cancelled);
        }
    }

    fn winding_down(&self) -> bool {
        self.halted.load(Ordering::Relaxed) || self.cancel.is_cancelled()
    }
}

/// Signal from the enumeration step to its caller.
enum Descend {
    Continue,
    Halt,
}

/// Outcome of a synchronous directory delivery.
enum DirOutcome {
    Descend,
    Prune,
    Halt,
}

/// The concurrent traversal engine.
///
/// A `Walker` owns its symlink visited-set and excluded-directory cache;
/// both reset at each call to [`walk`](Self::walk). Each walk instantiates
/// its own worker pool, so separate `Walker` values may traverse
/// concurrently in the same process.
pub struct Walker {
    workers: usize,
    filter: FilterOptions,
    symlink_mode: SymlinkMode,
    error_mode: ErrorMode,
    cancel: Cancellation,
    progress: Option<ProgressFn>,
    middleware: Vec<MiddlewareFn>,
    resolver: SymlinkResolver,
    excluded: ExcludedDirs,
}

impl Walker {
    /// A walker with the given concurrency limit and default options.
    pub fn new(workers: usize) -> std::result::Result<Self, ConfigError> {
        WalkerBuilder::default().workers(workers).build()
    }

    pub fn builder() -> WalkerBuilder {
        WalkerBuilder::default()
    }

    /// The cancellation handle polled by this walker.
    pub fn cancellation(&self) -> Cancellation {
        self.cancel.clone()
    }

    /// Traverse the subtree rooted at `root`, delivering each accepted
    /// entry to `visit` exactly once.
    pub fn walk(&self, root: &Path, visit: VisitFn) -> Result<WalkStats> {
        let start = Instant::now();
        self.resolver.reset();
        self.excluded.reset();

        let root = clean_path(root);
        // Resolve symlinked ancestors so visited-set and exclusion checks
        // compare canonical paths. A root that is itself a symlink stays
        // lexical here; the symlink mode decides its fate.
        let root = match fs::symlink_metadata(&root) {
            Ok(meta) if !meta.file_type().is_symlink() => {
                fs::canonicalize(&root).unwrap_or(root)
            }
            _ => root,
        };
        let counters = Arc::new(Counters::new());
        let publisher = self
            .progress
            .as_ref()
            .map(|cb| ProgressPublisher::spawn(Arc::clone(&counters), Arc::clone(cb)));

        let visit = compose(&self.middleware, visit);
        let shared = Arc::new(Shared {
            visit,
            counters: Arc::clone(&counters),
            errors: Mutex::new(Vec::new()),
            halted: AtomicBool::new(false),
            cancel: self.cancel.clone(),
            error_mode: self.error_mode,
            root: root.clone(),
        });

        let (tx, rx) = bounded::<Task>(self.workers);
        let handles = self.spawn_workers(&rx, &shared);
        drop(rx);

        debug!(root = %root.display(), workers = self.workers, "starting walk");
        self.walk_root(&root, &shared, &tx);

        // Close the channel so workers drain and exit.
        drop(tx);
        for handle in handles {
            let _ = handle.join();
        }

        if self.cancel.is_cancelled() {
            shared.record_cancellation();
        }
        if let Some(publisher) = publisher {
            publisher.finish();
        }

        let completed = !self.cancel.is_cancelled() && !shared.halted.load(Ordering::Relaxed);
        let snapshot = counters.snapshot(start.elapsed());
        let stats = WalkStats {
            files: snapshot.files_processed,
            dirs: snapshot.dirs_processed,
            empty_dirs: snapshot.empty_dirs,
            bytes: snapshot.bytes_processed,
            errors: snapshot.error_count,
            duration: start.elapsed(),
            completed,
        };

        let collected = std::mem::take(&mut *shared.errors.lock());
        match collapse(collected) {
            Some(err) => Err(err),
            None => Ok(stats),
        }
    }

    fn spawn_workers(&self, rx: &Receiver<Task>, shared: &Arc<Shared>) -> Vec<JoinHandle<()>> {
        (0..self.workers)
            .map(|id| {
                let rx = rx.clone();
                let shared = Arc::clone(shared);
                thread::Builder::new()
                    .name(format!("walker-{}", id))
                    .spawn(move || worker_loop(id, rx, shared))
                    .expect("failed to spawn worker thread")
            })
            .collect()
    }

    /// Resolve and deliver the root, then enumerate beneath it.
    fn walk_root(&self, root: &Path, shared: &Arc<Shared>, tx: &Sender<Task>) {
        let resolved = match self.resolver.resolve(root, self.symlink_mode) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.handle_entry_error(shared, root.to_path_buf(), 0, err);
                return;
            }
        };

        let (effective, meta, marked) = match resolved {
            Resolved::NotLink(meta) => (root.to_path_buf(), meta, false),
            Resolved::Link(meta) => (root.to_path_buf(), meta, false),
            Resolved::Followed { target, metadata } => (target, metadata, true),
            Resolved::Ignored | Resolved::Cycle => return,
        };

        let entry = Entry::from_metadata(effective.clone(), &meta, 0);

        if entry.is_dir() {
            // Insert-before-descend: in follow mode every walked directory
            // joins the visited set, so links back to it detect as cycles.
            if self.symlink_mode == SymlinkMode::Follow
                && !marked
                && !self.resolver.mark_dir(&effective)
            {
                return;
            }
            if self.filter.matches(&entry) {
                match self.deliver_dir(shared, &entry) {
                    DirOutcome::Descend => {}
                    DirOutcome::Prune | DirOutcome::Halt => return,
                }
            }
            let _ = self.enumerate(shared, tx, &effective, 0);
        } else {
            // Single-entry walk over a file root.
            if self.filter.matches(&entry) {
                shared.counters.add_file(entry.size);
                self.send_task(shared, tx, Task { entry });
            }
        }
    }

    /// Enumerate one directory, dispatching children. `depth` is the
    /// directory's own depth; children are at `depth + 1`.
    fn enumerate(
        &self,
        shared: &Arc<Shared>,
        tx: &Sender<Task>,
        dir: &Path,
        depth: usize,
    ) -> Descend {
        if shared.winding_down() {
            return Descend::Halt;
        }

        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(err) => {
                let entry_err = EntryError::read_dir(dir, &err);
                return self.handle_entry_error(shared, dir.to_path_buf(), depth, entry_err);
            }
        };

        let child_depth = depth + 1;
        let mut children = Vec::new();

        for dirent in read {
            match dirent {
                Ok(dirent) => children.push(dirent),
                Err(err) => {
                    let entry_err = EntryError::read_dir(dir, &err);
                    match self.handle_entry_error(shared, dir.to_path_buf(), depth, entry_err) {
                        Descend::Continue => continue,
                        Descend::Halt => return Descend::Halt,
                    }
                }
            }
        }
        shared.counters.add_dir(children.is_empty());

        for dirent in children {
            if shared.winding_down() {
                if self.cancel.is_cancelled() {
                    shared.record_cancellation();
                }
                return Descend::Halt;
            }
            if let Descend::Halt =
                self.visit_child(shared, tx, dirent.path(), child_depth)
            {
                return Descend::Halt;
            }
        }

        Descend::Continue
    }

    /// Resolve, filter, and dispatch one child entry.
    fn visit_child(
        &self,
        shared: &Arc<Shared>,
        tx: &Sender<Task>,
        child_path: PathBuf,
        child_depth: usize,
    ) -> Descend {
        let resolved = match self.resolver.resolve(&child_path, self.symlink_mode) {
            Ok(resolved) => resolved,
            Err(err) => {
                return self.handle_entry_error(shared, child_path, child_depth, err);
            }
        };

        let (effective, meta, via_link) = match resolved {
            Resolved::NotLink(meta) => (child_path, meta, false),
            // Reported links are delivered as links and never descended.
            Resolved::Link(meta) => (child_path, meta, false),
            Resolved::Followed { target, metadata } => (target, metadata, true),
            Resolved::Ignored => return Descend::Continue,
            Resolved::Cycle => {
                debug!(path = %child_path.display(), "skipping cyclic symlink");
                return Descend::Continue;
            }
        };

        let entry = Entry::from_metadata(effective, &meta, child_depth);

        if entry.is_dir() {
            self.descend_into(shared, tx, entry, via_link)
        } else {
            self.dispatch_file(shared, tx, entry)
        }
    }

    /// Handle a directory child: prune, deliver synchronously, recurse.
    fn descend_into(
        &self,
        shared: &Arc<Shared>,
        tx: &Sender<Task>,
        entry: Entry,
        already_marked: bool,
    ) -> Descend {
        let max_depth = self.filter.max_depth;
        if max_depth > 0 && entry.depth > max_depth {
            return Descend::Continue;
        }
        if self
            .excluded
            .is_excluded(&entry.path, &shared.root, &self.filter.exclude_dirs)
        {
            debug!(path = %entry.path.display(), "pruning excluded directory");
            return Descend::Continue;
        }

        // Insert-before-descend: under follow mode every directory we
        // walk joins the visited set (followed link targets were inserted
        // by the resolver already), so a later link back to this directory
        // is detected as a cycle rather than re-walked.
        if self.symlink_mode == SymlinkMode::Follow
            && !already_marked
            && !self.resolver.mark_dir(&entry.path)
        {
            debug!(path = %entry.path.display(), "directory already visited");
            return Descend::Continue;
        }

        // Depth and predicate gate the delivery, never the descent: a
        // directory that fails the filter is still walked for children
        // that may pass it.
        if self.filter.matches(&entry) {
            match self.deliver_dir(shared, &entry) {
                DirOutcome::Descend => {}
                DirOutcome::Prune => return Descend::Continue,
                DirOutcome::Halt => return Descend::Halt,
            }
        }

        let path = entry.path.clone();
        let depth = entry.depth;
        self.enumerate(shared, tx, &path, depth)
    }

    /// Deliver a directory callback on the enumerating thread.
    fn deliver_dir(&self, shared: &Arc<Shared>, entry: &Entry) -> DirOutcome {
        let visit = Visit {
            entry,
            error: None,
            event: None,
            cancel: &self.cancel,
        };
        match (shared.visit)(&visit) {
            Ok(Flow::SkipDir) => DirOutcome::Prune,
            Ok(Flow::Continue) => DirOutcome::Descend,
            Err(err) => {
                shared.record_callback_error(&entry.path, err);
                if shared.halted.load(Ordering::Relaxed) {
                    DirOutcome::Halt
                } else {
                    DirOutcome::Descend
                }
            }
        }
    }

    /// Filter a non-directory entry and push it to the worker pool.
    fn dispatch_file(&self, shared: &Arc<Shared>, tx: &Sender<Task>, entry: Entry) -> Descend {
        let min_depth = self.filter.min_depth;
        if min_depth > 0 && entry.depth < min_depth {
            // Below min-depth entries are dropped silently, without
            // counting toward files processed.
            return Descend::Continue;
        }
        let max_depth = self.filter.max_depth;
        if max_depth > 0 && entry.depth > max_depth {
            return Descend::Continue;
        }
        if !self.filter.matches(&entry) {
            return Descend::Continue;
        }

        shared.counters.add_file(entry.size);
        self.send_task(shared, tx, Task { entry })
    }

    /// Blocking send with cancellation polling; the bounded channel is the
    /// backpressure on enumeration rate.
    fn send_task(&self, shared: &Arc<Shared>, tx: &Sender<Task>, task: Task) -> Descend {
        let mut task = task;
        loop {
            if shared.winding_down() {
                if self.cancel.is_cancelled() {
                    shared.record_cancellation();
                }
                return Descend::Halt;
            }
            match tx.send_timeout(task, SEND_POLL) {
                Ok(()) => return Descend::Continue,
                Err(SendTimeoutError::Timeout(returned)) => task = returned,
                Err(SendTimeoutError::Disconnected(_)) => {
                    warn!("worker pool disconnected while enumerating");
                    return Descend::Halt;
                }
            }
        }
    }

    /// Route a per-entry error through the error policy.
    fn handle_entry_error(
        &self,
        shared: &Arc<Shared>,
        path: PathBuf,
        depth: usize,
        err: EntryError,
    ) -> Descend {
        shared.counters.add_error();

        match self.error_mode {
            ErrorMode::Skip => {
                debug!(path = %path.display(), error = %err, "skipping entry error");
                Descend::Continue
            }
            ErrorMode::Continue | ErrorMode::Stop => {
                shared.errors.lock().push(WalkError::Entry(err.clone()));

                let placeholder = Entry::placeholder(path, depth);
                let visit = Visit {
                    entry: &placeholder,
                    error: Some(&err),
                    event: None,
                    cancel: &self.cancel,
                };
                match (shared.visit)(&visit) {
                    Ok(_) => Descend::Continue,
                    Err(callback_err) => {
                        // The callback echoing the same error back adds no
                        // information; anything else is collected too.
                        let delivered = WalkError::Entry(err);
                        if !callback_err.same_as(&delivered) {
                            shared.record_callback_error(&placeholder.path, callback_err);
                        } else if self.error_mode == ErrorMode::Stop {
                            shared.halted.store(true, Ordering::SeqCst);
                        }
                        if shared.halted.load(Ordering::Relaxed) {
                            Descend::Halt
                        } else {
                            Descend::Continue
                        }
                    }
                }
            }
        }
    }
}

/// Worker thread body: pull tasks, invoke the callback, record failures.
fn worker_loop(id: usize, rx: Receiver<Task>, shared: Arc<Shared>) {
    debug!("worker {} started", id);

    for task in rx.iter() {
        if shared.cancel.is_cancelled() {
            debug!(
                "worker {} discarding '{}' after cancellation",
                id,
                task.entry.path.display()
            );
            continue;
        }
        if shared.halted.load(Ordering::Relaxed) {
            continue;
        }

        let visit = Visit {
            entry: &task.entry,
            error: None,
            event: None,
            cancel: &shared.cancel,
        };
        match (shared.visit)(&visit) {
            // SkipDir on a non-directory is equivalent to success.
            Ok(_) => {}
            Err(err) => shared.record_callback_error(&task.entry.path, err),
        }
    }

    debug!("worker {} finished", id);
}

/// Builder for [`Walker`], composing filter, policies, and middleware.
pub struct WalkerBuilder {
    workers: usize,
    filter: FilterOptions,
    symlink_mode: SymlinkMode,
    error_mode: ErrorMode,
    cancel: Option<Cancellation>,
    progress: Option<ProgressFn>,
    middleware: Vec<MiddlewareFn>,
}

impl Default for WalkerBuilder {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            filter: FilterOptions::default(),
            symlink_mode: SymlinkMode::default(),
            error_mode: ErrorMode::default(),
            cancel: None,
            progress: None,
            middleware: Vec::new(),
        }
    }
}

impl WalkerBuilder {
    /// Concurrency limit: the number of file-granularity callbacks that
    /// may run in parallel.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn filter(mut self, filter: FilterOptions) -> Self {
        self.filter = filter;
        self
    }

    pub fn symlink_mode(mut self, mode: SymlinkMode) -> Self {
        self.symlink_mode = mode;
        self
    }

    pub fn error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    pub fn cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Periodic progress callback; invoked from the publisher thread.
    pub fn progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Register a middleware wrapper. The first registered wrapper is the
    /// outermost at invocation time.
    pub fn middleware<F>(mut self, wrapper: F) -> Self
    where
        F: Fn(VisitFn) -> VisitFn + Send + Sync + 'static,
    {
        self.middleware.push(Box::new(wrapper));
        self
    }

    pub fn build(self) -> std::result::Result<Walker, ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::InvalidWorkerCount {
                count: self.workers,
                max: MAX_WORKERS,
            });
        }

        Ok(Walker {
            workers: self.workers,
            filter: self.filter,
            symlink_mode: self.symlink_mode,
            error_mode: self.error_mode,
            cancel: self.cancel.unwrap_or_default(),
            progress: self.progress,
            middleware: self.middleware,
            resolver: SymlinkResolver::new(),
            excluded: ExcludedDirs::default(),
        })
    }
}
