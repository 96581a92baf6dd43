//! Progress accounting and reporting.
//!
//! The engine increments a set of atomic counters at the point of entry
//! acceptance; a publisher thread periodically snapshots them, computes
//! the derived rate and average, and invokes the progress callback. A
//! final snapshot is published unconditionally when the walk completes or
//! exits early.
//!
//! The display half of this module (spinner, header, summary) is only used
//! by the CLI binary.

use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Publish period for the progress ticker.
const PUBLISH_PERIOD: Duration = Duration::from_millis(250);

/// Atomic traversal counters, shared between the enumerator, the workers,
/// and the publisher thread. Every counter is monotonic for the life of a
/// walk.
#[derive(Debug, Default)]
pub struct Counters {
    files: AtomicU64,
    dirs: AtomicU64,
    empty_dirs: AtomicU64,
    bytes: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file passing the predicate.
    pub fn add_file(&self, size: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size, Ordering::Relaxed);
    }

    /// Record a successful directory enumeration.
    pub fn add_dir(&self, empty: bool) {
        self.dirs.fetch_add(1, Ordering::Relaxed);
        if empty {
            self.empty_dirs.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an error escalated through the error policy.
    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy with derived fields. Readers may observe
    /// slightly stale values between related counters; each individual
    /// counter is monotonic.
    pub fn snapshot(&self, elapsed: Duration) -> Stats {
        let files = self.files.load(Ordering::Relaxed);
        let bytes = self.bytes.load(Ordering::Relaxed);

        let avg_file_size = if files > 0 { bytes / files } else { 0 };
        let elapsed_secs = elapsed.as_secs_f64();
        let speed_mb_per_sec = if elapsed_secs > 0.0 && bytes > 0 {
            (bytes as f64 / 1_048_576.0) / elapsed_secs
        } else {
            0.0
        };

        Stats {
            files_processed: files,
            dirs_processed: self.dirs.load(Ordering::Relaxed),
            empty_dirs: self.empty_dirs.load(Ordering::Relaxed),
            bytes_processed: bytes,
            error_count: self.errors.load(Ordering::Relaxed),
            elapsed,
            avg_file_size,
            speed_mb_per_sec,
        }
    }
}

/// A point-in-time copy of the traversal counters plus derived fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    /// Files accepted by the predicate
    pub files_processed: u64,

    /// Directories successfully enumerated
    pub dirs_processed: u64,

    /// Directories whose enumeration yielded no entries
    pub empty_dirs: u64,

    /// Total bytes across accepted files
    pub bytes_processed: u64,

    /// Errors escalated through the error policy
    pub error_count: u64,

    /// Time since the walk started
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed: Duration,

    /// Derived: bytes / files (0 when no files yet)
    pub avg_file_size: u64,

    /// Derived: MB processed per second
    pub speed_mb_per_sec: f64,
}

fn serialize_elapsed<S>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(elapsed.as_secs_f64())
}

/// Progress callback. Invoked from the publisher thread, potentially
/// concurrently with user callbacks; implementations must be thread-safe
/// and should not block for long.
pub type ProgressFn = Arc<dyn Fn(Stats) + Send + Sync>;

/// Periodic publisher for progress snapshots.
///
/// Spawns a ticker thread on construction; [`finish`](Self::finish) stops
/// the ticker and publishes the final snapshot unconditionally.
pub struct ProgressPublisher {
    counters: Arc<Counters>,
    callback: ProgressFn,
    start: Instant,
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressPublisher {
    pub fn spawn(counters: Arc<Counters>, callback: ProgressFn) -> Self {
        let start = Instant::now();
        let done = Arc::new(AtomicBool::new(false));

        let ticker_counters = Arc::clone(&counters);
        let ticker_callback = Arc::clone(&callback);
        let ticker_done = Arc::clone(&done);

        let handle = thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || {
                while !ticker_done.load(Ordering::Relaxed) {
                    thread::sleep(PUBLISH_PERIOD);
                    if ticker_done.load(Ordering::Relaxed) {
                        break;
                    }
                    ticker_callback(ticker_counters.snapshot(start.elapsed()));
                }
            })
            .expect("failed to spawn progress thread");

        Self {
            counters,
            callback,
            start,
            done,
            handle: Some(handle),
        }
    }

    /// Stop the ticker and publish the final snapshot.
    pub fn finish(mut self) -> Stats {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let final_stats = self.counters.snapshot(self.start.elapsed());
        (self.callback)(final_stats.clone());
        final_stats
    }
}

impl Drop for ProgressPublisher {
    fn drop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spinner-based progress display for the CLI.
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .expect("Invalid progress template")
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display from a snapshot.
    pub fn update(&self, stats: &Stats) {
        let msg = format!(
            "Dirs: {} | Files: {} | Size: {} | {:.2} MB/s | Errors: {} | {}",
            format_number(stats.dirs_processed),
            format_number(stats.files_processed),
            format_size(stats.bytes_processed, BINARY),
            stats.speed_mb_per_sec,
            format_number(stats.error_count),
            format_elapsed(stats.elapsed),
        );
        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Format an elapsed duration as h/m/s
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h{:02}m{:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Print a summary of the walk results
pub fn print_summary(stats: &Stats) {
    println!();
    println!("{}", style("Walk Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(stats.dirs_processed)
    );
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(stats.files_processed)
    );
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(stats.bytes_processed, BINARY)
    );
    if stats.empty_dirs > 0 {
        println!(
            "  {} {}",
            style("Empty Dirs:").bold(),
            format_number(stats.empty_dirs)
        );
    }
    println!(
        "  {} {} ({:.2} MB/s)",
        style("Duration:").bold(),
        format_elapsed(stats.elapsed),
        stats.speed_mb_per_sec
    );
    if stats.error_count > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(stats.error_count)
        );
    }
    println!();
}

/// Print a header at the start of the walk
pub fn print_header(root: &str, workers: usize) {
    println!();
    println!(
        "{} {}",
        style("fswalk").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!();
}
