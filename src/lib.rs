//! fswalk - Concurrent Filesystem Traversal and Search
//!
//! A high-throughput directory-tree walker that applies a rich predicate
//! (size, time, mode, owner, pattern, depth, type) to every entry and
//! dispatches matches to a user callback through a bounded worker pool.
//! A find mode layers richer predicates and per-match actions on top; a
//! watch mode delivers filesystem change notifications through the same
//! callback contract.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  plain walk  │   │     find     │   │    watch     │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        │                  │                  │
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!               one callback contract (Visit)
//!                           │
//! ┌─────────────────────────┴───────────────────────────┐
//! │                 Traversal Engine                    │
//! │  directories: synchronous on the enumerator thread  │
//! │  files: bounded channel → N worker threads          │
//! │                                                     │
//! │  Symlink Resolver ── shared visited set, cycles     │
//! │  Predicate Evaluator ── conjunctive filter clauses  │
//! │  Progress Accumulator ── atomic counters + ticker   │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fswalk::filter::FilterOptions;
//! use fswalk::walker::{visit_fn, Flow, Walker};
//! use std::path::Path;
//!
//! let walker = Walker::builder()
//!     .workers(8)
//!     .filter(FilterOptions {
//!         pattern: "*.log".into(),
//!         min_size: 1024,
//!         ..Default::default()
//!     })
//!     .build()
//!     .unwrap();
//!
//! let stats = walker
//!     .walk(
//!         Path::new("/var/log"),
//!         visit_fn(|visit| {
//!             println!("{}", visit.entry.path.display());
//!             Ok(Flow::Continue)
//!         }),
//!     )
//!     .unwrap();
//! println!("{} files, {} bytes", stats.files, stats.bytes);
//! ```

pub mod cancel;
pub mod config;
pub mod entry;
pub mod error;
pub mod filter;
pub mod find;
pub mod owner;
pub mod pattern;
pub mod progress;
pub mod symlink;
pub mod template;
pub mod walker;
pub mod watch;

pub use cancel::Cancellation;
pub use entry::{Entry, EntryKind};
pub use error::{ConfigError, EntryError, Result, WalkError};
pub use filter::FilterOptions;
pub use find::{find, find_with_exec, find_with_format, FindHandler, FindOptions};
pub use progress::{Counters, ProgressFn, Stats};
pub use symlink::SymlinkMode;
pub use walker::{visit_fn, ErrorMode, Flow, Visit, VisitFn, WalkStats, Walker, WalkerBuilder};
pub use watch::{watch, EventKind, WatchOptions};
