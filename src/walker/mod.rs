//! Concurrent directory traversal.
//!
//! [`Walker`] drives the walk: directories are enumerated synchronously so
//! SkipDir can prune descent, files fan out to a bounded worker pool. The
//! callback contract shared by every front of the crate lives in
//! [`visit`].

pub mod engine;
pub mod visit;

pub use engine::{ErrorMode, WalkStats, Walker, WalkerBuilder, MAX_WORKERS};
pub use visit::{visit_fn, Flow, MiddlewareFn, Visit, VisitFn};
