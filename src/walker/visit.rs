//! The callback contract between the engine and its callers.
//!
//! Every front (plain walk, find, watch) funnels entries through a single
//! callback shape: a function receiving a [`Visit`] and returning a
//! [`Flow`] or an error. Progress reporting and middleware are separate,
//! optional channels rather than overloads of this signature.

use crate::cancel::Cancellation;
use crate::entry::Entry;
use crate::error::{EntryError, WalkError};
use crate::watch::EventKind;
use std::path::Path;
use std::sync::Arc;

/// Outcome of a callback invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep walking.
    Continue,
    /// When returned for a directory: do not descend into it. Returning
    /// this for a non-directory is equivalent to [`Flow::Continue`].
    SkipDir,
}

/// One callback invocation.
///
/// For ordinary deliveries `error` is `None` and `entry` reflects a single
/// enumeration-time stat. For error-path invocations (under the continue
/// and stop policies) `error` carries the entry error and `entry` is a
/// placeholder holding only the path and depth. Watch dispatch annotates
/// the originating event kind.
pub struct Visit<'a> {
    /// The entry being delivered
    pub entry: &'a Entry,

    /// Set on error-path invocations
    pub error: Option<&'a EntryError>,

    /// Set when dispatched from the watch adapter
    pub event: Option<EventKind>,

    /// The walk's cancellation handle
    pub cancel: &'a Cancellation,
}

impl Visit<'_> {
    /// The path this invocation refers to.
    pub fn path(&self) -> &Path {
        &self.entry.path
    }

    /// Whether this is an error-path invocation.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The walk callback. Invoked concurrently from many workers; must be
/// thread-safe.
pub type VisitFn = Arc<dyn Fn(&Visit<'_>) -> Result<Flow, WalkError> + Send + Sync>;

/// Wrap a closure into a [`VisitFn`].
pub fn visit_fn<F>(f: F) -> VisitFn
where
    F: Fn(&Visit<'_>) -> Result<Flow, WalkError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A middleware wrapper: receives the downstream callback and returns a
/// new one. Wrappers registered on the builder compose so that the first
/// registered is outermost.
pub type MiddlewareFn = Box<dyn Fn(VisitFn) -> VisitFn + Send + Sync>;

/// Compose middleware around the innermost callback. Applied in reverse
/// registration order so the first registered wrapper sees every
/// invocation first.
pub(crate) fn compose(middleware: &[MiddlewareFn], innermost: VisitFn) -> VisitFn {
    let mut wrapped = innermost;
    for mw in middleware.iter().rev() {
        wrapped = mw(wrapped);
    }
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    #[test]
    fn test_skipdir_is_distinct_from_continue() {
        assert_ne!(Flow::Continue, Flow::SkipDir);
    }

    #[test]
    fn test_middleware_composition_order() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let make_layer = |label: &'static str, order: Arc<Mutex<Vec<&'static str>>>| -> MiddlewareFn {
            Box::new(move |next: VisitFn| {
                let order = Arc::clone(&order);
                let label = label;
                visit_fn(move |visit| {
                    order.lock().push(label);
                    next(visit)
                })
            })
        };

        let middleware = vec![
            make_layer("first", Arc::clone(&order)),
            make_layer("second", Arc::clone(&order)),
        ];

        let inner_order = Arc::clone(&order);
        let inner = visit_fn(move |_visit| {
            inner_order.lock().push("inner");
            Ok(Flow::Continue)
        });

        let composed = compose(&middleware, inner);

        let entry = Entry::placeholder(PathBuf::from("/x"), 0);
        let cancel = Cancellation::new();
        let visit = Visit {
            entry: &entry,
            error: None,
            event: None,
            cancel: &cancel,
        };
        composed(&visit).unwrap();

        // First registered is outermost: it runs before everything else
        assert_eq!(*order.lock(), vec!["first", "second", "inner"]);
    }
}
