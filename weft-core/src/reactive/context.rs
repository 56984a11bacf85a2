//! Tracking context.
//!
//! The tracking context records which nodes a computation reads while it
//! runs. This enables automatic dependency discovery: when a node's value
//! is read, it registers itself into the innermost active frame, and the
//! computation that opened the frame collects the reads when it finishes.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Entering a run pushes a fresh
//! frame; leaving pops it. Nested runs (a derived node's compute function
//! reading another stale derived node, which recomputes inline) therefore
//! work without any bookkeeping on the caller's side: an inner run's reads
//! land in the inner frame only, and the outer frame resumes collecting
//! once control returns to it.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;

use super::node::{Dependency, NodeId};

thread_local! {
    static FRAME_STACK: RefCell<Vec<Frame>> = RefCell::new(Vec::new());
}

/// One frame: the de-duplicated, ordered reads of a single run.
struct Frame {
    reads: IndexMap<NodeId, Arc<dyn Dependency>>,
}

/// Guard for one tracking frame.
///
/// Popping on drop keeps the stack balanced even when the tracked closure
/// panics, so an aborted run never corrupts the frame an outer run is
/// still collecting into.
pub(crate) struct TrackingFrame {
    armed: bool,
}

impl TrackingFrame {
    /// Push a fresh frame onto this thread's stack.
    pub(crate) fn enter() -> Self {
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                reads: IndexMap::new(),
            });
        });
        Self { armed: true }
    }

    /// Pop the frame and return its reads in registration order.
    pub(crate) fn finish(mut self) -> Vec<Arc<dyn Dependency>> {
        self.armed = false;
        FRAME_STACK.with(|stack| {
            stack
                .borrow_mut()
                .pop()
                .map(|frame| frame.reads.into_values().collect())
                .unwrap_or_default()
        })
    }

    /// Whether any frame is active on this thread.
    pub(crate) fn is_active() -> bool {
        FRAME_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Register a read into the innermost frame, if any.
    ///
    /// Re-reads of a node already registered in this frame are ignored.
    pub(crate) fn register(dep: Arc<dyn Dependency>) {
        FRAME_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                frame.reads.entry(dep.id()).or_insert(dep);
            }
        });
    }
}

impl Drop for TrackingFrame {
    fn drop(&mut self) {
        if self.armed {
            FRAME_STACK.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
}

/// Run `f` inside a fresh tracking frame, returning the nodes it read
/// along with its result.
pub(crate) fn track_inputs<R>(f: impl FnOnce() -> R) -> (Vec<Arc<dyn Dependency>>, R) {
    let frame = TrackingFrame::enter();
    let result = f();
    (frame.finish(), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::node::Disconnect;

    struct MockDep {
        id: NodeId,
    }

    impl MockDep {
        fn new() -> Arc<Self> {
            Arc::new(Self { id: NodeId::next() })
        }
    }

    impl Dependency for MockDep {
        fn id(&self) -> NodeId {
            self.id
        }

        fn attach(self: Arc<Self>, _observer: Box<dyn Fn() + Send + Sync>) -> Disconnect {
            Box::new(|| {})
        }
    }

    #[test]
    fn frame_collects_reads_in_order() {
        let a = MockDep::new();
        let b = MockDep::new();

        let (reads, result) = track_inputs(|| {
            TrackingFrame::register(a.clone());
            TrackingFrame::register(b.clone());
            "done"
        });

        assert_eq!(result, "done");
        let ids: Vec<NodeId> = reads.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
    }

    #[test]
    fn repeated_reads_are_deduplicated() {
        let a = MockDep::new();

        let (reads, _) = track_inputs(|| {
            TrackingFrame::register(a.clone());
            TrackingFrame::register(a.clone());
            TrackingFrame::register(a.clone());
        });

        assert_eq!(reads.len(), 1);
    }

    #[test]
    fn register_without_frame_is_noop() {
        assert!(!TrackingFrame::is_active());
        TrackingFrame::register(MockDep::new());
        assert!(!TrackingFrame::is_active());
    }

    #[test]
    fn nested_frames_do_not_leak() {
        let outer_dep = MockDep::new();
        let inner_dep = MockDep::new();

        let (outer_reads, inner_reads) = {
            let (reads, inner) = track_inputs(|| {
                TrackingFrame::register(outer_dep.clone());

                let (inner_reads, _) = track_inputs(|| {
                    TrackingFrame::register(inner_dep.clone());
                });

                // The outer frame keeps collecting after the inner run.
                assert!(TrackingFrame::is_active());
                inner_reads
            });
            (reads, inner)
        };

        let outer_ids: Vec<NodeId> = outer_reads.iter().map(|d| d.id()).collect();
        let inner_ids: Vec<NodeId> = inner_reads.iter().map(|d| d.id()).collect();
        assert_eq!(outer_ids, vec![outer_dep.id()]);
        assert_eq!(inner_ids, vec![inner_dep.id()]);
    }

    #[test]
    fn panicking_run_unwinds_its_frame() {
        let outcome = std::panic::catch_unwind(|| {
            let _ = track_inputs(|| {
                panic!("compute failed");
            });
        });

        assert!(outcome.is_err());
        assert!(!TrackingFrame::is_active());
    }
}
