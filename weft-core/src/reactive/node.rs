//! Node identity and capabilities.
//!
//! Every reactive node, primitive or derived, has a unique [`NodeId`] and
//! implements the [`Node`] trait: read the current value, subscribe an
//! observer. The derived-only surface (staleness, lifecycle hooks, input
//! inspection) lives on the concrete [`Source`](super::Source) type, so
//! collaborators that need it must ask for a `Source` explicitly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a node in the dependency graph.
///
/// Ids double as the identity used when reconciling a derived node's input
/// set between runs: two reads refer to the same input exactly when their
/// ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Idempotent unsubscribe closure returned by [`Node::connect`].
///
/// Calling it removes exactly the registration it was returned for; calling
/// it again is a no-op.
pub type Disconnect = Box<dyn Fn() + Send + Sync>;

/// Common capability of every reactive node.
///
/// Implemented by [`Signal`](super::Signal) (primitive, externally mutated)
/// and [`Source`](super::Source) (derived, recomputed from its inputs).
pub trait Node {
    /// The value type held by this node.
    type Output: Clone + PartialEq + Send + Sync + 'static;

    /// This node's unique id.
    fn id(&self) -> NodeId;

    /// Read the current value, registering this node as a dependency of any
    /// computation currently being tracked.
    fn value(&self) -> Self::Output;

    /// Read the current value without registering a dependency.
    fn peek(&self) -> Self::Output;

    /// Subscribe an observer invoked with `(previous, next)` whenever this
    /// node's value changes. Returns the disconnect closure for exactly
    /// this registration.
    fn connect<F>(&self, observer: F) -> Disconnect
    where
        F: Fn(&Self::Output, &Self::Output) + Send + Sync + 'static;
}

/// Type-erased view of a node, used for dependency wiring.
///
/// A derived node's compute function may read nodes of arbitrary value
/// types; the tracking context collects them behind this trait so the
/// derived node can subscribe its re-run trigger to each of them uniformly.
pub(crate) trait Dependency: Send + Sync {
    /// This node's unique id.
    fn id(&self) -> NodeId;

    /// Subscribe an erased change observer.
    ///
    /// The returned disconnect closure, like the observer registration it
    /// tears down, holds only a weak reference to this node: the
    /// subscriber's bookkeeping never extends the node's lifetime.
    fn attach(self: Arc<Self>, observer: Box<dyn Fn() + Send + Sync>) -> Disconnect;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        let id1 = NodeId::next();
        let id2 = NodeId::next();
        let id3 = NodeId::next();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn raw_round_trips() {
        let id = NodeId::next();
        assert_eq!(id.raw(), id.raw());
    }
}
