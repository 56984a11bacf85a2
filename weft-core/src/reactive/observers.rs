//! Observer registry shared by both node kinds.
//!
//! Observers are kept in connection order and removed by id, so a
//! disconnect closure can tear down exactly its own registration no matter
//! what was connected or disconnected in between. Notification passes run
//! over an owned snapshot taken up front: callbacks that connect or
//! disconnect observers mid-pass never affect which observers the
//! in-progress pass invokes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

/// Unique identifier for one observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ObserverId(u64);

impl ObserverId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An observer callback, invoked with `(previous, next)`.
pub(crate) type ObserverFn<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

/// Ordered observer registry.
pub(crate) struct ObserverList<T> {
    entries: IndexMap<ObserverId, ObserverFn<T>>,
}

impl<T> ObserverList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Append an observer, returning the id of the new registration.
    pub(crate) fn insert(&mut self, observer: ObserverFn<T>) -> ObserverId {
        let id = ObserverId::next();
        self.entries.insert(id, observer);
        id
    }

    /// Remove a registration by id. Returns whether it was still present,
    /// so callers can make double-removal a no-op.
    pub(crate) fn remove(&mut self, id: ObserverId) -> bool {
        // shift_remove keeps the remaining entries in connection order
        self.entries.shift_remove(&id).is_some()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Owned snapshot of the current registrations, in connection order.
    pub(crate) fn snapshot(&self) -> SmallVec<[ObserverFn<T>; 4]> {
        self.entries.values().cloned().collect()
    }
}
