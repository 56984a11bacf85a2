//! Signal implementation.
//!
//! A Signal is the primitive reactive node: a mutable value cell whose
//! updates are driven entirely from outside the engine.
//!
//! # How Signals work
//!
//! 1. When a signal is read inside a tracked computation, the signal
//!    registers itself into the active tracking frame.
//!
//! 2. When a signal's value is replaced with one that compares unequal,
//!    every connected observer is invoked synchronously, in connection
//!    order, with the previous and next values.
//!
//! 3. Observers are invoked against a snapshot of the observer list taken
//!    when notification starts, so connecting or disconnecting from inside
//!    a callback never changes which observers the current pass invokes.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::context::TrackingFrame;
use super::node::{Dependency, Disconnect, Node, NodeId};
use super::observers::{ObserverFn, ObserverId, ObserverList};

/// A reactive signal holding a value of type `T`.
///
/// Cloning a `Signal` yields another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let disconnect = count.connect(|previous, next| {
///     println!("count: {previous} -> {next}");
/// });
///
/// count.reset(5);   // observer fires with (0, 5)
/// disconnect();
/// ```
pub struct Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) inner: Arc<SignalInner<T>>,
}

pub(crate) struct SignalInner<T> {
    /// Unique identifier for this signal.
    id: NodeId,

    /// The current value.
    state: RwLock<T>,

    /// Connected observers, in connection order.
    observers: Mutex<ObserverList<T>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: NodeId::next(),
                state: RwLock::new(initial),
                observers: Mutex::new(ObserverList::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If a computation is being tracked on this thread, the signal also
    /// registers itself as one of that computation's inputs.
    pub fn value(&self) -> T {
        if TrackingFrame::is_active() {
            TrackingFrame::register(self.inner.clone());
        }
        self.inner.state.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn peek(&self) -> T {
        self.inner.state.read().clone()
    }

    /// Replace the value unconditionally.
    ///
    /// If the new value compares unequal to the previous one, every
    /// connected observer is invoked synchronously before `reset` returns.
    pub fn reset(&self, next: T) {
        let previous = {
            let mut state = self.inner.state.write();
            std::mem::replace(&mut *state, next.clone())
        };

        if previous != next {
            self.inner.notify(&previous, &next);
        }
    }

    /// Replace the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let state = self.inner.state.read();
            f(&state)
        };
        self.reset(next);
    }

    /// Subscribe an observer invoked with `(previous, next)` on every
    /// change. Returns the disconnect closure for this registration;
    /// calling it more than once is a no-op.
    pub fn connect<F>(&self, observer: F) -> Disconnect
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let id = self.inner.observers.lock().insert(Arc::new(observer));
        SignalInner::disconnector(Arc::downgrade(&self.inner), id)
    }

    /// Get the number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

impl<T> SignalInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Invoke every observer registered at call time, in connection order.
    fn notify(&self, previous: &T, next: &T) {
        let snapshot = self.observers.lock().snapshot();
        tracing::trace!(id = self.id.raw(), observers = snapshot.len(), "signal changed");
        for observer in snapshot {
            observer(previous, next);
        }
    }

    /// Build the disconnect closure for one registration.
    ///
    /// Holds only a weak reference, so outstanding disconnectors never keep
    /// the signal alive.
    fn disconnector(inner: Weak<Self>, id: ObserverId) -> Disconnect {
        Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.observers.lock().remove(id);
            }
        })
    }

    pub(crate) fn subscribe(&self, observer: ObserverFn<T>) -> ObserverId {
        self.observers.lock().insert(observer)
    }
}

impl<T> Dependency for SignalInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn attach(self: Arc<Self>, observer: Box<dyn Fn() + Send + Sync>) -> Disconnect {
        let id = self.subscribe(Arc::new(move |_previous: &T, _next: &T| observer()));
        SignalInner::disconnector(Arc::downgrade(&self), id)
    }
}

impl<T> Node for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Output = T;

    fn id(&self) -> NodeId {
        Signal::id(self)
    }

    fn value(&self) -> T {
        Signal::value(self)
    }

    fn peek(&self) -> T {
        Signal::peek(self)
    }

    fn connect<F>(&self, observer: F) -> Disconnect
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        Signal::connect(self, observer)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + PartialEq + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id())
            .field("value", &self.peek())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}
