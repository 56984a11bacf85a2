//! Source implementation.
//!
//! A Source is a derived node: a value cell whose content is computed by a
//! function over other nodes. The function's inputs are discovered
//! automatically — whatever nodes it reads during a run become the
//! Source's subscriptions until the next run says otherwise.
//!
//! # How Sources work
//!
//! 1. A fresh Source is stale. The first read runs the compute function
//!    inside a tracking frame and caches the result.
//!
//! 2. The nodes read during the run are diffed against the previous run's
//!    inputs: newly-read nodes are subscribed, no-longer-read nodes are
//!    unsubscribed via the disconnector stored when they were added.
//!
//! 3. While subscriptions are live, an upstream change re-runs the Source
//!    immediately — propagation is push-based and synchronous, with no
//!    scheduler in between. A node reachable along several paths of a
//!    diamond-shaped graph re-runs once per converging path.
//!
//! 4. When the last observer disconnects, the Source frees itself: it
//!    drops its subscriptions and cache and fires its on-free callbacks.
//!    Any later read revives it with a fresh run.
//!
//! # Hazard
//!
//! A cyclic subscription graph is not detected. A Source whose compute
//! function reads itself, directly or through other nodes, recurses until
//! the stack overflows. No lock is held across compute execution or
//! observer invocation, so the cycle surfaces as recursion, never as a
//! deadlock.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use super::context::{track_inputs, TrackingFrame};
use super::diff::diff_inputs;
use super::node::{Dependency, Disconnect, Node, NodeId};
use super::observers::{ObserverId, ObserverList};

/// A derived reactive node computed from other nodes.
///
/// Cloning a `Source` yields another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let base = Signal::new(2);
/// let doubled = Source::new({
///     let base = base.clone();
///     move || base.value() * 2
/// });
///
/// let disconnect = doubled.connect(|previous, next| {
///     println!("doubled: {previous} -> {next}");
/// });
///
/// base.reset(5);   // doubled recomputes to 10 before reset returns
/// disconnect();    // last observer gone: doubled frees itself
/// ```
pub struct Source<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) inner: Arc<SourceInner<T>>,
}

pub(crate) struct SourceInner<T> {
    /// Unique identifier for this source.
    id: NodeId,

    /// The compute function. Reads its inputs solely through other nodes'
    /// `value()`.
    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// Cached result of the latest successful run, if any.
    state: RwLock<Option<T>>,

    /// Whether the cache is stale and a read must recompute first.
    dirty: AtomicBool,

    /// Currently-subscribed inputs in the read order of the latest run,
    /// each owning the disconnector obtained when subscribing to it. The
    /// disconnector captures only a weak reference to the input, so this
    /// association never keeps an input alive.
    inputs: Mutex<IndexMap<NodeId, Disconnect>>,

    /// Connected observers, in connection order.
    observers: Mutex<ObserverList<T>>,

    /// Callbacks fired the next time this source frees itself.
    on_free: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl<T> Source<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a derived node with the given compute function.
    ///
    /// The function does not run yet; the first read runs it.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(Box::new(compute), None)
    }

    /// Create a derived node with a pre-seeded value.
    ///
    /// The node still starts stale, so the first read recomputes rather
    /// than returning the seed.
    pub fn with_initial<F>(compute: F, initial: T) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(Box::new(compute), Some(initial))
    }

    fn build(compute: Box<dyn Fn() -> T + Send + Sync>, initial: Option<T>) -> Self {
        Self {
            inner: Arc::new(SourceInner {
                id: NodeId::next(),
                compute,
                state: RwLock::new(initial),
                dirty: AtomicBool::new(true),
                inputs: Mutex::new(IndexMap::new()),
                observers: Mutex::new(ObserverList::new()),
                on_free: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Get the source's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Whether the cache is stale. Does not trigger a recompute.
    pub fn dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Get the current value, recomputing first if stale.
    ///
    /// If a computation is being tracked on this thread, the source also
    /// registers itself as one of that computation's inputs.
    pub fn value(&self) -> T {
        if TrackingFrame::is_active() {
            TrackingFrame::register(self.inner.clone());
        }
        SourceInner::refresh(&self.inner);
        self.inner
            .state
            .read()
            .clone()
            .expect("source holds a value after a successful run")
    }

    /// Get the current value without registering a dependency,
    /// recomputing first if stale.
    pub fn peek(&self) -> T {
        SourceInner::refresh(&self.inner);
        self.inner
            .state
            .read()
            .clone()
            .expect("source holds a value after a successful run")
    }

    /// Subscribe an observer invoked with `(previous, next)` whenever the
    /// computed value changes.
    ///
    /// The source is brought up to date before the observer is registered.
    /// The returned disconnect closure removes the registration; when the
    /// last observer disconnects, the source frees itself.
    pub fn connect<F>(&self, observer: F) -> Disconnect
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        SourceInner::refresh(&self.inner);
        let id = self.inner.observers.lock().insert(Arc::new(observer));
        SourceInner::disconnector(Arc::downgrade(&self.inner), id)
    }

    /// Register a callback fired the next time this source frees itself.
    ///
    /// Useful to release external resources keyed to the source's observed
    /// lifetime, such as a feed an external collaborator opened for it.
    pub fn on_free<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.on_free.lock().push(Box::new(callback));
    }

    /// Ordered snapshot of the currently-subscribed inputs, recomputing
    /// first if stale.
    pub fn inputs(&self) -> Vec<NodeId> {
        SourceInner::refresh(&self.inner);
        self.inner.inputs.lock().keys().copied().collect()
    }

    /// Get the number of connected observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

impl<T> SourceInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Recompute if stale.
    fn refresh(this: &Arc<Self>) {
        if this.dirty.load(Ordering::SeqCst) {
            Self::run(this);
        }
    }

    /// Run the compute function inside a fresh tracking frame, reconcile
    /// subscriptions with the inputs it read, and install the result.
    ///
    /// If the compute function panics, nothing here has executed yet: the
    /// previous cache, subscriptions, and the stale flag all survive, and
    /// the panic propagates to whichever read triggered the run.
    fn run(this: &Arc<Self>) {
        let (reads, next) = track_inputs(|| (this.compute)());

        {
            let mut inputs = this.inputs.lock();
            let previous: SmallVec<[NodeId; 4]> = inputs.keys().copied().collect();
            let discovered: SmallVec<[NodeId; 4]> = reads.iter().map(|dep| dep.id()).collect();
            let delta = diff_inputs(&previous, &discovered);

            for id in &delta.removed {
                if let Some(disconnect) = inputs.swap_remove(id) {
                    disconnect();
                }
            }

            // Rebuild the association in this run's read order, keeping
            // the disconnectors of inputs that were read again and
            // subscribing to the ones read for the first time.
            let mut rebuilt = IndexMap::with_capacity(reads.len());
            for dep in &reads {
                let id = dep.id();
                let disconnect = match inputs.swap_remove(&id) {
                    Some(kept) => kept,
                    None => {
                        let weak = Arc::downgrade(this);
                        dep.clone().attach(Box::new(move || {
                            if let Some(inner) = weak.upgrade() {
                                SourceInner::strobe(&inner);
                            }
                        }))
                    }
                };
                rebuilt.insert(id, disconnect);
            }
            *inputs = rebuilt;

            if !delta.added.is_empty() || !delta.removed.is_empty() {
                tracing::trace!(
                    id = this.id.raw(),
                    added = delta.added.len(),
                    removed = delta.removed.len(),
                    total = inputs.len(),
                    "inputs reconciled"
                );
            }
        }

        this.dirty.store(false, Ordering::SeqCst);

        let previous = {
            let mut state = this.state.write();
            state.replace(next.clone())
        };
        match previous {
            Some(previous) if previous != next => this.notify(&previous, &next),
            _ => {}
        }
    }

    /// Upstream change notification: mark stale and recompute immediately.
    fn strobe(this: &Arc<Self>) {
        tracing::trace!(id = this.id.raw(), "strobe");
        this.dirty.store(true, Ordering::SeqCst);
        Self::run(this);
    }

    /// Remove one observer registration; free when the last one goes.
    fn release_observer(this: &Arc<Self>, id: ObserverId) {
        let emptied = {
            let mut observers = this.observers.lock();
            observers.remove(id) && observers.is_empty()
        };
        if emptied {
            this.free();
        }
    }

    /// Drop all subscriptions and the cache, fire on-free callbacks.
    ///
    /// Idempotent: freeing an already-dormant source does nothing
    /// observable.
    fn free(&self) {
        let released: Vec<Disconnect> = {
            let mut inputs = self.inputs.lock();
            inputs.drain(..).map(|(_, disconnect)| disconnect).collect()
        };
        for disconnect in &released {
            disconnect();
        }

        self.dirty.store(true, Ordering::SeqCst);
        *self.state.write() = None;

        let callbacks: Vec<Box<dyn FnOnce() + Send>> = {
            let mut on_free = self.on_free.lock();
            on_free.drain(..).collect()
        };

        if !released.is_empty() || !callbacks.is_empty() {
            tracing::debug!(
                id = self.id.raw(),
                inputs = released.len(),
                callbacks = callbacks.len(),
                "source freed"
            );
        }
        for callback in callbacks {
            callback();
        }
    }

    /// Invoke every observer registered at call time, in connection order.
    fn notify(&self, previous: &T, next: &T) {
        let snapshot = self.observers.lock().snapshot();
        tracing::trace!(id = self.id.raw(), observers = snapshot.len(), "source changed");
        for observer in snapshot {
            observer(previous, next);
        }
    }

    /// Build the disconnect closure for one observer registration.
    ///
    /// Holds only a weak reference, so outstanding disconnectors never
    /// keep the source alive.
    fn disconnector(inner: Weak<Self>, id: ObserverId) -> Disconnect {
        Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                SourceInner::release_observer(&inner, id);
            }
        })
    }
}

impl<T> Dependency for SourceInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn attach(self: Arc<Self>, observer: Box<dyn Fn() + Send + Sync>) -> Disconnect {
        let id = self
            .observers
            .lock()
            .insert(Arc::new(move |_previous: &T, _next: &T| observer()));
        SourceInner::disconnector(Arc::downgrade(&self), id)
    }
}

impl<T> Node for Source<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Output = T;

    fn id(&self) -> NodeId {
        Source::id(self)
    }

    fn value(&self) -> T {
        Source::value(self)
    }

    fn peek(&self) -> T {
        Source::peek(self)
    }

    fn connect<F>(&self, observer: F) -> Disconnect
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        Source::connect(self, observer)
    }
}

impl<T> Clone for Source<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Source<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id())
            .field("dirty", &self.dirty())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}
