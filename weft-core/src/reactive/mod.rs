//! Reactive engine.
//!
//! This module implements the dependency-tracking core: signals, sources,
//! and the tracking context that wires them together automatically.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state, updated from outside the
//! engine. When its value is read inside a tracked computation, the signal
//! registers itself as one of that computation's inputs. When its value
//! changes, connected observers are notified synchronously.
//!
//! ## Sources
//!
//! A [`Source`] is a derived value. Its compute function discovers its own
//! inputs by reading other nodes; the source subscribes to exactly those
//! nodes and re-derives eagerly when any of them changes, or lazily on the
//! first read after it goes stale. When its last observer disconnects, a
//! source releases its subscriptions and cache entirely; any later read
//! revives it.
//!
//! # Implementation notes
//!
//! Dependency discovery uses a thread-local stack of tracking frames: each
//! run collects its reads into its own frame, so nested recomputation is
//! safe and an inner run's reads never leak into an outer run's frame.
//!
//! Propagation is push-based, synchronous, and unbatched. There is no
//! topological scheduler, no batching, and no cycle detection: a node
//! behind two paths of a diamond recomputes once per path, dependents may
//! transiently observe a half-settled intermediate state, and a cyclic
//! graph recurses until the stack overflows.

mod context;
mod diff;
mod node;
mod observers;
mod signal;
mod source;

pub use node::{Disconnect, Node, NodeId};
pub use signal::Signal;
pub use source::Source;
