//! Weft Core
//!
//! This crate provides the reactive engine at the heart of the Weft UI
//! framework: a small graph of value-holding nodes that automatically
//! recomputes derived values when their inputs change, without the caller
//! wiring update order by hand.
//!
//! Renderers, effect interpreters, and other collaborators sit outside
//! this crate and consume nodes purely through the public node interface.
//!
//! # Architecture
//!
//! - `reactive`: the engine — signals, sources, dependency tracking, and
//!   subscription lifecycle management
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::reactive::{Signal, Source};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = Source::new({
//!     let count = count.clone();
//!     move || count.value() * 2
//! });
//!
//! // Observe it
//! let disconnect = doubled.connect(|previous, next| {
//!     println!("doubled: {previous} -> {next}");
//! });
//!
//! // Update the signal
//! count.reset(5);
//! // doubled recomputed synchronously; the observer printed "0 -> 10"
//!
//! disconnect();
//! ```

pub mod reactive;
