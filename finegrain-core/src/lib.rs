//! Finegrain Core
//!
//! This crate provides a small fine-grained reactivity engine together with
//! the coarse-grained strategies it is usually compared against. It
//! implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Deep-tracking reactive objects and fixed-shape legacy objects
//! - Counter engines that count how much "rendering" each strategy does
//! - A benchmark harness that runs the strategies side by side
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `engines`: Three counter engines sharing one interface
//! - `harness`: Fixed-iteration benchmark runs and their reports
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use finegrain_core::reactive::{Computed, Effect, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let doubled = Computed::new({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let seen = Rc::new(Cell::new(0));
//! let _effect = Effect::new({
//!     let doubled = doubled.clone();
//!     let seen = seen.clone();
//!     move || seen.set(doubled.get())
//! });
//!
//! // Update the signal; the effect has already re-run when `set` returns
//! count.set(5);
//! assert_eq!(seen.get(), 10);
//! ```

pub mod engines;
pub mod harness;
pub mod reactive;

mod error;

pub use error::{ReactiveError, Result};
