//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds,
//! effects, and reactive objects. Every read of observable state inside an
//! effect is recorded against that effect; every write re-runs exactly the
//! effects that read what was written.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a container for a single value. Reading it inside an
//! effect subscribes the effect; writing a different value re-runs it.
//!
//! ## Computeds
//!
//! A [`Computed`] is a derived value. It recomputes when its inputs change,
//! and only notifies its own readers when the result is different.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that re-runs whenever its
//! dependencies change. It runs once on creation to discover them.
//!
//! ## Objects
//!
//! A [`ReactiveObject`] tracks reads of any property, including ones added
//! after it was wrapped, and wraps nested objects on access. A
//! [`LegacyObject`] only observes the keys it had when instrumented.
//!
//! # Implementation Notes
//!
//! Tracking uses a thread-local context stack ([`ReactiveContext`]) to know
//! which effect is running, and a thread-local [`DependencyTracker`] that
//! maps `(target, key)` pairs to subscribers. Everything is synchronous and
//! single-threaded: a write returns after every affected effect has re-run.

mod computed;
mod context;
mod effect;
mod legacy;
mod object;
mod policy;
mod signal;
mod subscriber;
mod tracker;
mod value;

pub use computed::Computed;
pub use context::{untrack, ReactiveContext};
pub use effect::{Effect, EffectState};
pub use legacy::LegacyObject;
pub use object::{ChangeEvent, ChangeListener, Property, ProxyOptions, ReactiveObject};
pub use policy::NotifyPolicy;
pub use signal::Signal;
pub use subscriber::{Subscriber, SubscriberId};
pub use tracker::{Dependency, DependencyTracker, PropertyKey, TargetId};
pub use value::{Object, Value};
