//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! Effects are subscribers; computeds are subscribers through the effect they
//! own.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. The dependency tracker
/// stores IDs rather than the subscribers themselves, so a subscriber set
/// never keeps a computation alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A runnable unit that is re-invoked when one of its dependencies changes.
///
/// This is the engine's opaque effect handle. The tracker only ever calls
/// [`notify`](Subscriber::notify); what "running" means is up to the
/// implementor.
pub trait Subscriber {
    /// The identity this subscriber tracks dependencies under.
    fn id(&self) -> SubscriberId;

    /// Re-run the computation.
    fn notify(&self);

    /// Whether the subscriber has been disposed and must not run again.
    fn is_disposed(&self) -> bool;
}
