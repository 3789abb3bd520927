//! Dependency Tracker
//!
//! The tracker is the central bookkeeping that connects observables
//! (signals, reactive objects) with the effects that read them.
//!
//! # How It Works
//!
//! 1. When an effect is created, it registers with the tracker. The tracker
//!    keeps only a weak reference, so registration never keeps an effect
//!    alive.
//!
//! 2. When an effect reads an observable, the observable calls
//!    [`DependencyTracker::track`] with its target ID and the property key
//!    that was read. The tracker records the edge in both directions:
//!    `target -> key -> subscribers` and `subscriber -> dependencies`.
//!
//! 3. When an observable changes, it calls [`DependencyTracker::trigger`].
//!    The tracker takes a snapshot of the subscriber set and runs each
//!    subscriber in subscription order. Subscribers that re-subscribe while
//!    running do not extend the snapshot, so one trigger never loops.
//!
//! 4. Before an effect re-runs, and when it is disposed, its outgoing edges
//!    are removed through the reverse map. This costs time proportional to
//!    the effect's own dependencies rather than a scan of every target.
//!
//! 5. When a target is dropped, its entries are released.
//!
//! # Thread Safety
//!
//! All state is thread-local. Reactive values are single-threaded; two
//! threads each get an independent tracker.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};

/// Identity of a tracked object (a cell, or a raw object behind a proxy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// The property of a target that was read or written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// The single slot of a cell.
    Value,
    /// The key set of an object (enumeration, membership).
    Iterate,
    /// A named object property.
    Named(Rc<str>),
}

impl From<&str> for PropertyKey {
    fn from(key: &str) -> Self {
        Self::Named(Rc::from(key))
    }
}

impl From<String> for PropertyKey {
    fn from(key: String) -> Self {
        Self::Named(Rc::from(key))
    }
}

impl From<Rc<str>> for PropertyKey {
    fn from(key: Rc<str>) -> Self {
        Self::Named(key)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => f.write_str("<value>"),
            Self::Iterate => f.write_str("<iterate>"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// A single (target, key) pair an effect read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub target: TargetId,
    pub key: PropertyKey,
}

impl Dependency {
    pub fn new(target: TargetId, key: PropertyKey) -> Self {
        Self { target, key }
    }
}

#[derive(Default)]
struct TrackerState {
    /// target -> key -> subscribers, in subscription order.
    targets: HashMap<TargetId, HashMap<PropertyKey, IndexSet<SubscriberId>>>,
    /// subscriber -> everything it is currently listed under.
    subscriptions: HashMap<SubscriberId, IndexSet<Dependency>>,
    /// Weak handles used to re-run subscribers on trigger.
    registry: HashMap<SubscriberId, Weak<dyn Subscriber>>,
}

impl TrackerState {
    fn unsubscribe(&mut self, subscriber_id: SubscriberId) -> usize {
        let Some(dependencies) = self.subscriptions.remove(&subscriber_id) else {
            return 0;
        };

        for dependency in &dependencies {
            let Some(keys) = self.targets.get_mut(&dependency.target) else {
                continue;
            };
            if let Some(subscribers) = keys.get_mut(&dependency.key) {
                subscribers.shift_remove(&subscriber_id);
                if subscribers.is_empty() {
                    keys.remove(&dependency.key);
                }
            }
            if keys.is_empty() {
                self.targets.remove(&dependency.target);
            }
        }

        dependencies.len()
    }
}

thread_local! {
    static STATE: RefCell<TrackerState> = RefCell::new(TrackerState::default());
}

/// The per-thread dependency tracker.
pub struct DependencyTracker;

impl DependencyTracker {
    /// Register a subscriber so that triggers can reach it.
    pub fn register(subscriber: &Rc<dyn Subscriber>) {
        let id = subscriber.id();
        STATE.with(|state| {
            state
                .borrow_mut()
                .registry
                .insert(id, Rc::downgrade(subscriber));
        });
    }

    /// Unregister a subscriber and remove it from every set it belongs to.
    pub fn unregister(subscriber_id: SubscriberId) {
        // Drop glue may run after the thread-local has been torn down.
        let _ = STATE.try_with(|state| {
            let mut state = state.borrow_mut();
            state.registry.remove(&subscriber_id);
            let removed = state.unsubscribe(subscriber_id);
            debug!(subscriber = subscriber_id.raw(), removed, "unregistered subscriber");
        });
    }

    /// Record that the active effect depends on `(target, key)`.
    ///
    /// No-op when no effect is active.
    pub fn track(target: TargetId, key: PropertyKey) {
        let Some(subscriber_id) = ReactiveContext::current_subscriber() else {
            return;
        };

        let dependency = Dependency::new(target, key);
        ReactiveContext::track_dependency(dependency.clone());

        STATE.with(|state| {
            let mut state = state.borrow_mut();
            if !state.registry.contains_key(&subscriber_id) {
                return;
            }

            let inserted = state
                .targets
                .entry(target)
                .or_default()
                .entry(dependency.key.clone())
                .or_default()
                .insert(subscriber_id);

            if inserted {
                trace!(
                    target_id = target.raw(),
                    key = %dependency.key,
                    subscriber = subscriber_id.raw(),
                    "track"
                );
                state
                    .subscriptions
                    .entry(subscriber_id)
                    .or_default()
                    .insert(dependency);
            }
        });
    }

    /// Run every subscriber of `(target, key)`.
    ///
    /// Iterates a snapshot taken before the first subscriber runs. Returns
    /// the number of subscribers that were executed.
    pub fn trigger(target: TargetId, key: &PropertyKey) -> usize {
        // Weak, so the snapshot never outlives a handle dropped mid-trigger.
        let snapshot: SmallVec<[Weak<dyn Subscriber>; 4]> = STATE.with(|state| {
            let state = state.borrow();
            state
                .targets
                .get(&target)
                .and_then(|keys| keys.get(key))
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| state.registry.get(id))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        });

        if snapshot.is_empty() {
            return 0;
        }

        trace!(target_id = target.raw(), key = %key, subscribers = snapshot.len(), "trigger");

        let mut notified = 0;
        for weak in &snapshot {
            // An earlier subscriber in this snapshot may have dropped or
            // disposed it.
            let Some(subscriber) = weak.upgrade() else {
                continue;
            };
            if subscriber.is_disposed() {
                continue;
            }
            subscriber.notify();
            notified += 1;
        }
        notified
    }

    /// Remove all dependencies for a subscriber, keeping it registered.
    ///
    /// Called before re-running a computation to clear stale dependencies.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        STATE.with(|state| {
            state.borrow_mut().unsubscribe(subscriber_id);
        });
    }

    /// Forget everything recorded against a target that no longer exists.
    pub fn release_target(target: TargetId) {
        let _ = STATE.try_with(|state| {
            let mut state = state.borrow_mut();
            let Some(keys) = state.targets.remove(&target) else {
                return;
            };

            for (key, subscribers) in keys {
                let dependency = Dependency::new(target, key);
                for id in subscribers {
                    if let Some(dependencies) = state.subscriptions.get_mut(&id) {
                        dependencies.shift_remove(&dependency);
                    }
                }
            }
            debug!(target_id = target.raw(), "released target");
        });
    }

    /// Number of subscribers currently listed under `(target, key)`.
    pub fn subscriber_count(target: TargetId, key: &PropertyKey) -> usize {
        STATE.with(|state| {
            state
                .borrow()
                .targets
                .get(&target)
                .and_then(|keys| keys.get(key))
                .map_or(0, IndexSet::len)
        })
    }

    /// Subscribers of `(target, key)` in notification order.
    pub fn subscribers(target: TargetId, key: &PropertyKey) -> Vec<SubscriberId> {
        STATE.with(|state| {
            state
                .borrow()
                .targets
                .get(&target)
                .and_then(|keys| keys.get(key))
                .map(|ids| ids.iter().copied().collect())
                .unwrap_or_default()
        })
    }

    /// Number of `(target, key)` pairs a subscriber is listed under.
    pub fn dependency_count(subscriber_id: SubscriberId) -> usize {
        STATE.with(|state| {
            state
                .borrow()
                .subscriptions
                .get(&subscriber_id)
                .map_or(0, IndexSet::len)
        })
    }

    /// Whether anything is currently recorded against a target.
    pub fn is_tracked(target: TargetId) -> bool {
        STATE.with(|state| state.borrow().targets.contains_key(&target))
    }

    /// Number of targets with at least one subscriber.
    pub fn target_count() -> usize {
        STATE.with(|state| state.borrow().targets.len())
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracked computation.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
