//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a reactive context (an effect), the
//!    signal registers that context as a subscriber.
//!
//! 2. When a signal's value changes, all subscribers are re-run before
//!    `set` returns. The new value is stored first, so a subscriber that
//!    reads the signal again sees it.
//!
//! 3. Whether a write counts as a change is decided by the signal's
//!    equality: `PartialEq` by default, a custom comparison, or none at all
//!    (every write notifies).
//!
//! # Memory Layout
//!
//! Each signal consists of:
//! - A unique target ID (8 bytes)
//! - The value, behind a `RefCell`
//! - An optional boxed equality function
//!
//! Subscribers live in the tracker, keyed by the target ID. Dropping the last
//! clone of a signal releases those entries.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::policy::NotifyPolicy;
use super::tracker::{DependencyTracker, PropertyKey, TargetId};

type EqualsFn<T> = Box<dyn Fn(&T, &T) -> bool>;

struct SignalInner<T> {
    target: TargetId,
    value: RefCell<T>,
    /// `None` means every write notifies.
    equals: Option<EqualsFn<T>>,
}

impl<T> Drop for SignalInner<T> {
    fn drop(&mut self) {
        DependencyTracker::release_target(self.target);
    }
}

/// A reactive cell holding a value of type T.
///
/// # Example
///
/// ```rust
/// use finegrain_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// // Update the value (re-runs dependents if it changed)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T: 'static> {
    inner: Rc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    ///
    /// Writes of a value equal to the current one do not notify.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_policy(value, NotifyPolicy::Changed)
    }

    /// Create a signal that uses `PartialEq` gating or notifies on every
    /// write, depending on `policy`.
    pub fn with_policy(value: T, policy: NotifyPolicy) -> Self
    where
        T: PartialEq,
    {
        let equals: Option<EqualsFn<T>> = match policy {
            NotifyPolicy::Changed => Some(Box::new(|old: &T, new: &T| old == new)),
            NotifyPolicy::Always => None,
        };
        Self::from_parts(value, equals)
    }

    /// Create a signal with a custom equality.
    ///
    /// A write notifies when `equals(old, new)` returns false.
    pub fn with_equals<F>(value: T, equals: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Self::from_parts(value, Some(Box::new(equals)))
    }

    fn from_parts(value: T, equals: Option<EqualsFn<T>>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                target: TargetId::new(),
                value: RefCell::new(value),
                equals,
            }),
        }
    }

    /// Get the signal's target ID.
    pub fn id(&self) -> TargetId {
        self.inner.target
    }

    /// Read the value by reference, registering the active effect.
    ///
    /// `f` must not write to this same signal.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        DependencyTracker::track(self.inner.target, PropertyKey::Value);
        f(&*self.inner.value.borrow())
    }

    /// Read the value by reference without establishing a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.inner.value.borrow())
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, value: T) {
        let changed = match &self.inner.equals {
            Some(equals) => !equals(&*self.inner.value.borrow(), &value),
            None => true,
        };
        if !changed {
            return;
        }

        *self.inner.value.borrow_mut() = value;
        DependencyTracker::trigger(self.inner.target, &PropertyKey::Value);
    }

    /// Update the value using a function of the current one.
    ///
    /// The read is untracked; the write follows the usual equality rules.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&*self.inner.value.borrow());
        self.set(next);
    }

    /// Number of effects currently subscribed to this signal.
    pub fn subscriber_count(&self) -> usize {
        DependencyTracker::subscriber_count(self.inner.target, &PropertyKey::Value)
    }
}

impl<T: Clone + 'static> Signal<T> {
    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: 'static> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.target)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
