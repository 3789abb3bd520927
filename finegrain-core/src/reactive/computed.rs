//! Computed Implementation
//!
//! A Computed is a cached derived value. It owns an effect that re-evaluates
//! the computation whenever one of its dependencies changes, and an internal
//! signal that stores the result.
//!
//! # Why This Matters
//!
//! The result is written through the signal's equality-gated `set`, so
//! dependents of a computed only re-run when the *derived* value changes:
//!
//! - `count` goes 3 -> 4
//! - `is_big = count > 10` re-evaluates, still `false`
//! - effects reading `is_big` do not run
//!
//! This is the difference between fine-grained propagation and re-rendering
//! everything on every write.
//!
//! Computeds are eager: the computation runs once on creation and then on
//! every change of its inputs, not on read.

use std::fmt::{self, Debug};
use std::rc::Rc;
use std::cell::OnceCell;

use super::effect::Effect;
use super::signal::Signal;
use super::tracker::TargetId;

/// A cached derived value that recomputes when its dependencies change.
///
/// # Type Parameters
///
/// - `T`: The type of the computed value. The `PartialEq` bound is what lets
///   an unchanged result stop propagation.
///
/// # Example
///
/// ```rust
/// use finegrain_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(5);
/// let doubled = Computed::new({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 10);
///
/// count.set(6);
/// assert_eq!(doubled.get(), 12);
/// ```
pub struct Computed<T: 'static> {
    value: Signal<T>,
    effect: Effect,
}

impl<T> Computed<T>
where
    T: PartialEq + 'static,
{
    /// Create a new computed with the given computation function.
    ///
    /// The computation runs immediately, inside its own effect, so reads made
    /// by `compute` become the computed's dependencies.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let slot: Rc<OnceCell<Signal<T>>> = Rc::new(OnceCell::new());

        let effect = Effect::new({
            let slot = Rc::clone(&slot);
            move || {
                let next = compute();
                match slot.get() {
                    Some(value) => value.set(next),
                    None => {
                        let _ = slot.set(Signal::new(next));
                    }
                }
            }
        });

        let value = slot
            .get()
            .cloned()
            .expect("computed effect runs on creation");

        Self { value, effect }
    }

    /// Read the value by reference, registering the active effect.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.value.with(f)
    }

    /// Target ID of the cell holding the derived value.
    pub fn id(&self) -> TargetId {
        self.value.id()
    }

    /// Number of times the computation has run.
    pub fn recompute_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Number of dependencies recorded by the last computation.
    pub fn dependency_count(&self) -> usize {
        self.effect.dependency_count()
    }

    /// Number of effects subscribed to the derived value.
    pub fn subscriber_count(&self) -> usize {
        self.value.subscriber_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.effect.dispose();
    }

    /// Whether the computed has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl<T> Computed<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Get the current value, tracked.
    pub fn get(&self) -> T {
        self.value.get()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.get_untracked()
    }
}

impl<T: 'static> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.value)
            .field("effect", &self.effect)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn computed_computes_on_creation() {
        let call_count = Rc::new(Cell::new(0));
        let computed = Computed::new({
            let call_count = call_count.clone();
            move || {
                call_count.set(call_count.get() + 1);
                42
            }
        });

        assert_eq!(call_count.get(), 1);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.recompute_count(), 1);
    }

    #[test]
    fn computed_caches_value_between_reads() {
        let computed = Computed::new(|| 42);

        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.get(), 42);
        assert_eq!(computed.recompute_count(), 1);
    }

    #[test]
    fn computed_recomputes_when_dependency_changes() {
        let base = Signal::new(5);
        let doubled = Computed::new({
            let base = base.clone();
            move || base.get() * 2
        });
        assert_eq!(doubled.dependency_count(), 1);

        base.set(10);
        assert_eq!(doubled.get(), 20);
        assert_eq!(doubled.recompute_count(), 2);
    }

    #[test]
    fn computed_depends_on_computed() {
        let base = Signal::new(5);
        let doubled = Computed::new({
            let base = base.clone();
            move || base.get() * 2
        });
        let plus_ten = Computed::new({
            let doubled = doubled.clone();
            move || doubled.get() + 10
        });

        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn unchanged_result_does_not_propagate() {
        let count = Signal::new(0);
        let is_big = Computed::new({
            let count = count.clone();
            move || count.get() > 10
        });
        let downstream = Computed::new({
            let is_big = is_big.clone();
            move || !is_big.get()
        });

        for n in 1..=10 {
            count.set(n);
        }

        assert_eq!(is_big.recompute_count(), 11);
        assert_eq!(downstream.recompute_count(), 1);

        count.set(11);
        assert_eq!(downstream.recompute_count(), 2);
        assert!(!downstream.get());
    }

    #[test]
    fn disposed_computed_keeps_last_value() {
        let base = Signal::new(1);
        let computed = Computed::new({
            let base = base.clone();
            move || base.get() + 1
        });

        computed.dispose();
        base.set(5);

        assert!(computed.is_disposed());
        assert_eq!(computed.get(), 2);
    }

    #[test]
    fn computed_clone_shares_state() {
        let base = Signal::new(1);
        let computed1 = Computed::new({
            let base = base.clone();
            move || base.get()
        });
        let computed2 = computed1.clone();

        base.set(3);
        assert_eq!(computed1.id(), computed2.id());
        assert_eq!(computed2.get(), 3);
    }
}
