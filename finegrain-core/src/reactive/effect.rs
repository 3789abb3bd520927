//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect re-runs synchronously, inside
//!    the write that changed it.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution, so a branch that stops reading a signal
//!    stops depending on it.
//!
//! # Lifecycle
//!
//! ```text
//! Created --execute--> Running --return--> Idle --trigger--> Running ...
//!    |                                      |
//!    +--------------- dispose --------------+--> Disposed (terminal)
//! ```
//!
//! Disposal removes the effect from every subscriber set it belongs to. A
//! disposed effect never runs again; executing it is a silent no-op.
//! Dropping the last handle to an effect disposes it.

use std::cell::Cell;
use std::rc::Rc;

use tracing::debug;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use super::tracker::DependencyTracker;

/// Where an effect is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// Registered but never executed.
    Created,
    /// Currently executing (possibly re-entered).
    Running,
    /// Executed at least once and waiting for a trigger.
    Idle,
    /// Terminal: will never execute again.
    Disposed,
}

/// Marks an effect Running for the length of one run and restores the
/// previous state when the run ends, including by panic.
struct RunGuard<'a> {
    state: &'a Cell<EffectState>,
    previous: EffectState,
}

impl<'a> RunGuard<'a> {
    fn enter(state: &'a Cell<EffectState>) -> Self {
        let previous = state.replace(EffectState::Running);
        Self { state, previous }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        // The body may have disposed the effect.
        if self.state.get() != EffectState::Running {
            return;
        }
        // A re-entrant run leaves the outer run Running.
        let next = if self.previous == EffectState::Running {
            EffectState::Running
        } else {
            EffectState::Idle
        };
        self.state.set(next);
    }
}

struct EffectInner {
    id: SubscriberId,
    run: Box<dyn Fn()>,
    state: Cell<EffectState>,
    run_count: Cell<usize>,
    /// Dependencies held after the most recent run.
    dependency_count: Cell<usize>,
}

impl EffectInner {
    fn execute(&self) {
        if self.state.get() == EffectState::Disposed {
            return;
        }

        DependencyTracker::clear_dependencies(self.id);
        let _run = RunGuard::enter(&self.state);

        let reads = {
            let _ctx = ReactiveContext::enter(self.id);
            (self.run)();
            ReactiveContext::get_dependencies().len()
        };

        // A re-entrant run may have replaced what this run recorded, so the
        // tracker is the source of truth.
        let dependencies = DependencyTracker::dependency_count(self.id);
        self.dependency_count.set(dependencies);
        self.run_count.set(self.run_count.get() + 1);
        debug!(
            effect = self.id.raw(),
            run = self.run_count.get(),
            reads,
            dependencies,
            "effect ran"
        );
    }

    fn dispose(&self) {
        if self.state.replace(EffectState::Disposed) == EffectState::Disposed {
            return;
        }
        debug!(effect = self.id.raw(), runs = self.run_count.get(), "effect disposed");
        DependencyTracker::unregister(self.id);
    }
}

impl Subscriber for EffectInner {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn notify(&self) {
        self.execute();
    }

    fn is_disposed(&self) -> bool {
        self.state.get() == EffectState::Disposed
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use finegrain_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Rc::new(Cell::new(-1));
///
/// let _effect = Effect::new({
///     let count = count.clone();
///     let seen = seen.clone();
///     move || seen.set(count.get())
/// });
/// assert_eq!(seen.get(), 0);
///
/// count.set(5);
/// assert_eq!(seen.get(), 5);
/// ```
#[must_use = "dropping the last handle to an Effect disposes it"]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let effect = Self::new_lazy(run);
        effect.execute();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It has no dependencies until the first [`execute`](Effect::execute).
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        let inner = Rc::new(EffectInner {
            id: SubscriberId::new(),
            run: Box::new(run),
            state: Cell::new(EffectState::Created),
            run_count: Cell::new(0),
            dependency_count: Cell::new(0),
        });

        let subscriber: Rc<dyn Subscriber> = inner.clone();
        DependencyTracker::register(&subscriber);

        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Execute the effect function.
    ///
    /// This runs the function within a reactive context to track
    /// dependencies. Does nothing once the effect is disposed.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EffectState {
        self.inner.state.get()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Get the number of dependencies held after the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count.get()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::cell::RefCell;

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn effect_runs_on_creation() {
        let run_count = counter();
        let _effect = Effect::new({
            let run_count = run_count.clone();
            move || run_count.set(run_count.get() + 1)
        });

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = counter();
        let effect = Effect::new_lazy({
            let run_count = run_count.clone();
            move || run_count.set(run_count.get() + 1)
        });

        assert_eq!(run_count.get(), 0);
        assert_eq!(effect.run_count(), 0);
        assert_eq!(effect.state(), EffectState::Created);

        effect.execute();
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
        assert_eq!(effect.state(), EffectState::Idle);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let effect = Effect::new({
            let signal = signal.clone();
            move || {
                signal.get();
            }
        });

        signal.set(1);
        signal.set(2);
        assert_eq!(effect.run_count(), 3);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let run_count = counter();
        let effect = Effect::new({
            let run_count = run_count.clone();
            let signal = signal.clone();
            move || {
                signal.get();
                run_count.set(run_count.get() + 1);
            }
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        effect.execute();
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.state(), EffectState::Disposed);
    }

    #[test]
    fn dropping_effect_disposes_it() {
        let signal = Signal::new(0);
        let run_count = counter();
        let effect = Effect::new({
            let run_count = run_count.clone();
            let signal = signal.clone();
            move || {
                signal.get();
                run_count.set(run_count.get() + 1);
            }
        });
        assert_eq!(signal.subscriber_count(), 1);

        drop(effect);
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn stale_branch_dependencies_are_dropped() {
        let use_left = Signal::new(true);
        let left = Signal::new(0);
        let right = Signal::new(0);
        let effect = Effect::new({
            let (use_left, left, right) = (use_left.clone(), left.clone(), right.clone());
            move || {
                if use_left.get() {
                    left.get();
                } else {
                    right.get();
                }
            }
        });
        assert_eq!(effect.dependency_count(), 2);

        use_left.set(false);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(left.subscriber_count(), 0);

        // No longer read, so no longer a dependency.
        left.set(10);
        assert_eq!(effect.run_count(), 2);

        right.set(10);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn effect_can_dispose_itself_while_running() {
        let signal = Signal::new(0);
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let effect = Effect::new({
            let signal = signal.clone();
            let slot = slot.clone();
            move || {
                if signal.get() > 0 {
                    if let Some(this) = slot.borrow().as_ref() {
                        this.dispose();
                    }
                }
            }
        });
        *slot.borrow_mut() = Some(effect.clone());

        signal.set(1);
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(2);
        assert_eq!(effect.run_count(), 2);

        // Break the handle cycle.
        slot.borrow_mut().take();
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert_eq!(effect1.run_count(), 1);

        effect1.execute();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn effect_dropped_by_earlier_subscriber_does_not_run() {
        let signal = Signal::new(0);
        let slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));
        let first = Effect::new({
            let signal = signal.clone();
            let slot = slot.clone();
            move || {
                if signal.get() > 0 {
                    slot.borrow_mut().take();
                }
            }
        });

        let second_runs = counter();
        let second = Effect::new({
            let signal = signal.clone();
            let second_runs = second_runs.clone();
            move || {
                signal.get();
                second_runs.set(second_runs.get() + 1);
            }
        });
        slot.borrow_mut().replace(second);

        // Both are subscribed; `first` runs first and drops the only handle
        // to `second` before its turn comes.
        signal.set(1);

        assert_eq!(first.run_count(), 2);
        assert_eq!(second_runs.get(), 1);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn panicking_run_leaves_effect_idle() {
        let signal = Signal::new(0);
        let effect = Effect::new({
            let signal = signal.clone();
            move || {
                if signal.get() == 1 {
                    panic!("render failed");
                }
            }
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| signal.set(1)));
        assert!(result.is_err());
        assert_eq!(effect.state(), EffectState::Idle);
        assert_eq!(effect.run_count(), 1);

        // Still subscribed, and runs normally afterwards.
        signal.set(2);
        assert_eq!(effect.state(), EffectState::Idle);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn reentrant_run_reports_tracked_dependencies() {
        let signal = Signal::new(0);
        let extra = Signal::new(0);
        let effect = Effect::new({
            let signal = signal.clone();
            let extra = extra.clone();
            move || match signal.get() {
                1 => signal.set(2),
                2 => {
                    extra.get();
                }
                _ => {}
            }
        });
        assert_eq!(effect.dependency_count(), 1);

        // The write re-enters the effect, which then also reads `extra`.
        signal.set(1);

        assert_eq!(effect.state(), EffectState::Idle);
        assert_eq!(extra.subscriber_count(), 1);
        assert_eq!(effect.dependency_count(), 2);
        assert_eq!(
            effect.dependency_count(),
            DependencyTracker::dependency_count(effect.id())
        );
    }
}
