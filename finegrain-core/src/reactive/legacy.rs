//! Legacy (accessor-pair) objects.
//!
//! A [`LegacyObject`] observes an object the pre-proxy way: every key that
//! exists when the object is instrumented gets its own notifier cell, and
//! reads and writes of that key go through it. The shape is fixed at that
//! moment. Keys added afterwards are stored on the raw object like any other
//! field, but reading them records nothing and writing them notifies nobody.
//!
//! Values live only on the raw object. Instrumented reads track the key's
//! cell but return the raw value, so a write made directly through
//! [`LegacyObject::raw`] is visible to the next read. It notifies nobody.
//! Writes through [`LegacyObject::set`] are equality-gated against the raw
//! value.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use super::object::{ChangeEvent, ChangeListener};
use super::policy::NotifyPolicy;
use super::signal::Signal;
use super::value::{Object, Value};
use crate::error::{ReactiveError, Result};

struct LegacyInner {
    raw: Object,
    /// One notifier per instrumented key. Gating happens in `set`.
    cells: IndexMap<Rc<str>, Signal<()>>,
    listener: Option<ChangeListener>,
}

/// An object whose pre-existing keys are reactive and whose later keys are
/// not.
///
/// # Example
///
/// ```rust
/// use finegrain_core::reactive::{LegacyObject, Object};
///
/// let state = LegacyObject::instrument(Object::from_pairs([("count", 0)])).unwrap();
/// assert!(state.is_instrumented("count"));
///
/// state.set("added_later", 1);
/// assert!(!state.is_instrumented("added_later"));
/// ```
#[derive(Clone)]
pub struct LegacyObject {
    inner: Rc<LegacyInner>,
}

impl LegacyObject {
    /// Instrument every key currently on `value`.
    ///
    /// Fails with `InvalidArgument` if `value` is not an object.
    pub fn instrument(value: impl Into<Value>) -> Result<Self> {
        Self::build(value.into(), None)
    }

    /// Like [`instrument`](Self::instrument), calling `listener` after every
    /// write to an instrumented key that changed its value.
    pub fn instrument_with(
        value: impl Into<Value>,
        listener: impl Fn(&ChangeEvent) + 'static,
    ) -> Result<Self> {
        Self::build(value.into(), Some(Rc::new(listener)))
    }

    fn build(value: Value, listener: Option<ChangeListener>) -> Result<Self> {
        let raw = match value {
            Value::Object(raw) => raw,
            other => return Err(ReactiveError::not_an_object(other.type_name())),
        };

        let cells: IndexMap<Rc<str>, Signal<()>> = raw
            .keys()
            .into_iter()
            .map(|key| (key, Signal::with_policy((), NotifyPolicy::Always)))
            .collect();
        trace!(object = raw.id().raw(), keys = cells.len(), "instrumented object");

        Ok(Self {
            inner: Rc::new(LegacyInner { raw, cells, listener }),
        })
    }

    /// The raw object underneath.
    pub fn raw(&self) -> &Object {
        &self.inner.raw
    }

    /// Whether `key` existed when the object was instrumented.
    pub fn is_instrumented(&self, key: &str) -> bool {
        self.inner.cells.contains_key(key)
    }

    /// Keys that are reactive, in their original order.
    pub fn instrumented_keys(&self) -> Vec<Rc<str>> {
        self.inner.cells.keys().cloned().collect()
    }

    /// Read a property. Tracked only for instrumented keys.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(cell) = self.inner.cells.get(key) {
            cell.with(|_| ());
        }
        self.inner.raw.get(key)
    }

    /// Write a property.
    ///
    /// Instrumented keys notify their readers and the listener when the
    /// value changed. Any other key is written silently.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();

        let Some(cell) = self.inner.cells.get(key) else {
            self.inner.raw.insert(key, value);
            return;
        };

        let old_value = self.inner.raw.insert(key, value.clone());
        if old_value.as_ref() == Some(&value) {
            return;
        }
        cell.set(());

        if let Some(listener) = &self.inner.listener {
            listener(&ChangeEvent {
                target: self.inner.raw.clone(),
                key: Rc::from(key),
                old_value,
                new_value: Some(value),
                deleted: false,
            });
        }
    }

    /// Every key on the raw object. Not tracked.
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.inner.raw.keys()
    }

    /// Number of effects reading an instrumented key. Always zero for others.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .cells
            .get(key)
            .map_or(0, Signal::subscriber_count)
    }
}

impl fmt::Debug for LegacyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyObject")
            .field("raw", &self.inner.raw)
            .field("instrumented", &self.instrumented_keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn non_object_is_rejected() {
        let err = LegacyObject::instrument("text").unwrap_err();
        assert!(matches!(err, ReactiveError::InvalidArgument { found: "text", .. }));
    }

    #[test]
    fn instrumented_key_is_observed() {
        let state = LegacyObject::instrument(Object::from_pairs([("count", 0)])).unwrap();
        let runs = Rc::new(Cell::new(0));
        let _effect = Effect::new({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                state.get("count");
                runs.set(runs.get() + 1);
            }
        });

        state.set("count", 1);
        state.set("count", 1);

        assert_eq!(runs.get(), 2);
        assert_eq!(state.raw().get("count"), Some(Value::from(1)));
    }

    #[test]
    fn late_key_is_stored_but_invisible() {
        let state = LegacyObject::instrument(Object::from_pairs([("count", 0)])).unwrap();
        let runs = Rc::new(Cell::new(0));
        let _effect = Effect::new({
            let state = state.clone();
            let runs = runs.clone();
            move || {
                state.get("later");
                runs.set(runs.get() + 1);
            }
        });

        state.set("later", 1);
        state.set("later", 2);

        assert_eq!(runs.get(), 1);
        assert_eq!(state.get("later"), Some(Value::from(2)));
        assert_eq!(state.subscriber_count("later"), 0);
    }

    #[test]
    fn listener_fires_only_for_instrumented_changes() {
        let calls = Rc::new(Cell::new(0));
        let state = LegacyObject::instrument_with(Object::from_pairs([("count", 0)]), {
            let calls = calls.clone();
            move |event: &ChangeEvent| {
                assert_eq!(&*event.key, "count");
                calls.set(calls.get() + 1);
            }
        })
        .unwrap();

        state.set("count", 1);
        state.set("count", 1);
        state.set("extra", "x");

        assert_eq!(calls.get(), 1);
        let keys: Vec<String> = state.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["count", "extra"]);
    }

    #[test]
    fn raw_writes_are_visible_but_silent() {
        let state = LegacyObject::instrument(Object::from_pairs([("count", 0)])).unwrap();
        let seen = Rc::new(Cell::new(-1.0));
        let _effect = Effect::new({
            let state = state.clone();
            let seen = seen.clone();
            move || seen.set(state.get("count").and_then(|v| v.as_f64()).unwrap_or(-1.0))
        });

        state.raw().insert("count", 5);
        assert_eq!(state.get("count"), Some(Value::from(5)));
        assert_eq!(seen.get(), 0.0);

        // Gating compares against the raw value.
        state.set("count", 5);
        assert_eq!(seen.get(), 0.0);

        state.set("count", 6);
        assert_eq!(seen.get(), 6.0);
    }
}
