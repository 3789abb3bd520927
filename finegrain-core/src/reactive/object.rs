//! Reactive Objects
//!
//! A [`ReactiveObject`] wraps a raw [`Object`] so that every property read
//! and write funnels through the dependency tracker. It plays the role a
//! `Proxy` plays in a dynamic language:
//!
//! - `get` tracks `(object, key)` for whatever key is asked for, whether or
//!   not it existed when the object was wrapped. Keys added later are
//!   observable from their first read.
//! - Object-valued properties come back wrapped. Wrapping is lazy (only on
//!   access) and cached per scope, so reading the same nested object twice
//!   yields the same wrapper.
//! - `set` always writes; it notifies when the value changed, or on every
//!   write under [`NotifyPolicy::Always`].
//! - `delete` notifies only when the key existed.
//!
//! A scope is created by [`ReactiveObject::wrap_with`] and shared by every
//! wrapper reached from that root, together with its options.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::policy::NotifyPolicy;
use super::tracker::{DependencyTracker, PropertyKey, TargetId};
use super::value::{Object, Value};
use crate::error::{ReactiveError, Result};

/// A write that notified, as seen by a change listener.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// The raw object that was written.
    pub target: Object,
    pub key: Rc<str>,
    /// `None` if the key did not exist before.
    pub old_value: Option<Value>,
    /// `None` if the key was deleted.
    pub new_value: Option<Value>,
    pub deleted: bool,
}

/// Callback invoked after every notifying write.
pub type ChangeListener = Rc<dyn Fn(&ChangeEvent)>;

/// Options for a proxy scope.
#[derive(Clone, Default)]
pub struct ProxyOptions {
    policy: NotifyPolicy,
    listener: Option<ChangeListener>,
}

impl ProxyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the notification policy for every wrapper in the scope.
    pub fn policy(mut self, policy: NotifyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Install a listener called after every notifying write in the scope.
    pub fn on_change(mut self, listener: impl Fn(&ChangeEvent) + 'static) -> Self {
        self.listener = Some(Rc::new(listener));
        self
    }
}

impl fmt::Debug for ProxyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyOptions")
            .field("policy", &self.policy)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

struct ProxyScope {
    options: ProxyOptions,
    /// raw object -> its wrapper. Weak both ways: the cache keeps neither the
    /// raw object nor the wrapper alive.
    cache: RefCell<HashMap<TargetId, Weak<ProxyInner>>>,
}

impl ProxyScope {
    fn wrap(self: &Rc<Self>, raw: Object) -> ReactiveObject {
        let id = raw.id();
        if let Some(inner) = self.cache.borrow().get(&id).and_then(Weak::upgrade) {
            return ReactiveObject { inner };
        }

        let inner = Rc::new(ProxyInner {
            raw,
            scope: Rc::clone(self),
        });

        let mut cache = self.cache.borrow_mut();
        cache.retain(|_, wrapper| wrapper.strong_count() > 0);
        cache.insert(id, Rc::downgrade(&inner));
        trace!(object = id.raw(), cached = cache.len(), "wrapped object");

        ReactiveObject { inner }
    }

    fn emit(&self, event: impl FnOnce() -> ChangeEvent) {
        if let Some(listener) = &self.options.listener {
            listener(&event());
        }
    }
}

struct ProxyInner {
    raw: Object,
    scope: Rc<ProxyScope>,
}

/// A property read through a reactive object.
#[derive(Debug, Clone)]
pub enum Property {
    /// A non-object value.
    Value(Value),
    /// A nested object, already wrapped.
    Object(ReactiveObject),
}

impl Property {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Self::Object(object) => Some(object),
            Self::Value(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_value().and_then(Value::as_f64)
    }

    /// Unwrap back to a plain value (nested objects become their raw form).
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Object(object) => Value::Object(object.raw().clone()),
        }
    }
}

/// A deep-tracking wrapper around a raw object.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use finegrain_core::reactive::{Effect, Object, ReactiveObject};
///
/// let state = ReactiveObject::wrap(Object::new()).unwrap();
/// state.set("k", 1);
///
/// let runs = Rc::new(Cell::new(0));
/// let _effect = Effect::new({
///     let state = state.clone();
///     let runs = runs.clone();
///     move || {
///         state.get("k");
///         runs.set(runs.get() + 1);
///     }
/// });
///
/// state.set("k", 2);
/// assert_eq!(runs.get(), 2);
/// ```
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Rc<ProxyInner>,
}

impl ReactiveObject {
    /// Wrap an object with default options.
    ///
    /// Fails with `InvalidArgument` if `value` is not an object.
    pub fn wrap(value: impl Into<Value>) -> Result<Self> {
        Self::wrap_with(value, ProxyOptions::default())
    }

    /// Wrap an object in a new scope with the given options.
    pub fn wrap_with(value: impl Into<Value>, options: ProxyOptions) -> Result<Self> {
        let raw = match value.into() {
            Value::Object(raw) => raw,
            other => return Err(ReactiveError::not_an_object(other.type_name())),
        };

        let scope = Rc::new(ProxyScope {
            options,
            cache: RefCell::new(HashMap::new()),
        });
        Ok(scope.wrap(raw))
    }

    /// Build and wrap an object from a JSON document.
    pub fn from_json(json: serde_json::Value, options: ProxyOptions) -> Result<Self> {
        Self::wrap_with(Object::from_json(json)?, options)
    }

    /// The raw object underneath. Access through it is untracked.
    pub fn raw(&self) -> &Object {
        &self.inner.raw
    }

    pub fn id(&self) -> TargetId {
        self.inner.raw.id()
    }

    /// Whether two wrappers are the same wrapper.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn policy(&self) -> NotifyPolicy {
        self.inner.scope.options.policy
    }

    /// Read a property, tracking `(self, key)`.
    ///
    /// Nested objects are returned wrapped in this object's scope.
    pub fn get(&self, key: &str) -> Option<Property> {
        DependencyTracker::track(self.id(), PropertyKey::from(key));
        self.inner.raw.get(key).map(|value| match value {
            Value::Object(raw) => Property::Object(self.inner.scope.wrap(raw)),
            other => Property::Value(other),
        })
    }

    /// Read a property as a plain value, tracking `(self, key)`.
    pub fn get_value(&self, key: &str) -> Option<Value> {
        DependencyTracker::track(self.id(), PropertyKey::from(key));
        self.inner.raw.get(key)
    }

    /// Read a nested object, wrapped. `None` if absent or not an object.
    pub fn get_object(&self, key: &str) -> Option<ReactiveObject> {
        match self.get(key)? {
            Property::Object(object) => Some(object),
            Property::Value(_) => None,
        }
    }

    /// Write a property.
    ///
    /// The write always happens. Dependents of `key` are notified if the
    /// value changed (or always, under [`NotifyPolicy::Always`]); adding a
    /// new key also notifies readers of the key set.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let key: Rc<str> = Rc::from(key);
        let value = value.into();

        let old_value = self.inner.raw.insert(Rc::clone(&key), value.clone());
        let added = old_value.is_none();
        let changed = old_value.as_ref() != Some(&value);

        if !self.policy().should_notify(changed) {
            return;
        }

        let id = self.id();
        DependencyTracker::trigger(id, &PropertyKey::Named(Rc::clone(&key)));
        if added {
            DependencyTracker::trigger(id, &PropertyKey::Iterate);
        }

        self.inner.scope.emit(|| ChangeEvent {
            target: self.inner.raw.clone(),
            key,
            old_value,
            new_value: Some(value),
            deleted: false,
        });
    }

    /// Remove a property. Notifies only if the key existed.
    pub fn delete(&self, key: &str) -> bool {
        let Some(old_value) = self.inner.raw.remove(key) else {
            return false;
        };

        let id = self.id();
        let key: Rc<str> = Rc::from(key);
        DependencyTracker::trigger(id, &PropertyKey::Named(Rc::clone(&key)));
        DependencyTracker::trigger(id, &PropertyKey::Iterate);

        self.inner.scope.emit(|| ChangeEvent {
            target: self.inner.raw.clone(),
            key,
            old_value: Some(old_value),
            new_value: None,
            deleted: true,
        });
        true
    }

    /// Whether a key exists. Tracked, so adding or removing `key` re-runs
    /// the reader.
    pub fn has(&self, key: &str) -> bool {
        DependencyTracker::track(self.id(), PropertyKey::from(key));
        self.inner.raw.contains_key(key)
    }

    /// All keys, in insertion order. Tracks the key set.
    pub fn keys(&self) -> Vec<Rc<str>> {
        DependencyTracker::track(self.id(), PropertyKey::Iterate);
        self.inner.raw.keys()
    }

    /// Number of effects subscribed to `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        DependencyTracker::subscriber_count(self.id(), &PropertyKey::from(key))
    }

    /// Untracked JSON snapshot of the whole graph.
    pub fn to_json(&self) -> serde_json::Value {
        self.inner.raw.to_json()
    }
}

impl From<ReactiveObject> for Value {
    fn from(object: ReactiveObject) -> Self {
        Value::Object(object.inner.raw.clone())
    }
}

impl From<&ReactiveObject> for Value {
    fn from(object: &ReactiveObject) -> Self {
        Value::Object(object.inner.raw.clone())
    }
}

impl fmt::Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("raw", &self.inner.raw)
            .field("policy", &self.policy())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
