//! Dynamic values for reactive objects.
//!
//! [`Value`] is the payload type of [`ReactiveObject`](super::ReactiveObject)
//! and [`LegacyObject`](super::LegacyObject). [`Object`] is the raw plain
//! object underneath a proxy: an insertion-ordered map of fields with a
//! stable identity.
//!
//! Equality is strict: objects compare by identity, numbers by IEEE
//! equality (so `NaN` never equals itself and writing `NaN` always counts as
//! a change).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use super::tracker::{DependencyTracker, TargetId};
use crate::error::{ReactiveError, Result};

/// A dynamically typed value stored in an object field.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(Rc<str>),
    Object(Object),
}

impl Value {
    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Object(_) => "object",
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Build a value from JSON. Arrays are not part of the value model.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::Text(Rc::from(s)),
            serde_json::Value::Object(map) => {
                let object = Object::new();
                for (key, value) in map {
                    object.insert(key.as_str(), Self::from_json(value)?);
                }
                Self::Object(object)
            }
            serde_json::Value::Array(_) => {
                return Err(ReactiveError::InvalidArgument {
                    expected: "object, number, text, bool or null",
                    found: "array",
                })
            }
        })
    }

    /// Snapshot as JSON. Non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Text(s) => serde_json::Value::String(s.to_string()),
            Self::Object(o) => o.to_json(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

struct ObjectData {
    id: TargetId,
    fields: RefCell<IndexMap<Rc<str>, Value>>,
}

impl Drop for ObjectData {
    fn drop(&mut self) {
        trace!(object = self.id.raw(), "object dropped");
        DependencyTracker::release_target(self.id);
    }
}

/// A raw plain object: ordered fields behind a shared, identity-bearing
/// handle.
///
/// Cloning an `Object` clones the handle, not the fields. Reads and writes
/// here are untracked; wrap the object in a
/// [`ReactiveObject`](super::ReactiveObject) to observe it.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectData>,
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectData {
                id: TargetId::new(),
                fields: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Create an object from key/value pairs, in order.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let object = Self::new();
        for (key, value) in pairs {
            object.insert(key, value);
        }
        object
    }

    /// Build an object from a JSON document, which must be a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Value::from_json(json)? {
            Value::Object(object) => Ok(object),
            other => Err(ReactiveError::not_an_object(other.type_name())),
        }
    }

    /// Identity used by the dependency tracker.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Whether two handles point at the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.fields.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.fields.borrow().contains_key(key)
    }

    /// Write a field, returning the previous value.
    pub fn insert(&self, key: impl Into<Rc<str>>, value: impl Into<Value>) -> Option<Value> {
        self.inner
            .fields
            .borrow_mut()
            .insert(key.into(), value.into())
    }

    /// Remove a field, returning its value. Keeps the order of the others.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.fields.borrow_mut().shift_remove(key)
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.fields.borrow().is_empty()
    }

    /// Snapshot as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let fields = self.inner.fields.borrow();
        serde_json::Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_json()))
                .collect(),
        )
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    // Fields may contain cycles back to this object, so only keys are shown.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.inner.id)
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_compare_by_identity() {
        let a = Object::from_pairs([("x", 1)]);
        let b = Object::from_pairs([("x", 1)]);

        assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
        assert_ne!(Value::from(a), Value::from(b));
    }

    #[test]
    fn nan_never_equals_itself() {
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_eq!(Value::Number(1.0), Value::from(1));
        assert_ne!(Value::Null, Value::Bool(false));
    }

    #[test]
    fn insert_and_remove_keep_order() {
        let object = Object::from_pairs([("a", 1), ("b", 2), ("c", 3)]);
        assert_eq!(object.remove("b"), Some(Value::from(2)));

        object.insert("d", 4);
        let keys: Vec<String> = object.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["a", "c", "d"]);
    }

    #[test]
    fn json_round_trip_for_nested_objects() {
        let doc = json!({ "count": 1.0, "nested": { "label": "x", "on": true, "none": null } });
        let object = Object::from_json(doc.clone()).unwrap();

        assert!(object.get("nested").unwrap().is_object());
        assert_eq!(object.to_json(), doc);
    }

    #[test]
    fn non_object_json_is_rejected() {
        let err = Object::from_json(json!(3)).unwrap_err();
        assert!(matches!(
            err,
            ReactiveError::InvalidArgument { found: "number", .. }
        ));

        let err = Object::from_json(json!({ "list": [1, 2] })).unwrap_err();
        assert!(matches!(err, ReactiveError::InvalidArgument { found: "array", .. }));
    }
}
