//! Reactive Objects
//!
//! A [`ReactiveObject`] is a shared, insertion-ordered map from string keys
//! to properties. It starts out plain; [`observe`](super::observe) converts
//! its keys into reactive slots in place, after which reads register
//! dependencies and writes notify.
//!
//! # Property Kinds
//!
//! - **Data**: a plain stored value.
//! - **Accessor**: user-supplied get/set functions. The property installer
//!   preserves them: a reactive slot over an accessor reads through the
//!   getter and writes through the setter. A getter without a setter makes
//!   the property read-only.
//! - **Fixed**: a non-configurable value. The installer leaves it alone, so
//!   it never becomes reactive.
//! - **Reactive**: an installed [`ReactiveSlot`].

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::dep::Dep;
use super::observer;
use super::property::ReactiveSlot;
use super::value::Value;

/// Identity of an object or array, used as the observer side-table key.
///
/// Ids are never reused, unlike addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// User-defined accessor functions for one key.
#[derive(Clone, Default)]
pub struct Accessor {
    pub get: Option<Rc<dyn Fn() -> Value>>,
    pub set: Option<Rc<dyn Fn(Value)>>,
}

impl Accessor {
    /// An accessor with only a getter (writes are ignored).
    pub fn getter(get: impl Fn() -> Value + 'static) -> Self {
        Self {
            get: Some(Rc::new(get)),
            set: None,
        }
    }

    /// An accessor with both a getter and a setter.
    pub fn new(get: impl Fn() -> Value + 'static, set: impl Fn(Value) + 'static) -> Self {
        Self {
            get: Some(Rc::new(get)),
            set: Some(Rc::new(set)),
        }
    }
}

/// One key of an object.
#[derive(Clone)]
pub enum Property {
    Data(Value),
    Accessor(Accessor),
    Fixed(Value),
    Reactive(Rc<ReactiveSlot>),
}

/// A shared string-keyed container.
///
/// Cloning yields another handle to the same object.
#[derive(Clone)]
pub struct ReactiveObject {
    inner: Rc<ObjectInner>,
}

struct ObjectInner {
    id: ContainerId,
    props: RefCell<IndexMap<String, Property>>,
    raw: Cell<bool>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        observer::forget(self.id);
    }
}

impl ReactiveObject {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: ContainerId::next(),
                props: RefCell::new(IndexMap::new()),
                raw: Cell::new(false),
            }),
        }
    }

    /// Build a plain object from key/value pairs.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let object = Self::new();
        for (key, value) in pairs {
            object.insert(key, value);
        }
        object
    }

    pub fn id(&self) -> ContainerId {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Exclude this object from observation.
    pub fn mark_raw(&self) {
        self.inner.raw.set(true);
    }

    pub fn is_raw(&self) -> bool {
        self.inner.raw.get()
    }

    /// Define (or redefine) a plain data key without any reactivity.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.install(key.into(), Property::Data(value));
    }

    /// Define a key backed by user accessor functions.
    pub fn define_accessor(&self, key: impl Into<String>, accessor: Accessor) {
        self.install(key.into(), Property::Accessor(accessor));
    }

    /// Define a non-configurable key that observation skips.
    pub fn define_fixed(&self, key: impl Into<String>, value: Value) {
        self.install(key.into(), Property::Fixed(value));
    }

    /// Read a key, registering a dependency if it is reactive and a watcher
    /// is collecting.
    pub fn get(&self, key: &str) -> Value {
        match self.property(key) {
            None => Value::Undefined,
            Some(Property::Data(value)) | Some(Property::Fixed(value)) => value,
            Some(Property::Accessor(accessor)) => {
                accessor.get.map(|get| get()).unwrap_or_default()
            }
            Some(Property::Reactive(slot)) => slot.get(),
        }
    }

    /// Read a key without registering any dependency.
    pub fn peek(&self, key: &str) -> Value {
        match self.property(key) {
            None => Value::Undefined,
            Some(Property::Data(value)) | Some(Property::Fixed(value)) => value,
            Some(Property::Accessor(accessor)) => {
                accessor.get.map(|get| get()).unwrap_or_default()
            }
            Some(Property::Reactive(slot)) => slot.peek(),
        }
    }

    /// Assign a key.
    ///
    /// Reactive keys go through their setter (and notify on change).
    /// Assigning a key that does not exist yet adds a plain, non-reactive
    /// key; use [`observer::set`](super::observer::set) to add a reactive one.
    pub fn set(&self, key: &str, value: Value) {
        match self.property(key) {
            Some(Property::Reactive(slot)) => slot.set(value),
            Some(Property::Accessor(accessor)) => {
                if let Some(set) = accessor.set {
                    set(value);
                }
            }
            Some(Property::Fixed(_)) => self.install(key.to_string(), Property::Fixed(value)),
            Some(Property::Data(_)) | None => {
                self.install(key.to_string(), Property::Data(value))
            }
        }
    }

    /// Remove a key without notifying anyone. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.props.borrow_mut().shift_remove(key).is_some()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` has been converted into a reactive slot.
    pub fn is_reactive(&self, key: &str) -> bool {
        matches!(self.property(key), Some(Property::Reactive(_)))
    }

    /// The dep guarding `key`, if it is reactive.
    pub fn dep(&self, key: &str) -> Option<Dep> {
        match self.property(key) {
            Some(Property::Reactive(slot)) => Some(slot.dep().clone()),
            _ => None,
        }
    }

    pub(crate) fn property(&self, key: &str) -> Option<Property> {
        // Clone out so no borrow is held while user code runs
        self.inner.props.borrow().get(key).cloned()
    }

    pub(crate) fn install(&self, key: String, property: Property) {
        self.inner.props.borrow_mut().insert(key, property);
    }
}

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("id", &self.id().raw())
            .field("keys", &self.keys())
            .field("observed", &observer::lookup(self.id()).is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
