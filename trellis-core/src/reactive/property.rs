//! Reactive Property Installer
//!
//! [`define_reactive`] turns one `(object, key)` pair into a reactive slot:
//! a cell owning exactly one [`Dep`] and the current value, with read and
//! write operations that forward interception to that dep.
//!
//! # Reads
//!
//! While a watcher is collecting, a read registers:
//!
//! - the slot's own dep;
//! - the container dep of the value's observer, if the value is observed,
//!   so container-shape changes (array mutations, reactive key additions)
//!   reach whoever read the key;
//! - for arrays, the container deps of every observed element, nested
//!   arrays included. Array mutations only notify the container dep, so
//!   without this, replacing an item inside a nested array would go
//!   unnoticed by readers that reached it through an index.
//!
//! # Writes
//!
//! A write that is [`same_value`](Value::same_value)-equal to the current
//! value is a no-op. Otherwise the value is stored (through a preserved
//! setter if one existed), observed if it is a container, and the dep
//! notifies.

use std::cell::RefCell;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::object::{Accessor, Property, ReactiveObject};
use super::observer;
use super::value::Value;

/// Hook run before a changed value is stored.
pub type CustomSetter = Rc<dyn Fn(&Value)>;

/// One reactive `(object, key)` slot.
pub struct ReactiveSlot {
    dep: Dep,
    value: RefCell<Value>,
    getter: Option<Rc<dyn Fn() -> Value>>,
    setter: Option<Rc<dyn Fn(Value)>>,
    custom_setter: Option<CustomSetter>,
    shallow: bool,
}

impl ReactiveSlot {
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Current value, registering dependencies when a watcher is collecting.
    pub fn get(&self) -> Value {
        let value = self.peek();

        if ReactiveContext::is_active() {
            self.dep.depend();

            if !self.shallow {
                if let Some(ob) = observer::observer_of(&value) {
                    ob.dep().depend();
                    if let Value::Array(array) = &value {
                        depend_array(&array.to_vec());
                    }
                }
            }
        }

        value
    }

    /// Current value without registering anything.
    pub fn peek(&self) -> Value {
        match &self.getter {
            Some(getter) => getter(),
            None => self.value.borrow().clone(),
        }
    }

    /// Store `new_value` and notify if it differs from the current value.
    pub fn set(&self, new_value: Value) {
        let current = self.peek();
        if current.same_value(&new_value) {
            return;
        }

        if let Some(custom_setter) = &self.custom_setter {
            custom_setter(&new_value);
        }

        // Accessor with a getter but no setter: read-only
        if self.getter.is_some() && self.setter.is_none() {
            return;
        }

        match &self.setter {
            Some(setter) => setter(new_value.clone()),
            None => *self.value.borrow_mut() = new_value.clone(),
        }

        if !self.shallow {
            observer::observe(&new_value, false);
        }

        self.dep.notify();
    }
}

/// Register the container deps of every observed element of an array.
fn depend_array(items: &[Value]) {
    for item in items {
        if let Some(ob) = observer::observer_of(item) {
            ob.dep().depend();
        }
        if let Value::Array(nested) = item {
            depend_array(&nested.to_vec());
        }
    }
}

/// Install a reactive slot for `key` on `object`.
///
/// - `value`: initial value; when `None` the current value of the key is
///   used (unless the key is a getter-only accessor, whose value is always
///   read through the getter).
/// - `custom_setter`: runs before a changed value is stored.
/// - `shallow`: skip observing the value and registering its child deps.
///
/// Fixed (non-configurable) keys are left untouched. An existing accessor
/// (or an already installed slot) is preserved: the new slot reads and
/// writes through it.
pub fn define_reactive(
    object: &ReactiveObject,
    key: &str,
    value: Option<Value>,
    custom_setter: Option<CustomSetter>,
    shallow: bool,
) {
    let existing = object.property(key);

    let accessor = match existing {
        Some(Property::Fixed(_)) => return,
        Some(Property::Accessor(accessor)) => accessor,
        Some(Property::Reactive(slot)) => {
            let read = slot.clone();
            let write = slot;
            Accessor::new(move || read.peek(), move |v| write.set(v))
        }
        Some(Property::Data(_)) | None => Accessor::default(),
    };

    let value = match value {
        Some(value) => value,
        None if accessor.get.is_none() || accessor.set.is_some() => object.peek(key),
        None => Value::Undefined,
    };

    if !shallow {
        observer::observe(&value, false);
    }

    let slot = ReactiveSlot {
        dep: Dep::new(),
        value: RefCell::new(value),
        getter: accessor.get,
        setter: accessor.set,
        custom_setter,
        shallow,
    };

    object.install(key.to_string(), Property::Reactive(Rc::new(slot)));
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Watcher};
    use serde_json::json;
    use std::cell::Cell;

    fn counting_watcher(read: impl Fn() -> Value + 'static) -> (Watcher, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let watcher = Watcher::builder(move || {
            runs_clone.set(runs_clone.get() + 1);
            Ok(read())
        })
        .sync()
        .build();
        (watcher, runs)
    }

    #[test]
    fn write_notifies_readers_only_on_change() {
        let object = ReactiveObject::new();
        define_reactive(&object, "k", Some(Value::from(0)), None, false);

        let reader = object.clone();
        let (_watcher, runs) = counting_watcher(move || reader.get("k"));
        assert_eq!(runs.get(), 1);

        object.set("k", Value::from(1));
        assert_eq!(runs.get(), 2);

        object.set("k", Value::from(1));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn nan_over_nan_is_not_a_change() {
        let object = ReactiveObject::new();
        define_reactive(&object, "n", Some(Value::Number(f64::NAN)), None, false);

        let reader = object.clone();
        let (_watcher, runs) = counting_watcher(move || reader.get("n"));

        object.set("n", Value::Number(f64::NAN));
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn assigned_containers_are_observed() {
        let object = ReactiveObject::new();
        define_reactive(&object, "child", None, None, false);

        let child = Value::from(json!({ "x": 1 }));
        object.set("child", child.clone());
        assert!(child.as_object().unwrap().is_reactive("x"));
    }

    #[test]
    fn shallow_slot_does_not_observe() {
        let object = ReactiveObject::new();
        let child = Value::from(json!({ "x": 1 }));
        define_reactive(&object, "child", Some(child.clone()), None, true);

        assert!(!child.as_object().unwrap().is_reactive("x"));
    }

    #[test]
    fn preserves_existing_accessor() {
        let backing = Rc::new(RefCell::new(Value::from(1)));
        let read = backing.clone();
        let write = backing.clone();

        let object = ReactiveObject::new();
        object.define_accessor(
            "x",
            Accessor::new(move || read.borrow().clone(), move |v| *write.borrow_mut() = v),
        );
        define_reactive(&object, "x", None, None, false);

        let reader = object.clone();
        let (_watcher, runs) = counting_watcher(move || reader.get("x"));

        object.set("x", Value::from(2));
        assert_eq!(*backing.borrow(), Value::from(2));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn getter_only_accessor_stays_readonly() {
        let object = ReactiveObject::new();
        object.define_accessor("answer", Accessor::getter(|| Value::from(42)));
        define_reactive(&object, "answer", None, None, false);

        object.set("answer", Value::from(1));
        assert_eq!(object.get("answer"), Value::from(42));
    }

    #[test]
    fn fixed_keys_are_skipped() {
        let object = ReactiveObject::new();
        object.define_fixed("id", Value::from(7));
        define_reactive(&object, "id", None, None, false);
        assert!(!object.is_reactive("id"));
    }

    #[test]
    fn custom_setter_runs_before_store() {
        let object = ReactiveObject::new();
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        define_reactive(
            &object,
            "p",
            Some(Value::from(1)),
            Some(Rc::new(move |_| calls_clone.set(calls_clone.get() + 1))),
            false,
        );

        object.set("p", Value::from(1));
        assert_eq!(calls.get(), 0);
        object.set("p", Value::from(2));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn nested_array_item_replacement_reaches_index_readers() {
        let root = Value::from(json!({ "rows": [[1, 2], [3, 4]] }));
        observe(&root, true);
        let object = root.as_object().unwrap().clone();

        let reader = object.clone();
        let (_watcher, runs) = counting_watcher(move || reader.get("rows").get("1").get("0"));
        assert_eq!(runs.get(), 1);

        // Mutate the inner array only; the outer key was never reassigned
        let inner = object.peek("rows").get("1");
        inner.as_array().unwrap().splice(0, Some(1), vec![Value::from(30)]);
        assert_eq!(runs.get(), 2);
    }
}
