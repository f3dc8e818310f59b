//! Observer / Recursive Walk
//!
//! [`observe`] makes an object or array graph reactive in place:
//!
//! - objects get a reactive slot for every key (see
//!   [`define_reactive`](super::define_reactive)); fixed keys are skipped;
//! - arrays have their elements walked recursively (the array type itself
//!   carries the mutation interception).
//!
//! Every observed container gets exactly one [`Observer`], recorded in a
//! thread-local side table keyed by container identity. Observing the same
//! container again returns the existing observer unchanged. The observer is
//! recorded *before* the walk starts, which is also what terminates walks
//! over cyclic graphs.
//!
//! # The Observing Toggle
//!
//! [`ObservingGuard::suspend`] turns off fresh observation while values
//! that an ancestor already owns are assigned into child props, avoiding a
//! redundant re-walk. Containers that are already observed are unaffected.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::dep::Dep;
use super::object::{ContainerId, ReactiveObject};
use super::property::define_reactive;
use super::value::Value;
use crate::error::Diagnostic;
use crate::hooks::Hooks;

thread_local! {
    static OBSERVERS: RefCell<HashMap<ContainerId, Rc<Observer>>> = RefCell::new(HashMap::new());
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Per-container reactive bookkeeping.
#[derive(Debug)]
pub struct Observer {
    id: ContainerId,
    /// "This container changed shape."
    dep: Dep,
    /// Number of instances using this container as root data.
    vm_count: Cell<usize>,
}

impl Observer {
    fn new(id: ContainerId) -> Self {
        Self {
            id,
            dep: Dep::new(),
            vm_count: Cell::new(0),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    pub fn vm_count(&self) -> usize {
        self.vm_count.get()
    }

    pub(crate) fn release_root(&self) {
        self.vm_count.set(self.vm_count.get().saturating_sub(1));
    }
}

/// Observe `value`, returning its observer.
///
/// Returns `None` for scalars, raw containers, and unobserved containers
/// while observation is suspended. `as_root` counts the value as an
/// instance's root data.
pub fn observe(value: &Value, as_root: bool) -> Option<Rc<Observer>> {
    let id = match value {
        Value::Object(object) if !object.is_raw() => object.id(),
        Value::Array(array) if !array.is_raw() => array.id(),
        _ => return None,
    };

    let ob = match lookup(id) {
        Some(ob) => ob,
        None => {
            if !should_observe() {
                return None;
            }

            let ob = Rc::new(Observer::new(id));
            OBSERVERS.with(|table| table.borrow_mut().insert(id, ob.clone()));
            tracing::trace!(container = id.raw(), "observing");

            match value {
                Value::Object(object) => walk(object),
                Value::Array(array) => {
                    for item in array.to_vec() {
                        observe(&item, false);
                    }
                }
                _ => {}
            }
            ob
        }
    };

    if as_root {
        ob.vm_count.set(ob.vm_count.get() + 1);
    }
    Some(ob)
}

fn walk(object: &ReactiveObject) {
    for key in object.keys() {
        define_reactive(object, &key, None, None, false);
    }
}

/// The observer recorded for `id`, if any.
pub fn lookup(id: ContainerId) -> Option<Rc<Observer>> {
    OBSERVERS.with(|table| table.borrow().get(&id).cloned())
}

/// The observer of `value`, if it is an observed container.
pub fn observer_of(value: &Value) -> Option<Rc<Observer>> {
    value.container_id().and_then(lookup)
}

/// Drop the side-table entry of a container that is going away.
pub(crate) fn forget(id: ContainerId) {
    let _ = OBSERVERS.try_with(|table| {
        // A container dropped while the table is borrowed keeps a stale
        // entry; ids are never reused so it is harmless.
        if let Ok(mut table) = table.try_borrow_mut() {
            table.remove(&id);
        }
    });
}

/// Whether fresh observation is currently enabled.
pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Scoped override of the observing toggle.
pub struct ObservingGuard {
    previous: bool,
}

impl ObservingGuard {
    /// Disable fresh observation until the guard is dropped.
    pub fn suspend() -> Self {
        Self::set(false)
    }

    /// Enable fresh observation until the guard is dropped.
    pub fn resume() -> Self {
        Self::set(true)
    }

    fn set(enabled: bool) -> Self {
        let previous = SHOULD_OBSERVE.with(|flag| flag.replace(enabled));
        Self { previous }
    }
}

impl Drop for ObservingGuard {
    fn drop(&mut self) {
        SHOULD_OBSERVE.with(|flag| flag.set(self.previous));
    }
}

/// Set a key on `target`, adding a reactive property if it is new.
///
/// - Arrays: `key` must be an index below `u32::MAX`; the write goes
///   through `splice` so it is observed and notifies (past-the-end indices
///   grow the array first). Other keys are reported and leave the array
///   untouched.
/// - Existing object keys: plain assignment.
/// - New keys on an observed object: a reactive slot is installed and the
///   container dep notifies.
/// - Root instance data refuses new keys with a diagnostic.
/// - Unobserved objects get a plain key.
pub fn set(target: &Value, key: &str, value: Value, hooks: &dyn Hooks, context: &str) -> Value {
    match target {
        Value::Array(array) => {
            let Some(index) = array_index(key) else {
                hooks.report(&Diagnostic::InvalidArrayIndex { key: key.to_string() }, context);
                return value;
            };
            if index >= array.len() {
                array.set_len(index + 1);
            }
            array.splice(index as isize, Some(1), vec![value.clone()]);
            value
        }
        Value::Object(object) => {
            if object.has(key) {
                object.set(key, value.clone());
                return value;
            }

            let ob = lookup(object.id());
            match ob {
                Some(ob) if ob.vm_count() > 0 => {
                    hooks.report(
                        &Diagnostic::RootDataMutation {
                            key: key.to_string(),
                        },
                        context,
                    );
                }
                Some(ob) => {
                    define_reactive(object, key, Some(value.clone()), None, false);
                    ob.dep().notify();
                }
                None => object.insert(key, value.clone()),
            }
            value
        }
        _ => value,
    }
}

/// Parse an array index, bounded the way array lengths are.
fn array_index(key: &str) -> Option<usize> {
    key.parse::<u32>()
        .ok()
        .filter(|index| *index < u32::MAX)
        .and_then(|index| usize::try_from(index).ok())
}

/// Delete a key from `target`, notifying if it was reactive.
pub fn del(target: &Value, key: &str, hooks: &dyn Hooks, context: &str) {
    match target {
        Value::Array(array) => {
            if let Some(index) = array_index(key) {
                if index < array.len() {
                    array.splice(index as isize, Some(1), Vec::new());
                }
            }
        }
        Value::Object(object) => {
            let ob = lookup(object.id());
            if let Some(ob) = &ob {
                if ob.vm_count() > 0 {
                    hooks.report(
                        &Diagnostic::RootDataMutation {
                            key: key.to_string(),
                        },
                        context,
                    );
                    return;
                }
            }

            if !object.remove(key) {
                return;
            }
            if let Some(ob) = ob {
                ob.dep().notify();
            }
        }
        _ => {}
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::RecordingHooks;
    use crate::reactive::Watcher;
    use serde_json::json;

    #[test]
    fn observe_is_idempotent() {
        let value = Value::from(json!({ "a": 1 }));
        let first = observe(&value, false).unwrap();
        let dep_before = value.as_object().unwrap().dep("a").unwrap().id();

        let second = observe(&value, false).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        // No re-walk: the slot dep is unchanged
        assert_eq!(value.as_object().unwrap().dep("a").unwrap().id(), dep_before);
    }

    #[test]
    fn scalars_and_raw_containers_are_not_observed() {
        assert!(observe(&Value::from(1), false).is_none());

        let raw = ReactiveObject::new();
        raw.mark_raw();
        assert!(observe(&Value::Object(raw), false).is_none());
    }

    #[test]
    fn nested_values_are_walked() {
        let value = Value::from(json!({ "list": [{ "x": 1 }], "inner": { "y": 2 } }));
        observe(&value, false);

        let object = value.as_object().unwrap();
        assert!(object.is_reactive("list"));
        let item = object.peek("list").get("0");
        assert!(item.as_object().unwrap().is_reactive("x"));
        assert!(object.peek("inner").as_object().unwrap().is_reactive("y"));
    }

    #[test]
    fn cycles_terminate() {
        let value = Value::from(json!({ "name": "a" }));
        value.as_object().unwrap().insert("me", value.clone());

        let ob = observe(&value, false).unwrap();
        assert!(Rc::ptr_eq(&ob, &observer_of(&value.get("me")).unwrap()));
    }

    #[test]
    fn suspended_toggle_skips_fresh_values_only() {
        let fresh = Value::from(json!({ "a": 1 }));
        let known = Value::from(json!({ "b": 1 }));
        observe(&known, false);

        {
            let _guard = ObservingGuard::suspend();
            assert!(observe(&fresh, false).is_none());
            assert!(observe(&known, false).is_some());
        }

        assert!(should_observe());
        assert!(observe(&fresh, false).is_some());
    }

    #[test]
    fn root_data_counts_instances() {
        let value = Value::from(json!({}));
        let ob = observe(&value, true).unwrap();
        observe(&value, true);
        assert_eq!(ob.vm_count(), 2);
    }

    #[test]
    fn set_adds_reactive_key_and_notifies_container() {
        let hooks = RecordingHooks::new();
        let holder = Value::from(json!({ "obj": {} }));
        observe(&holder, false);
        let holder_obj = holder.as_object().unwrap().clone();

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let reader = holder_obj.clone();
        let _watcher = Watcher::builder(move || {
            runs_clone.set(runs_clone.get() + 1);
            Ok(reader.get("obj").get("added"))
        })
        .sync()
        .build();

        let target = holder_obj.peek("obj");
        set(&target, "added", Value::from(1), hooks.as_ref(), "<Root>");
        assert_eq!(runs.get(), 2);
        assert!(target.as_object().unwrap().is_reactive("added"));

        // Now the key itself is tracked
        target.as_object().unwrap().set("added", Value::from(2));
        assert_eq!(runs.get(), 3);

        del(&target, "added", hooks.as_ref(), "<Root>");
        assert_eq!(runs.get(), 4);
        assert!(!target.as_object().unwrap().has("added"));
        assert!(hooks.diagnostics().is_empty());
    }

    #[test]
    fn set_on_root_data_is_refused() {
        let hooks = RecordingHooks::new();
        let root = Value::from(json!({}));
        observe(&root, true);

        set(&root, "late", Value::from(1), hooks.as_ref(), "<Root>");
        assert!(!root.as_object().unwrap().has("late"));
        assert_eq!(
            hooks.diagnostics(),
            vec![Diagnostic::RootDataMutation {
                key: "late".to_string()
            }]
        );
    }

    #[test]
    fn set_on_array_index_goes_through_splice() {
        let hooks = RecordingHooks::new();
        let list = Value::from(json!([1, 2]));
        observe(&list, false);

        let item = Value::from(json!({ "z": 0 }));
        set(&list, "1", item.clone(), hooks.as_ref(), "<Root>");
        assert_eq!(list.get("1"), item);
        assert!(observer_of(&item).is_some());

        set(&list, "3", Value::from(4), hooks.as_ref(), "<Root>");
        assert_eq!(list.get("length"), Value::from(4));

        del(&list, "0", hooks.as_ref(), "<Root>");
        assert_eq!(list.get("length"), Value::from(3));
    }

    #[test]
    fn set_on_array_rejects_out_of_range_keys() {
        let hooks = RecordingHooks::new();
        let list = Value::from(json!([1, 2]));
        observe(&list, false);

        for key in ["18446744073709551615", "10000000000", "4294967295", "-1", "x"] {
            set(&list, key, Value::from(9), hooks.as_ref(), "<Root>");
        }

        assert_eq!(list.get("length"), Value::from(2));
        assert_eq!(list.as_array().unwrap().to_vec(), vec![Value::from(1), Value::from(2)]);
        assert_eq!(hooks.diagnostics().len(), 5);
        assert_eq!(
            hooks.diagnostics()[0],
            Diagnostic::InvalidArrayIndex { key: "18446744073709551615".to_string() }
        );
    }

    #[test]
    fn dropped_containers_leave_the_side_table() {
        let value = Value::from(json!({ "a": 1 }));
        let id = value.container_id().unwrap();
        observe(&value, false);
        assert!(lookup(id).is_some());

        drop(value);
        assert!(lookup(id).is_none());
    }
}
