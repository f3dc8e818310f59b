//! State Wiring
//!
//! Installs an instance's members from its options, one kind at a time:
//!
//! - **props**: one reactive slot per declared prop, seeded by the prop
//!   validator. Child instances suspend fresh observation while seeding
//!   (the parent already observed those values) and warn when a prop is
//!   written from inside the child.
//! - **methods**: bound to the instance. A name shared with a prop is
//!   reported; the method still takes the key.
//! - **data**: the object (or the result of the factory, called once with
//!   dependency collection suspended) becomes the root data. Keys shared
//!   with props stay props; keys shared with methods become data. Reserved
//!   keys (`_x`, `$x`) are observed but not exposed.
//! - **computed**: one lazy watcher per key, exposed only when the key is
//!   still free. Collisions are reported, not resolved.
//! - **watch**: every handler, including each entry of a list, registers
//!   its own user watcher.

use std::rc::Rc;

use indexmap::IndexMap;

use super::options::{ComponentOptions, ComputedDef, DataOption, Method, WatchCallback, WatchHandler, WatchOptions};
use super::props::{hyphenate, is_reserved_attribute};
use super::{ComputedMember, ComputedRead, Instance, Member, WatchSource};
use crate::error::{Diagnostic, EvalResult};
use crate::reactive::{define_reactive, observe, untracked, CustomSetter, ObservingGuard, ReactiveObject, Value, Watcher};

/// Members every instance already has.
const BUILTIN_MEMBERS: &[&str] = &[
    "$data", "$props", "$set", "$delete", "$watch", "$options", "$parent", "$root", "$el",
    "$refs", "$emit", "$on", "$off", "$once", "$mount", "$destroy", "$forceUpdate", "$nextTick",
    "_uid", "_data", "_props", "_watcher", "_watchers", "_computedWatchers", "_isVue", "_self",
];

/// Wire every member kind in order.
pub(super) fn init_state(vm: &Instance, options: ComponentOptions) {
    init_props(vm, &options.props_data);
    init_methods(vm, &options.methods);
    init_data(vm, options.data.as_ref(), &options.methods);
    init_computed(vm, &options.computed);
    init_watch(vm, &options.watch);
}

fn init_props(vm: &Instance, props_data: &IndexMap<String, Value>) {
    *vm.inner.props_data.borrow_mut() = props_data.clone();

    let is_root = vm.is_root();
    let _observing = (!is_root).then(ObservingGuard::suspend);

    for (key, decl) in &vm.inner.prop_decls {
        let value = vm
            .inner
            .prop_validator
            .validate(key, decl, props_data.get(key), vm);

        let hyphenated = hyphenate(key);
        if is_reserved_attribute(&hyphenated) {
            vm.report(&Diagnostic::ReservedAttribute { key: hyphenated });
        }

        let custom_setter: Option<CustomSetter> = if is_root {
            None
        } else {
            let owner = vm.downgrade();
            let key = key.clone();
            Some(Rc::new(move |_: &Value| {
                if let Some(vm) = owner.upgrade() {
                    if !vm.is_updating_props() {
                        vm.report(&Diagnostic::PropMutation { key: key.clone() });
                    }
                }
            }))
        };

        define_reactive(&vm.inner.props, key, Some(value), custom_setter, false);

        vm.inner
            .members
            .borrow_mut()
            .entry(key.clone())
            .or_insert(Member::Prop);
    }
}

fn init_methods(vm: &Instance, methods: &IndexMap<String, Method>) {
    for (key, method) in methods {
        if vm.inner.prop_decls.contains_key(key) {
            vm.report(&Diagnostic::MethodPropConflict { key: key.clone() });
        }
        if BUILTIN_MEMBERS.contains(&key.as_str()) {
            vm.report(&Diagnostic::ReservedMethod { key: key.clone() });
        }

        vm.inner
            .members
            .borrow_mut()
            .insert(key.clone(), Member::Method(method.clone()));
    }
}

fn init_data(vm: &Instance, data: Option<&DataOption>, methods: &IndexMap<String, Method>) {
    let data = match data {
        None => Value::object(),
        Some(DataOption::Object(value)) => value.clone(),
        Some(DataOption::Factory(factory)) => get_data(vm, factory.as_ref()),
    };

    let data = match data {
        Value::Object(object) => object,
        _ => {
            vm.report(&Diagnostic::DataNotObject);
            ReactiveObject::new()
        }
    };
    *vm.inner.data.borrow_mut() = data.clone();

    for key in data.keys() {
        if methods.contains_key(&key) {
            vm.report(&Diagnostic::DataMethodConflict { key: key.clone() });
        }

        if vm.inner.prop_decls.contains_key(&key) {
            vm.report(&Diagnostic::DataPropConflict { key });
        } else if !is_reserved(&key) {
            vm.inner.members.borrow_mut().insert(key, Member::Data);
        }
    }

    observe(&Value::Object(data), true);
}

/// Call a data factory with collection suspended. Failures yield `{}`.
fn get_data(vm: &Instance, factory: &dyn Fn(&Instance) -> EvalResult) -> Value {
    match untracked(|| factory(vm)) {
        Ok(value) => value,
        Err(error) => {
            vm.report_error(&error, "data()");
            Value::object()
        }
    }
}

fn init_computed(vm: &Instance, computed: &IndexMap<String, ComputedDef>) {
    for (key, def) in computed {
        let read = match (&def.get, def.cache) {
            (None, _) => {
                vm.report(&Diagnostic::MissingComputedGetter { key: key.clone() });
                ComputedRead::Missing
            }
            (Some(get), true) => {
                let owner = vm.downgrade();
                let get = get.clone();
                let watcher = Watcher::builder(move || match owner.upgrade() {
                    Some(vm) => get(&vm),
                    None => Ok(Value::Undefined),
                })
                .lazy()
                .expression(key.clone())
                .owner(vm.owner())
                .hooks(vm.inner.hooks.clone())
                .scheduler(vm.inner.scheduler.clone())
                .build();

                vm.inner.computed.borrow_mut().insert(key.clone(), watcher.clone());
                ComputedRead::Cached(watcher)
            }
            (Some(get), false) => ComputedRead::Uncached(get.clone()),
        };

        let existing = vm.member(key);
        match existing {
            None if !BUILTIN_MEMBERS.contains(&key.as_str()) => {
                let member = Member::Computed(ComputedMember {
                    read,
                    set: def.set.clone(),
                });
                vm.inner.members.borrow_mut().insert(key.clone(), member);
            }
            _ => {
                if vm.data().has(key) {
                    vm.report(&Diagnostic::ComputedDataConflict { key: key.clone() });
                } else if vm.inner.prop_decls.contains_key(key) {
                    vm.report(&Diagnostic::ComputedPropConflict { key: key.clone() });
                } else if matches!(existing, Some(Member::Method(_))) {
                    vm.report(&Diagnostic::ComputedMethodConflict { key: key.clone() });
                }
            }
        }
    }
}

fn init_watch(vm: &Instance, watch: &IndexMap<String, WatchHandler>) {
    for (key, handler) in watch {
        create_watchers(vm, key, handler, WatchOptions::default());
    }
}

fn create_watchers(vm: &Instance, key: &str, handler: &WatchHandler, options: WatchOptions) {
    match handler {
        WatchHandler::List(handlers) => {
            for handler in handlers {
                create_watchers(vm, key, handler, options);
            }
        }
        WatchHandler::WithOptions(handler, options) => create_watchers(vm, key, handler, *options),
        WatchHandler::Callback(callback) => {
            vm.watch_with(WatchSource::Path(key.to_string()), callback.clone(), options);
        }
        WatchHandler::Method(name) => match vm.member(name) {
            Some(Member::Method(method)) => {
                let callback: WatchCallback = Rc::new(move |vm, new, old| {
                    method(vm, &[new.clone(), old.clone()]).map(|_| ())
                });
                vm.watch_with(WatchSource::Path(key.to_string()), callback, options);
            }
            _ => vm.report(&Diagnostic::UnknownWatchMethod {
                key: key.to_string(),
                method: name.clone(),
            }),
        },
    }
}

/// Keys starting with `$` or `_` are reserved for the instance itself.
fn is_reserved(key: &str) -> bool {
    key.starts_with('$') || key.starts_with('_')
}

/// Split a simple dot-delimited path. `None` if it contains anything other
/// than word characters, `.` and `$`.
pub(super) fn parse_path(path: &str) -> Option<Vec<String>> {
    let valid = path
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$');
    if !valid {
        return None;
    }
    Some(path.split('.').map(str::to_string).collect())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
