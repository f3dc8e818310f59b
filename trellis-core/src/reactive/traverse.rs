//! Deep traversal for `deep` watchers.
//!
//! Reads every nested key of a value so the collecting watcher subscribes
//! to all of them. Containers are visited once each, keyed by identity,
//! which keeps cyclic graphs finite.

use std::collections::HashSet;

use super::object::ContainerId;
use super::value::Value;

/// Touch every reactive key reachable from `value`.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    visit(value, &mut seen);
}

fn visit(value: &Value, seen: &mut HashSet<ContainerId>) {
    match value {
        Value::Object(object) => {
            if object.is_raw() || !seen.insert(object.id()) {
                return;
            }
            for key in object.keys() {
                visit(&object.get(&key), seen);
            }
        }
        Value::Array(array) => {
            if array.is_raw() || !seen.insert(array.id()) {
                return;
            }
            for item in array.to_vec() {
                visit(&item, seen);
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
    use crate::reactive::{observe, Watcher};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn traversal_subscribes_to_nested_keys() {
        let root = Value::from(json!({ "a": { "b": { "c": 1 } } }));
        observe(&root, false);

        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let reader = root.clone();
        let _watcher = Watcher::builder(move || {
            runs_clone.set(runs_clone.get() + 1);
            traverse(&reader);
            Ok(Value::Undefined)
        })
        .sync()
        .build();

        let deepest = root.get("a").get("b");
        deepest.as_object().unwrap().set("c", Value::from(2));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn traversal_handles_cycles() {
        let root = Value::from(json!({ "x": 1 }));
        root.as_object().unwrap().insert("self", root.clone());
        observe(&root, false);
        traverse(&root);
    }
}
