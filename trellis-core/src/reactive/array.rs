//! Observable Sequences
//!
//! [`ReactiveArray`] wraps a `Vec<Value>` and intercepts the seven
//! mutating operations: `push`, `pop`, `shift`, `unshift`, `splice`,
//! `sort` and `reverse`.
//!
//! # How Interception Works
//!
//! Each intercepted call:
//!
//! 1. Delegates to the native `Vec` operation, keeping its return value
//!    (new length, removed element(s), or the array itself).
//! 2. Observes the newly inserted elements (`push`/`unshift`: all
//!    arguments; `splice`: the insertion list; otherwise none).
//! 3. Notifies the container dep of the array's observer.
//!
//! Nothing happens in steps 2 and 3 for an array that has not been
//! observed.
//!
//! # Known Gap
//!
//! [`ReactiveArray::set_index`] and [`ReactiveArray::set_len`] are **not**
//! intercepted: they neither observe the written value nor notify. Code
//! that needs a reactive index write should use `splice(i, Some(1), vec![v])`
//! or [`observer::set`](super::observer::set).
//!
//! Index reads ([`ReactiveArray::get`]) do not register dependencies on
//! their own. The property holding the array registers its container dep
//! (and those of nested observed elements) when it is read.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::object::ContainerId;
use super::observer;
use super::value::Value;

/// A shared, observable sequence of values.
///
/// Cloning yields another handle to the same array.
#[derive(Clone)]
pub struct ReactiveArray {
    inner: Rc<ArrayInner>,
}

struct ArrayInner {
    id: ContainerId,
    items: RefCell<Vec<Value>>,
    raw: std::cell::Cell<bool>,
}

impl Drop for ArrayInner {
    fn drop(&mut self) {
        observer::forget(self.id);
    }
}

impl ReactiveArray {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                id: ContainerId::next(),
                items: RefCell::new(items),
                raw: std::cell::Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> ContainerId {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &ReactiveArray) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Exclude this array from observation.
    pub fn mark_raw(&self) {
        self.inner.raw.set(true);
    }

    pub fn is_raw(&self) -> bool {
        self.inner.raw.get()
    }

    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, or `Undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        self.inner
            .items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Copy of the current elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    // ------------------------------------------------------------------
    // Intercepted operations
    // ------------------------------------------------------------------

    /// Append `items`; returns the new length.
    pub fn push(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let inserted: Vec<Value> = items.into_iter().collect();
        let len = {
            let mut vec = self.inner.items.borrow_mut();
            vec.extend(inserted.iter().cloned());
            vec.len()
        };
        self.after_mutation(&inserted);
        len
    }

    /// Remove and return the last element (`Undefined` when empty).
    pub fn pop(&self) -> Value {
        let removed = self.inner.items.borrow_mut().pop().unwrap_or_default();
        self.after_mutation(&[]);
        removed
    }

    /// Remove and return the first element (`Undefined` when empty).
    pub fn shift(&self) -> Value {
        let removed = {
            let mut vec = self.inner.items.borrow_mut();
            if vec.is_empty() {
                Value::Undefined
            } else {
                vec.remove(0)
            }
        };
        self.after_mutation(&[]);
        removed
    }

    /// Prepend `items` (keeping their order); returns the new length.
    pub fn unshift(&self, items: impl IntoIterator<Item = Value>) -> usize {
        let inserted: Vec<Value> = items.into_iter().collect();
        let len = {
            let mut vec = self.inner.items.borrow_mut();
            vec.splice(0..0, inserted.iter().cloned());
            vec.len()
        };
        self.after_mutation(&inserted);
        len
    }

    /// Remove `delete_count` elements starting at `start` and insert
    /// `items` in their place; returns the removed elements.
    ///
    /// A negative `start` counts from the end. Both bounds are clamped the
    /// way the native operation clamps them; `None` removes everything
    /// from `start` on.
    pub fn splice(&self, start: isize, delete_count: Option<usize>, items: Vec<Value>) -> Vec<Value> {
        let removed = {
            let mut vec = self.inner.items.borrow_mut();
            let len = vec.len();
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs())
            } else {
                (start as usize).min(len)
            };
            let count = delete_count.unwrap_or(len - start).min(len - start);
            vec.splice(start..start + count, items.iter().cloned())
                .collect::<Vec<_>>()
        };
        self.after_mutation(&items);
        removed
    }

    /// Sort in place using the default ordering: `Undefined` last, every
    /// other element compared by its string form. Returns the array.
    pub fn sort(&self) -> ReactiveArray {
        self.sort_by(|a, b| a.to_display_string().cmp(&b.to_display_string()))
    }

    /// Stable in-place sort with a comparator. `Undefined` elements always
    /// sort to the end without being passed to `compare`. Returns the array.
    pub fn sort_by(&self, mut compare: impl FnMut(&Value, &Value) -> Ordering) -> ReactiveArray {
        // The comparator may read this array, so sort a copy.
        let mut sorted = self.inner.items.borrow().clone();
        sorted.sort_by(|a, b| match (a.is_undefined(), b.is_undefined()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(a, b),
        });
        *self.inner.items.borrow_mut() = sorted;
        self.after_mutation(&[]);
        self.clone()
    }

    /// Reverse in place. Returns the array.
    pub fn reverse(&self) -> ReactiveArray {
        self.inner.items.borrow_mut().reverse();
        self.after_mutation(&[]);
        self.clone()
    }

    // ------------------------------------------------------------------
    // Not intercepted
    // ------------------------------------------------------------------

    /// Direct index assignment. Grows the array with `Undefined` when
    /// `index` is past the end. Does not observe `value` or notify.
    pub fn set_index(&self, index: usize, value: Value) {
        let mut vec = self.inner.items.borrow_mut();
        if index >= vec.len() {
            vec.resize(index + 1, Value::Undefined);
        }
        vec[index] = value;
    }

    /// Direct length assignment (truncate or pad with `Undefined`).
    /// Does not notify.
    pub fn set_len(&self, len: usize) {
        self.inner.items.borrow_mut().resize(len, Value::Undefined);
    }

    fn after_mutation(&self, inserted: &[Value]) {
        let Some(ob) = observer::lookup(self.id()) else {
            return;
        };
        for value in inserted {
            observer::observe(value, false);
        }
        ob.dep().notify();
    }
}

impl Default for ReactiveArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveArray")
            .field("id", &self.id().raw())
            .field("len", &self.len())
            .field("observed", &observer::lookup(self.id()).is_some())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Watcher};
    use std::cell::Cell;

    fn numbers(values: &[i32]) -> ReactiveArray {
        ReactiveArray::from_vec(values.iter().map(|&n| Value::from(n)).collect())
    }

    fn as_numbers(array: &ReactiveArray) -> Vec<f64> {
        array.to_vec().iter().filter_map(Value::as_f64).collect()
    }

    /// Count notifications of the array's container dep.
    fn count_notifications(array: &ReactiveArray) -> (Watcher, Rc<Cell<usize>>) {
        let value = Value::Array(array.clone());
        let ob = observe(&value, false).expect("array should be observable");
        let dep = ob.dep().clone();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let watcher = Watcher::builder(move || {
            dep.depend();
            runs_clone.set(runs_clone.get() + 1);
            Ok(Value::Undefined)
        })
        .sync()
        .build();
        runs.set(0);
        (watcher, runs)
    }

    #[test]
    fn push_returns_new_length_and_notifies_once() {
        let array = numbers(&[1, 2]);
        let (_watcher, runs) = count_notifications(&array);

        assert_eq!(array.push([Value::from(3)]), 3);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn pop_returns_removed_element_and_notifies_once() {
        let array = numbers(&[1, 2]);
        let (_watcher, runs) = count_notifications(&array);

        assert_eq!(array.pop(), Value::from(2));
        assert_eq!(runs.get(), 1);

        assert_eq!(array.pop(), Value::from(1));
        assert_eq!(array.pop(), Value::Undefined);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn shift_and_unshift() {
        let array = numbers(&[2, 3]);
        assert_eq!(array.unshift([Value::from(0), Value::from(1)]), 4);
        assert_eq!(as_numbers(&array), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(array.shift(), Value::from(0));
        assert_eq!(as_numbers(&array), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn splice_clamps_like_native() {
        let array = numbers(&[1, 2, 3, 4, 5]);

        let removed = array.splice(1, Some(2), vec![Value::from(9)]);
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(as_numbers(&array), vec![1.0, 9.0, 4.0, 5.0]);

        let removed = array.splice(-1, None, vec![]);
        assert_eq!(removed, vec![Value::from(5)]);

        let removed = array.splice(10, Some(3), vec![Value::from(7)]);
        assert!(removed.is_empty());
        assert_eq!(as_numbers(&array), vec![1.0, 9.0, 4.0, 7.0]);
    }

    #[test]
    fn inserted_objects_become_observed() {
        let array = numbers(&[]);
        let (_watcher, _runs) = count_notifications(&array);

        let item = Value::object();
        array.push([item.clone()]);
        assert!(observer::lookup(item.container_id().unwrap()).is_some());

        let spliced = Value::object();
        array.splice(0, Some(0), vec![spliced.clone()]);
        assert!(observer::lookup(spliced.container_id().unwrap()).is_some());
    }

    #[test]
    fn default_sort_compares_strings_and_sinks_undefined() {
        let array = ReactiveArray::from_vec(vec![
            Value::from(10),
            Value::Undefined,
            Value::from(9),
            Value::from(1),
        ]);
        let returned = array.sort();

        assert!(returned.ptr_eq(&array));
        assert_eq!(
            array.to_vec(),
            vec![Value::from(1), Value::from(10), Value::from(9), Value::Undefined]
        );
    }

    #[test]
    fn sort_by_and_reverse_notify() {
        let array = numbers(&[3, 1, 2]);
        let (_watcher, runs) = count_notifications(&array);

        array.sort_by(|a, b| a.as_f64().partial_cmp(&b.as_f64()).unwrap());
        assert_eq!(as_numbers(&array), vec![1.0, 2.0, 3.0]);
        array.reverse();
        assert_eq!(as_numbers(&array), vec![3.0, 2.0, 1.0]);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn sort_comparator_may_read_the_array() {
        let array = numbers(&[2, 3, 1]);
        let reader = array.clone();

        array.sort_by(|a, b| {
            assert_eq!(reader.len(), 3);
            a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal)
        });
        assert_eq!(as_numbers(&array), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn index_and_length_writes_are_not_intercepted() {
        let array = numbers(&[1, 2, 3]);
        let (_watcher, runs) = count_notifications(&array);

        let item = Value::object();
        array.set_index(0, item.clone());
        array.set_len(1);

        assert_eq!(array.len(), 1);
        assert_eq!(runs.get(), 0);
        assert!(observer::lookup(item.container_id().unwrap()).is_none());

        array.set_index(3, Value::from(4));
        assert_eq!(array.len(), 4);
        assert_eq!(array.get(2), Value::Undefined);
    }

    #[test]
    fn unobserved_array_mutates_silently() {
        let array = numbers(&[1]);
        let item = Value::object();
        array.push([item.clone()]);
        assert!(observer::lookup(item.container_id().unwrap()).is_none());
    }
}
