//! Dynamic Values
//!
//! Component state is a graph of dynamically typed values. Scalars are
//! stored inline; objects and arrays are shared, identity-compared
//! containers that the observer can make reactive in place.
//!
//! # Equality
//!
//! Two notions of equality exist:
//!
//! - [`Value::same_value`] is the change-detection rule used by reactive
//!   setters and watchers. It treats `NaN` as equal to `NaN` (so assigning
//!   `NaN` over `NaN` is not a change) and `-0` as equal to `+0`.
//! - `PartialEq` is plain structural equality on scalars and identity on
//!   containers; `NaN != NaN` as usual.

use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::array::ReactiveArray;
use super::object::{ContainerId, ReactiveObject};

/// A dynamically typed state value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ReactiveObject),
    Array(ReactiveArray),
}

impl Value {
    /// A fresh, empty plain object.
    pub fn object() -> Self {
        Value::Object(ReactiveObject::new())
    }

    /// A fresh array holding `items`.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ReactiveArray::from_vec(items))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Objects and arrays.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Truthiness in the usual scripting sense.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) => true,
        }
    }

    /// Name of the value's type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Object(_) => "Object",
            Value::Array(_) => "Array",
        }
    }

    /// Identity of the container, if this is one.
    pub fn container_id(&self) -> Option<ContainerId> {
        match self {
            Value::Object(o) => Some(o.id()),
            Value::Array(a) => Some(a.id()),
            _ => None,
        }
    }

    /// Change-detection equality (see the module docs).
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// Read a key. Objects read through their property (tracking when a
    /// watcher is active); arrays answer indices and `length`; everything
    /// else yields `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(o) => o.get(key),
            Value::Array(a) => {
                if key == "length" {
                    Value::Number(a.len() as f64)
                } else {
                    key.parse::<usize>().map(|i| a.get(i)).unwrap_or_default()
                }
            }
            Value::String(s) if key == "length" => Value::Number(s.chars().count() as f64),
            _ => Value::Undefined,
        }
    }

    /// String conversion used by the default array sort.
    pub fn to_display_string(&self) -> String {
        let mut seen = HashSet::new();
        self.display_into(&mut seen)
    }

    fn display_into(&self, seen: &mut HashSet<ContainerId>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Array(a) => {
                if !seen.insert(a.id()) {
                    return String::new();
                }
                let parts: Vec<String> = a
                    .to_vec()
                    .iter()
                    .map(|item| match item {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.display_into(seen),
                    })
                    .collect();
                seen.remove(&a.id());
                parts.join(",")
            }
        }
    }

    /// Snapshot as JSON without registering dependencies.
    ///
    /// `Undefined` becomes `null`, non-finite numbers become `null`, and a
    /// container reached again through a cycle is cut off as `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = HashSet::new();
        self.json_into(&mut seen)
    }

    fn json_into(&self, seen: &mut HashSet<ContainerId>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(|num| {
                    if n.fract() == 0.0 && n.abs() < 9.0e15 {
                        Json::from(*n as i64)
                    } else {
                        Json::Number(num)
                    }
                })
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.to_string()),
            Value::Object(o) => {
                if !seen.insert(o.id()) {
                    return Json::Null;
                }
                let map = o
                    .keys()
                    .into_iter()
                    .map(|key| {
                        let value = o.peek(&key).json_into(seen);
                        (key, value)
                    })
                    .collect();
                seen.remove(&o.id());
                Json::Object(map)
            }
            Value::Array(a) => {
                if !seen.insert(a.id()) {
                    return Json::Null;
                }
                let items = a.to_vec().iter().map(|item| item.json_into(seen)).collect();
                seen.remove(&a.id());
                Json::Array(items)
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(o) => Debug::fmt(o, f),
            Value::Array(a) => Debug::fmt(a, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<ReactiveObject> for Value {
    fn from(o: ReactiveObject) -> Self {
        Value::Object(o)
    }
}

impl From<ReactiveArray> for Value {
    fn from(a: ReactiveArray) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<serde_json::Value> for Value {
    /// Build plain (not yet observed) containers from JSON.
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                let object = ReactiveObject::new();
                for (key, value) in map {
                    object.insert(key, Value::from(value));
                }
                Value::Object(object)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_value_treats_nan_as_unchanged() {
        let nan = Value::Number(f64::NAN);
        assert!(nan.same_value(&Value::Number(f64::NAN)));
        assert_ne!(nan, Value::Number(f64::NAN));
    }

    #[test]
    fn same_value_equates_signed_zero() {
        assert!(Value::Number(0.0).same_value(&Value::Number(-0.0)));
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::object();
        let b = Value::object();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn json_conversion_preserves_shape() {
        let source = json!({ "count": 1, "items": [1, "two", null], "nested": { "ok": true } });
        let value = Value::from(source.clone());
        assert_eq!(value.to_json(), source);
        assert_eq!(value.get("items").get("length"), Value::from(3));
        assert_eq!(value.get("nested").get("ok"), Value::Bool(true));
    }

    #[test]
    fn cyclic_json_snapshot_terminates() {
        let value = Value::from(json!({ "name": "root" }));
        let object = value.as_object().unwrap().clone();
        object.insert("myself", value.clone());
        assert_eq!(value.to_json(), json!({ "name": "root", "myself": null }));
    }

    #[test]
    fn display_strings_follow_script_conventions() {
        assert_eq!(Value::from(10).to_display_string(), "10");
        assert_eq!(Value::from(1.5).to_display_string(), "1.5");
        assert_eq!(Value::Number(f64::NAN).to_display_string(), "NaN");
        let arr = Value::array(vec![Value::from(1), Value::Null, Value::from("x")]);
        assert_eq!(arr.to_display_string(), "1,,x");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(Value::from("a").is_truthy());
        assert!(Value::object().is_truthy());
    }
}
