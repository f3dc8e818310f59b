//! Prop Validation
//!
//! Resolves the value a declared prop starts with (or is updated to) from
//! what the parent supplied:
//!
//! 1. Boolean props that were not supplied and have no default become
//!    `false`; an empty string (or the hyphenated prop name) becomes `true`
//!    unless `String` is listed before `Boolean`.
//! 2. An `Undefined` value falls back to the declared default. Defaults
//!    are fresh values, so they are observed even while the parent has
//!    observation suspended.
//! 3. The result is checked: required, declared types, custom validator.
//!    Failures are reported and the value is used anyway.

use super::options::{PropDecl, PropDefault, PropType};
use super::Instance;
use crate::error::Diagnostic;
use crate::reactive::{observe, ObservingGuard, Value};

/// Attribute names a prop may not use.
const RESERVED_ATTRIBUTES: &[&str] = &["key", "ref", "slot", "slot-scope", "is"];

/// Strategy turning supplied prop data into prop values.
pub trait PropValidator {
    /// The value `key` should hold given `supplied` (`None` when the parent
    /// did not pass the prop at all).
    fn validate(&self, key: &str, decl: &PropDecl, supplied: Option<&Value>, vm: &Instance) -> Value;
}

/// The standard resolution and checking rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPropValidator;

impl PropValidator for DefaultPropValidator {
    fn validate(&self, key: &str, decl: &PropDecl, supplied: Option<&Value>, vm: &Instance) -> Value {
        let absent = supplied.is_none();
        let mut value = supplied.cloned().unwrap_or_default();

        if let Some(boolean_index) = type_index(decl, PropType::Boolean) {
            if absent && decl.default.is_none() {
                value = Value::Bool(false);
            } else if let Value::String(s) = &value {
                if s.is_empty() || s.as_ref() == hyphenate(key) {
                    let string_index = type_index(decl, PropType::String);
                    if string_index.map_or(true, |index| boolean_index < index) {
                        value = Value::Bool(true);
                    }
                }
            }
        }

        if value.is_undefined() {
            value = default_value(key, decl, vm);
            let _observing = ObservingGuard::resume();
            observe(&value, false);
        }

        assert_prop(key, decl, &value, absent, vm);
        value
    }
}

fn type_index(decl: &PropDecl, kind: PropType) -> Option<usize> {
    decl.types.iter().position(|t| *t == kind)
}

fn default_value(key: &str, decl: &PropDecl, vm: &Instance) -> Value {
    let Some(default) = &decl.default else {
        return Value::Undefined;
    };

    // A prop that was already defaulted keeps its earlier default so
    // watchers do not fire for a freshly built but equivalent value.
    if !vm.was_supplied(key) {
        let previous = vm.props().peek(key);
        if !previous.is_undefined() {
            return previous;
        }
    }

    match default {
        PropDefault::Value(value) => value.clone(),
        PropDefault::Factory(factory) => factory(vm),
    }
}

fn assert_prop(key: &str, decl: &PropDecl, value: &Value, absent: bool, vm: &Instance) {
    if decl.required && absent {
        vm.report(&Diagnostic::MissingRequiredProp { key: key.to_string() });
        return;
    }

    if matches!(value, Value::Undefined | Value::Null) && !decl.required {
        return;
    }

    if !decl.types.is_empty() && !decl.types.iter().any(|t| t.matches(value)) {
        let expected = decl
            .types
            .iter()
            .map(PropType::name)
            .collect::<Vec<_>>()
            .join(", ");
        vm.report(&Diagnostic::InvalidPropType {
            key: key.to_string(),
            expected,
            found: value.type_name().to_string(),
        });
        return;
    }

    if let Some(validator) = &decl.validator {
        if !validator(value) {
            vm.report(&Diagnostic::PropValidatorFailed { key: key.to_string() });
        }
    }
}

/// `fooBar` → `foo-bar`.
pub fn hyphenate(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut previous: Option<char> = None;

    for c in key.chars() {
        if c.is_uppercase() {
            if previous.is_some_and(|p| p.is_alphanumeric() || p == '_') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

/// Whether a (hyphenated) name is reserved for template attributes.
pub fn is_reserved_attribute(name: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&name)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::RecordingHooks;
    use crate::instance::ComponentOptions;
    use crate::reactive::observer::observer_of;
    use serde_json::json;

    fn instance() -> (Instance, std::rc::Rc<RecordingHooks>) {
        let hooks = RecordingHooks::new();
        let vm = Instance::new(ComponentOptions::new().hooks(hooks.clone()));
        (vm, hooks)
    }

    #[test]
    fn hyphenates_camel_case() {
        assert_eq!(hyphenate("slotScope"), "slot-scope");
        assert_eq!(hyphenate("fooBarBaz"), "foo-bar-baz");
        assert_eq!(hyphenate("Already"), "already");
        assert!(is_reserved_attribute(&hyphenate("slotScope")));
        assert!(!is_reserved_attribute("title"));
    }

    #[test]
    fn absent_boolean_is_false() {
        let (vm, _) = instance();
        let decl = PropDecl::of(PropType::Boolean);
        assert_eq!(DefaultPropValidator.validate("open", &decl, None, &vm), Value::Bool(false));
    }

    #[test]
    fn empty_string_casts_to_true_for_booleans() {
        let (vm, _) = instance();
        let decl = PropDecl::of(PropType::Boolean);
        let value = DefaultPropValidator.validate("open", &decl, Some(&Value::from("")), &vm);
        assert_eq!(value, Value::Bool(true));

        let value = DefaultPropValidator.validate("isOpen", &decl, Some(&Value::from("is-open")), &vm);
        assert_eq!(value, Value::Bool(true));

        // String listed first keeps the string
        let decl = PropDecl::of(PropType::String).or(PropType::Boolean);
        let value = DefaultPropValidator.validate("open", &decl, Some(&Value::from("")), &vm);
        assert_eq!(value, Value::from(""));
    }

    #[test]
    fn defaults_are_fresh_and_observed() {
        let (vm, _) = instance();
        let decl = PropDecl::of(PropType::Object).default_factory(|_| Value::from(json!({ "x": 1 })));

        let value = {
            let _suspended = ObservingGuard::suspend();
            DefaultPropValidator.validate("config", &decl, None, &vm)
        };
        assert!(observer_of(&value).is_some());
    }

    #[test]
    fn missing_required_prop_is_reported() {
        let (vm, hooks) = instance();
        let decl = PropDecl::of(PropType::String).required();
        DefaultPropValidator.validate("title", &decl, None, &vm);
        assert_eq!(
            hooks.diagnostics(),
            vec![Diagnostic::MissingRequiredProp { key: "title".to_string() }]
        );
    }

    #[test]
    fn type_mismatch_is_reported_but_value_kept() {
        let (vm, hooks) = instance();
        let decl = PropDecl::of(PropType::Number).or(PropType::String);
        let value = DefaultPropValidator.validate("size", &decl, Some(&Value::Bool(true)), &vm);

        assert_eq!(value, Value::Bool(true));
        assert_eq!(
            hooks.diagnostics(),
            vec![Diagnostic::InvalidPropType {
                key: "size".to_string(),
                expected: "Number, String".to_string(),
                found: "Boolean".to_string(),
            }]
        );
    }

    #[test]
    fn custom_validator_failure_is_reported() {
        let (vm, hooks) = instance();
        let decl = PropDecl::of(PropType::Number).validator(|v| v.as_f64().is_some_and(|n| n >= 0.0));
        DefaultPropValidator.validate("count", &decl, Some(&Value::from(-1)), &vm);
        assert_eq!(
            hooks.diagnostics(),
            vec![Diagnostic::PropValidatorFailed { key: "count".to_string() }]
        );
    }
}
