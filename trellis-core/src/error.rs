//! Error Types
//!
//! Nothing in the reactive core aborts. User code (getters, setters, data
//! factories, watch callbacks, methods) reports failure by returning an
//! [`EvalError`]; the core catches it at the watcher or data-init boundary,
//! hands it to the installed [`Hooks`](crate::hooks::Hooks) and continues
//! with a fallback value.
//!
//! Declaration problems and misuse (duplicate keys, writes to readonly
//! members, missing computed setters, runaway update loops) are described
//! by [`Diagnostic`] and routed to the diagnostic hook. They never change
//! control flow beyond the documented fallback.

use thiserror::Error;

use crate::reactive::Value;

/// Result type returned by user-supplied getters, factories and methods.
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// An error raised by user code while the core was evaluating it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvalError {
    message: String,
}

impl EvalError {
    /// Create an error carrying the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for EvalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for EvalError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// A non-fatal violation reported through the diagnostic hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    /// A method shares its name with a declared prop.
    #[error("method \"{key}\" has already been defined as a prop")]
    MethodPropConflict { key: String },

    /// A method name collides with a built-in instance member.
    #[error("method \"{key}\" conflicts with an existing instance member; avoid names starting with _ or $")]
    ReservedMethod { key: String },

    /// A data key is also declared as a method.
    #[error("method \"{key}\" has already been defined as a data property")]
    DataMethodConflict { key: String },

    /// A data key is also declared as a prop. The prop keeps the instance slot.
    #[error("data property \"{key}\" is already declared as a prop; use the prop default instead")]
    DataPropConflict { key: String },

    /// A data factory produced something other than a plain object.
    #[error("data functions should return an object")]
    DataNotObject,

    /// A computed key is already provided by data.
    #[error("computed property \"{key}\" is already defined in data")]
    ComputedDataConflict { key: String },

    /// A computed key is already declared as a prop.
    #[error("computed property \"{key}\" is already defined as a prop")]
    ComputedPropConflict { key: String },

    /// A computed key is already declared as a method.
    #[error("computed property \"{key}\" is already defined as a method")]
    ComputedMethodConflict { key: String },

    /// A computed definition has no getter.
    #[error("getter is missing for computed property \"{key}\"")]
    MissingComputedGetter { key: String },

    /// A computed property without a setter was assigned to.
    #[error("computed property \"{key}\" was assigned to but it has no setter")]
    MissingComputedSetter { key: String },

    /// A child component wrote to one of its props.
    #[error("avoid mutating a prop directly since the value will be overwritten whenever the parent re-renders; prop being mutated: \"{key}\"")]
    PropMutation { key: String },

    /// A prop uses a name reserved for template attributes.
    #[error("\"{key}\" is a reserved attribute and cannot be used as a component prop")]
    ReservedAttribute { key: String },

    /// A required prop was not supplied.
    #[error("missing required prop: \"{key}\"")]
    MissingRequiredProp { key: String },

    /// A prop value does not match its declared type.
    #[error("invalid prop: type check failed for prop \"{key}\"; expected {expected}, got {found}")]
    InvalidPropType {
        key: String,
        expected: String,
        found: String,
    },

    /// A prop's custom validator rejected the value.
    #[error("invalid prop: custom validator check failed for prop \"{key}\"")]
    PropValidatorFailed { key: String },

    /// Something tried to replace `$data` or `$props` wholesale.
    #[error("{member} is readonly; mutate nested properties instead")]
    ReadonlyRoot { member: String },

    /// A write targeted an instance member that cannot be assigned.
    #[error("cannot assign to \"{key}\": not a prop, data or computed property")]
    UndeclaredWrite { key: String },

    /// A reactive property was added to or removed from root `$data` at runtime.
    #[error("avoid adding or deleting reactive properties on an instance's root data at runtime; declare \"{key}\" upfront")]
    RootDataMutation { key: String },

    /// `$set` on an array with a key that is not a valid array index.
    #[error("cannot set \"{key}\" on an array; expected an index below 4294967295")]
    InvalidArrayIndex { key: String },

    /// A watch expression is not a simple dot-delimited path.
    #[error("failed watching path \"{path}\"; watchers only accept simple dot-delimited paths")]
    InvalidWatchPath { path: String },

    /// A watch handler names a method that does not exist.
    #[error("watch handler for \"{key}\" names unknown method \"{method}\"")]
    UnknownWatchMethod { key: String, method: String },

    /// A watcher kept re-triggering itself during one flush.
    #[error("you may have an infinite update loop in watcher with expression \"{expression}\"")]
    InfiniteUpdateLoop { expression: String },
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_error_displays_message() {
        let err = EvalError::new("boom");
        assert_eq!(err.to_string(), "boom");
        assert_eq!(EvalError::from("boom"), err);
    }

    #[test]
    fn diagnostics_name_the_key() {
        let diag = Diagnostic::MissingComputedSetter {
            key: "total".to_string(),
        };
        assert!(diag.to_string().contains("\"total\""));
    }
}
