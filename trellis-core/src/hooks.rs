//! Diagnostic and Error Hooks
//!
//! The core never propagates failures out of a notification. Instead it
//! reports them to a [`Hooks`] implementation injected into every watcher
//! and instance:
//!
//! - [`Hooks::report`] receives [`Diagnostic`]s (declaration conflicts,
//!   readonly writes, missing setters, runaway update loops).
//! - [`Hooks::report_error`] receives [`EvalError`]s raised by user code,
//!   together with the owner context and a phase label such as
//!   `data()` or `callback for watcher "count"`.
//!
//! [`TracingHooks`] is the default and forwards everything to `tracing`.
//! [`RecordingHooks`] keeps everything in memory, which is what tests and
//! embedders that surface diagnostics in their own UI want.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config;
use crate::error::{Diagnostic, EvalError};

/// Receiver for non-fatal diagnostics and user-code errors.
pub trait Hooks {
    /// A non-fatal violation. `context` names the owning component.
    fn report(&self, diagnostic: &Diagnostic, context: &str);

    /// An error raised by user code during `phase`.
    fn report_error(&self, error: &EvalError, context: &str, phase: &str);
}

/// Default hooks: structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl Hooks for TracingHooks {
    fn report(&self, diagnostic: &Diagnostic, context: &str) {
        if config::current().silent {
            return;
        }
        tracing::warn!(context, "{diagnostic}");
    }

    fn report_error(&self, error: &EvalError, context: &str, phase: &str) {
        tracing::error!(context, phase, "error in {phase}: {error}");
    }
}

/// Shared handle to the default hooks.
pub fn default_hooks() -> Rc<dyn Hooks> {
    Rc::new(TracingHooks)
}

/// An error captured by [`RecordingHooks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub error: EvalError,
    pub context: String,
    pub phase: String,
}

/// Hooks that remember everything they receive.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    diagnostics: RefCell<Vec<(Diagnostic, String)>>,
    errors: RefCell<Vec<ReportedError>>,
}

impl RecordingHooks {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Diagnostics received so far, in order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .borrow()
            .iter()
            .map(|(diagnostic, _)| diagnostic.clone())
            .collect()
    }

    /// Errors received so far, in order.
    pub fn errors(&self) -> Vec<ReportedError> {
        self.errors.borrow().clone()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.diagnostics.borrow_mut().clear();
        self.errors.borrow_mut().clear();
    }
}

impl Hooks for RecordingHooks {
    fn report(&self, diagnostic: &Diagnostic, context: &str) {
        tracing::debug!(context, "recorded diagnostic: {diagnostic}");
        self.diagnostics
            .borrow_mut()
            .push((diagnostic.clone(), context.to_string()));
    }

    fn report_error(&self, error: &EvalError, context: &str, phase: &str) {
        tracing::debug!(context, phase, "recorded error: {error}");
        self.errors.borrow_mut().push(ReportedError {
            error: error.clone(),
            context: context.to_string(),
            phase: phase.to_string(),
        });
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_hooks_keep_order() {
        let hooks = RecordingHooks::new();
        hooks.report(&Diagnostic::DataNotObject, "<Root>");
        hooks.report_error(&EvalError::new("boom"), "<Root>", "data()");

        assert_eq!(hooks.diagnostics(), vec![Diagnostic::DataNotObject]);
        let errors = hooks.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].phase, "data()");

        hooks.clear();
        assert!(hooks.diagnostics().is_empty());
        assert!(hooks.errors().is_empty());
    }

    #[test]
    fn tracing_hooks_do_not_panic_without_subscriber() {
        let hooks = TracingHooks;
        hooks.report(&Diagnostic::DataNotObject, "<Root>");
        hooks.report_error(&EvalError::new("boom"), "<Root>", "data()");
    }
}
