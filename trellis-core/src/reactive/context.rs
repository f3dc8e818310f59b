//! Reactive Context
//!
//! The reactive context tracks which watcher is currently evaluating.
//! This enables implicit dependency registration: when a reactive slot is
//! read, its [`Dep`](super::Dep) subscribes whatever watcher sits on top of
//! the target stack.
//!
//! # Implementation
//!
//! We use a thread-local stack. Entering a context pushes an entry; the
//! returned guard pops it when dropped, so the stack is restored even when
//! the evaluation fails or unwinds.
//!
//! An entry may be empty: [`ReactiveContext::untracked`] pushes a "no
//! target" entry so reads made inside it (data factories, immediate watch
//! callbacks) do not leak dependencies into an enclosing watcher.
//!
//! Nesting happens when one watcher's getter reads another's value, so the
//! stack depth equals the nesting depth of reactive reads.

use std::cell::RefCell;

use super::watcher::Watcher;

thread_local! {
    static TARGET_STACK: RefCell<Vec<Option<Watcher>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the target stack when dropped.
pub struct ReactiveContext {
    depth: usize,
}

impl ReactiveContext {
    /// Make `watcher` the current target until the guard is dropped.
    pub fn enter(watcher: &Watcher) -> Self {
        Self::push(Some(watcher.clone()))
    }

    /// Suspend dependency collection until the guard is dropped.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(entry: Option<Watcher>) -> Self {
        let depth = TARGET_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(entry);
            stack.len()
        });

        Self { depth }
    }

    /// Check whether reads are currently being collected.
    pub fn is_active() -> bool {
        TARGET_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// The watcher currently collecting dependencies, if any.
    pub fn current() -> Option<Watcher> {
        TARGET_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }

    /// Number of entries on the stack.
    pub fn depth() -> usize {
        TARGET_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        TARGET_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            // Guards are scoped, so they always drop in LIFO order.
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ReactiveContext dropped out of order"
            );
            stack.pop();
        });
    }
}

/// Run `f` without collecting dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = ReactiveContext::untracked();
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Value;

    fn idle_watcher() -> Watcher {
        Watcher::builder(|| Ok(Value::Undefined)).lazy().build()
    }

    #[test]
    fn context_tracks_watcher() {
        let watcher = idle_watcher();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current().is_none());

        {
            let _ctx = ReactiveContext::enter(&watcher);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current().map(|w| w.id()), Some(watcher.id()));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn untracked_masks_outer_target() {
        let watcher = idle_watcher();
        let _outer = ReactiveContext::enter(&watcher);

        untracked(|| {
            assert!(!ReactiveContext::is_active());
            assert_eq!(ReactiveContext::depth(), 2);
        });

        assert!(ReactiveContext::is_active());
    }

    #[test]
    fn nested_contexts() {
        let outer = idle_watcher();
        let inner = idle_watcher();

        {
            let _ctx1 = ReactiveContext::enter(&outer);
            assert_eq!(ReactiveContext::current().map(|w| w.id()), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(&inner);
                assert_eq!(ReactiveContext::current().map(|w| w.id()), Some(inner.id()));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current().map(|w| w.id()), Some(outer.id()));
        }

        assert!(ReactiveContext::current().is_none());
    }
}
