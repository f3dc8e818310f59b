//! Watcher Implementation
//!
//! A [`Watcher`] is a re-runnable computation: a render function, a
//! computed property, or a user watch. It discovers its dependencies by
//! evaluating its getter while sitting on top of the target stack.
//!
//! # Lifecycle
//!
//! ```text
//! created ──┬─ lazy ──> dirty ──evaluate()──> evaluated ──update()──> dirty ...
//!           └─ eager ─> evaluated ──update()──> (sync) run / (async) enqueue
//!                                   any state ──teardown()──> torn down
//! ```
//!
//! # How Evaluation Works
//!
//! 1. Push the watcher onto the target stack (scoped guard).
//! 2. Run the getter. Every reactive read calls `Dep::depend`, which lands
//!    in [`Watcher::add_dep`] and fills the current-run dependency set.
//! 3. Pop the stack, even when the getter failed.
//! 4. Diff the current-run set against the previous one and unsubscribe
//!    from deps that were not read this time. A conditional that stops
//!    reading a branch stops depending on it.
//!
//! A getter error is handed to the error hook and the evaluation yields a
//! fallback: the previous cached value for lazy (computed) watchers, an
//! empty object otherwise.
//!
//! # Ids
//!
//! Ids increase monotonically in creation order. Deps notify and the
//! scheduler flushes in ascending id order, so computations created
//! earlier (parents, computed properties) settle before later ones.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::traverse::traverse;
use super::value::Value;
use crate::error::{Diagnostic, EvalError, EvalResult};
use crate::hooks::{default_hooks, Hooks};
use crate::scheduler::{Scheduler, UpdateScheduler};

/// Unique, monotonically increasing watcher identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

impl WatcherId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// What a watcher computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherKind {
    /// Produces a tree for the render consumer; its callback applies it.
    Render,
    /// Lazy cached value behind a computed property.
    Computed,
    /// A user `watch` declaration or `$watch` call.
    User,
    /// Any other internal computation.
    Internal,
}

/// Getter evaluated under dependency collection.
pub type Getter = Rc<dyn Fn() -> EvalResult>;

/// Callback receiving `(new, old)` after a re-run.
pub type Callback = Rc<dyn Fn(&Value, &Value) -> Result<(), EvalError>>;

/// A re-runnable computation.
///
/// Cloning yields another handle to the same watcher.
#[derive(Clone)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

/// Weak handle held by deps.
#[derive(Clone)]
pub struct WeakWatcher {
    inner: Weak<WatcherInner>,
}

impl WeakWatcher {
    pub fn upgrade(&self) -> Option<Watcher> {
        self.inner.upgrade().map(|inner| Watcher { inner })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

struct WatcherInner {
    id: WatcherId,
    kind: WatcherKind,
    lazy: bool,
    sync: bool,
    deep: bool,
    expression: String,
    owner: String,

    getter: Getter,
    callback: Option<Callback>,
    before: RefCell<Option<Rc<dyn Fn()>>>,

    value: RefCell<Value>,
    dirty: Cell<bool>,
    active: Cell<bool>,

    /// Deps read during the last completed evaluation.
    deps: RefCell<IndexMap<DepId, Dep>>,
    /// Deps read during the evaluation in progress.
    new_deps: RefCell<IndexMap<DepId, Dep>>,

    hooks: Rc<dyn Hooks>,
    scheduler: Rc<dyn Scheduler>,
}

impl Watcher {
    /// Start building a watcher around `getter`.
    pub fn builder<F>(getter: F) -> WatcherBuilder
    where
        F: Fn() -> EvalResult + 'static,
    {
        WatcherBuilder::new(Rc::new(getter))
    }

    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    pub fn kind(&self) -> WatcherKind {
        self.inner.kind
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn is_lazy(&self) -> bool {
        self.inner.lazy
    }

    pub fn is_sync(&self) -> bool {
        self.inner.sync
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Whether a lazy watcher's cached value is stale.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// The cached value.
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Number of deps from the last evaluation.
    pub fn dep_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Whether the last evaluation read `dep`.
    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.inner.deps.borrow().contains_key(&dep.id())
    }

    pub fn downgrade(&self) -> WeakWatcher {
        WeakWatcher {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Evaluate the getter, re-collecting dependencies.
    ///
    /// Never fails: a getter error is reported and the fallback returned.
    pub fn get(&self) -> Value {
        match self.collect() {
            Ok(value) => value,
            Err(_) => self.fallback(),
        }
    }

    fn collect(&self) -> EvalResult {
        let result = {
            let _ctx = ReactiveContext::enter(self);
            let result = (self.inner.getter)();
            if self.inner.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };

        self.cleanup_deps();

        if let Err(error) = &result {
            self.inner.hooks.report_error(
                error,
                &self.inner.owner,
                &format!("getter for watcher \"{}\"", self.inner.expression),
            );
        }
        result
    }

    fn fallback(&self) -> Value {
        if self.inner.lazy {
            self.value()
        } else {
            Value::object()
        }
    }

    /// Record `dep` as read during the evaluation in progress.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        let id = dep.id();
        if self.inner.new_deps.borrow().contains_key(&id) {
            return;
        }
        self.inner.new_deps.borrow_mut().insert(id, dep.clone());

        if !self.inner.deps.borrow().contains_key(&id) {
            dep.add_sub(self);
        }
    }

    /// Drop subscriptions that the last evaluation no longer needed and
    /// promote the current-run set.
    fn cleanup_deps(&self) {
        let new_deps = std::mem::take(&mut *self.inner.new_deps.borrow_mut());
        let old_deps = std::mem::replace(&mut *self.inner.deps.borrow_mut(), new_deps);

        let deps = self.inner.deps.borrow();
        for (id, dep) in old_deps {
            if !deps.contains_key(&id) {
                dep.remove_sub(self.inner.id);
            }
        }
    }

    /// React to a dependency change.
    pub fn update(&self) {
        if self.inner.lazy {
            self.inner.dirty.set(true);
        } else if self.inner.sync {
            self.run();
        } else {
            self.inner.scheduler.enqueue(self.clone());
        }
    }

    /// Re-evaluate and fire the callback. Called by the scheduler.
    pub fn run(&self) {
        if !self.is_active() {
            return;
        }

        // A failed evaluation keeps the previous value and stays quiet
        let Ok(new_value) = self.collect() else {
            return;
        };

        if self.inner.kind == WatcherKind::Render {
            let old_value = self.inner.value.replace(new_value.clone());
            self.invoke_callback(&new_value, &old_value);
            return;
        }

        let changed = {
            let current = self.inner.value.borrow();
            !new_value.same_value(&current) || new_value.is_container() || self.inner.deep
        };

        if changed {
            let old_value = self.inner.value.replace(new_value.clone());
            self.invoke_callback(&new_value, &old_value);
        }
    }

    fn invoke_callback(&self, new_value: &Value, old_value: &Value) {
        let Some(callback) = self.inner.callback.clone() else {
            return;
        };

        if let Err(error) = callback(new_value, old_value) {
            self.inner.hooks.report_error(
                &error,
                &self.inner.owner,
                &format!("callback for watcher \"{}\"", self.inner.expression),
            );
        }
    }

    /// Recompute a lazy watcher's value and mark it clean.
    pub fn evaluate(&self) {
        let value = self.get();
        *self.inner.value.borrow_mut() = value;
        self.inner.dirty.set(false);
    }

    /// Subscribe the current target to every dep this watcher read.
    ///
    /// This is how a render watcher reading a computed property ends up
    /// depending on the computed property's own sources.
    pub fn depend(&self) {
        let deps: Vec<Dep> = self.inner.deps.borrow().values().cloned().collect();
        for dep in deps {
            dep.depend();
        }
    }

    /// Unsubscribe from every dep and stop reacting. Idempotent.
    pub fn teardown(&self) {
        if !self.is_active() {
            return;
        }

        let deps = std::mem::take(&mut *self.inner.deps.borrow_mut());
        for dep in deps.values() {
            dep.remove_sub(self.inner.id);
        }
        self.inner.new_deps.borrow_mut().clear();
        self.inner.active.set(false);

        tracing::debug!(
            watcher = self.inner.id.raw(),
            expression = %self.inner.expression,
            "watcher torn down"
        );
    }

    /// Run the pre-update hook, if any. Called by the scheduler.
    pub fn before(&self) {
        let before = self.inner.before.borrow().clone();
        if let Some(before) = before {
            before();
        }
    }

    /// Install a pre-update hook.
    pub fn set_before(&self, before: impl Fn() + 'static) {
        *self.inner.before.borrow_mut() = Some(Rc::new(before));
    }

    /// Report a diagnostic against this watcher's owner.
    pub fn report(&self, diagnostic: &Diagnostic) {
        self.inner.hooks.report(diagnostic, &self.inner.owner);
    }
}

impl Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id.raw())
            .field("kind", &self.inner.kind)
            .field("expression", &self.inner.expression)
            .field("active", &self.is_active())
            .field("dirty", &self.is_dirty())
            .field("dep_count", &self.dep_count())
            .finish()
    }
}

/// Builder for [`Watcher`].
pub struct WatcherBuilder {
    getter: Getter,
    callback: Option<Callback>,
    before: Option<Rc<dyn Fn()>>,
    lazy: bool,
    sync: bool,
    user: bool,
    deep: bool,
    render: bool,
    expression: String,
    owner: String,
    hooks: Option<Rc<dyn Hooks>>,
    scheduler: Option<Rc<dyn Scheduler>>,
}

impl WatcherBuilder {
    fn new(getter: Getter) -> Self {
        Self {
            getter,
            callback: None,
            before: None,
            lazy: false,
            sync: false,
            user: false,
            deep: false,
            render: false,
            expression: "<getter>".to_string(),
            owner: "<Root>".to_string(),
            hooks: None,
            scheduler: None,
        }
    }

    /// Defer evaluation until the value is read; updates only mark dirty.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Re-run immediately on update instead of going through the scheduler.
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Mark as a user watcher.
    pub fn user(mut self) -> Self {
        self.user = true;
        self
    }

    /// Also depend on everything nested inside the value.
    pub fn deep(mut self) -> Self {
        self.deep = true;
        self
    }

    /// Make this a render watcher: the callback applies every new tree,
    /// including the first one produced at construction.
    pub fn render(mut self) -> Self {
        self.render = true;
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<(), EvalError> + 'static,
    {
        self.callback = Some(Rc::new(callback));
        self
    }

    pub fn before<F>(mut self, before: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.before = Some(Rc::new(before));
        self
    }

    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    /// Context label passed to the hooks (usually the component name).
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn hooks(mut self, hooks: Rc<dyn Hooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn scheduler(mut self, scheduler: Rc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Create the watcher. Eager watchers evaluate immediately.
    pub fn build(self) -> Watcher {
        let kind = if self.render {
            WatcherKind::Render
        } else if self.lazy {
            WatcherKind::Computed
        } else if self.user {
            WatcherKind::User
        } else {
            WatcherKind::Internal
        };

        let scheduler = self
            .scheduler
            .unwrap_or_else(|| UpdateScheduler::global() as Rc<dyn Scheduler>);

        let watcher = Watcher {
            inner: Rc::new(WatcherInner {
                id: WatcherId::next(),
                kind,
                lazy: self.lazy,
                sync: self.sync,
                deep: self.deep,
                expression: self.expression,
                owner: self.owner,
                getter: self.getter,
                callback: self.callback,
                before: RefCell::new(self.before),
                value: RefCell::new(Value::Undefined),
                dirty: Cell::new(self.lazy),
                active: Cell::new(true),
                deps: RefCell::new(IndexMap::new()),
                new_deps: RefCell::new(IndexMap::new()),
                hooks: self.hooks.unwrap_or_else(default_hooks),
                scheduler,
            }),
        };

        if !watcher.inner.lazy {
            match watcher.collect() {
                Ok(value) => {
                    *watcher.inner.value.borrow_mut() = value.clone();
                    if kind == WatcherKind::Render {
                        watcher.invoke_callback(&value, &Value::Undefined);
                    }
                }
                Err(_) => {
                    *watcher.inner.value.borrow_mut() = watcher.fallback();
                }
            }
        }

        tracing::trace!(watcher = watcher.inner.id.raw(), ?kind, "watcher created");
        watcher
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
