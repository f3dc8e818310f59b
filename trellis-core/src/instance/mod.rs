//! Component Instances
//!
//! An [`Instance`] owns a component's reactive state: props, methods, root
//! data, computed properties and watchers. It is built from
//! [`ComponentOptions`] by wiring each kind of member in a fixed order:
//!
//! ```text
//! props → methods → data → computed → watch
//! ```
//!
//! Later kinds see the members earlier kinds installed, which is what
//! drives the conflict rules (a data key shadowed by a prop, a computed key
//! already taken by data, a watch handler naming a method).
//!
//! # Typed Accessors
//!
//! Members are not proxied onto a dynamic object. Instead the instance
//! keeps a member table and exposes [`get`](Instance::get),
//! [`set`](Instance::set) and [`call`](Instance::call), which dispatch on
//! what kind of member a key resolved to.
//!
//! # Ownership
//!
//! The instance owns its watchers; watcher getters and callbacks only hold
//! a [`WeakInstance`], so dropping the last `Instance` handle frees the
//! whole component even without an explicit [`teardown`](Instance::teardown).

mod options;
mod props;
mod state;

pub use options::{
    ComponentOptions, ComputedDef, ComputedGetter, ComputedSetter, DataOption, Method, PropDecl,
    PropDefault, PropType, WatchCallback, WatchHandler, WatchOptions,
};
pub use props::{hyphenate, is_reserved_attribute, DefaultPropValidator, PropValidator};

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::{Diagnostic, EvalError, EvalResult};
use crate::hooks::{default_hooks, Hooks};
use crate::reactive::{
    observer, untracked, ObservingGuard, ReactiveContext, ReactiveObject, Value, Watcher, WatcherId,
};
use crate::scheduler::{Scheduler, UpdateScheduler};

/// Source of a `watch` call.
#[derive(Clone)]
pub enum WatchSource {
    /// Dot-delimited path resolved against the instance, e.g. `"user.name"`.
    Path(String),
    Getter(ComputedGetter),
}

impl WatchSource {
    pub fn getter(f: impl Fn(&Instance) -> EvalResult + 'static) -> Self {
        WatchSource::Getter(Rc::new(f))
    }
}

impl From<&str> for WatchSource {
    fn from(path: &str) -> Self {
        WatchSource::Path(path.to_string())
    }
}

impl From<String> for WatchSource {
    fn from(path: String) -> Self {
        WatchSource::Path(path)
    }
}

/// Handle returned by [`Instance::watch`].
#[derive(Clone)]
pub struct WatchHandle {
    watcher: Watcher,
    owner: WeakInstance,
}

impl WatchHandle {
    /// Stop watching and release the watcher from its instance. Idempotent.
    pub fn unwatch(&self) {
        self.watcher.teardown();
        if let Some(vm) = self.owner.upgrade() {
            vm.release_watcher(self.watcher.id());
        }
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

/// What an instance key resolves to.
#[derive(Clone)]
pub(crate) enum Member {
    Prop,
    Data,
    Computed(ComputedMember),
    Method(Method),
}

#[derive(Clone)]
pub(crate) struct ComputedMember {
    read: ComputedRead,
    set: Option<ComputedSetter>,
}

#[derive(Clone)]
pub(crate) enum ComputedRead {
    Cached(Watcher),
    Uncached(ComputedGetter),
    Missing,
}

/// A component instance.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

/// Non-owning handle to an instance.
#[derive(Clone)]
pub struct WeakInstance {
    inner: Weak<InstanceInner>,
}

impl Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle").field("watcher", &self.watcher).finish()
    }
}

impl WeakInstance {
    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(|inner| Instance { inner })
    }
}

pub(crate) struct InstanceInner {
    uid: u64,
    name: Option<String>,
    parent: Option<WeakInstance>,
    owner: String,

    props: ReactiveObject,
    prop_decls: IndexMap<String, PropDecl>,
    prop_validator: Rc<dyn PropValidator>,
    /// Raw values the parent passed last time.
    props_data: RefCell<IndexMap<String, Value>>,
    data: RefCell<ReactiveObject>,

    members: RefCell<IndexMap<String, Member>>,
    computed: RefCell<IndexMap<String, Watcher>>,
    watchers: RefCell<Vec<Watcher>>,
    render: RefCell<Option<Watcher>>,

    /// Set while the parent pushes new prop values.
    updating_props: Cell<bool>,
    torn_down: Cell<bool>,

    hooks: Rc<dyn Hooks>,
    scheduler: Rc<dyn Scheduler>,
}

impl Instance {
    /// Build an instance, wiring its state.
    pub fn new(mut options: ComponentOptions) -> Self {
        static NEXT_UID: AtomicU64 = AtomicU64::new(0);

        let parent = options.parent.take();
        let owner = match (&options.name, &parent) {
            (_, None) => "<Root>".to_string(),
            (Some(name), Some(_)) => format!("<{name}>"),
            (None, Some(_)) => "<Anonymous>".to_string(),
        };

        let instance = Instance {
            inner: Rc::new(InstanceInner {
                uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
                name: options.name.clone(),
                parent: parent.as_ref().map(Instance::downgrade),
                owner,
                props: ReactiveObject::new(),
                prop_decls: std::mem::take(&mut options.props),
                prop_validator: options.prop_validator.clone(),
                props_data: RefCell::new(IndexMap::new()),
                data: RefCell::new(ReactiveObject::new()),
                members: RefCell::new(IndexMap::new()),
                computed: RefCell::new(IndexMap::new()),
                watchers: RefCell::new(Vec::new()),
                render: RefCell::new(None),
                updating_props: Cell::new(false),
                torn_down: Cell::new(false),
                hooks: options.hooks.take().unwrap_or_else(default_hooks),
                scheduler: options
                    .scheduler
                    .take()
                    .unwrap_or_else(|| UpdateScheduler::global() as Rc<dyn Scheduler>),
            }),
        };

        state::init_state(&instance, options);

        tracing::debug!(uid = instance.inner.uid, owner = %instance.inner.owner, "instance created");
        instance
    }

    pub fn uid(&self) -> u64 {
        self.inner.uid
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Label used as the hook context, e.g. `<TodoList>`.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    pub fn parent(&self) -> Option<Instance> {
        self.inner.parent.as_ref().and_then(WeakInstance::upgrade)
    }

    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn hooks(&self) -> &Rc<dyn Hooks> {
        &self.inner.hooks
    }

    /// Report a diagnostic against this instance.
    pub fn report(&self, diagnostic: &Diagnostic) {
        self.inner.hooks.report(diagnostic, &self.inner.owner);
    }

    fn report_error(&self, error: &EvalError, phase: &str) {
        self.inner.hooks.report_error(error, &self.inner.owner, phase);
    }

    // ------------------------------------------------------------------------
    // Root containers
    // ------------------------------------------------------------------------

    /// The root data object (`$data`).
    pub fn data(&self) -> ReactiveObject {
        self.inner.data.borrow().clone()
    }

    /// The props object (`$props`).
    pub fn props(&self) -> ReactiveObject {
        self.inner.props.clone()
    }

    /// `$data` cannot be replaced; this only reports.
    pub fn replace_data(&self, _data: Value) {
        self.report(&Diagnostic::ReadonlyRoot {
            member: "$data".to_string(),
        });
    }

    /// `$props` cannot be replaced; this only reports.
    pub fn replace_props(&self, _props: Value) {
        self.report(&Diagnostic::ReadonlyRoot {
            member: "$props".to_string(),
        });
    }

    // ------------------------------------------------------------------------
    // Member access
    // ------------------------------------------------------------------------

    fn member(&self, key: &str) -> Option<Member> {
        self.inner.members.borrow().get(key).cloned()
    }

    pub(crate) fn has_member(&self, key: &str) -> bool {
        self.inner.members.borrow().contains_key(key)
    }

    /// Whether `key` resolves to any member.
    pub fn has(&self, key: &str) -> bool {
        self.has_member(key) || matches!(key, "$data" | "$props")
    }

    /// Read a prop, data key or computed property.
    ///
    /// Tracks like a direct property read when a watcher is collecting.
    /// Methods and unknown keys read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self.member(key) {
            Some(Member::Prop) => self.inner.props.get(key),
            Some(Member::Data) => self.data().get(key),
            Some(Member::Computed(computed)) => self.read_computed(key, &computed.read),
            Some(Member::Method(_)) => Value::Undefined,
            None => match key {
                "$data" => Value::Object(self.data()),
                "$props" => Value::Object(self.props()),
                _ => Value::Undefined,
            },
        }
    }

    fn read_computed(&self, key: &str, read: &ComputedRead) -> Value {
        match read {
            ComputedRead::Cached(watcher) => {
                if watcher.is_dirty() {
                    watcher.evaluate();
                }
                if ReactiveContext::is_active() {
                    watcher.depend();
                }
                watcher.value()
            }
            ComputedRead::Uncached(getter) => match getter(self) {
                Ok(value) => value,
                Err(error) => {
                    self.report_error(&error, &format!("getter for computed property \"{key}\""));
                    Value::Undefined
                }
            },
            ComputedRead::Missing => Value::Undefined,
        }
    }

    /// Assign a prop, data key or computed property.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.member(key) {
            Some(Member::Prop) => self.inner.props.set(key, value),
            Some(Member::Data) => self.data().set(key, value),
            Some(Member::Computed(computed)) => match computed.set {
                Some(setter) => {
                    if let Err(error) = setter(self, value) {
                        self.report_error(&error, &format!("setter for computed property \"{key}\""));
                    }
                }
                None => self.report(&Diagnostic::MissingComputedSetter { key: key.to_string() }),
            },
            Some(Member::Method(_)) | None => match key {
                "$data" => self.replace_data(value),
                "$props" => self.replace_props(value),
                _ => self.report(&Diagnostic::UndeclaredWrite { key: key.to_string() }),
            },
        }
    }

    /// Invoke a method.
    pub fn call(&self, method: &str, args: &[Value]) -> EvalResult {
        match self.member(method) {
            Some(Member::Method(f)) => f(self, args),
            _ => Err(EvalError::new(format!("\"{method}\" is not a method"))),
        }
    }

    /// Resolve a dot-delimited path such as `"items.0.title"`.
    ///
    /// Invalid paths report a diagnostic and read as `Undefined`.
    pub fn get_path(&self, path: &str) -> Value {
        match state::parse_path(path) {
            Some(segments) => self.resolve_segments(&segments),
            None => {
                self.report(&Diagnostic::InvalidWatchPath { path: path.to_string() });
                Value::Undefined
            }
        }
    }

    fn resolve_segments(&self, segments: &[String]) -> Value {
        let Some((first, rest)) = segments.split_first() else {
            return Value::Undefined;
        };
        rest.iter().fold(self.get(first), |value, segment| value.get(segment))
    }

    /// Add a reactive key to `target` (`$set`).
    pub fn set_property(&self, target: &Value, key: &str, value: impl Into<Value>) -> Value {
        observer::set(target, key, value.into(), self.inner.hooks.as_ref(), &self.inner.owner)
    }

    /// Remove a key from `target`, notifying readers (`$delete`).
    pub fn delete_property(&self, target: &Value, key: &str) {
        observer::del(target, key, self.inner.hooks.as_ref(), &self.inner.owner);
    }

    // ------------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------------

    /// Watch a path or getter (`$watch`).
    pub fn watch(
        &self,
        source: impl Into<WatchSource>,
        callback: impl Fn(&Instance, &Value, &Value) -> Result<(), EvalError> + 'static,
        options: WatchOptions,
    ) -> WatchHandle {
        self.watch_with(source.into(), Rc::new(callback), options)
    }

    pub(crate) fn watch_with(&self, source: WatchSource, callback: WatchCallback, options: WatchOptions) -> WatchHandle {
        let weak = self.downgrade();

        let (getter, expression): (Box<dyn Fn() -> EvalResult>, String) = match source {
            WatchSource::Path(path) => {
                let segments = state::parse_path(&path);
                if segments.is_none() {
                    self.report(&Diagnostic::InvalidWatchPath { path: path.clone() });
                }
                let weak = weak.clone();
                let getter = move || match (&segments, weak.upgrade()) {
                    (Some(segments), Some(vm)) => Ok(vm.resolve_segments(segments)),
                    _ => Ok(Value::Undefined),
                };
                (Box::new(getter), path)
            }
            WatchSource::Getter(get) => {
                let weak = weak.clone();
                let getter = move || match weak.upgrade() {
                    Some(vm) => get(&vm),
                    None => Ok(Value::Undefined),
                };
                (Box::new(getter), "<getter>".to_string())
            }
        };

        let cb = callback.clone();
        let callback_owner = weak.clone();
        let mut builder = Watcher::builder(getter)
            .user()
            .expression(expression)
            .owner(self.inner.owner.clone())
            .hooks(self.inner.hooks.clone())
            .scheduler(self.inner.scheduler.clone())
            .callback(move |new, old| match callback_owner.upgrade() {
                Some(vm) => cb(&vm, new, old),
                None => Ok(()),
            });
        if options.deep {
            builder = builder.deep();
        }
        if options.sync {
            builder = builder.sync();
        }
        let watcher = builder.build();

        if options.immediate {
            let value = watcher.value();
            let result = untracked(|| callback(self, &value, &Value::Undefined));
            if let Err(error) = result {
                self.report_error(
                    &error,
                    &format!("callback for immediate watcher \"{}\"", watcher.expression()),
                );
            }
        }

        self.inner.watchers.borrow_mut().push(watcher.clone());
        WatchHandle { watcher, owner: weak }
    }

    fn release_watcher(&self, id: WatcherId) {
        self.inner.watchers.borrow_mut().retain(|w| w.id() != id);
    }

    /// Create the render watcher. `render` produces a tree; `apply` receives
    /// every tree, starting with the one produced now.
    ///
    /// Re-mounting tears down the previous render watcher.
    pub fn mount_render(
        &self,
        render: impl Fn(&Instance) -> EvalResult + 'static,
        apply: impl Fn(&Instance, &Value) -> Result<(), EvalError> + 'static,
    ) -> Watcher {
        let render_owner = self.downgrade();
        let apply_owner = self.downgrade();

        let watcher = Watcher::builder(move || match render_owner.upgrade() {
            Some(vm) => render(&vm),
            None => Ok(Value::Undefined),
        })
        .render()
        .expression("render")
        .owner(self.inner.owner.clone())
        .hooks(self.inner.hooks.clone())
        .scheduler(self.inner.scheduler.clone())
        .callback(move |tree, _| match apply_owner.upgrade() {
            Some(vm) => apply(&vm, tree),
            None => Ok(()),
        })
        .build();

        if let Some(previous) = self.inner.render.replace(Some(watcher.clone())) {
            previous.teardown();
        }
        watcher
    }

    pub fn render_watcher(&self) -> Option<Watcher> {
        self.inner.render.borrow().clone()
    }

    /// The watcher behind a cached computed property.
    pub fn computed_watcher(&self, key: &str) -> Option<Watcher> {
        self.inner.computed.borrow().get(key).cloned()
    }

    /// Number of active user watchers.
    pub fn watcher_count(&self) -> usize {
        self.inner
            .watchers
            .borrow()
            .iter()
            .filter(|w| w.is_active())
            .count()
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Push new prop values from the parent.
    ///
    /// Declared props missing from `values` fall back to their defaults.
    /// Writes made here never trigger the prop-mutation warning, and fresh
    /// values are not observed (the parent already owns them).
    pub fn update_props<K: Into<String>>(&self, values: impl IntoIterator<Item = (K, Value)>) {
        let supplied: IndexMap<String, Value> = values.into_iter().map(|(k, v)| (k.into(), v)).collect();

        self.inner.updating_props.set(true);
        {
            let _observing = ObservingGuard::suspend();
            for (key, decl) in &self.inner.prop_decls {
                let value = self
                    .inner
                    .prop_validator
                    .validate(key, decl, supplied.get(key), self);
                self.inner.props.set(key, value);
            }
        }
        self.inner.updating_props.set(false);
        *self.inner.props_data.borrow_mut() = supplied;
    }

    pub(crate) fn is_updating_props(&self) -> bool {
        self.inner.updating_props.get()
    }

    /// Whether the parent passed a defined value for `key` last time.
    pub(crate) fn was_supplied(&self, key: &str) -> bool {
        self.inner
            .props_data
            .borrow()
            .get(key)
            .is_some_and(|value| !value.is_undefined())
    }

    /// Tear down every watcher and release the root data. Idempotent.
    pub fn teardown(&self) {
        if self.inner.torn_down.replace(true) {
            return;
        }

        if let Some(render) = self.inner.render.borrow_mut().take() {
            render.teardown();
        }
        for watcher in self.inner.watchers.borrow_mut().drain(..) {
            watcher.teardown();
        }
        for watcher in self.inner.computed.borrow().values() {
            watcher.teardown();
        }

        if let Some(ob) = observer::lookup(self.data().id()) {
            ob.release_root();
        }

        tracing::debug!(uid = self.inner.uid, owner = %self.inner.owner, "instance torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.get()
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("uid", &self.inner.uid)
            .field("owner", &self.inner.owner)
            .field("members", &self.inner.members.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
