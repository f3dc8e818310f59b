//! Component Options
//!
//! Declarative description of an instance's state, consumed once by
//! [`Instance::new`](super::Instance::new). Declaration order is kept
//! (`IndexMap`) because it is observable: members are wired, and conflicts
//! reported, in the order they were declared.

use std::fmt::{self, Debug};
use std::rc::Rc;

use indexmap::IndexMap;

use super::props::{DefaultPropValidator, PropValidator};
use super::Instance;
use crate::error::{EvalError, EvalResult};
use crate::hooks::Hooks;
use crate::reactive::Value;
use crate::scheduler::Scheduler;

/// A method bound to its instance.
pub type Method = Rc<dyn Fn(&Instance, &[Value]) -> EvalResult>;

/// Getter of a computed property.
pub type ComputedGetter = Rc<dyn Fn(&Instance) -> EvalResult>;

/// Setter of a computed property.
pub type ComputedSetter = Rc<dyn Fn(&Instance, Value) -> Result<(), EvalError>>;

/// Watch callback receiving `(instance, new, old)`.
pub type WatchCallback = Rc<dyn Fn(&Instance, &Value, &Value) -> Result<(), EvalError>>;

/// Runtime type a prop may be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl PropType {
    /// Whether `value` has this type.
    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropType::String, Value::String(_))
                | (PropType::Number, Value::Number(_))
                | (PropType::Boolean, Value::Bool(_))
                | (PropType::Object, Value::Object(_))
                | (PropType::Array, Value::Array(_))
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropType::String => "String",
            PropType::Number => "Number",
            PropType::Boolean => "Boolean",
            PropType::Object => "Object",
            PropType::Array => "Array",
        }
    }
}

/// Default value of a prop that was not supplied.
#[derive(Clone)]
pub enum PropDefault {
    Value(Value),
    /// Called once per instance; use this for object and array defaults so
    /// instances do not share them.
    Factory(Rc<dyn Fn(&Instance) -> Value>),
}

/// Declaration of one prop.
#[derive(Clone, Default)]
pub struct PropDecl {
    /// Accepted types; empty accepts anything.
    pub types: Vec<PropType>,
    pub required: bool,
    pub default: Option<PropDefault>,
    pub validator: Option<Rc<dyn Fn(&Value) -> bool>>,
}

impl PropDecl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(kind: PropType) -> Self {
        Self::new().or(kind)
    }

    /// Also accept `kind`.
    pub fn or(mut self, kind: PropType) -> Self {
        self.types.push(kind);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(PropDefault::Value(value.into()));
        self
    }

    pub fn default_factory(mut self, factory: impl Fn(&Instance) -> Value + 'static) -> Self {
        self.default = Some(PropDefault::Factory(Rc::new(factory)));
        self
    }

    pub fn validator(mut self, validator: impl Fn(&Value) -> bool + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }
}

impl Debug for PropDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropDecl")
            .field("types", &self.types)
            .field("required", &self.required)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Initial data: an object, or a factory producing one.
#[derive(Clone)]
pub enum DataOption {
    Object(Value),
    Factory(Rc<dyn Fn(&Instance) -> EvalResult>),
}

/// Definition of a computed property.
#[derive(Clone)]
pub struct ComputedDef {
    pub get: Option<ComputedGetter>,
    pub set: Option<ComputedSetter>,
    /// When false the getter runs on every read and nothing is cached.
    pub cache: bool,
}

impl ComputedDef {
    pub fn getter(get: impl Fn(&Instance) -> EvalResult + 'static) -> Self {
        Self {
            get: Some(Rc::new(get)),
            set: None,
            cache: true,
        }
    }

    /// A definition with neither getter nor setter.
    pub fn empty() -> Self {
        Self {
            get: None,
            set: None,
            cache: true,
        }
    }

    pub fn setter(mut self, set: impl Fn(&Instance, Value) -> Result<(), EvalError> + 'static) -> Self {
        self.set = Some(Rc::new(set));
        self
    }

    pub fn uncached(mut self) -> Self {
        self.cache = false;
        self
    }
}

/// Per-watch options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    pub deep: bool,
    /// Call the callback once at registration with the initial value.
    pub immediate: bool,
    /// Re-run on every change instead of going through the scheduler.
    pub sync: bool,
}

/// A declared watch handler.
#[derive(Clone)]
pub enum WatchHandler {
    Callback(WatchCallback),
    /// Name of a method receiving `[new, old]`.
    Method(String),
    WithOptions(Box<WatchHandler>, WatchOptions),
    /// Each entry registers its own watcher.
    List(Vec<WatchHandler>),
}

impl WatchHandler {
    pub fn callback(f: impl Fn(&Instance, &Value, &Value) -> Result<(), EvalError> + 'static) -> Self {
        WatchHandler::Callback(Rc::new(f))
    }

    pub fn method(name: impl Into<String>) -> Self {
        WatchHandler::Method(name.into())
    }

    pub fn with_options(self, options: WatchOptions) -> Self {
        WatchHandler::WithOptions(Box::new(self), options)
    }
}

/// Everything needed to build an [`Instance`].
#[derive(Clone)]
pub struct ComponentOptions {
    pub name: Option<String>,
    /// A parent makes this a child instance: its props are not deeply
    /// observed and writing to them warns.
    pub parent: Option<Instance>,

    pub props: IndexMap<String, PropDecl>,
    /// Values supplied by the parent for declared props.
    pub props_data: IndexMap<String, Value>,
    pub prop_validator: Rc<dyn PropValidator>,

    pub methods: IndexMap<String, Method>,
    pub data: Option<DataOption>,
    pub computed: IndexMap<String, ComputedDef>,
    pub watch: IndexMap<String, WatchHandler>,

    pub hooks: Option<Rc<dyn Hooks>>,
    pub scheduler: Option<Rc<dyn Scheduler>>,
}

impl Default for ComponentOptions {
    fn default() -> Self {
        Self {
            name: None,
            parent: None,
            props: IndexMap::new(),
            props_data: IndexMap::new(),
            prop_validator: Rc::new(DefaultPropValidator),
            methods: IndexMap::new(),
            data: None,
            computed: IndexMap::new(),
            watch: IndexMap::new(),
            hooks: None,
            scheduler: None,
        }
    }
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn parent(mut self, parent: &Instance) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn prop(mut self, key: impl Into<String>, decl: PropDecl) -> Self {
        self.props.insert(key.into(), decl);
        self
    }

    pub fn prop_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props_data.insert(key.into(), value.into());
        self
    }

    pub fn prop_validator(mut self, validator: Rc<dyn PropValidator>) -> Self {
        self.prop_validator = validator;
        self
    }

    pub fn method(
        mut self,
        key: impl Into<String>,
        method: impl Fn(&Instance, &[Value]) -> EvalResult + 'static,
    ) -> Self {
        self.methods.insert(key.into(), Rc::new(method));
        self
    }

    /// Use `data` as the instance's root data object.
    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(DataOption::Object(data.into()));
        self
    }

    /// Produce the root data object by calling `factory` once.
    pub fn data_fn(mut self, factory: impl Fn(&Instance) -> EvalResult + 'static) -> Self {
        self.data = Some(DataOption::Factory(Rc::new(factory)));
        self
    }

    pub fn computed(
        self,
        key: impl Into<String>,
        get: impl Fn(&Instance) -> EvalResult + 'static,
    ) -> Self {
        self.computed_def(key, ComputedDef::getter(get))
    }

    pub fn computed_def(mut self, key: impl Into<String>, def: ComputedDef) -> Self {
        self.computed.insert(key.into(), def);
        self
    }

    pub fn watch(mut self, key: impl Into<String>, handler: WatchHandler) -> Self {
        self.watch.insert(key.into(), handler);
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
}
