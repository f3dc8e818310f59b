//! Reactive Primitives
//!
//! This module implements the dependency-tracking core: deps, the target
//! stack, reactive property slots, observers and watchers. Together they
//! let plain-looking state objects notify the computations that read them.
//!
//! # Concepts
//!
//! ## Deps
//!
//! A [`Dep`] is a subscription point: one per reactive property, plus one
//! per observed container for shape changes. Deps hold their subscribers
//! weakly and notify them in ascending watcher id order.
//!
//! ## Observers
//!
//! [`observe`] walks an object or array graph and installs a reactive slot
//! ([`define_reactive`]) on every object key. Arrays intercept their
//! mutating operations (`push`, `splice`, `sort`, ...) and notify their
//! container dep afterwards.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter with itself on top of the target stack
//! ([`ReactiveContext`]), so every reactive read subscribes it. Lazy
//! watchers back computed properties; eager ones drive rendering and user
//! watches through the [scheduler](crate::scheduler).
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded: `Rc`/`RefCell` for shared state and
//! thread-locals for the target stack, the observer side table and the
//! observing toggle.
//!
//! Known gap: writing an array element by index ([`ReactiveArray::set_index`])
//! or truncating through [`ReactiveArray::set_len`] does not notify. Use
//! `splice` or [`observer::set`] instead.

mod array;
mod context;
mod dep;
mod object;
pub mod observer;
mod property;
mod traverse;
mod value;
mod watcher;

pub use array::ReactiveArray;
pub use context::{untracked, ReactiveContext};
pub use dep::{Dep, DepId};
pub use object::{Accessor, ContainerId, Property, ReactiveObject};
pub use observer::{observe, Observer, ObservingGuard};
pub use property::{define_reactive, CustomSetter, ReactiveSlot};
pub use traverse::traverse;
pub use value::Value;
pub use watcher::{Callback, Getter, Watcher, WatcherBuilder, WatcherId, WatcherKind, WeakWatcher};
