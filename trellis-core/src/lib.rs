//! Trellis Core
//!
//! This crate provides the reactive state core of the Trellis component
//! runtime. It implements:
//!
//! - Dependency tracking (deps, the target stack, watchers)
//! - In-place observation of object and array graphs
//! - Batched, id-ordered update scheduling
//! - Component state wiring (props, methods, data, computed, watch)
//!
//! Rendering, template compilation and lifecycle hooks are left to the
//! embedder: a render function is just a getter whose result is handed to
//! an apply callback.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: values, deps, observers and watchers
//! - `scheduler`: the update queue that batches watcher re-runs
//! - `instance`: component instances built from declarative options
//! - `hooks`, `error`, `config`: diagnostics, error types and runtime knobs
//!
//! Everything is single-threaded. Each thread owns an independent reactive
//! world (target stack, observer table, default scheduler, config).
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use serde_json::json;
//! use trellis_core::instance::{ComponentOptions, Instance, WatchOptions};
//! use trellis_core::reactive::Value;
//! use trellis_core::scheduler;
//!
//! let vm = Instance::new(
//!     ComponentOptions::new()
//!         .data(json!({ "count": 0 }))
//!         .computed("doubled", |vm| {
//!             Ok(Value::from(vm.get("count").as_f64().unwrap_or(0.0) * 2.0))
//!         }),
//! );
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let log = seen.clone();
//! vm.watch(
//!     "doubled",
//!     move |_, new, old| {
//!         log.borrow_mut().push((new.clone(), old.clone()));
//!         Ok(())
//!     },
//!     WatchOptions::default(),
//! );
//!
//! vm.set("count", 5);
//! scheduler::flush();
//!
//! assert_eq!(*seen.borrow(), vec![(Value::from(10), Value::from(0))]);
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod instance;
pub mod reactive;
pub mod scheduler;

pub use error::{Diagnostic, EvalError, EvalResult};
pub use instance::{ComponentOptions, Instance};
pub use reactive::{Value, Watcher};
