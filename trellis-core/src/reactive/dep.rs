//! Dependency Registry
//!
//! A [`Dep`] belongs to one reactive slot (an object key) or one container
//! (an observed object or array, for shape changes). It remembers which
//! watchers read it during their last evaluation.
//!
//! # How Deps Work
//!
//! 1. A read calls [`Dep::depend`]. If a watcher is on top of the target
//!    stack, watcher and dep register each other.
//!
//! 2. A write calls [`Dep::notify`], which snapshots the subscribers and
//!    calls `update()` on each in ascending watcher-id order, so
//!    earlier-created (ancestor) computations hear about a change first.
//!
//! Subscribers are held weakly: a watcher's lifetime is owned by whoever
//! created it (an instance, a watch handle), never by the data it reads.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::watcher::{WeakWatcher, Watcher, WatcherId};

/// Unique identifier for a dep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Subscriber registry for one reactive slot or container.
///
/// Cloning a `Dep` yields another handle to the same registry.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

struct DepInner {
    id: DepId,
    /// Insertion-ordered, deduplicated by watcher identity.
    subs: RefCell<IndexMap<WatcherId, WeakWatcher>>,
}

impl Dep {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DepInner {
                id: DepId::next(),
                subs: RefCell::new(IndexMap::new()),
            }),
        }
    }

    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Register the current target watcher, if any.
    pub fn depend(&self) {
        if let Some(watcher) = ReactiveContext::current() {
            watcher.add_dep(self);
        }
    }

    /// Tell every subscriber that the slot changed.
    pub fn notify(&self) {
        // Stable snapshot: subscriptions made or dropped while updating
        // must not change who hears about this change.
        let mut subs: SmallVec<[Watcher; 8]> = self
            .inner
            .subs
            .borrow()
            .values()
            .filter_map(WeakWatcher::upgrade)
            .collect();
        subs.sort_by_key(Watcher::id);

        tracing::trace!(dep = self.id().raw(), subscribers = subs.len(), "notify");

        for watcher in subs {
            watcher.update();
        }
    }

    pub(crate) fn add_sub(&self, watcher: &Watcher) {
        self.inner
            .subs
            .borrow_mut()
            .entry(watcher.id())
            .or_insert_with(|| watcher.downgrade());
    }

    pub(crate) fn remove_sub(&self, id: WatcherId) {
        self.inner.subs.borrow_mut().shift_remove(&id);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subs
            .borrow()
            .values()
            .filter(|w| w.is_alive())
            .count()
    }

    /// Whether `id` is currently subscribed.
    pub fn has_subscriber(&self, id: WatcherId) -> bool {
        self.inner.subs.borrow().contains_key(&id)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
