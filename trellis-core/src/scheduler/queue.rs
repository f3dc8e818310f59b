//! Update Queue
//!
//! The queue collects watchers between flushes and runs them in id order.
//!
//! # Algorithm
//!
//! 1. `enqueue` ignores watchers already pending. Outside a flush the
//!    watcher is appended; during a flush it is inserted after the current
//!    position, keeping the remainder sorted by id.
//! 2. `flush` sorts the queue by id and walks it by index (the queue can
//!    grow while it is being walked):
//!    - skip watchers that were torn down while pending;
//!    - run the `before` hook, clear the pending mark, run the watcher;
//!    - if running it queued the same watcher again, count one circular
//!      update. Past `max_update_count` the watcher is reported, its
//!      remaining entries dropped, and further enqueues ignored until the
//!      flush ends.
//! 3. Reset all state.
//!
//! No borrow of the queue is held while a watcher runs, so watchers are
//! free to enqueue other watchers (or themselves).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::Scheduler;
use crate::config;
use crate::error::Diagnostic;
use crate::reactive::{Watcher, WatcherId};

thread_local! {
    static GLOBAL: Rc<UpdateScheduler> = Rc::new(UpdateScheduler::new());
}

/// Batching scheduler with id-ordered flushes.
pub struct UpdateScheduler {
    state: RefCell<QueueState>,
}

#[derive(Default)]
struct QueueState {
    queue: Vec<Watcher>,
    /// Ids currently pending.
    has: HashSet<WatcherId>,
    /// Re-queues of each watcher during the current flush.
    circular: HashMap<WatcherId, usize>,
    /// Watchers dropped by the recursion guard for the rest of the flush.
    suppressed: HashSet<WatcherId>,
    flushing: bool,
    index: usize,
}

impl UpdateScheduler {
    /// Create a new empty scheduler.
    pub fn new() -> Self {
        Self {
            state: RefCell::new(QueueState::default()),
        }
    }

    /// The default scheduler of this thread.
    pub fn global() -> Rc<Self> {
        GLOBAL.with(Rc::clone)
    }

    /// Number of watchers waiting to run.
    pub fn pending(&self) -> usize {
        let state = self.state.borrow();
        state.queue.len().saturating_sub(if state.flushing { state.index } else { 0 })
    }

    /// Whether a flush is in progress.
    pub fn is_flushing(&self) -> bool {
        self.state.borrow().flushing
    }

    /// Run every pending watcher. Returns how many ran.
    ///
    /// Calling this from inside a running watcher is a no-op: the outer
    /// flush already picks up anything queued meanwhile.
    pub fn flush(&self) -> usize {
        {
            let mut state = self.state.borrow_mut();
            if state.flushing || state.queue.is_empty() {
                return 0;
            }
            state.flushing = true;
            state.index = 0;
            state.queue.sort_by_key(Watcher::id);
        }

        let max_update_count = config::current().max_update_count;
        let mut ran = 0;

        tracing::debug!(pending = self.pending(), "flushing update queue");

        loop {
            let watcher = {
                let state = self.state.borrow();
                match state.queue.get(state.index) {
                    Some(watcher) => watcher.clone(),
                    None => break,
                }
            };
            let id = watcher.id();

            if watcher.is_active() {
                watcher.before();
                self.state.borrow_mut().has.remove(&id);
                watcher.run();
                ran += 1;
            } else {
                self.state.borrow_mut().has.remove(&id);
            }

            let runaway = {
                let mut state = self.state.borrow_mut();
                let mut runaway = false;

                if state.has.contains(&id) {
                    let count = state.circular.entry(id).or_insert(0);
                    *count += 1;

                    if *count > max_update_count {
                        runaway = true;
                        state.has.remove(&id);
                        state.suppressed.insert(id);

                        let index = state.index;
                        let tail = state.queue.split_off(index + 1);
                        state.queue.extend(tail.into_iter().filter(|w| w.id() != id));
                    }
                }

                state.index += 1;
                runaway
            };

            if runaway {
                tracing::warn!(watcher = id.raw(), "update loop detected; dropping watcher for this flush");
                watcher.report(&Diagnostic::InfiniteUpdateLoop {
                    expression: watcher.expression().to_string(),
                });
            }
        }

        *self.state.borrow_mut() = QueueState::default();

        tracing::debug!(ran, "update queue flushed");
        ran
    }
}

impl Scheduler for UpdateScheduler {
    fn enqueue(&self, watcher: Watcher) {
        let id = watcher.id();

        {
            let mut state = self.state.borrow_mut();
            if state.suppressed.contains(&id) || !state.has.insert(id) {
                return;
            }

            if state.flushing {
                // Keep the unprocessed tail sorted by id
                let mut position = state.queue.len();
                while position > state.index + 1 && state.queue[position - 1].id() > id {
                    position -= 1;
                }
                state.queue.insert(position, watcher);
            } else {
                state.queue.push(watcher);
            }
        }

        tracing::trace!(watcher = id.raw(), "watcher queued");

        if !config::current().async_updates {
            self.flush();
        }
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{with_config, Config};
    use crate::hooks::RecordingHooks;
    use crate::reactive::{define_reactive, ReactiveObject, Value};
    use std::cell::Cell;

    fn state(pairs: &[(&str, Value)]) -> ReactiveObject {
        let object = ReactiveObject::new();
        for (key, value) in pairs {
            define_reactive(&object, key, Some(value.clone()), None, false);
        }
        object
    }

    fn watch_key(
        scheduler: &Rc<UpdateScheduler>,
        data: &ReactiveObject,
        key: &'static str,
        log: Rc<RefCell<Vec<&'static str>>>,
        label: &'static str,
    ) -> Watcher {
        let reader = data.clone();
        Watcher::builder(move || Ok(reader.get(key)))
            .scheduler(scheduler.clone())
            .callback(move |_, _| {
                log.borrow_mut().push(label);
                Ok(())
            })
            .build()
    }

    #[test]
    fn repeated_notifications_run_once() {
        let scheduler = Rc::new(UpdateScheduler::new());
        let data = state(&[("a", Value::from(0))]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let _w = watch_key(&scheduler, &data, "a", log.clone(), "a");

        data.set("a", Value::from(1));
        data.set("a", Value::from(2));
        data.set("a", Value::from(3));
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.flush(), 1);
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn flush_runs_in_id_order() {
        let scheduler = Rc::new(UpdateScheduler::new());
        let data = state(&[("a", Value::from(0)), ("b", Value::from(0))]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let _first = watch_key(&scheduler, &data, "a", log.clone(), "first");
        let _second = watch_key(&scheduler, &data, "b", log.clone(), "second");

        // Queue the later watcher first
        data.set("b", Value::from(1));
        data.set("a", Value::from(1));
        scheduler.flush();

        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn torn_down_watchers_are_skipped() {
        let scheduler = Rc::new(UpdateScheduler::new());
        let data = state(&[("a", Value::from(0))]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let watcher = watch_key(&scheduler, &data, "a", log.clone(), "a");

        data.set("a", Value::from(1));
        watcher.teardown();

        assert_eq!(scheduler.flush(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn before_hook_runs_ahead_of_each_run() {
        let scheduler = Rc::new(UpdateScheduler::new());
        let data = state(&[("a", Value::from(0))]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let watcher = watch_key(&scheduler, &data, "a", log.clone(), "run");

        let before_log = log.clone();
        watcher.set_before(move || before_log.borrow_mut().push("before"));

        data.set("a", Value::from(1));
        scheduler.flush();
        assert_eq!(*log.borrow(), vec!["before", "run"]);
    }

    #[test]
    fn watchers_queued_during_flush_run_in_the_same_flush() {
        let scheduler = Rc::new(UpdateScheduler::new());
        let data = state(&[("a", Value::from(0)), ("b", Value::from(0))]);
        let log = Rc::new(RefCell::new(Vec::new()));

        let writer = data.clone();
        let first_log = log.clone();
        let reader = data.clone();
        let _first = Watcher::builder(move || Ok(reader.get("a")))
            .scheduler(scheduler.clone())
            .callback(move |new, _| {
                first_log.borrow_mut().push("first");
                writer.set("b", new.clone());
                Ok(())
            })
            .build();
        let _second = watch_key(&scheduler, &data, "b", log.clone(), "second");

        data.set("a", Value::from(5));
        assert_eq!(scheduler.flush(), 2);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn runaway_watcher_is_reported_and_stopped() {
        let scheduler = Rc::new(UpdateScheduler::new());
        let hooks = RecordingHooks::new();
        let data = state(&[("count", Value::from(0))]);

        let reader = data.clone();
        let writer = data.clone();
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let _watcher = Watcher::builder(move || Ok(reader.get("count")))
            .scheduler(scheduler.clone())
            .hooks(hooks.clone())
            .expression("count")
            .callback(move |new, _| {
                runs_clone.set(runs_clone.get() + 1);
                writer.set("count", Value::from(new.as_f64().unwrap_or(0.0) + 1.0));
                Ok(())
            })
            .build();

        let config = Config {
            max_update_count: 10,
            ..Config::default()
        };
        with_config(config, || {
            data.set("count", Value::from(1));
            scheduler.flush();
        });

        assert_eq!(runs.get(), 11);
        assert_eq!(
            hooks.diagnostics(),
            vec![Diagnostic::InfiniteUpdateLoop {
                expression: "count".to_string()
            }]
        );
        assert!(!scheduler.is_flushing());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn sync_config_flushes_on_enqueue() {
        let scheduler = Rc::new(UpdateScheduler::new());
        let data = state(&[("a", Value::from(0))]);
        let log = Rc::new(RefCell::new(Vec::new()));
        let _w = watch_key(&scheduler, &data, "a", log.clone(), "a");

        let config = Config {
            async_updates: false,
            ..Config::default()
        };
        with_config(config, || data.set("a", Value::from(1)));

        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(scheduler.pending(), 0);
    }
}
