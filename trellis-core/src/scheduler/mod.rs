//! Update Scheduling
//!
//! Eager watchers that are neither lazy nor sync do not re-run when a dep
//! notifies. They hand themselves to a [`Scheduler`], which batches them
//! until a flush boundary and then runs each pending watcher once.
//!
//! # Contract
//!
//! - `enqueue` deduplicates by watcher identity within one flush cycle.
//! - A flush drains in ascending watcher id order, so computations created
//!   earlier (parents) settle before later ones (children).
//! - Watchers torn down while pending are skipped.
//!
//! [`UpdateScheduler`] is the default implementation. When the flush
//! happens is up to the embedder: call [`flush`] (or
//! [`UpdateScheduler::flush`] on an owned scheduler) at whatever boundary
//! suits the host loop, or set `async = false` in the
//! [config](crate::config) to flush on every enqueue.

mod queue;

pub use queue::UpdateScheduler;

use crate::reactive::Watcher;

/// Receiver of watchers that need to re-run.
pub trait Scheduler {
    /// Queue `watcher` for the next flush.
    fn enqueue(&self, watcher: Watcher);
}

/// Flush the thread's default scheduler. Returns how many watchers ran.
pub fn flush() -> usize {
    UpdateScheduler::global().flush()
}

/// Number of watchers waiting in the thread's default scheduler.
pub fn pending() -> usize {
    UpdateScheduler::global().pending()
}
