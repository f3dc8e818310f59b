//! Runtime Configuration
//!
//! A small set of knobs shared by the scheduler and the default hooks.
//! The active configuration is thread-local, matching the rest of the
//! reactive state: each thread owns an independent reactive world.
//!
//! Configuration can be built in code or parsed from JSON:
//!
//! ```rust
//! use trellis_core::config::Config;
//!
//! let config = Config::from_json(r#"{ "async": false, "max_update_count": 10 }"#).unwrap();
//! assert!(!config.async_updates);
//! assert_eq!(config.max_update_count, 10);
//! assert!(!config.silent);
//! ```

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Re-runs of one watcher allowed within a single flush before it is dropped.
pub const DEFAULT_MAX_UPDATE_COUNT: usize = 100;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Suppress warn-level diagnostic output from the default hooks.
    pub silent: bool,

    /// When false, the default scheduler flushes synchronously on every
    /// enqueue instead of waiting for an explicit flush.
    #[serde(rename = "async")]
    pub async_updates: bool,

    /// Recursion guard threshold for the scheduler.
    pub max_update_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            silent: false,
            async_updates: true,
            max_update_count: DEFAULT_MAX_UPDATE_COUNT,
        }
    }
}

impl Config {
    /// Parse a configuration document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

thread_local! {
    static CURRENT: RefCell<Config> = RefCell::new(Config::default());
}

/// Snapshot of the configuration active on this thread.
pub fn current() -> Config {
    CURRENT.with(|c| c.borrow().clone())
}

/// Install a new configuration, returning the previous one.
pub fn replace(config: Config) -> Config {
    CURRENT.with(|c| std::mem::replace(&mut *c.borrow_mut(), config))
}

/// Run `f` with `config` installed, restoring the previous configuration
/// afterwards (also on unwind).
pub fn with_config<R>(config: Config, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Config>);

    impl Drop for Restore {
        fn drop(&mut self) {
            if let Some(previous) = self.0.take() {
                replace(previous);
            }
        }
    }

    let _restore = Restore(Some(replace(config)));
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
