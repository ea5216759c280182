//! # Scheduler registry.
//!
//! [`Schedulers`] bundles the built-in schedulers and any named extras. It is a
//! cheap-to-clone value that is passed explicitly to task and executor construction.
//!
//! A single process-wide instance may be installed at the composition root with
//! [`Schedulers::init_global`] and torn down with [`Schedulers::shutdown`]; library code
//! should take `&Schedulers` instead of reaching for the global.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::runtime::Handle;

use super::{DirectScheduler, IoScheduler, SchedulerRef, UiScheduler};
use crate::config::Config;
use crate::error::SchedulerError;

static GLOBAL: OnceLock<Schedulers> = OnceLock::new();

/// Set of schedulers available to tasks and executors.
#[derive(Clone)]
pub struct Schedulers {
    io: Arc<IoScheduler>,
    ui: Arc<UiScheduler>,
    direct: Arc<DirectScheduler>,
    named: HashMap<String, SchedulerRef>,
}

impl Schedulers {
    /// Starts the io pool and the ui loop described by `cfg`.
    pub fn new(cfg: &Config) -> Result<Self, SchedulerError> {
        Ok(Self {
            io: Arc::new(IoScheduler::new(cfg)?),
            ui: Arc::new(UiScheduler::new(cfg)?),
            direct: Arc::new(DirectScheduler::new()),
            named: HashMap::new(),
        })
    }

    /// Registers an additional scheduler under `name`.
    #[must_use]
    pub fn with_scheduler(mut self, name: impl Into<String>, scheduler: SchedulerRef) -> Self {
        self.named.insert(name.into(), scheduler);
        self
    }

    /// The background worker pool.
    pub fn io(&self) -> SchedulerRef {
        self.io.clone()
    }

    /// The serialized event loop.
    pub fn ui(&self) -> SchedulerRef {
        self.ui.clone()
    }

    /// The ambient-runtime scheduler.
    pub fn direct(&self) -> SchedulerRef {
        self.direct.clone()
    }

    /// Looks a scheduler up by name: `io`, `ui`, `direct`, or a registered extra.
    pub fn get(&self, name: &str) -> Option<SchedulerRef> {
        match name {
            "io" => Some(self.io()),
            "ui" => Some(self.ui()),
            "direct" => Some(self.direct()),
            other => self.named.get(other).cloned(),
        }
    }

    /// Runtime handle of the io pool (executor-internal workers are spawned here).
    pub fn handle(&self) -> &Handle {
        self.io.handle()
    }

    /// Concrete ui scheduler (for thread identity checks).
    pub fn ui_scheduler(&self) -> &UiScheduler {
        &self.ui
    }

    /// Shuts down the io pool and the ui loop.
    pub fn shutdown(&self) {
        self.io.shutdown();
        self.ui.shutdown();
    }

    /// Installs the process-wide registry. Returns the already installed one on later calls.
    pub fn init_global(cfg: &Config) -> Result<&'static Schedulers, SchedulerError> {
        if let Some(existing) = GLOBAL.get() {
            return Ok(existing);
        }
        let fresh = Schedulers::new(cfg)?;
        match GLOBAL.set(fresh) {
            Ok(()) => {}
            Err(lost) => lost.shutdown(),
        }
        GLOBAL.get().ok_or(SchedulerError::Closed {
            scheduler: "global".to_string(),
        })
    }

    /// The process-wide registry, if [`init_global`](Self::init_global) was called.
    pub fn global() -> Option<&'static Schedulers> {
        GLOBAL.get()
    }
}

impl std::fmt::Debug for Schedulers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut named: Vec<&String> = self.named.keys().collect();
        named.sort_unstable();
        f.debug_struct("Schedulers").field("named", &named).finish()
    }
}
