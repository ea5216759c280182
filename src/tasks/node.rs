//! # Task node: the shared state behind every task handle.
//!
//! A [`Node`] is type-erased: results are stored as `Arc<dyn Any>` and recovered by
//! the typed [`Task<T>`](crate::Task) handle. All mutation goes through short
//! `parking_lot` critical sections; no lock is held while a body or waiter runs.
//!
//! ## Terminal transition
//! ```text
//! complete(outcome):
//!   lock inner
//!     ├─ already terminal → return false (first writer wins)
//!     └─ store state + outcome, take waiters
//!   unlock
//!   call every waiter with &outcome
//!
//! on_terminal(waiter):
//!   lock inner
//!     ├─ outcome stored → unlock, call waiter now
//!     └─ push waiter
//! ```
//! Both paths share the lock, so a waiter registered after completion still
//! observes the outcome exactly once.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::context::{PostExecuteContext, PrepareContext, TaskContext};
use super::handle::TaskRef;
use super::state::{Significance, TaskState};
use crate::error::TaskError;
use crate::schedulers::SchedulerRef;

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;

/// What a body hands back to the runner.
pub(crate) enum Completion {
    /// Finished with a value.
    Value(AnyValue),
    /// Finish with the outcome of another task (compose).
    Then(TaskRef),
}

pub(crate) type Body =
    Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, Result<Completion, TaskError>> + Send>;

pub(crate) type PrepareFn =
    Box<dyn FnOnce(&PrepareContext<'_>) -> Result<Vec<TaskRef>, TaskError> + Send>;

pub(crate) type PostFn =
    Box<dyn FnOnce(&PostExecuteContext<'_>) -> Result<(), TaskError> + Send>;

pub(crate) type Waiter = Box<dyn FnOnce(&Outcome) + Send>;

/// Terminal outcome of a node.
#[derive(Clone)]
pub(crate) enum Outcome {
    Succeeded(AnyValue),
    Failed(TaskError),
    Cancelled,
}

impl Outcome {
    pub(crate) fn state(&self) -> TaskState {
        match self {
            Outcome::Succeeded(_) => TaskState::Succeeded,
            Outcome::Failed(_) => TaskState::Failed,
            Outcome::Cancelled => TaskState::Cancelled,
        }
    }

    /// Error view: failures as-is, cancellation as [`TaskError::Cancelled`].
    pub(crate) fn error(&self) -> Option<TaskError> {
        match self {
            Outcome::Succeeded(_) => None,
            Outcome::Failed(e) => Some(e.clone()),
            Outcome::Cancelled => Some(TaskError::Cancelled),
        }
    }
}

/// Result of trying to take ownership of a node for execution.
pub(crate) enum Claim {
    Acquired,
    /// Cancelled before any executor owned it; now owned, with nothing left to run.
    Adopted,
    Taken,
    Terminal,
}

/// Everything needed to construct a node.
pub(crate) struct NodeSpec {
    pub(crate) name: String,
    pub(crate) significance: Significance,
    pub(crate) relying: bool,
    pub(crate) relying_on_dependencies: bool,
    pub(crate) manual: bool,
    pub(crate) dependents: Vec<TaskRef>,
    pub(crate) dependencies: Vec<TaskRef>,
    pub(crate) prepare: Option<PrepareFn>,
    pub(crate) post: Option<PostFn>,
    pub(crate) body: Option<Body>,
    pub(crate) stage: Option<String>,
    pub(crate) counter: Option<String>,
    pub(crate) scheduler: Option<SchedulerRef>,
}

struct Meta {
    name: String,
    significance: Significance,
    stage: Option<String>,
    inherited_stage: Option<String>,
    counter: Option<String>,
    scheduler: Option<SchedulerRef>,
}

struct Inner {
    state: TaskState,
    claimed: bool,
    outcome: Option<Outcome>,
    waiters: Vec<Waiter>,
}

const NO_PROGRESS: u64 = u64::MAX;
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct Node {
    id: u64,
    relying: bool,
    relying_on_dependencies: bool,
    manual: bool,
    meta: RwLock<Meta>,
    dependents: RwLock<Vec<TaskRef>>,
    dependencies: RwLock<Vec<TaskRef>>,
    post: Mutex<Option<PostFn>>,
    continuation: Mutex<Option<TaskRef>>,
    prepare: Mutex<Option<PrepareFn>>,
    prepare_error: Mutex<Option<TaskError>>,
    body: Mutex<Option<Body>>,
    properties: RwLock<HashMap<String, Value>>,
    progress: AtomicU64,
    last_progress: Mutex<Option<Instant>>,
    message: RwLock<Option<String>>,
    token: CancellationToken,
    inner: Mutex<Inner>,
}

impl Node {
    pub(crate) fn new(spec: NodeSpec) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            relying: spec.relying,
            relying_on_dependencies: spec.relying_on_dependencies,
            manual: spec.manual,
            meta: RwLock::new(Meta {
                name: spec.name,
                significance: spec.significance,
                stage: spec.stage,
                inherited_stage: None,
                counter: spec.counter,
                scheduler: spec.scheduler,
            }),
            dependents: RwLock::new(spec.dependents),
            dependencies: RwLock::new(spec.dependencies),
            post: Mutex::new(spec.post),
            continuation: Mutex::new(None),
            prepare: Mutex::new(spec.prepare),
            prepare_error: Mutex::new(None),
            body: Mutex::new(spec.body),
            properties: RwLock::new(HashMap::new()),
            progress: AtomicU64::new(NO_PROGRESS),
            last_progress: Mutex::new(None),
            message: RwLock::new(None),
            token: CancellationToken::new(),
            inner: Mutex::new(Inner {
                state: TaskState::Pending,
                claimed: false,
                outcome: None,
                waiters: Vec::new(),
            }),
        })
    }

    // ---- metadata ----

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn name(&self) -> String {
        self.meta.read().name.clone()
    }

    pub(crate) fn set_name(&self, name: String) {
        self.meta.write().name = name;
    }

    pub(crate) fn significance(&self) -> Significance {
        self.meta.read().significance
    }

    pub(crate) fn set_significance(&self, significance: Significance) {
        self.meta.write().significance = significance;
    }

    /// Own stage, or the one inherited from the parent during resolution.
    pub(crate) fn stage(&self) -> Option<String> {
        let m = self.meta.read();
        m.stage.clone().or_else(|| m.inherited_stage.clone())
    }

    /// Stage assigned to this node itself, ignoring inheritance.
    pub(crate) fn own_stage(&self) -> Option<String> {
        self.meta.read().stage.clone()
    }

    pub(crate) fn set_stage(&self, stage: String) {
        self.meta.write().stage = Some(stage);
    }

    pub(crate) fn inherit_stage(&self, stage: &str) {
        let mut m = self.meta.write();
        if m.stage.is_none() && m.inherited_stage.is_none() {
            m.inherited_stage = Some(stage.to_owned());
        }
    }

    pub(crate) fn counter(&self) -> Option<String> {
        self.meta.read().counter.clone()
    }

    pub(crate) fn set_counter(&self, key: String) {
        self.meta.write().counter = Some(key);
    }

    pub(crate) fn scheduler(&self) -> Option<SchedulerRef> {
        self.meta.read().scheduler.clone()
    }

    pub(crate) fn is_relying(&self) -> bool {
        self.relying
    }

    pub(crate) fn is_relying_on_dependencies(&self) -> bool {
        self.relying_on_dependencies
    }

    pub(crate) fn is_manual(&self) -> bool {
        self.manual
    }

    // ---- graph ----

    pub(crate) fn dependents(&self) -> Vec<TaskRef> {
        self.dependents.read().clone()
    }

    pub(crate) fn extend_dependents(&self, more: Vec<TaskRef>) {
        self.dependents.write().extend(more);
    }

    pub(crate) fn dependencies(&self) -> Vec<TaskRef> {
        self.dependencies.read().clone()
    }

    pub(crate) fn add_dependency(&self, task: TaskRef) {
        self.dependencies.write().push(task);
    }

    pub(crate) fn take_post(&self) -> Option<PostFn> {
        self.post.lock().take()
    }

    /// Whether a successful body is followed by dependencies or a post hook.
    pub(crate) fn has_follow_up(&self) -> bool {
        !self.dependencies.read().is_empty() || self.post.lock().is_some()
    }

    pub(crate) fn continuation(&self) -> Option<TaskRef> {
        self.continuation.lock().clone()
    }

    pub(crate) fn set_continuation(&self, next: TaskRef) {
        *self.continuation.lock() = Some(next);
    }

    pub(crate) fn take_prepare(&self) -> Option<PrepareFn> {
        self.prepare.lock().take()
    }

    pub(crate) fn set_prepare_error(&self, err: TaskError) {
        *self.prepare_error.lock() = Some(err);
    }

    pub(crate) fn take_prepare_error(&self) -> Option<TaskError> {
        self.prepare_error.lock().take()
    }

    pub(crate) fn take_body(&self) -> Option<Body> {
        self.body.lock().take()
    }

    // ---- observation ----

    pub(crate) fn properties(&self) -> HashMap<String, Value> {
        self.properties.read().clone()
    }

    pub(crate) fn property(&self, key: &str) -> Option<Value> {
        self.properties.read().get(key).cloned()
    }

    pub(crate) fn set_property(&self, key: String, value: Value) {
        self.properties.write().insert(key, value);
    }

    pub(crate) fn progress(&self) -> Option<f64> {
        match self.progress.load(Ordering::Acquire) {
            NO_PROGRESS => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    /// Stores `value`; returns whether it should be published under `throttle`.
    pub(crate) fn record_progress(&self, value: f64, throttle: Option<Duration>) -> bool {
        self.progress.store(value.to_bits(), Ordering::Release);
        let Some(interval) = throttle else {
            return true;
        };
        let now = Instant::now();
        let mut last = self.last_progress.lock();
        match *last {
            Some(prev) if value < 1.0 && now.duration_since(prev) < interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub(crate) fn message(&self) -> Option<String> {
        self.message.read().clone()
    }

    pub(crate) fn set_message(&self, msg: String) {
        *self.message.write() = Some(msg);
    }

    // ---- lifecycle ----

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn state(&self) -> TaskState {
        self.inner.lock().state
    }

    pub(crate) fn outcome(&self) -> Option<Outcome> {
        self.inner.lock().outcome.clone()
    }

    pub(crate) fn value(&self) -> Option<AnyValue> {
        match &self.inner.lock().outcome {
            Some(Outcome::Succeeded(v)) => Some(Arc::clone(v)),
            _ => None,
        }
    }

    /// Takes ownership for one executor. With `adopt_cancelled`, a node that was
    /// cancelled while nobody owned it is taken over as [`Claim::Adopted`].
    pub(crate) fn try_claim(&self, adopt_cancelled: bool) -> Claim {
        let mut inner = self.inner.lock();
        if inner.claimed {
            Claim::Taken
        } else if inner.state == TaskState::Cancelled && adopt_cancelled {
            inner.claimed = true;
            Claim::Adopted
        } else if inner.state.is_terminal() {
            Claim::Terminal
        } else {
            inner.claimed = true;
            Claim::Acquired
        }
    }

    /// Undoes a claim taken by a walk that failed; nothing was armed for the node yet.
    pub(crate) fn release_claim(&self) {
        self.inner.lock().claimed = false;
    }

    /// Pending → Running. Fails if the node already reached a terminal state.
    pub(crate) fn try_start(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == TaskState::Pending {
            inner.state = TaskState::Running;
            true
        } else {
            false
        }
    }

    /// Single terminal transition. Returns `false` if the node was already terminal.
    pub(crate) fn complete(&self, outcome: Outcome) -> bool {
        self.transition(outcome, false)
    }

    fn transition(&self, outcome: Outcome, only_pending: bool) -> bool {
        let waiters = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() || (only_pending && inner.state != TaskState::Pending) {
                return false;
            }
            inner.state = outcome.state();
            inner.outcome = Some(outcome.clone());
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            waiter(&outcome);
        }
        true
    }

    /// Calls `waiter` once with the terminal outcome, immediately if already terminal.
    pub(crate) fn on_terminal(&self, waiter: Waiter) {
        let ready = {
            let mut inner = self.inner.lock();
            if inner.outcome.is_none() {
                inner.waiters.push(waiter);
                return;
            }
            inner.outcome.clone()
        };
        if let Some(outcome) = ready {
            waiter(&outcome);
        }
    }

    /// Flags cancellation; a pending node is cancelled on the spot.
    ///
    /// A running node only sees its token fire and decides itself how to finish.
    pub(crate) fn request_cancel(&self) {
        if self.state().is_terminal() {
            return;
        }
        self.token.cancel();
        self.transition(Outcome::Cancelled, true);
    }
}
