//! # Execution engine shared by an executor and every callback it installs.
//!
//! The engine never blocks and never polls. Everything is driven by terminal
//! transitions of nodes:
//!
//! ```text
//! arm(plan):
//!   for node (dependents first):
//!     registry.insert, watch (counters, events, logs), publish TaskReady
//!   for node:
//!     latch = deps + 1
//!     dep.on_terminal → latch.count_down → dispatch(node)
//!     latch.count_down (guard)          → dispatch(node)
//!
//! dispatch(node):
//!   ├─ terminal already              → nothing
//!   ├─ cancellation requested         → Cancelled
//!   ├─ prepare hook failed            → Failed(prepare error)
//!   ├─ relying and a dependent failed → Failed(DependentFailed), body skipped
//!   ├─ relying and one was cancelled  → Cancelled, body skipped
//!   ├─ manual                         → wait for complete()/fail()
//!   └─ submit run_node to the node's scheduler (or the default one)
//!        rejected                     → Failed(Rejected)
//!
//! follow_up(node, value):             (body succeeded, node still Running)
//!   resolve + arm dependencies, latch = deps + 1
//!   last one terminal → submit post step to the node's scheduler:
//!     post hook error                 → Failed(error)
//!     relying, a dependency failed    → Failed(DependencyFailed)
//!     relying, one was cancelled      → Cancelled
//!     otherwise                       → Succeeded(value)
//!
//! root terminal → root_finished → (all roots done) → finish:
//!   summarize, publish ExecutorStopped, wake join(), run on_complete hooks
//! ```
//!
//! ## Rules
//! - Watchers are attached before latches, so a counter is bumped before any
//!   dependant of the counted task can run.
//! - `finish` runs once; hooks registered afterwards are submitted immediately.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::executor::ExecutorOutcome;
use crate::core::graph::{self, Plan};
use crate::core::latch::Latch;
use crate::core::registry::Registry;
use crate::core::runner::{guarded, panic_message, run_node};
use crate::error::{GraphError, TaskError};
use crate::events::{Event, EventKind};
use crate::policies::FailurePolicy;
use crate::schedulers::SchedulerRef;
use crate::tasks::node::{AnyValue, Outcome};
use crate::tasks::{ExecEnv, PostExecuteContext, Significance, TaskRef, TaskState};

pub(crate) type Hook = Box<dyn FnOnce(ExecutorOutcome) + Send>;

struct RootState {
    left: usize,
    errors: Vec<(String, TaskError)>,
}

pub(crate) struct Engine {
    env: Arc<ExecEnv>,
    token: CancellationToken,
    cancelling: AtomicBool,
    started: AtomicBool,
    default_scheduler: SchedulerRef,
    policy: FailurePolicy,
    roots: Vec<TaskRef>,
    registry: Registry,
    root_state: Mutex<RootState>,
    done: watch::Sender<Option<ExecutorOutcome>>,
    hooks: Mutex<Vec<(SchedulerRef, Hook)>>,
}

impl Engine {
    pub(crate) fn new(
        env: Arc<ExecEnv>,
        default_scheduler: SchedulerRef,
        policy: FailurePolicy,
        roots: Vec<TaskRef>,
    ) -> Arc<Self> {
        let (done, _) = watch::channel(None);
        Arc::new(Self {
            env,
            token: CancellationToken::new(),
            cancelling: AtomicBool::new(false),
            started: AtomicBool::new(false),
            default_scheduler,
            policy,
            root_state: Mutex::new(RootState {
                left: roots.len(),
                errors: Vec::new(),
            }),
            roots,
            registry: Registry::new(),
            done,
            hooks: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn env(&self) -> &Arc<ExecEnv> {
        &self.env
    }

    pub(crate) fn id(&self) -> u64 {
        self.env.executor
    }

    pub(crate) fn roots(&self) -> &[TaskRef] {
        &self.roots
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn done(&self) -> watch::Receiver<Option<ExecutorOutcome>> {
        self.done.subscribe()
    }

    pub(crate) fn outcome(&self) -> Option<ExecutorOutcome> {
        self.done.borrow().clone()
    }

    /// Resolves the roots and starts running them.
    pub(crate) fn start(self: &Arc<Self>) -> Result<(), GraphError> {
        if self.roots.is_empty() {
            return Err(GraphError::NoRoots);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(GraphError::AlreadyStarted);
        }
        let plan = match graph::resolve(&self.roots, &[], true, self.is_cancelled(), &self.env) {
            Ok(plan) => plan,
            Err(e) => {
                self.started.store(false, Ordering::Release);
                return Err(e);
            }
        };

        let tasks = plan.nodes.len();
        self.env.publish(
            Event::new(EventKind::ExecutorStarted)
                .with_count(tasks as u64)
                .with_reason(self.policy.as_label()),
        );
        info!(
            executor = self.id(),
            roots = self.roots.len(),
            tasks,
            policy = self.policy.as_label(),
            "executor started"
        );

        self.arm(plan);
        for root in &self.roots {
            let engine = Arc::clone(self);
            let r = root.clone();
            root.node()
                .on_terminal(Box::new(move |outcome| engine.root_finished(&r, outcome)));
        }
        Ok(())
    }

    fn arm(self: &Arc<Self>, plan: Plan) {
        for task in &plan.nodes {
            self.registry.insert(task);
            self.watch(task);
            self.env
                .publish(Event::new(EventKind::TaskReady).with_node(task));
        }
        for task in plan.nodes {
            let deps = task.dependents();
            let latch = Arc::new(Latch::new(deps.len() + 1));
            for dep in &deps {
                let engine = Arc::clone(self);
                let latch = Arc::clone(&latch);
                let task = task.clone();
                dep.node().on_terminal(Box::new(move |_| {
                    if latch.count_down() {
                        engine.dispatch(&task);
                    }
                }));
            }
            if latch.count_down() {
                self.dispatch(&task);
            }
        }
    }

    /// Bumps the counter, publishes the terminal event and logs the transition.
    fn watch(self: &Arc<Self>, task: &TaskRef) {
        let engine = Arc::downgrade(self);
        let node = Arc::downgrade(&task.0);
        task.node().on_terminal(Box::new(move |outcome| {
            if let (Some(engine), Some(node)) = (engine.upgrade(), node.upgrade()) {
                engine.observe_terminal(&TaskRef(node), outcome);
            }
        }));
    }

    fn observe_terminal(&self, task: &TaskRef, outcome: &Outcome) {
        if let Some(key) = task.counter_key() {
            let count = self.env.progress.increment(&key);
            self.env.publish(
                Event::new(EventKind::CounterIncremented)
                    .with_node(task)
                    .with_stage(key)
                    .with_count(count),
            );
        }

        let kind = match outcome {
            Outcome::Succeeded(_) => EventKind::TaskSucceeded,
            Outcome::Failed(_) => EventKind::TaskFailed,
            Outcome::Cancelled => EventKind::TaskCancelled,
        };
        let mut ev = Event::new(kind).with_node(task);
        if let Outcome::Failed(e) = outcome {
            ev = ev.with_reason(e.to_string());
        }
        self.env.publish(ev);

        if !task.significance().should_log() {
            return;
        }
        let name = task.name();
        match outcome {
            Outcome::Succeeded(_) => debug!(executor = self.id(), task = %name, "task succeeded"),
            Outcome::Failed(e) => {
                debug!(executor = self.id(), task = %name, error = %e, label = e.as_label(), "task failed")
            }
            Outcome::Cancelled => debug!(executor = self.id(), task = %name, "task cancelled"),
        }
    }

    /// Decides the fate of a node whose dependents are all terminal.
    pub(crate) fn dispatch(self: &Arc<Self>, task: &TaskRef) {
        let node = task.node();
        if node.state().is_terminal() {
            return;
        }
        if self.is_cancelled() || node.cancel_requested() {
            node.complete(Outcome::Cancelled);
            return;
        }
        if let Some(err) = node.take_prepare_error() {
            node.complete(Outcome::Failed(err));
            return;
        }
        if node.is_relying() {
            let deps = task.dependents();
            if let Some((name, source)) = first_failure(&deps) {
                node.complete(Outcome::Failed(TaskError::DependentFailed {
                    task: name,
                    source: Arc::new(source),
                }));
                return;
            }
            if deps.iter().any(|d| d.state() == TaskState::Cancelled) {
                node.complete(Outcome::Cancelled);
                return;
            }
        }
        if node.is_manual() {
            return;
        }
        self.submit(task, run_node(Arc::clone(self), task.clone()));
    }

    /// Queues `work` on the node's scheduler (or the default one), failing the node
    /// if the scheduler refuses it. A refused job is dropped inside `submit`, so its
    /// guard usually settles the node first.
    fn submit<F>(&self, task: &TaskRef, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let scheduler = task
            .node()
            .scheduler()
            .unwrap_or_else(|| Arc::clone(&self.default_scheduler));
        let job = guarded(task.clone(), scheduler.name(), work);
        if let Err(e) = scheduler.submit(job) {
            warn!(
                executor = self.id(),
                task = %task.name(),
                scheduler = scheduler.name(),
                error = %e,
                "task rejected by scheduler"
            );
            task.node().complete(Outcome::Failed(TaskError::Rejected {
                scheduler: scheduler.name().to_owned(),
                reason: e.to_string(),
            }));
        }
    }

    /// Makes `outer` finish with the outcome of `inner`, resolving `inner` first.
    pub(crate) fn continue_with(self: &Arc<Self>, outer: &TaskRef, inner: TaskRef) {
        let node = outer.node();
        node.set_continuation(inner.clone());
        if self.is_cancelled() || node.cancel_requested() {
            node.complete(Outcome::Cancelled);
            return;
        }

        match graph::resolve(
            std::slice::from_ref(&inner),
            std::slice::from_ref(outer),
            false,
            false,
            &self.env,
        ) {
            Ok(plan) => self.arm(plan),
            Err(e) => {
                node.complete(Outcome::Failed(TaskError::Graph {
                    error: e.to_string(),
                }));
                return;
            }
        }

        let target = outer.clone();
        inner.node().on_terminal(Box::new(move |outcome| {
            target.node().complete(outcome.clone());
        }));
    }

    /// Runs the dependencies of `task`, whose body produced `value`, then its post step.
    pub(crate) fn follow_up(self: &Arc<Self>, task: &TaskRef, value: AnyValue) {
        let node = task.node();
        if self.is_cancelled() || node.cancel_requested() {
            node.complete(Outcome::Cancelled);
            return;
        }

        let deps = node.dependencies();
        match graph::resolve(&deps, std::slice::from_ref(task), false, false, &self.env) {
            Ok(plan) => self.arm(plan),
            Err(e) => {
                node.complete(Outcome::Failed(TaskError::Graph {
                    error: e.to_string(),
                }));
                return;
            }
        }

        let latch = Arc::new(Latch::new(deps.len() + 1));
        for dep in &deps {
            let engine = Arc::clone(self);
            let latch = Arc::clone(&latch);
            let task = task.clone();
            let value = Arc::clone(&value);
            dep.node().on_terminal(Box::new(move |_| {
                if latch.count_down() {
                    engine.submit_post(&task, value);
                }
            }));
        }
        if latch.count_down() {
            self.submit_post(task, value);
        }
    }

    fn submit_post(self: &Arc<Self>, task: &TaskRef, value: AnyValue) {
        let engine = Arc::clone(self);
        let t = task.clone();
        self.submit(task, async move { engine.post_execute(&t, value) });
    }

    fn post_execute(&self, task: &TaskRef, value: AnyValue) {
        let node = task.node();
        if let Some(hook) = node.take_post() {
            let ctx = PostExecuteContext::new(task, &self.env);
            let failure = match catch_unwind(AssertUnwindSafe(|| hook(&ctx))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) if e.is_cancelled() => Some(Outcome::Cancelled),
                Ok(Err(e)) => Some(Outcome::Failed(e)),
                Err(panic) => Some(Outcome::Failed(TaskError::Panicked {
                    info: panic_message(panic.as_ref()),
                })),
            };
            if let Some(outcome) = failure {
                node.complete(outcome);
                return;
            }
        }

        let deps = node.dependencies();
        let failed = first_failure(&deps);
        if let (Some((name, source)), true) = (&failed, task.significance().should_log()) {
            warn!(
                executor = self.id(),
                task = %task.name(),
                dependency = %name,
                error = %source,
                "dependency failed"
            );
        }
        if node.is_relying_on_dependencies() {
            if let Some((name, source)) = failed {
                node.complete(Outcome::Failed(TaskError::DependencyFailed {
                    task: name,
                    source: Arc::new(source),
                }));
                return;
            }
            if deps.iter().any(|d| d.state() == TaskState::Cancelled) {
                node.complete(Outcome::Cancelled);
                return;
            }
        }
        if self.is_cancelled() || node.cancel_requested() {
            node.complete(Outcome::Cancelled);
            return;
        }
        node.complete(Outcome::Succeeded(value));
    }

    fn root_finished(&self, root: &TaskRef, outcome: &Outcome) {
        let tolerated = root.significance() == Significance::Minor;
        let failed = matches!(outcome, Outcome::Failed(_)) && !tolerated;

        let finished = {
            let mut st = self.root_state.lock();
            if let (Outcome::Failed(e), false) = (outcome, tolerated) {
                st.errors.push((root.name(), e.clone()));
            }
            st.left = st.left.saturating_sub(1);
            st.left == 0
        };

        if failed && self.policy.cancels_siblings() {
            for other in self.roots.iter().filter(|r| *r != root) {
                other.cancel();
            }
        }
        if finished {
            self.finish();
        }
    }

    fn summarize(&self) -> ExecutorOutcome {
        let errors = self.root_state.lock().errors.clone();
        let total = self.roots.len();
        match (self.policy, errors.len()) {
            (_, 0) => {
                let cancelled = self
                    .roots
                    .iter()
                    .any(|r| r.state() == TaskState::Cancelled);
                if cancelled || self.is_cancelled() {
                    ExecutorOutcome::Cancelled
                } else {
                    ExecutorOutcome::Succeeded
                }
            }
            (FailurePolicy::BestEffort, n) if n > 1 => {
                ExecutorOutcome::Failed(TaskError::Aggregate {
                    failed: n,
                    total,
                    errors,
                })
            }
            _ => {
                let mut errors = errors;
                ExecutorOutcome::Failed(errors.swap_remove(0).1)
            }
        }
    }

    fn finish(&self) {
        let outcome = self.summarize();
        self.env.publish(
            Event::new(EventKind::ExecutorStopped)
                .with_reason(outcome.as_label())
                .with_count(self.registry.len() as u64),
        );
        match &outcome {
            ExecutorOutcome::Failed(e) => warn!(
                executor = self.id(),
                error = %e,
                label = e.as_label(),
                "executor failed"
            ),
            other => info!(
                executor = self.id(),
                outcome = other.as_label(),
                tasks = self.registry.len(),
                "executor finished"
            ),
        }

        let hooks = {
            let mut hooks = self.hooks.lock();
            self.done.send_replace(Some(outcome.clone()));
            std::mem::take(&mut *hooks)
        };
        for (scheduler, hook) in hooks {
            self.submit_hook(&scheduler, hook, outcome.clone());
        }
    }

    /// Runs `hook` on `scheduler` once the executor is done (immediately if it is).
    pub(crate) fn on_complete(&self, scheduler: SchedulerRef, hook: Hook) {
        let ready = {
            let mut hooks = self.hooks.lock();
            let ready = self.done.borrow().clone();
            if ready.is_none() {
                hooks.push((scheduler, hook));
                return;
            }
            ready
        };
        if let Some(outcome) = ready {
            self.submit_hook(&scheduler, hook, outcome);
        }
    }

    fn submit_hook(&self, scheduler: &SchedulerRef, hook: Hook, outcome: ExecutorOutcome) {
        let executor = self.id();
        let job = AssertUnwindSafe(async move { hook(outcome) })
            .catch_unwind()
            .map(move |res| {
                if let Err(panic) = res {
                    warn!(
                        executor,
                        info = %panic_message(panic.as_ref()),
                        "completion hook panicked"
                    );
                }
            })
            .boxed();
        if let Err(e) = scheduler.submit(job) {
            warn!(
                executor,
                scheduler = scheduler.name(),
                error = %e,
                "completion hook rejected"
            );
        }
    }

    /// Requests cancellation of every task this executor armed. Idempotent.
    pub(crate) fn cancel(&self) {
        if self.cancelling.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        self.env.publish(Event::new(EventKind::CancelRequested));
        debug!(executor = self.id(), "cancellation requested");
        for task in self.registry.snapshot() {
            task.node().request_cancel();
        }
    }
}

/// Name and error of the first failed task in `tasks`.
fn first_failure(tasks: &[TaskRef]) -> Option<(String, TaskError)> {
    tasks.iter().find_map(|t| match t.node().outcome() {
        Some(Outcome::Failed(e)) => Some((t.name(), e)),
        _ => None,
    })
}
