//! # Graph resolution.
//!
//! Turns a set of roots into an execution plan before anything runs.
//!
//! ## Walk
//! ```text
//! visit(task):
//!   ├─ on the DFS stack?       → Cycle(path)            (checked before dedup)
//!   ├─ already visited?        → skip                   (shared sub-task, once)
//!   ├─ claim:
//!   │    Acquired              → owned by this plan
//!   │    Adopted               → root cancelled before submission: owned, not planned
//!   │    Taken / Terminal      → root: AlreadySubmitted; otherwise only waited on
//!   ├─ inherit parent's stage
//!   ├─ run prepare hook (once, here, on the resolving thread) → more dependents
//!   ├─ recurse into the now-final dependents
//!   └─ append to plan (post-order: dependents before dependers)
//! ```
//!
//! ## Rules
//! - Prepare errors and panics never abort the walk; they are stored on the node,
//!   which fails when its latch fires.
//! - If cancellation was already requested, prepare hooks are skipped.
//! - On any [`GraphError`] every claim taken by this walk is released, leaving the
//!   graph as it was (apart from prepare hooks that already ran).

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::core::runner::panic_message;
use crate::error::{GraphError, TaskError};
use crate::tasks::node::Claim;
use crate::tasks::{ExecEnv, PrepareContext, TaskRef};

/// Nodes owned by one resolution, dependents first.
pub(crate) struct Plan {
    pub(crate) nodes: Vec<TaskRef>,
}

/// Resolves `roots` into a [`Plan`].
///
/// `ancestors` seed the DFS stack (the composing task, for runtime-discovered
/// graphs). With `strict`, a root that is already owned or terminal is an error;
/// otherwise it is simply waited on.
pub(crate) fn resolve(
    roots: &[TaskRef],
    ancestors: &[TaskRef],
    strict: bool,
    cancelled: bool,
    env: &ExecEnv,
) -> Result<Plan, GraphError> {
    let mut walk = Walk {
        env,
        cancelled,
        stack: ancestors.to_vec(),
        on_stack: ancestors.iter().map(TaskRef::id).collect(),
        visited: HashSet::new(),
        claimed: Vec::new(),
        order: Vec::new(),
    };

    for root in roots {
        if let Err(e) = walk.visit(root, None, strict) {
            for task in &walk.claimed {
                task.node().release_claim();
            }
            return Err(e);
        }
    }
    Ok(Plan { nodes: walk.order })
}

struct Walk<'a> {
    env: &'a ExecEnv,
    cancelled: bool,
    stack: Vec<TaskRef>,
    on_stack: HashSet<u64>,
    visited: HashSet<u64>,
    claimed: Vec<TaskRef>,
    order: Vec<TaskRef>,
}

impl Walk<'_> {
    fn visit(
        &mut self,
        task: &TaskRef,
        parent_stage: Option<&str>,
        strict_root: bool,
    ) -> Result<(), GraphError> {
        if self.on_stack.contains(&task.id()) {
            return Err(self.cycle(task));
        }
        if !self.visited.insert(task.id()) {
            return Ok(());
        }

        match task.node().try_claim(strict_root) {
            Claim::Acquired => self.claimed.push(task.clone()),
            Claim::Adopted => {
                self.claimed.push(task.clone());
                return Ok(());
            }
            Claim::Taken | Claim::Terminal if strict_root => {
                return Err(GraphError::AlreadySubmitted { task: task.name() });
            }
            Claim::Taken | Claim::Terminal => return Ok(()),
        }

        if let Some(stage) = parent_stage {
            task.node().inherit_stage(stage);
        }
        self.prepare(task);

        self.stack.push(task.clone());
        self.on_stack.insert(task.id());
        let stage = task.stage();
        for dep in task.dependents() {
            self.visit(&dep, stage.as_deref(), false)?;
        }
        self.stack.pop();
        self.on_stack.remove(&task.id());

        self.order.push(task.clone());
        Ok(())
    }

    fn prepare(&self, task: &TaskRef) {
        let node = task.node();
        let Some(hook) = node.take_prepare() else {
            return;
        };
        if self.cancelled || node.cancel_requested() {
            return;
        }
        let ctx = PrepareContext::new(task, self.env);
        match catch_unwind(AssertUnwindSafe(|| hook(&ctx))) {
            Ok(Ok(children)) => node.extend_dependents(children),
            Ok(Err(e)) => node.set_prepare_error(e),
            Err(panic) => node.set_prepare_error(TaskError::Panicked {
                info: panic_message(panic.as_ref()),
            }),
        }
    }

    fn cycle(&self, task: &TaskRef) -> GraphError {
        let start = self
            .stack
            .iter()
            .position(|t| t == task)
            .unwrap_or_default();
        let mut path: Vec<String> = self.stack[start..].iter().map(TaskRef::name).collect();
        path.push(task.name());
        GraphError::Cycle { path }
    }
}
