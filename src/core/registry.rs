//! # Registry of tasks armed by one executor.
//!
//! Every node the executor armed (including those discovered through
//! `then_compose` at runtime) is recorded here by identity. The registry is what
//! executor-wide cancellation walks and what `running_tasks()` reports.
//!
//! ## Rules
//! - Insertion is idempotent (keyed by task id)
//! - Entries are never removed while the executor lives; terminal tasks are filtered on read
//! - Locks are held only for map access, never while calling into tasks

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::tasks::{TaskRef, TaskState};

#[derive(Default)]
pub(crate) struct Registry {
    tasks: RwLock<HashMap<u64, TaskRef>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records `task`; returns `false` if it was already known.
    pub(crate) fn insert(&self, task: &TaskRef) -> bool {
        let mut tasks = self.tasks.write();
        if tasks.contains_key(&task.id()) {
            return false;
        }
        tasks.insert(task.id(), task.clone());
        true
    }

    pub(crate) fn snapshot(&self) -> Vec<TaskRef> {
        self.tasks.read().values().cloned().collect()
    }

    /// Names of tasks whose body is executing, sorted.
    pub(crate) fn running(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .snapshot()
            .into_iter()
            .filter(|t| t.state() == TaskState::Running)
            .map(|t| t.name())
            .collect();
        names.sort();
        names
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Task;

    #[test]
    fn test_insert_is_idempotent() {
        let reg = Registry::new();
        let t = Task::supply("a", || Ok(1));
        assert!(reg.insert(&t));
        assert!(!reg.insert(&t.erase()));
        assert_eq!(reg.len(), 1);
        assert!(reg.running().is_empty());
    }

    #[test]
    fn test_snapshot_keeps_identity() {
        let reg = Registry::new();
        let a = Task::supply("same", || Ok(1));
        let b = Task::supply("same", || Ok(2));
        reg.insert(&a);
        reg.insert(&b);
        let snap = reg.snapshot();
        assert_eq!(snap.len(), 2, "equal names are still distinct tasks");
        assert!(snap.contains(&a.erase()));
        assert!(snap.contains(&b.erase()));
    }
}
