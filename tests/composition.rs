mod common;

use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{schedulers, wait_for_state};
use taskgraph::{ExecutorOutcome, Task, TaskBuilder, TaskError, TaskRef, TaskState};

#[test]
fn test_compose_after_manual_completion() {
    let s = schedulers();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let answer = Task::<u32>::manual("answer");
    let next = answer.then_compose(move |v| {
        c.fetch_add(1, Ordering::SeqCst);
        Task::supply("increment", move || Ok(v + 1))
    });

    let exec = next.start(&s).unwrap();
    assert!(!exec.is_done());
    assert_eq!(answer.state(), TaskState::Pending);
    assert!(answer.complete(20));
    assert!(!answer.complete(99), "second completion is ignored");

    assert!(exec.wait().is_success());
    assert_eq!(next.result(), Some(21));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    s.shutdown();
}

#[test]
fn test_compose_on_completed_task() {
    let s = schedulers();
    let t = Task::completed(2u32).then_compose(|v| Task::completed(v * 10));
    assert_eq!(t.run(&s).unwrap(), 20);
    s.shutdown();
}

#[test]
fn test_composed_subgraph_is_resolved() {
    let s = schedulers();
    let t = Task::supply("list", || Ok(vec![1u32, 2, 3])).then_compose(|items| {
        let parts: Vec<Task<u32>> = items
            .into_iter()
            .map(|i| Task::supply(format!("square-{i}"), move || Ok(i * i)))
            .collect();
        Task::collect("squares", parts).then_apply(|v| Ok(v.iter().sum::<u32>()))
    });

    let exec = t.executor(&s);
    assert!(exec.run().unwrap().is_success());
    assert_eq!(t.result(), Some(14));
    // list, compose, squares, three leaves, sum
    assert_eq!(exec.task_count(), 7);
    s.shutdown();
}

#[test]
fn test_composed_failure_propagates() {
    let s = schedulers();
    let t = Task::supply("first", || Ok(1u32))
        .then_compose(|_| Task::<u32>::supply("second", || Err(TaskError::fail("denied"))));
    let err = t.run(&s).unwrap_err();
    assert_eq!(
        err.task_error().map(|e| e.root_cause().to_string()),
        Some("execution failed: denied".to_string())
    );
    assert_eq!(t.state(), TaskState::Failed);
    s.shutdown();
}

#[test]
fn test_with_compose_recovers_from_failure() {
    let s = schedulers();
    let t = Task::<u32>::supply("primary", || Err(TaskError::fail("offline"))).with_compose(
        |value, error| match (value, error) {
            (Some(v), _) => Task::completed(v),
            (None, Some(_)) => Task::supply("fallback", || Ok(7u32)),
            (None, None) => Task::failed(TaskError::fail("no outcome")),
        },
    );
    assert_eq!(t.run(&s).unwrap(), 7);
    s.shutdown();
}

#[test]
fn test_composed_cycle_fails_task() {
    let s = schedulers();
    let outer: Arc<OnceLock<TaskRef>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&outer);
    let t = Task::supply("seed", || Ok(1u32)).then_compose(move |v| {
        let mut next = TaskBuilder::new("loop");
        if let Some(outer) = slot.get() {
            next = next.with_dependent(outer);
        }
        next.build(move |_ctx| async move { Ok(v) })
    });
    outer.set(t.erase()).unwrap();

    let err = t.run(&s).unwrap_err();
    match err.task_error() {
        Some(TaskError::Graph { error }) => assert!(error.starts_with("dependency cycle")),
        other => panic!("unexpected error: {other:?}"),
    }
    s.shutdown();
}

#[test]
fn test_cancel_reaches_composed_task() {
    let s = schedulers();
    let inner = Arc::new(parking_lot::Mutex::new(None));
    let slot = Arc::clone(&inner);
    let t = Task::supply("start", || Ok(())).then_compose(move |_| {
        let slow: Task<()> = TaskBuilder::new("slow").build(|ctx| async move {
            ctx.cancelled().await;
            Err(TaskError::Cancelled)
        });
        *slot.lock() = Some(slow.erase());
        slow
    });

    let exec = t.start(&s).unwrap();
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    let slow = loop {
        if let Some(slow) = inner.lock().clone() {
            break slow;
        }
        assert!(std::time::Instant::now() < deadline, "compose never ran");
        std::thread::sleep(std::time::Duration::from_millis(5));
    };
    assert!(wait_for_state(&slow, TaskState::Running));

    exec.cancel();
    assert!(matches!(exec.wait(), ExecutorOutcome::Cancelled));
    assert_eq!(slow.state(), TaskState::Cancelled);
    assert_eq!(t.state(), TaskState::Cancelled);
    s.shutdown();
}
