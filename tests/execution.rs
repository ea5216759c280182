mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use common::{schedulers, thread_name, wait_for_state};
use taskgraph::{
    EventKind, ExecutorOutcome, Significance, Task, TaskBuilder, TaskError, TaskExecutor,
    TaskState,
};

#[test]
fn test_shared_dependent_runs_once() {
    let s = schedulers();
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let shared = Task::supply("shared", move || {
        r.fetch_add(1, Ordering::SeqCst);
        Ok(10u32)
    });
    let left = shared.then_apply(|v| Ok(v + 1));
    let right = shared.then_apply(|v| Ok(v * 2));
    let (l, r) = (left.clone(), right.clone());
    let root: Task<u32> = TaskBuilder::new("sum")
        .with_dependents([left.erase(), right.erase()])
        .build(move |_ctx| async move {
            Ok(l.result().unwrap_or_default() + r.result().unwrap_or_default())
        });

    assert_eq!(root.run(&s).unwrap(), 31);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    s.shutdown();
}

#[test]
fn test_relying_task_skips_body_on_failure() {
    let s = schedulers();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let failing = Task::<u32>::supply("fetch", || Err(TaskError::fail("404")));
    let next = failing.then_apply(move |v| {
        flag.store(true, Ordering::SeqCst);
        Ok(v)
    });

    let err = next.run(&s).unwrap_err();
    assert!(!ran.load(Ordering::SeqCst), "body must not run");
    assert_eq!(next.state(), TaskState::Failed);
    match err.task_error() {
        Some(TaskError::DependentFailed { task, source }) => {
            assert_eq!(task, "fetch");
            assert_eq!(source.as_label(), "task_failed");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    s.shutdown();
}

#[test]
fn test_relying_task_is_cancelled_with_its_dependent() {
    let s = schedulers();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let leaf: Task<u32> = TaskBuilder::new("leaf").build(|ctx| async move {
        ctx.cancelled().await;
        Err(TaskError::Cancelled)
    });
    let parent = leaf.then_apply(move |v| {
        flag.store(true, Ordering::SeqCst);
        Ok(v)
    });

    let exec = parent.start(&s).unwrap();
    assert!(wait_for_state(&leaf, TaskState::Running));
    leaf.cancel();

    assert!(matches!(exec.wait(), ExecutorOutcome::Cancelled));
    assert_eq!(leaf.state(), TaskState::Cancelled);
    assert_eq!(parent.state(), TaskState::Cancelled);
    assert!(!ran.load(Ordering::SeqCst), "body must not run");
    s.shutdown();
}

#[test]
fn test_non_relying_task_always_runs() {
    let s = schedulers();
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let slot = Arc::clone(&seen);
    let failing = Task::<u32>::supply("fetch", || Err(TaskError::fail("404")));
    let observed = failing.when_complete(move |value, error| {
        *slot.lock() = Some((value, error.map(|e| e.as_label())));
        Ok(())
    });

    let err = observed.run(&s).unwrap_err();
    assert_eq!(*seen.lock(), Some((None, Some("task_failed"))));
    assert_eq!(err.task_error().map(TaskError::as_label), Some("task_failed"));
    assert_eq!(observed.state(), TaskState::Failed);
    s.shutdown();
}

#[test]
fn test_when_complete_forwards_value() {
    let s = schedulers();
    let t = Task::supply("answer", || Ok(42u32)).when_complete(|v, e| {
        assert_eq!(v, Some(42));
        assert!(e.is_none());
        Ok(())
    });
    assert_eq!(t.run(&s).unwrap(), 42);
    s.shutdown();
}

#[test]
fn test_handler_error_replaces_outcome() {
    let s = schedulers();
    let t = Task::supply("answer", || Ok(42u32))
        .when_complete(|_, _| Err(TaskError::fail("dialog failed")));
    let err = t.run(&s).unwrap_err();
    assert_eq!(
        err.task_error().map(|e| e.to_string()),
        Some("execution failed: dialog failed".to_string())
    );
    s.shutdown();
}

#[test]
fn test_panicking_body_fails_task() {
    let s = schedulers();
    let t = Task::<u32>::supply("boom", || panic!("kaboom"));
    let err = t.run(&s).unwrap_err();
    match err.task_error() {
        Some(TaskError::Panicked { info }) => assert_eq!(info, "kaboom"),
        other => panic!("unexpected error: {other:?}"),
    }
    s.shutdown();
}

#[test]
fn test_prepare_error_fails_without_running_body() {
    let s = schedulers();
    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let t: Task<()> = TaskBuilder::new("list-mods")
        .with_pre_execute(|_| Err(TaskError::fail("index missing")))
        .build(move |_ctx| async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
    let err = t.run(&s).unwrap_err();
    assert_eq!(err.task_error().map(TaskError::as_label), Some("task_failed"));
    assert!(!ran.load(Ordering::SeqCst));
    s.shutdown();
}

#[test]
fn test_ui_continuation_runs_on_ui_thread() {
    let s = schedulers();
    let fetched = Task::supply_on("fetch", s.io(), || Ok(thread_name()));
    let ui = s.ui();
    let shown = fetched.then_apply_on(s.ui(), move |io_name| {
        assert!(ui.is_current());
        Ok((io_name, thread_name()))
    });

    let (io_name, ui_name) = shown.run(&s).unwrap();
    assert_eq!(io_name.as_deref(), Some("tg-io"));
    assert_eq!(ui_name.as_deref(), Some("tg-ui"));
    s.shutdown();
}

#[test]
fn test_stage_counter_and_partial_results() {
    let s = schedulers();
    let io = s.io();
    let root = TaskBuilder::new("check-mods")
        .with_stage("mods")
        .with_relying(false)
        .with_pre_execute(move |ctx| {
            ctx.set_total(3);
            let ok = Task::supply_on("mod-ok", io.clone(), || Ok("ok".to_string()))
                .with_counter("mods");
            let bad = Task::<String>::supply_on("mod-bad", io.clone(), || {
                Err(TaskError::fail("404"))
            })
            .with_counter("mods");
            let slow: Task<String> = TaskBuilder::new("mod-slow")
                .with_scheduler(io.clone())
                .with_counter("mods")
                .build(|ctx| async move {
                    ctx.cancelled().await;
                    Err(TaskError::Cancelled)
                });
            Ok(vec![ok.erase(), bad.erase(), slow.erase()])
        })
        .build(|ctx| async move {
            let results: Vec<String> = ctx
                .dependents()
                .iter()
                .filter_map(|t| t.result_as::<String>())
                .collect();
            Ok((results, ctx.failed_dependents().len()))
        });

    let exec = root.executor(&s);
    exec.start().unwrap();
    let children = root.dependents();
    assert_eq!(children.len(), 3);
    assert!(children.iter().all(|c| c.stage().as_deref() == Some("mods")));
    children[2].cancel();

    assert!(exec.wait().is_success());
    assert_eq!(children[2].state(), TaskState::Cancelled);
    let (results, failed) = root.result().unwrap();
    assert_eq!(results, vec!["ok".to_string()]);
    assert_eq!(failed, 2);

    let mods = exec.progress().stage("mods").unwrap();
    assert_eq!(mods.done, 3);
    assert_eq!(mods.total, Some(3));
    assert_eq!(mods.fraction(), Some(1.0));
    s.shutdown();
}

#[test]
fn test_counter_counts_every_outcome() {
    let s = schedulers();
    let leaves: Vec<Task<u32>> = (0..5u32)
        .map(|i| {
            Task::supply(format!("leaf-{i}"), move || {
                if i % 2 == 0 {
                    Ok(i)
                } else {
                    Err(TaskError::fail("odd"))
                }
            })
            .with_counter("leaves")
        })
        .collect();
    let all = Task::collect("collect", leaves);

    let exec = all.executor(&s);
    assert!(exec.run().unwrap().is_success());
    assert_eq!(all.result(), Some(vec![0, 2, 4]));
    assert_eq!(exec.progress().stage("leaves").map(|p| p.done), Some(5));
    assert_eq!(exec.task_count(), 6);
    s.shutdown();
}

#[test]
fn test_all_of_fails_on_first_failure() {
    let s = schedulers();
    let a = Task::supply("a", || Ok(1u32));
    let b = Task::<u32>::supply("b", || Err(TaskError::fail("nope")));
    let all = Task::all_of([a.erase(), b.erase()]);
    let err = all.run(&s).unwrap_err();
    assert_eq!(
        err.task_error().map(|e| e.root_cause().as_label()),
        Some("task_failed")
    );
    s.shutdown();
}

#[test]
fn test_progress_and_message_reported() {
    let s = schedulers();
    let t: Task<()> = TaskBuilder::new("download").build(|ctx| async move {
        ctx.update_message("downloading");
        ctx.update_progress(1, 2);
        ctx.update_progress(2, 2);
        ctx.set_property("bytes", 2048);
        Ok(())
    });
    let exec = t.executor(&s);
    let mut rx = exec.subscribe();
    assert!(exec.run().unwrap().is_success());

    assert_eq!(t.progress(), Some(1.0));
    assert_eq!(t.message().as_deref(), Some("downloading"));
    assert_eq!(t.property("bytes"), Some(serde_json::json!(2048)));

    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    assert_eq!(kinds.first(), Some(&EventKind::ExecutorStarted));
    assert_eq!(kinds.last(), Some(&EventKind::ExecutorStopped));
    assert!(kinds.contains(&EventKind::MessageUpdated));
    assert!(kinds.contains(&EventKind::ProgressUpdated));
    assert!(kinds.contains(&EventKind::PropertiesUpdated));
    assert!(kinds.contains(&EventKind::TaskRunning));
    assert!(kinds.contains(&EventKind::TaskSucceeded));
    s.shutdown();
}

#[test]
fn test_rejected_by_closed_scheduler() {
    let s = schedulers();
    s.ui_scheduler().shutdown();
    let t = Task::supply_on("late", s.ui(), || Ok(()));
    let err = t.run(&s).unwrap_err();
    assert_eq!(err.task_error().map(TaskError::as_label), Some("task_rejected"));
    s.shutdown();
}

#[test]
fn test_io_shutdown_settles_running_task() {
    let s = schedulers();
    let long: Task<()> = TaskBuilder::new("long")
        .with_scheduler(s.io())
        .build(|_ctx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });
    let exec = long.start(&s).unwrap();
    assert!(wait_for_state(&long, TaskState::Running));

    s.shutdown();
    assert!(wait_for_state(&long, TaskState::Failed));
    match exec.wait() {
        ExecutorOutcome::Failed(TaskError::Rejected { scheduler, .. }) => {
            assert_eq!(scheduler, "io")
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[test]
fn test_on_complete_runs_on_requested_scheduler() {
    let s = schedulers();
    let t = Task::supply("work", || Ok(1u8)).with_significance(Significance::Moderate);
    let exec = TaskExecutor::builder(&s).root(&t).build();
    let (tx, rx) = std::sync::mpsc::channel();
    let early = tx.clone();
    exec.on_complete(s.ui(), move |outcome| {
        let _ = early.send((outcome.is_success(), thread_name()));
    });
    exec.run().unwrap();

    // Registered after the fact: submitted right away.
    exec.on_complete(s.io(), move |outcome| {
        let _ = tx.send((outcome.is_success(), thread_name()));
    });

    let timeout = std::time::Duration::from_secs(5);
    let mut seen: Vec<_> = (0..2).map(|_| rx.recv_timeout(timeout).unwrap()).collect();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (true, Some("tg-io".to_string())),
            (true, Some("tg-ui".to_string())),
        ]
    );
    assert!(matches!(exec.outcome(), Some(ExecutorOutcome::Succeeded)));
    s.shutdown();
}

#[tokio::test]
async fn test_run_async_on_direct_scheduler() {
    let s = schedulers();
    let t = Task::supply_on("direct", s.direct(), || Ok("hi".to_string()))
        .then_apply_on(s.direct(), |v| Ok(v.len()));
    assert_eq!(t.run_async(&s).await.unwrap(), 2);
}
