//! Checks a handful of mods for updates, downloads the outdated ones and reports
//! the result on the ui scheduler.
//!
//! Run with:
//! ```bash
//! RUST_LOG=info cargo run --example mod_updates --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use taskgraph::{
    Config, LogWriter, Schedulers, Significance, Task, TaskBuilder, TaskContext, TaskError,
    TaskExecutor,
};
use tracing_subscriber::EnvFilter;

const MODS: &[(&str, u32, u32)] = &[
    ("better-maps", 3, 4),
    ("quiet-footsteps", 1, 1),
    ("hd-textures", 7, 9),
    ("abandoned-mod", 2, 0),
];

/// Latest published version; `0` simulates a missing index entry.
async fn check(
    ctx: TaskContext,
    name: &'static str,
    installed: u32,
    latest: u32,
) -> Result<Option<u32>, TaskError> {
    ctx.update_message(format!("checking {name}"));
    tokio::time::sleep(Duration::from_millis(50 * u64::from(installed))).await;
    ctx.check_cancelled()?;
    match latest {
        0 => Err(TaskError::fail(format!("{name}: not found in index"))),
        v if v > installed => Ok(Some(v)),
        _ => Ok(None),
    }
}

async fn download(ctx: TaskContext, name: String, version: u32) -> Result<String, TaskError> {
    for chunk in 1..=4u64 {
        tokio::time::sleep(Duration::from_millis(40)).await;
        ctx.check_cancelled()?;
        ctx.update_progress(chunk, 4);
    }
    ctx.set_property("version", version);
    Ok(format!("{name} -> v{version}"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let schedulers = Schedulers::new(&Config {
        io_threads: 4,
        thread_name: "mods".into(),
        ..Config::default()
    })?;
    let io = schedulers.io();

    let update_all = TaskBuilder::new("update-mods")
        .with_stage("check")
        .with_relying(false)
        .with_pre_execute(move |prep| {
            prep.set_total(MODS.len() as u64);
            let tasks = MODS
                .iter()
                .map(|&(name, installed, latest)| {
                    let checked = TaskBuilder::new(format!("check:{name}"))
                        .with_scheduler(io.clone())
                        .with_counter("check")
                        .build(move |ctx| check(ctx, name, installed, latest));
                    checked
                        .then_compose(move |found| match found {
                            Some(v) => TaskBuilder::new(format!("download:{name}"))
                                .with_stage("download")
                                .with_counter("download")
                                .build(move |ctx| download(ctx, name.to_string(), v)),
                            None => Task::completed(format!("{name} is up to date"))
                                .with_significance(Significance::Minor),
                        })
                        .erase()
                })
                .collect();
            Ok(tasks)
        })
        .build(|ctx| async move {
            let lines: Vec<String> = ctx
                .dependents()
                .iter()
                .filter_map(|t| t.result_as::<String>())
                .collect();
            let failed: Vec<String> = ctx.failed_dependents().iter().map(|t| t.name()).collect();
            Ok((lines, failed))
        });

    let report = update_all.when_complete_on(schedulers.ui(), |outcome, err| {
        match (outcome, err) {
            (Some((lines, failed)), _) => {
                for line in lines {
                    println!("  {line}");
                }
                if !failed.is_empty() {
                    println!("  {} mod(s) could not be updated: {failed:?}", failed.len());
                }
            }
            (None, Some(e)) => println!("update aborted: {e}"),
            (None, None) => {}
        }
        Ok(())
    });

    let exec = TaskExecutor::builder(&schedulers)
        .root(&report)
        .subscribers(vec![Arc::new(LogWriter)])
        .build();
    exec.start()?;

    while !exec.is_done() {
        let progress = exec.progress();
        if let Some(check) = progress.stage("check") {
            println!("checked {}/{}", check.done, check.total.unwrap_or(0));
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let outcome = exec.wait();
    println!("finished: {}", outcome.as_label());
    schedulers.shutdown();
    Ok(())
}
