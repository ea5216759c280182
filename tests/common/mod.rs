#![allow(dead_code)]

use std::sync::Once;
use std::time::{Duration, Instant};

use taskgraph::{Config, Schedulers, TaskRef, TaskState};

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG` (quiet by default).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Schedulers with thread names `tg-io` / `tg-ui`.
pub fn schedulers() -> Schedulers {
    init_tracing();
    let cfg = Config {
        io_threads: 4,
        thread_name: "tg".into(),
        ..Config::default()
    };
    Schedulers::new(&cfg).expect("schedulers")
}

/// Polls until `task` reaches `state` or the deadline passes.
pub fn wait_for_state(task: &TaskRef, state: TaskState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if task.state() == state {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

pub fn thread_name() -> Option<String> {
    std::thread::current().name().map(str::to_owned)
}
