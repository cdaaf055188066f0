//! Process pool tests.
//!
//! Worker processes are copies of this test binary, so it cannot use the
//! libtest harness: `main` has to hand control to the worker loop before
//! anything else runs.

use anyhow::{Result, bail, ensure};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use toolbox::parallel::{
    self, ExecutionMode, ExecutorError, ParallelExecutor, ProcessPool, Task, TaskRegistry, execute_processes,
};

fn increment() -> Task<(i64,), i64> {
    Task::new("increment", |(x,): (i64,)| Ok(x + 1))
}

fn chatty_increment() -> Task<(i64,), i64> {
    Task::new("chatty_increment", |(x,): (i64,)| {
        // No trailing newline, the reply shares the line with this text
        print!("progress {x}...");
        Ok(x + 1)
    })
}

fn slow_increment() -> Task<(i64, u64), i64> {
    Task::new("slow_increment", |(x, delay_ms): (i64, u64)| {
        std::thread::sleep(Duration::from_millis(delay_ms));
        Ok(x + 1)
    })
}

fn fail_on_odd() -> Task<(i64,), i64> {
    Task::new("fail_on_odd", |(x,): (i64,)| {
        if x % 2 != 0 {
            bail!("odd input {x}");
        }
        Ok(x)
    })
}

fn panic_on_negative() -> Task<(i64,), i64> {
    Task::new("panic_on_negative", |(x,): (i64,)| {
        if x < 0 {
            panic!("kaboom {x}");
        }
        Ok(x)
    })
}

fn exit_on_negative() -> Task<(i64,), i64> {
    Task::new("exit_on_negative", |(x,): (i64,)| {
        if x < 0 {
            std::process::exit(3);
        }
        Ok(x + 1)
    })
}

fn worker_pid() -> Task<(u64,), u32> {
    Task::new("worker_pid", |(delay_ms,): (u64,)| {
        std::thread::sleep(Duration::from_millis(delay_ms));
        Ok(std::process::id())
    })
}

fn record_pid_then_fail() -> Task<(PathBuf,), ()> {
    Task::new("record_pid_then_fail", |(path,): (PathBuf,)| {
        std::fs::write(&path, std::process::id().to_string())?;
        bail!("failed after recording pid")
    })
}

fn registry() -> TaskRegistry {
    TaskRegistry::new()
        .with_task(increment())
        .with_task(chatty_increment())
        .with_task(slow_increment())
        .with_task(fail_on_odd())
        .with_task(panic_on_negative())
        .with_task(exit_on_negative())
        .with_task(worker_pid())
        .with_task(record_pid_then_fail())
}

fn run_process<A, R>(task: Task<A, R>, batch: Vec<A>) -> Result<Vec<R>, ExecutorError>
where
    A: serde::Serialize + Send,
    R: serde::de::DeserializeOwned + Send,
{
    let mut executor = ParallelExecutor::new(task, ExecutionMode::Process);
    for args in batch {
        executor.submit(args);
    }
    executor.run()
}

#[cfg(target_os = "linux")]
fn assert_gone(pid: u32) -> Result<()> {
    // A reaped child has no /proc entry left, not even as a zombie
    ensure!(
        !std::path::Path::new(&format!("/proc/{pid}")).exists(),
        "worker process {pid} is still around"
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn assert_gone(_pid: u32) -> Result<()> {
    Ok(())
}

fn test_results_in_submission_order() -> Result<()> {
    let results = run_process(increment(), vec![(1,), (2,), (3,)])?;
    ensure!(results == vec![2, 3, 4], "got {results:?}");
    Ok(())
}

fn test_order_survives_artificial_delays() -> Result<()> {
    let pool = ProcessPool::new()?.workers(4);
    let mut executor = ParallelExecutor::new(slow_increment(), ExecutionMode::Process);
    for (x, delay_ms) in [(0, 400), (1, 300), (2, 200), (3, 100), (4, 0)] {
        executor.submit((x, delay_ms));
    }
    let results = executor.run_with(&pool)?;
    ensure!(results == vec![1, 2, 3, 4, 5], "got {results:?}");
    Ok(())
}

fn test_task_output_without_newline() -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(run_process(chatty_increment(), vec![(1,), (2,), (3,)]));
    });
    let results = match rx.recv_timeout(Duration::from_secs(30)) {
        Ok(results) => results?,
        Err(_) => bail!("run() did not return"),
    };
    ensure!(results == vec![2, 3, 4], "got {results:?}");
    Ok(())
}

fn test_pool_refused_inside_worker() -> Result<()> {
    // Runs first, before any test thread exists
    unsafe { std::env::set_var(parallel::WORKER_TASK_ENV, "increment") };
    let pool = ProcessPool::new();
    let executor_result = run_process(increment(), vec![(1,)]);
    unsafe { std::env::remove_var(parallel::WORKER_TASK_ENV) };

    ensure!(
        matches!(pool, Err(ExecutorError::Protocol(ref message)) if message.contains("inside a worker")),
        "pool was created: {pool:?}"
    );
    ensure!(
        matches!(executor_result, Err(ExecutorError::Protocol(_))),
        "executor ran: {executor_result:?}"
    );
    Ok(())
}

fn test_empty_batch() -> Result<()> {
    let results = run_process(increment(), Vec::new())?;
    ensure!(results.is_empty());
    Ok(())
}

fn test_convenience_function() -> Result<()> {
    let results = execute_processes(&increment(), vec![(10,), (20,)])?;
    ensure!(results == vec![11, 21], "got {results:?}");
    Ok(())
}

fn test_earliest_failure_is_reported() -> Result<()> {
    let err = match run_process(fail_on_odd(), vec![(2,), (4,), (5,), (6,), (7,)]) {
        Ok(results) => bail!("expected a failure, got {results:?}"),
        Err(err) => err,
    };
    ensure!(err.failed_index() == Some(2), "wrong index: {err:?}");
    let message = format!("{:#}", anyhow::Error::from(err));
    ensure!(message.contains("odd input 5"), "lost the cause: {message}");
    Ok(())
}

fn test_panic_becomes_invocation_error() -> Result<()> {
    let err = match run_process(panic_on_negative(), vec![(1,), (-1,)]) {
        Ok(results) => bail!("expected a failure, got {results:?}"),
        Err(err) => err,
    };
    ensure!(err.failed_index() == Some(1), "wrong index: {err:?}");
    let message = format!("{:#}", anyhow::Error::from(err));
    ensure!(message.contains("kaboom -1"), "lost the panic message: {message}");
    Ok(())
}

fn test_crashed_worker_fails_its_invocation() -> Result<()> {
    let err = match run_process(exit_on_negative(), vec![(1,), (-1,), (2,)]) {
        Ok(results) => bail!("expected a failure, got {results:?}"),
        Err(err) => err,
    };
    ensure!(err.failed_index() == Some(1), "wrong index: {err:?}");
    Ok(())
}

fn test_unregistered_task_fails() -> Result<()> {
    let task: Task<(i64,), i64> = Task::new("not_registered", |(x,): (i64,)| Ok(x));
    let err = match run_process(task, vec![(1,)]) {
        Ok(results) => bail!("expected a failure, got {results:?}"),
        Err(err) => err,
    };
    let message = format!("{:#}", anyhow::Error::from(err));
    ensure!(message.contains("not registered"), "unexpected error: {message}");
    Ok(())
}

fn test_workers_are_reaped_after_success() -> Result<()> {
    let pool = ProcessPool::new()?.workers(3);
    let mut executor = ParallelExecutor::new(worker_pid(), ExecutionMode::Process);
    for _ in 0..9 {
        executor.submit((20,));
    }
    let pids: HashSet<u32> = executor.run_with(&pool)?.into_iter().collect();

    ensure!(!pids.is_empty() && pids.len() <= 3, "unexpected worker pids {pids:?}");
    ensure!(!pids.contains(&std::process::id()), "task ran in the parent");
    for pid in pids {
        assert_gone(pid)?;
    }
    Ok(())
}

fn test_workers_are_reaped_after_failure() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let pid_file = temp_dir.path().join("worker.pid");

    let result = run_process(record_pid_then_fail(), vec![(pid_file.clone(),)]);
    ensure!(result.is_err(), "expected a failure");

    let pid: u32 = std::fs::read_to_string(&pid_file)?.trim().parse()?;
    assert_gone(pid)
}

fn main() -> Result<()> {
    if parallel::serve_if_requested(&registry())? {
        return Ok(());
    }

    let tests: &[(&str, fn() -> Result<()>)] = &[
        ("pool_refused_inside_worker", test_pool_refused_inside_worker),
        ("results_in_submission_order", test_results_in_submission_order),
        ("order_survives_artificial_delays", test_order_survives_artificial_delays),
        ("task_output_without_newline", test_task_output_without_newline),
        ("empty_batch", test_empty_batch),
        ("convenience_function", test_convenience_function),
        ("earliest_failure_is_reported", test_earliest_failure_is_reported),
        ("panic_becomes_invocation_error", test_panic_becomes_invocation_error),
        ("crashed_worker_fails_its_invocation", test_crashed_worker_fails_its_invocation),
        ("unregistered_task_fails", test_unregistered_task_fails),
        ("workers_are_reaped_after_success", test_workers_are_reaped_after_success),
        ("workers_are_reaped_after_failure", test_workers_are_reaped_after_failure),
    ];

    let filter = std::env::args().skip(1).find(|arg| !arg.starts_with('-'));
    let mut failed = Vec::new();
    for (name, test) in tests {
        if filter.as_deref().is_some_and(|filter| !name.contains(filter)) {
            continue;
        }
        match test() {
            Ok(()) => println!("test {name} ... ok"),
            Err(e) => {
                println!("test {name} ... FAILED\n    {e:#}");
                failed.push(*name);
            }
        }
    }

    if !failed.is_empty() {
        bail!("{} process pool test(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
