//! Parallel task execution on a process pool or a thread pool
//!
//! This module runs one function over a batch of argument tuples and hands
//! the results back in submission order, whatever order they finish in.
//!
//! # Execution Strategies
//!
//! - **Process** ([`ProcessPool`]): one worker process per logical CPU
//!   (`num_cpus::get()`). Each worker has its own memory. Arguments and
//!   results cross the process boundary as JSON, so they must be
//!   `Serialize`/`DeserializeOwned`, and the task must be registered in the
//!   worker's [`TaskRegistry`].
//! - **Thread** ([`ThreadPool`]): a bounded pool of scoped threads (32 by
//!   default) sharing the caller's memory. Through [`ThreadPool::map`] or
//!   [`ParallelExecutor::threaded`] any closure and any argument type works,
//!   borrowed state included. No locking is added on the task's behalf.
//!
//! Both implement [`Dispatch`], so callers can swap one for the other, or for
//! their own, without touching the rest of the code.
//!
//! # Failure Semantics
//!
//! A run waits for every invocation. If any of them failed (error or panic)
//! the run fails with [`ExecutorError::Invocation`] for the earliest such
//! invocation; there are no partial results and no retries. Worker threads
//! are joined and worker processes reaped before `run` returns, on every
//! path.
//!
//! # Process Workers
//!
//! Process mode re-launches the current executable with
//! [`WORKER_TASK_ENV`] set. The binary has to hand control to the worker loop
//! before doing anything else:
//!
//! ```rust,no_run
//! use toolbox::parallel::{self, ExecutionMode, ParallelExecutor, Task, TaskRegistry};
//!
//! fn increment((x,): (i64,)) -> anyhow::Result<i64> {
//!     Ok(x + 1)
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let task = Task::new("increment", increment);
//!     let registry = TaskRegistry::new().with_task(task.clone());
//!     if parallel::serve_if_requested(&registry)? {
//!         return Ok(());
//!     }
//!
//!     let mut executor = ParallelExecutor::new(task, ExecutionMode::Process);
//!     executor.submit((1,));
//!     executor.submit((2,));
//!     executor.submit((3,));
//!     assert_eq!(executor.run()?, vec![2, 3, 4]);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod error;
pub mod processes;
pub mod threads;
pub mod worker;

use serde::{Serialize, de::DeserializeOwned};

pub use self::core::{DEFAULT_MAX_THREADS, Dispatch, ExecutionMode, ParallelExecutor, Task};
pub use error::ExecutorError;
pub use processes::{ProcessPool, WorkerCommand};
pub use threads::ThreadPool;
pub use worker::{TaskRegistry, WORKER_TASK_ENV, serve, serve_if_requested};

/// Run `func` over `params` on at most `max_workers` threads
pub fn execute_threads<A, R, F>(func: F, params: Vec<A>, max_workers: usize) -> Result<Vec<R>, ExecutorError>
where
    A: Send,
    R: Send,
    F: Fn(A) -> anyhow::Result<R> + Sync,
{
    ThreadPool::new(max_workers).map(func, params)
}

/// Run a registered task over `params` on one worker process per CPU
pub fn execute_processes<A, R>(task: &Task<A, R>, params: Vec<A>) -> Result<Vec<R>, ExecutorError>
where
    A: Serialize,
    R: DeserializeOwned,
{
    ProcessPool::new()?.dispatch(task, params)
}
